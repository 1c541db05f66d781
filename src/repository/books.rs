//! Books repository

use sqlx::{Pool, Postgres};

use crate::{
    error::{conflict_on_unique, AppError, AppResult},
    models::{
        book::{BookQuery, CreateBook, DailyCount, UpdateBook},
        Book, BookStatus, PageParams,
    },
};

const BOOK_SELECT: &str = r#"
    SELECT b.*, c.name AS category_name
    FROM books b
    LEFT JOIN categories c ON c.id = b.category_id
"#;

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Search books with optional filters and pagination
    pub async fn search(&self, query: &BookQuery, page: &PageParams) -> AppResult<(Vec<Book>, i64)> {
        let mut conditions = Vec::new();
        let mut idx = 1;

        let keyword = query
            .keyword
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(|k| format!("%{}%", k));
        if keyword.is_some() {
            conditions.push(format!(
                "(b.title ILIKE ${0} OR b.author ILIKE ${0} OR b.isbn ILIKE ${0})",
                idx
            ));
            idx += 1;
        }
        if query.category.is_some() {
            conditions.push(format!("b.category_id = ${}", idx));
            idx += 1;
        }
        let author = query.author.as_ref().map(|a| format!("%{}%", a.trim()));
        if author.is_some() {
            conditions.push(format!("b.author ILIKE ${}", idx));
            idx += 1;
        }
        let publisher = query.publisher.as_ref().map(|p| format!("%{}%", p.trim()));
        if publisher.is_some() {
            conditions.push(format!("b.publisher ILIKE ${}", idx));
            idx += 1;
        }
        if query.status.is_some() {
            conditions.push(format!("b.status = ${}", idx));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_q = format!("SELECT COUNT(*) FROM books b {}", where_clause);
        let mut count_builder = sqlx::query_scalar::<_, i64>(&count_q);
        if let Some(ref kw) = keyword { count_builder = count_builder.bind(kw); }
        if let Some(cat) = query.category { count_builder = count_builder.bind(cat); }
        if let Some(ref a) = author { count_builder = count_builder.bind(a); }
        if let Some(ref p) = publisher { count_builder = count_builder.bind(p); }
        if let Some(status) = query.status { count_builder = count_builder.bind(status); }
        let total = count_builder.fetch_one(&self.pool).await?;

        let select_q = format!(
            "{} {} ORDER BY b.created_at DESC, b.id DESC LIMIT {} OFFSET {}",
            BOOK_SELECT,
            where_clause,
            page.limit,
            page.offset()
        );
        let mut builder = sqlx::query_as::<_, Book>(&select_q);
        if let Some(ref kw) = keyword { builder = builder.bind(kw); }
        if let Some(cat) = query.category { builder = builder.bind(cat); }
        if let Some(ref a) = author { builder = builder.bind(a); }
        if let Some(ref p) = publisher { builder = builder.bind(p); }
        if let Some(status) = query.status { builder = builder.bind(status); }

        let rows = builder.fetch_all(&self.pool).await?;
        Ok((rows, total))
    }

    /// Get book by ID, with its category name
    pub async fn get_by_id(&self, id: i32) -> AppResult<Book> {
        let query = format!("{} WHERE b.id = $1", BOOK_SELECT);
        sqlx::query_as::<_, Book>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book {} not found", id)))
    }

    pub async fn exists(&self, id: i32) -> AppResult<bool> {
        let found = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM books WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(found)
    }

    pub async fn create(&self, data: &CreateBook, total: i32, available: i32) -> AppResult<Book> {
        let status = BookStatus::for_availability(BookStatus::Available, available);
        sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (
                isbn, title, author, publisher, publish_year, description,
                cover_image, total_quantity, available_quantity, location,
                status, category_id
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(data.isbn.trim())
        .bind(&data.title)
        .bind(&data.author)
        .bind(&data.publisher)
        .bind(data.publish_year)
        .bind(&data.description)
        .bind(&data.cover_image)
        .bind(total)
        .bind(available)
        .bind(&data.location)
        .bind(status)
        .bind(data.category_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "ISBN already exists"))
    }

    /// Update a book. Stock is recomputed under a row lock so concurrent
    /// loans are not lost.
    pub async fn update(&self, id: i32, data: &UpdateBook) -> AppResult<Book> {
        let mut tx = self.pool.begin().await?;

        let book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book {} not found", id)))?;

        let (total, available, status) = data.resolve_stock(&book)?;

        let mut sets = vec![
            "updated_at = NOW()".to_string(),
            "total_quantity = $1".to_string(),
            "available_quantity = $2".to_string(),
            "status = $3".to_string(),
        ];
        let mut idx = 4;

        macro_rules! add_f {
            ($field:expr, $name:expr) => {
                if $field.is_some() { sets.push(format!("{} = ${}", $name, idx)); idx += 1; }
            };
        }

        add_f!(data.isbn, "isbn");
        add_f!(data.title, "title");
        add_f!(data.author, "author");
        add_f!(data.publisher, "publisher");
        add_f!(data.publish_year, "publish_year");
        add_f!(data.description, "description");
        add_f!(data.cover_image, "cover_image");
        add_f!(data.location, "location");
        add_f!(data.category_id, "category_id");

        let query = format!("UPDATE books SET {} WHERE id = ${}", sets.join(", "), idx);
        let mut builder = sqlx::query(&query).bind(total).bind(available).bind(status);

        macro_rules! bind_f {
            ($field:expr) => {
                if let Some(ref val) = $field { builder = builder.bind(val); }
            };
        }

        bind_f!(data.isbn);
        bind_f!(data.title);
        bind_f!(data.author);
        bind_f!(data.publisher);
        bind_f!(data.publish_year);
        bind_f!(data.description);
        bind_f!(data.cover_image);
        bind_f!(data.location);
        bind_f!(data.category_id);

        builder
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| conflict_on_unique(e, "ISBN already exists"))?;

        tx.commit().await?;
        self.get_by_id(id).await
    }

    /// Delete a book that is not on loan
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let locked = sqlx::query_scalar::<_, i32>("SELECT id FROM books WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Err(AppError::NotFound(format!("Book {} not found", id)));
        }

        let active = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM borrow_records
            WHERE book_id = $1 AND return_date IS NULL
              AND status IN ('borrowed', 'renewed', 'overdue')
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if active > 0 {
            return Err(AppError::BusinessRule(format!(
                "Book has {} active borrow record(s) and cannot be deleted",
                active
            )));
        }

        sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Best rated books with a copy on the shelf
    pub async fn popular(&self, limit: i64) -> AppResult<Vec<Book>> {
        let query = format!(
            r#"{}
            WHERE b.available_quantity > 0 AND b.status <> 'maintenance'
            ORDER BY b.rating DESC, b.rating_count DESC, b.id
            LIMIT $1"#,
            BOOK_SELECT
        );
        let rows = sqlx::query_as::<_, Book>(&query)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Book ids and categories of the user's most recent borrows
    pub async fn recent_borrow_profile(&self, user_id: i32, depth: i64) -> AppResult<(Vec<i32>, Vec<i32>)> {
        let rows: Vec<(i32, Option<i32>)> = sqlx::query_as(
            r#"
            SELECT br.book_id, b.category_id
            FROM borrow_records br
            JOIN books b ON b.id = br.book_id
            WHERE br.user_id = $1
            ORDER BY br.borrow_date DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(depth)
        .fetch_all(&self.pool)
        .await?;

        let book_ids = rows.iter().map(|(id, _)| *id).collect();
        let mut category_ids: Vec<i32> = rows.iter().filter_map(|(_, c)| *c).collect();
        category_ids.sort_unstable();
        category_ids.dedup();
        Ok((book_ids, category_ids))
    }

    /// Available books outside `exclude`, limited to `categories` when non-empty
    pub async fn recommended(&self, categories: &[i32], exclude: &[i32], limit: i64) -> AppResult<Vec<Book>> {
        let query = format!(
            r#"{}
            WHERE b.available_quantity > 0
              AND b.status <> 'maintenance'
              AND b.id <> ALL($1)
              AND (cardinality($2::int[]) = 0 OR b.category_id = ANY($2))
            ORDER BY b.rating DESC, b.rating_count DESC, b.id
            LIMIT $3"#,
            BOOK_SELECT
        );
        let rows = sqlx::query_as::<_, Book>(&query)
            .bind(exclude)
            .bind(categories)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// (titles, copies on the shelf)
    pub async fn stock_totals(&self) -> AppResult<(i64, i64)> {
        let row: (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(available_quantity), 0)::bigint FROM books",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    /// Loans started per day over the last `days` days
    pub async fn borrow_trend(&self, days: i32) -> AppResult<Vec<DailyCount>> {
        let rows = sqlx::query_as::<_, DailyCount>(
            r#"
            SELECT (borrow_date AT TIME ZONE 'UTC')::date AS date, COUNT(*) AS count
            FROM borrow_records
            WHERE borrow_date >= NOW() - make_interval(days => $1)
            GROUP BY 1
            ORDER BY 1
            "#,
        )
        .bind(days)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
