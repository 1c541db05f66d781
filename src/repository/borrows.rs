//! Borrow records repository: loan, return and renewal transactions

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{
        borrow::{self, BorrowQuery, BorrowRow, BorrowStatistics},
        Book, BookStatus, BorrowDetails, BorrowRecord, PageParams, User,
    },
};

const BORROW_SELECT: &str = r#"
    SELECT br.*, b.title AS book_title, b.author AS book_author,
           b.isbn AS book_isbn, b.cover_image AS book_cover_image
    FROM borrow_records br
    JOIN books b ON b.id = br.book_id
"#;

const BORROW_SELECT_WITH_USER: &str = r#"
    SELECT br.*, b.title AS book_title, b.author AS book_author,
           b.isbn AS book_isbn, b.cover_image AS book_cover_image,
           u.username, u.full_name AS user_full_name
    FROM borrow_records br
    JOIN books b ON b.id = br.book_id
    JOIN users u ON u.id = br.user_id
"#;

const ACTIVE: &str = "br.return_date IS NULL AND br.status IN ('borrowed', 'renewed', 'overdue')";

/// A loan that just became overdue, with what the reminder needs
#[derive(Debug, Clone, FromRow)]
pub struct OverdueNotice {
    pub record_id: i32,
    pub due_date: DateTime<Utc>,
    pub email: String,
    pub full_name: String,
    pub title: String,
}

/// Outcome of a return transaction
#[derive(Debug)]
pub struct Returned {
    pub record: BorrowRecord,
    pub overdue_days: i64,
}

#[derive(Clone)]
pub struct BorrowsRepository {
    pool: Pool<Postgres>,
}

impl BorrowsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<BorrowRecord> {
        sqlx::query_as::<_, BorrowRecord>("SELECT * FROM borrow_records WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Borrow record {} not found", id)))
    }

    /// Lend one copy of `book_id` to `user_id` until `due_date`
    pub async fn borrow(&self, user_id: i32, book_id: i32, due_date: DateTime<Utc>) -> AppResult<BorrowRecord> {
        let mut tx = self.pool.begin().await?;

        // Lock order: user, then book
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| {
                AppError::BusinessRule("User does not exist or has been disabled".to_string())
            })?;
        user.ensure_can_borrow()?;

        let book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1 FOR UPDATE")
            .bind(book_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book {} not found", book_id)))?;
        book.ensure_borrowable()?;

        let already = sqlx::query_scalar::<_, bool>(&format!(
            "SELECT EXISTS(SELECT 1 FROM borrow_records br WHERE br.user_id = $1 AND br.book_id = $2 AND {})",
            ACTIVE
        ))
        .bind(user_id)
        .bind(book_id)
        .fetch_one(&mut *tx)
        .await?;
        if already {
            return Err(AppError::BusinessRule(
                "You have already borrowed this book".to_string(),
            ));
        }

        let record = sqlx::query_as::<_, BorrowRecord>(
            r#"
            INSERT INTO borrow_records (user_id, book_id, borrow_date, due_date, status)
            VALUES ($1, $2, NOW(), $3, 'borrowed')
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .bind(due_date)
        .fetch_one(&mut *tx)
        .await?;

        let available = book.available_quantity - 1;
        sqlx::query(
            "UPDATE books SET available_quantity = $1, status = $2, updated_at = NOW() WHERE id = $3",
        )
        .bind(available)
        .bind(BookStatus::for_availability(book.status, available))
        .bind(book_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE users SET borrow_count = borrow_count + 1, updated_at = NOW() WHERE id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            UPDATE reservations SET status = 'fulfilled', updated_at = NOW()
            WHERE user_id = $1 AND book_id = $2 AND status = 'pending'
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(record)
    }

    /// Close a loan, charging `fine_per_day` for every started day late
    pub async fn return_book(&self, id: i32, now: DateTime<Utc>, fine_per_day: Decimal) -> AppResult<Returned> {
        let mut tx = self.pool.begin().await?;

        let record = sqlx::query_as::<_, BorrowRecord>(
            "SELECT * FROM borrow_records WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Borrow record {} not found", id)))?;
        record.ensure_returnable()?;

        let overdue_days = borrow::days_late(record.due_date, now);
        let fine = borrow::compute_fine(record.due_date, now, fine_per_day);

        let record = sqlx::query_as::<_, BorrowRecord>(
            r#"
            UPDATE borrow_records
            SET return_date = $1, fine_amount = $2, status = 'returned', updated_at = $1
            WHERE id = $3
            RETURNING *
            "#,
        )
        .bind(now)
        .bind(fine)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE users SET borrow_count = GREATEST(borrow_count - 1, 0), updated_at = NOW() WHERE id = $1",
        )
        .bind(record.user_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE books
            SET available_quantity = LEAST(available_quantity + 1, total_quantity),
                status = CASE WHEN status = 'maintenance' THEN status ELSE 'available'::book_status END,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(record.book_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Returned { record, overdue_days })
    }

    /// Push the due date of an active loan back by `days`
    pub async fn renew(
        &self,
        id: i32,
        days: i64,
        max_renewals: i32,
        now: DateTime<Utc>,
    ) -> AppResult<BorrowRecord> {
        let mut tx = self.pool.begin().await?;

        let record = sqlx::query_as::<_, BorrowRecord>(
            "SELECT * FROM borrow_records WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Borrow record {} not found", id)))?;
        record.ensure_renewable(max_renewals, now)?;

        let reserved = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM reservations
                WHERE book_id = $1 AND user_id <> $2 AND status = 'pending'
            )
            "#,
        )
        .bind(record.book_id)
        .bind(record.user_id)
        .fetch_one(&mut *tx)
        .await?;
        if reserved {
            return Err(AppError::BusinessRule(
                "This book is reserved by another reader and cannot be renewed".to_string(),
            ));
        }

        let record = sqlx::query_as::<_, BorrowRecord>(
            r#"
            UPDATE borrow_records
            SET due_date = $1, status = 'renewed', renew_count = renew_count + 1, updated_at = NOW()
            WHERE id = $2
            RETURNING *
            "#,
        )
        .bind(borrow::due_date(record.due_date, days))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(record)
    }

    /// All loans of a user, newest first
    pub async fn history(&self, user_id: i32, page: &PageParams) -> AppResult<(Vec<BorrowDetails>, i64)> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM borrow_records WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        let query = format!(
            "{} WHERE br.user_id = $1 ORDER BY br.borrow_date DESC, br.id DESC LIMIT $2 OFFSET $3",
            BORROW_SELECT
        );
        let rows = sqlx::query_as::<_, BorrowRow>(&query)
            .bind(user_id)
            .bind(page.limit)
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;
        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    /// Active loans of a user, soonest due first
    pub async fn current(&self, user_id: i32) -> AppResult<Vec<BorrowDetails>> {
        let query = format!(
            "{} WHERE br.user_id = $1 AND {} ORDER BY br.due_date",
            BORROW_SELECT, ACTIVE
        );
        let rows = sqlx::query_as::<_, BorrowRow>(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn recent_for_user(&self, user_id: i32, limit: i64) -> AppResult<Vec<BorrowDetails>> {
        let query = format!(
            "{} WHERE br.user_id = $1 ORDER BY br.borrow_date DESC, br.id DESC LIMIT $2",
            BORROW_SELECT
        );
        let rows = sqlx::query_as::<_, BorrowRow>(&query)
            .bind(user_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Staff listing with optional filters
    pub async fn list(&self, query: &BorrowQuery, page: &PageParams) -> AppResult<(Vec<BorrowDetails>, i64)> {
        let mut conditions = Vec::new();
        let mut idx = 1;

        if query.status.is_some() {
            conditions.push(format!("br.status = ${}", idx));
            idx += 1;
        }
        if query.user_id.is_some() {
            conditions.push(format!("br.user_id = ${}", idx));
            idx += 1;
        }
        if query.book_id.is_some() {
            conditions.push(format!("br.book_id = ${}", idx));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_q = format!("SELECT COUNT(*) FROM borrow_records br {}", where_clause);
        let mut count_builder = sqlx::query_scalar::<_, i64>(&count_q);
        if let Some(status) = query.status { count_builder = count_builder.bind(status); }
        if let Some(user_id) = query.user_id { count_builder = count_builder.bind(user_id); }
        if let Some(book_id) = query.book_id { count_builder = count_builder.bind(book_id); }
        let total = count_builder.fetch_one(&self.pool).await?;

        let select_q = format!(
            "{} {} ORDER BY br.borrow_date DESC, br.id DESC LIMIT {} OFFSET {}",
            BORROW_SELECT_WITH_USER,
            where_clause,
            page.limit,
            page.offset()
        );
        let mut builder = sqlx::query_as::<_, BorrowRow>(&select_q);
        if let Some(status) = query.status { builder = builder.bind(status); }
        if let Some(user_id) = query.user_id { builder = builder.bind(user_id); }
        if let Some(book_id) = query.book_id { builder = builder.bind(book_id); }

        let rows = builder.fetch_all(&self.pool).await?;
        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    /// Circulation figures, for everyone or for one user
    pub async fn statistics(&self, user_id: Option<i32>) -> AppResult<BorrowStatistics> {
        let stats = sqlx::query_as::<_, BorrowStatistics>(&format!(
            r#"
            SELECT
                COUNT(*) AS total_borrows,
                COUNT(*) FILTER (WHERE {active}) AS active_borrows,
                COUNT(*) FILTER (WHERE {active} AND (br.status = 'overdue' OR br.due_date < NOW())) AS overdue_borrows,
                COUNT(*) FILTER (WHERE br.status = 'returned') AS returned_borrows,
                COUNT(*) FILTER (WHERE br.borrow_date >= date_trunc('month', NOW())) AS this_month_borrows
            FROM borrow_records br
            WHERE ($1::int IS NULL OR br.user_id = $1)
            "#,
            active = ACTIVE
        ))
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(stats)
    }

    /// Flag loans past their due date as overdue and return them
    pub async fn mark_overdue(&self, now: DateTime<Utc>) -> AppResult<Vec<OverdueNotice>> {
        let rows = sqlx::query_as::<_, OverdueNotice>(
            r#"
            UPDATE borrow_records br
            SET status = 'overdue', updated_at = NOW()
            FROM users u, books b
            WHERE u.id = br.user_id
              AND b.id = br.book_id
              AND br.status IN ('borrowed', 'renewed')
              AND br.return_date IS NULL
              AND br.due_date < $1
            RETURNING br.id AS record_id, br.due_date, u.email, u.full_name, b.title
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
