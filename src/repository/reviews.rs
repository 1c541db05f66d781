//! Reviews repository

use sqlx::{Pool, Postgres};

use crate::{
    error::{conflict_on_unique, AppError, AppResult},
    models::review::{average_rating, Review, ReviewRow, ReviewWithUser},
};

#[derive(Clone)]
pub struct ReviewsRepository {
    pool: Pool<Postgres>,
}

impl ReviewsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Insert a review and refresh the book's aggregate rating in one transaction
    pub async fn add(&self, user_id: i32, book_id: i32, rating: i32, comment: Option<&str>) -> AppResult<Review> {
        let mut tx = self.pool.begin().await?;

        let locked = sqlx::query_scalar::<_, i32>("SELECT id FROM books WHERE id = $1 FOR UPDATE")
            .bind(book_id)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Err(AppError::NotFound(format!("Book {} not found", book_id)));
        }

        let review = sqlx::query_as::<_, Review>(
            r#"
            INSERT INTO reviews (user_id, book_id, rating, comment)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .bind(rating)
        .bind(comment)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| conflict_on_unique(e, "You have already reviewed this book"))?;

        let (sum, count): (i64, i64) = sqlx::query_as(
            "SELECT COALESCE(SUM(rating), 0)::bigint, COUNT(*) FROM reviews WHERE book_id = $1",
        )
        .bind(book_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE books SET rating = $1, rating_count = $2, updated_at = NOW() WHERE id = $3",
        )
        .bind(average_rating(sum, count))
        .bind(count as i32)
        .bind(book_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(review)
    }

    /// Most recent reviews of a book with their authors
    pub async fn recent_for_book(&self, book_id: i32, limit: i64) -> AppResult<Vec<ReviewWithUser>> {
        let rows = sqlx::query_as::<_, ReviewRow>(
            r#"
            SELECT r.*, u.username, u.full_name
            FROM reviews r
            JOIN users u ON u.id = r.user_id
            WHERE r.book_id = $1
            ORDER BY r.created_at DESC, r.id DESC
            LIMIT $2
            "#,
        )
        .bind(book_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}
