//! Favorites repository

use sqlx::{Pool, Postgres};

use crate::{
    error::{conflict_on_unique, AppError, AppResult},
    models::FavoriteBook,
};

#[derive(Clone)]
pub struct FavoritesRepository {
    pool: Pool<Postgres>,
}

impl FavoritesRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Returns the new favorite id
    pub async fn add(&self, user_id: i32, book_id: i32) -> AppResult<i32> {
        sqlx::query_scalar::<_, i32>(
            "INSERT INTO favorites (user_id, book_id) VALUES ($1, $2) RETURNING id",
        )
        .bind(user_id)
        .bind(book_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "Book is already in your favorites"))
    }

    pub async fn remove(&self, user_id: i32, book_id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND book_id = $2")
            .bind(user_id)
            .bind(book_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Book is not in your favorites".to_string()));
        }
        Ok(())
    }

    pub async fn list_for_user(&self, user_id: i32) -> AppResult<Vec<FavoriteBook>> {
        let rows = sqlx::query_as::<_, FavoriteBook>(
            r#"
            SELECT f.id AS favorite_id, f.created_at AS favorited_at,
                   b.*, c.name AS category_name
            FROM favorites f
            JOIN books b ON b.id = f.book_id
            LEFT JOIN categories c ON c.id = b.category_id
            WHERE f.user_id = $1
            ORDER BY f.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn count_for_user(&self, user_id: i32) -> AppResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM favorites WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
