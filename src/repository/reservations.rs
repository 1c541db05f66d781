//! Reservations repository

use chrono::{DateTime, Utc};
use sqlx::{FromRow, Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{
        reservation::{ReservationDetails, ReservationRow},
        Book, Reservation,
    },
};

/// Earliest waiting reader of a book
#[derive(Debug, Clone, FromRow)]
pub struct NextInLine {
    pub reservation_id: i32,
    pub expiry_date: DateTime<Utc>,
    pub email: String,
    pub full_name: String,
    pub title: String,
}

#[derive(Clone)]
pub struct ReservationsRepository {
    pool: Pool<Postgres>,
}

impl ReservationsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Place a reservation on a book that has no copy left
    pub async fn create(&self, user_id: i32, book_id: i32, expiry_date: DateTime<Utc>) -> AppResult<Reservation> {
        let mut tx = self.pool.begin().await?;

        let book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1 FOR UPDATE")
            .bind(book_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book {} not found", book_id)))?;

        if book.available_quantity > 0 {
            return Err(AppError::BusinessRule(
                "Book is available, borrow it directly".to_string(),
            ));
        }

        let (pending, borrowing): (bool, bool) = sqlx::query_as(
            r#"
            SELECT
                EXISTS(SELECT 1 FROM reservations
                       WHERE user_id = $1 AND book_id = $2 AND status = 'pending'),
                EXISTS(SELECT 1 FROM borrow_records
                       WHERE user_id = $1 AND book_id = $2 AND return_date IS NULL
                         AND status IN ('borrowed', 'renewed', 'overdue'))
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .fetch_one(&mut *tx)
        .await?;

        if pending {
            return Err(AppError::BusinessRule(
                "You already have a pending reservation for this book".to_string(),
            ));
        }
        if borrowing {
            return Err(AppError::BusinessRule(
                "You are currently borrowing this book".to_string(),
            ));
        }

        let reservation = sqlx::query_as::<_, Reservation>(
            r#"
            INSERT INTO reservations (user_id, book_id, reservation_date, expiry_date, status)
            VALUES ($1, $2, NOW(), $3, 'pending')
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .bind(expiry_date)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(reservation)
    }

    /// Reservation owned by `user_id`; other users' reservations are reported missing
    pub async fn get_for_user(&self, id: i32, user_id: i32) -> AppResult<Reservation> {
        sqlx::query_as::<_, Reservation>("SELECT * FROM reservations WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Reservation {} not found", id)))
    }

    pub async fn cancel(&self, id: i32) -> AppResult<Reservation> {
        sqlx::query_as::<_, Reservation>(
            r#"
            UPDATE reservations SET status = 'cancelled', updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| {
            AppError::BusinessRule("Only pending reservations can be cancelled".to_string())
        })
    }

    pub async fn list_for_user(&self, user_id: i32) -> AppResult<Vec<ReservationDetails>> {
        let rows = sqlx::query_as::<_, ReservationRow>(
            r#"
            SELECT r.*, b.title AS book_title, b.author AS book_author,
                   b.isbn AS book_isbn, b.cover_image AS book_cover_image
            FROM reservations r
            JOIN books b ON b.id = r.book_id
            WHERE r.user_id = $1
            ORDER BY r.reservation_date DESC, r.id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn next_in_line(&self, book_id: i32) -> AppResult<Option<NextInLine>> {
        let row = sqlx::query_as::<_, NextInLine>(
            r#"
            SELECT r.id AS reservation_id, r.expiry_date, u.email, u.full_name, b.title
            FROM reservations r
            JOIN users u ON u.id = r.user_id
            JOIN books b ON b.id = r.book_id
            WHERE r.book_id = $1 AND r.status = 'pending'
            ORDER BY r.reservation_date, r.id
            LIMIT 1
            "#,
        )
        .bind(book_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Expire pending reservations past their expiry date
    pub async fn expire_stale(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE reservations SET status = 'expired', updated_at = NOW()
            WHERE status = 'pending' AND expiry_date < $1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
