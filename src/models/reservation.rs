//! Reservations placed on books with no copy on the shelf

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::book::BookSummary;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "reservation_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Pending,
    Fulfilled,
    Cancelled,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Reservation {
    pub id: i32,
    pub user_id: i32,
    pub book_id: i32,
    pub reservation_date: DateTime<Utc>,
    pub expiry_date: DateTime<Utc>,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    pub fn ensure_cancellable(&self) -> Result<(), AppError> {
        if self.status != ReservationStatus::Pending {
            return Err(AppError::BusinessRule(
                "Only pending reservations can be cancelled".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, FromRow)]
pub struct ReservationRow {
    #[sqlx(flatten)]
    pub reservation: Reservation,
    pub book_title: String,
    pub book_author: String,
    pub book_isbn: String,
    pub book_cover_image: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReservationDetails {
    #[serde(flatten)]
    pub reservation: Reservation,
    pub book: BookSummary,
}

impl From<ReservationRow> for ReservationDetails {
    fn from(row: ReservationRow) -> Self {
        Self {
            book: BookSummary {
                id: row.reservation.book_id,
                title: row.book_title,
                author: row.book_author,
                isbn: row.book_isbn,
                cover_image: row.book_cover_image,
            },
            reservation: row.reservation,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReserveRequest {
    pub book_id: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn reservation(status: ReservationStatus) -> Reservation {
        let now = Utc::now();
        Reservation {
            id: 1,
            user_id: 7,
            book_id: 1,
            reservation_date: now,
            expiry_date: now + Duration::days(7),
            status,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_only_pending_cancellable() {
        assert!(reservation(ReservationStatus::Pending).ensure_cancellable().is_ok());
        for status in [
            ReservationStatus::Fulfilled,
            ReservationStatus::Cancelled,
            ReservationStatus::Expired,
        ] {
            assert!(reservation(status).ensure_cancellable().is_err());
        }
    }
}
