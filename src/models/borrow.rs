//! Borrow records: loan lifecycle, due dates and fines

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::{book::BookSummary, user::UserSummary, Pagination};
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "borrow_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BorrowStatus {
    Borrowed,
    Returned,
    Overdue,
    Renewed,
}

impl BorrowStatus {
    pub const ACTIVE: [BorrowStatus; 3] =
        [BorrowStatus::Borrowed, BorrowStatus::Renewed, BorrowStatus::Overdue];

    pub fn is_active(&self) -> bool {
        Self::ACTIVE.contains(self)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BorrowRecord {
    pub id: i32,
    pub user_id: i32,
    pub book_id: i32,
    pub borrow_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub status: BorrowStatus,
    pub renew_count: i32,
    #[schema(value_type = f64)]
    pub fine_amount: Decimal,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Due date for a loan of `days` days starting at `from`
pub fn due_date(from: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    from + Duration::days(days)
}

/// Started days between `due` and `at`, 0 when not late
pub fn days_late(due: DateTime<Utc>, at: DateTime<Utc>) -> i64 {
    if at <= due {
        return 0;
    }
    let late = at - due;
    let days = late.num_days();
    if late > Duration::days(days) {
        days + 1
    } else {
        days
    }
}

/// Fine owed when returning at `returned_at`: every started day late costs `per_day`
pub fn compute_fine(due: DateTime<Utc>, returned_at: DateTime<Utc>, per_day: Decimal) -> Decimal {
    Decimal::from(days_late(due, returned_at)) * per_day
}

impl BorrowRecord {
    pub fn is_active(&self) -> bool {
        self.return_date.is_none() && self.status.is_active()
    }

    pub fn ensure_returnable(&self) -> Result<(), AppError> {
        if !self.is_active() {
            return Err(AppError::BusinessRule(
                "This book has already been returned".to_string(),
            ));
        }
        Ok(())
    }

    /// A loan past its due date counts as overdue even before the daily sweep flags it
    pub fn ensure_renewable(&self, max_renewals: i32, now: DateTime<Utc>) -> Result<(), AppError> {
        if !matches!(self.status, BorrowStatus::Borrowed | BorrowStatus::Renewed) {
            return Err(AppError::BusinessRule(
                "Only books currently on loan can be renewed".to_string(),
            ));
        }
        if self.due_date < now {
            return Err(AppError::BusinessRule(
                "Overdue books must be returned and cannot be renewed".to_string(),
            ));
        }
        if self.renew_count >= max_renewals {
            return Err(AppError::BusinessRule(format!(
                "Maximum number of renewals reached ({})",
                max_renewals
            )));
        }
        Ok(())
    }
}

/// Borrow row joined with book and borrower columns
#[derive(Debug, FromRow)]
pub struct BorrowRow {
    #[sqlx(flatten)]
    pub record: BorrowRecord,
    pub book_title: String,
    pub book_author: String,
    pub book_isbn: String,
    pub book_cover_image: Option<String>,
    #[sqlx(default)]
    pub username: Option<String>,
    #[sqlx(default)]
    pub user_full_name: Option<String>,
}

/// Borrow record as returned by the API
#[derive(Debug, Serialize, ToSchema)]
pub struct BorrowDetails {
    #[serde(flatten)]
    pub record: BorrowRecord,
    pub book: BookSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserSummary>,
}

impl From<BorrowRow> for BorrowDetails {
    fn from(row: BorrowRow) -> Self {
        let user = match (row.username, row.user_full_name) {
            (Some(username), Some(full_name)) => Some(UserSummary {
                id: row.record.user_id,
                username,
                full_name,
            }),
            _ => None,
        };
        Self {
            book: BookSummary {
                id: row.record.book_id,
                title: row.book_title,
                author: row.book_author,
                isbn: row.book_isbn,
                cover_image: row.book_cover_image,
            },
            record: row.record,
            user,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BorrowRequest {
    pub book_id: i32,
    /// Loan length in days (default 30)
    pub days: Option<i64>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct RenewRequest {
    /// Extension in days (default 15)
    #[validate(range(min = 1, max = 90))]
    pub days: Option<i64>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct HistoryQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Staff borrow listing filters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct BorrowQuery {
    pub status: Option<BorrowStatus>,
    pub user_id: Option<i32>,
    pub book_id: Option<i32>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BorrowPage {
    pub records: Vec<BorrowDetails>,
    pub pagination: Pagination,
}

/// Result of a return operation
#[derive(Debug, Serialize, ToSchema)]
pub struct ReturnReceipt {
    pub record: BorrowRecord,
    #[schema(value_type = f64)]
    pub fine_amount: Decimal,
    pub overdue_days: i64,
}

#[derive(Debug, Serialize, FromRow, ToSchema)]
pub struct BorrowStatistics {
    pub total_borrows: i64,
    pub active_borrows: i64,
    pub overdue_borrows: i64,
    pub returned_borrows: i64,
    pub this_month_borrows: i64,
}

/// Outcome of one overdue sweep
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct OverdueSweep {
    pub marked_overdue: u64,
    pub reminders_sent: u64,
    pub expired_reservations: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(status: BorrowStatus, renew_count: i32) -> BorrowRecord {
        let now = Utc::now();
        BorrowRecord {
            id: 1,
            user_id: 7,
            book_id: 1,
            borrow_date: now,
            due_date: due_date(now, 30),
            return_date: None,
            status,
            renew_count,
            fine_amount: Decimal::ZERO,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_fine_on_time_is_zero() {
        let due = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(compute_fine(due, due, Decimal::ONE), Decimal::ZERO);
        assert_eq!(
            compute_fine(due, due - Duration::days(3), Decimal::ONE),
            Decimal::ZERO
        );
    }

    #[test]
    fn test_fine_rounds_partial_days_up() {
        let due = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let rate = Decimal::new(150, 2); // 1.50

        assert_eq!(compute_fine(due, due + Duration::minutes(1), rate), rate);
        assert_eq!(compute_fine(due, due + Duration::days(2), rate), Decimal::new(300, 2));
        assert_eq!(
            compute_fine(due, due + Duration::days(2) + Duration::hours(1), rate),
            Decimal::new(450, 2)
        );
    }

    #[test]
    fn test_days_late() {
        let due = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(days_late(due, due - Duration::hours(5)), 0);
        assert_eq!(days_late(due, due + Duration::hours(5)), 1);
        assert_eq!(days_late(due, due + Duration::days(3)), 3);
    }

    #[test]
    fn test_due_date() {
        let start = Utc.with_ymd_and_hms(2024, 1, 31, 8, 0, 0).unwrap();
        assert_eq!(
            due_date(start, 30),
            Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_active_statuses() {
        assert!(BorrowStatus::Borrowed.is_active());
        assert!(BorrowStatus::Renewed.is_active());
        assert!(BorrowStatus::Overdue.is_active());
        assert!(!BorrowStatus::Returned.is_active());
        assert!(record(BorrowStatus::Overdue, 0).is_active());
    }

    #[test]
    fn test_already_returned() {
        let mut rec = record(BorrowStatus::Returned, 0);
        rec.return_date = Some(Utc::now());
        assert!(matches!(rec.ensure_returnable(), Err(AppError::BusinessRule(_))));
        assert!(!rec.is_active());
        assert!(record(BorrowStatus::Overdue, 0).ensure_returnable().is_ok());
    }

    #[test]
    fn test_renewal_limits() {
        let now = Utc::now();
        assert!(record(BorrowStatus::Borrowed, 0).ensure_renewable(2, now).is_ok());
        assert!(record(BorrowStatus::Renewed, 1).ensure_renewable(2, now).is_ok());
        assert!(record(BorrowStatus::Renewed, 2).ensure_renewable(2, now).is_err());
    }

    #[test]
    fn test_renewal_refused_for_overdue_or_returned() {
        let now = Utc::now();
        assert!(record(BorrowStatus::Overdue, 0).ensure_renewable(2, now).is_err());
        assert!(record(BorrowStatus::Returned, 0).ensure_renewable(2, now).is_err());
    }

    #[test]
    fn test_renewal_refused_past_due_before_sweep() {
        let now = Utc::now();
        let mut rec = record(BorrowStatus::Borrowed, 0);
        rec.due_date = now - Duration::days(2);
        assert!(matches!(rec.ensure_renewable(2, now), Err(AppError::BusinessRule(_))));

        rec.status = BorrowStatus::Renewed;
        rec.renew_count = 1;
        assert!(rec.ensure_renewable(2, now).is_err());

        rec.due_date = now + Duration::hours(1);
        assert!(rec.ensure_renewable(2, now).is_ok());
    }

    #[test]
    fn test_details_from_row() {
        let row = BorrowRow {
            record: record(BorrowStatus::Borrowed, 0),
            book_title: "Dune".into(),
            book_author: "Frank Herbert".into(),
            book_isbn: "9780441013593".into(),
            book_cover_image: None,
            username: None,
            user_full_name: None,
        };
        let details = BorrowDetails::from(row);
        assert_eq!(details.book.title, "Dune");
        assert!(details.user.is_none());

        let json = serde_json::to_value(&details).unwrap();
        assert_eq!(json["status"], "borrowed");
        assert_eq!(json["book"]["author"], "Frank Herbert");
        assert!(json.get("user").is_none());
    }
}
