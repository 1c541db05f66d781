//! Circulation service: loans, returns, renewals and reservations

use chrono::{DateTime, Duration, Utc};

use crate::{
    config::BorrowingConfig,
    error::{AppError, AppResult},
    models::{
        borrow::{self, BorrowPage, BorrowQuery, BorrowStatistics, OverdueSweep, ReturnReceipt},
        reservation::ReservationDetails,
        user::UserClaims,
        BorrowDetails, BorrowRecord, PageParams, Pagination, Reservation,
    },
    repository::Repository,
    services::email::EmailService,
};

#[derive(Clone)]
pub struct BorrowsService {
    repository: Repository,
    rules: BorrowingConfig,
    email: EmailService,
}

/// Loan length in days, defaulted and bounded by the circulation rules
pub fn resolve_borrow_days(requested: Option<i64>, rules: &BorrowingConfig) -> AppResult<i64> {
    let days = requested.unwrap_or(rules.default_borrow_days);
    if !(1..=rules.max_borrow_days).contains(&days) {
        return Err(AppError::Validation(format!(
            "Borrow period must be between 1 and {} days",
            rules.max_borrow_days
        )));
    }
    Ok(days)
}

impl BorrowsService {
    pub fn new(repository: Repository, rules: BorrowingConfig, email: EmailService) -> Self {
        Self {
            repository,
            rules,
            email,
        }
    }

    pub async fn borrow(&self, user_id: i32, book_id: i32, days: Option<i64>) -> AppResult<BorrowRecord> {
        let days = resolve_borrow_days(days, &self.rules)?;
        let record = self
            .repository
            .borrows
            .borrow(user_id, book_id, borrow::due_date(Utc::now(), days))
            .await?;

        tracing::info!(record_id = record.id, user_id, book_id, due = %record.due_date, "Book borrowed");
        Ok(record)
    }

    /// Return a loan owned by the caller (any loan for staff)
    pub async fn return_book(&self, claims: &UserClaims, record_id: i32) -> AppResult<ReturnReceipt> {
        let record = self.repository.borrows.get_by_id(record_id).await?;
        claims.require_owner_or_staff(record.user_id)?;

        let returned = self
            .repository
            .borrows
            .return_book(record_id, Utc::now(), self.rules.fine_per_day)
            .await?;
        let record = returned.record;

        tracing::info!(
            record_id,
            book_id = record.book_id,
            fine = %record.fine_amount,
            overdue_days = returned.overdue_days,
            "Book returned"
        );

        self.notify_next_in_line(record.book_id).await;

        Ok(ReturnReceipt {
            fine_amount: record.fine_amount,
            overdue_days: returned.overdue_days,
            record,
        })
    }

    async fn notify_next_in_line(&self, book_id: i32) {
        match self.repository.reservations.next_in_line(book_id).await {
            Ok(Some(next)) => {
                self.email
                    .send_reservation_available(&next.email, &next.full_name, &next.title, next.expiry_date)
                    .await;
                tracing::debug!(reservation_id = next.reservation_id, book_id, "Reserver notified");
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(book_id, error = %e, "Could not look up reservations"),
        }
    }

    pub async fn renew(&self, claims: &UserClaims, record_id: i32, days: Option<i64>) -> AppResult<BorrowRecord> {
        let record = self.repository.borrows.get_by_id(record_id).await?;
        claims.require_owner_or_staff(record.user_id)?;

        let days = days.unwrap_or(self.rules.default_renew_days);
        let record = self
            .repository
            .borrows
            .renew(record_id, days, self.rules.max_renewals, Utc::now())
            .await?;

        tracing::info!(record_id, due = %record.due_date, renew_count = record.renew_count, "Loan renewed");
        Ok(record)
    }

    pub async fn history(&self, user_id: i32, page: Option<i64>, limit: Option<i64>) -> AppResult<BorrowPage> {
        let page = PageParams::resolve(page, limit, 10);
        let (records, total) = self.repository.borrows.history(user_id, &page).await?;
        Ok(BorrowPage {
            records,
            pagination: Pagination::new(total, &page),
        })
    }

    pub async fn current(&self, user_id: i32) -> AppResult<Vec<BorrowDetails>> {
        self.repository.borrows.current(user_id).await
    }

    pub async fn list_all(&self, query: &BorrowQuery) -> AppResult<BorrowPage> {
        let page = PageParams::resolve(query.page, query.limit, 20);
        let (records, total) = self.repository.borrows.list(query, &page).await?;
        Ok(BorrowPage {
            records,
            pagination: Pagination::new(total, &page),
        })
    }

    pub async fn statistics(&self) -> AppResult<BorrowStatistics> {
        self.repository.borrows.statistics(None).await
    }

    pub async fn reserve(&self, user_id: i32, book_id: i32) -> AppResult<Reservation> {
        let expiry = Utc::now() + Duration::days(self.rules.reservation_days);
        let reservation = self
            .repository
            .reservations
            .create(user_id, book_id, expiry)
            .await?;

        tracing::info!(reservation_id = reservation.id, user_id, book_id, "Book reserved");
        Ok(reservation)
    }

    pub async fn cancel_reservation(&self, user_id: i32, reservation_id: i32) -> AppResult<Reservation> {
        let reservation = self
            .repository
            .reservations
            .get_for_user(reservation_id, user_id)
            .await?;
        reservation.ensure_cancellable()?;
        self.repository.reservations.cancel(reservation_id).await
    }

    pub async fn reservations(&self, user_id: i32) -> AppResult<Vec<ReservationDetails>> {
        self.repository.reservations.list_for_user(user_id).await
    }

    /// Flag overdue loans, remind their borrowers and expire stale reservations
    pub async fn run_overdue_sweep(&self, now: DateTime<Utc>) -> AppResult<OverdueSweep> {
        let notices = self.repository.borrows.mark_overdue(now).await?;

        let mut sweep = OverdueSweep {
            marked_overdue: notices.len() as u64,
            ..Default::default()
        };
        for notice in &notices {
            if self
                .email
                .send_due_reminder(&notice.email, &notice.full_name, &notice.title, notice.due_date)
                .await
            {
                sweep.reminders_sent += 1;
            }
        }

        sweep.expired_reservations = self.repository.reservations.expire_stale(now).await?;

        tracing::info!(
            marked_overdue = sweep.marked_overdue,
            reminders_sent = sweep.reminders_sent,
            expired_reservations = sweep.expired_reservations,
            "Overdue sweep finished"
        );
        Ok(sweep)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_borrow_days_default() {
        let rules = BorrowingConfig::default();
        assert_eq!(resolve_borrow_days(None, &rules).unwrap(), 30);
        assert_eq!(resolve_borrow_days(Some(14), &rules).unwrap(), 14);
    }

    #[test]
    fn test_borrow_days_bounds() {
        let rules = BorrowingConfig::default();
        assert!(resolve_borrow_days(Some(0), &rules).is_err());
        assert!(resolve_borrow_days(Some(-3), &rules).is_err());
        assert!(resolve_borrow_days(Some(rules.max_borrow_days), &rules).is_ok());
        assert!(matches!(
            resolve_borrow_days(Some(rules.max_borrow_days + 1), &rules),
            Err(AppError::Validation(_))
        ));
    }
}
