//! Data models for BookFlow

pub mod book;
pub mod borrow;
pub mod category;
pub mod favorite;
pub mod reservation;
pub mod review;
pub mod system_log;
pub mod user;

use serde::Serialize;
use utoipa::ToSchema;

// Re-export commonly used types
pub use book::{Book, BookStatus, BookSummary};
pub use borrow::{BorrowDetails, BorrowRecord, BorrowStatus};
pub use category::Category;
pub use favorite::FavoriteBook;
pub use reservation::{Reservation, ReservationStatus};
pub use review::Review;
pub use system_log::SystemLog;
pub use user::{Role, User, UserStatus, UserSummary};

/// Pagination block attached to list responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct Pagination {
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

impl Pagination {
    pub fn new(total: i64, page: &PageParams) -> Self {
        let total_pages = if page.limit > 0 {
            (total + page.limit - 1) / page.limit
        } else {
            0
        };
        Self {
            total,
            page: page.page,
            limit: page.limit,
            total_pages,
        }
    }
}

/// Resolved page/limit pair with the SQL offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageParams {
    pub page: i64,
    pub limit: i64,
}

impl PageParams {
    pub const MAX_LIMIT: i64 = 100;
    /// Highest page whose offset still fits in an i64 at any allowed limit
    pub const MAX_PAGE: i64 = i64::MAX / Self::MAX_LIMIT;

    /// Clamp raw query parameters: 1 <= page <= MAX_PAGE, 1 <= limit <= MAX_LIMIT
    pub fn resolve(page: Option<i64>, limit: Option<i64>, default_limit: i64) -> Self {
        Self {
            page: page.unwrap_or(1).clamp(1, Self::MAX_PAGE),
            limit: limit.unwrap_or(default_limit).clamp(1, Self::MAX_LIMIT),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_params_defaults() {
        let p = PageParams::resolve(None, None, 10);
        assert_eq!(p, PageParams { page: 1, limit: 10 });
        assert_eq!(p.offset(), 0);
    }

    #[test]
    fn test_page_params_clamped() {
        let p = PageParams::resolve(Some(0), Some(10_000), 10);
        assert_eq!(p.page, 1);
        assert_eq!(p.limit, PageParams::MAX_LIMIT);

        let p = PageParams::resolve(Some(3), Some(-5), 10);
        assert_eq!(p.limit, 1);
        assert_eq!(p.offset(), 2);
    }

    #[test]
    fn test_huge_page_does_not_overflow() {
        let p = PageParams::resolve(Some(i64::MAX), Some(100), 10);
        assert_eq!(p.page, PageParams::MAX_PAGE);
        assert!(p.offset() >= 0);

        let p = PageParams::resolve(Some(i64::MAX), Some(1), 10);
        assert!(p.offset() >= 0);
    }

    #[test]
    fn test_total_pages_rounds_up() {
        let p = PageParams::resolve(Some(2), Some(10), 10);
        assert_eq!(Pagination::new(0, &p).total_pages, 0);
        assert_eq!(Pagination::new(10, &p).total_pages, 1);
        assert_eq!(Pagination::new(11, &p).total_pages, 2);
        assert_eq!(Pagination::new(11, &p).page, 2);
    }
}
