//! Book model and catalog rules

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::{category::Category, review::ReviewWithUser, Pagination};
use crate::error::AppError;

/// Shelf status of a book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "book_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BookStatus {
    Available,
    Borrowed,
    Reserved,
    Maintenance,
}

impl BookStatus {
    /// Status implied by the number of copies on the shelf.
    /// Maintenance is sticky and only cleared explicitly.
    pub fn for_availability(current: BookStatus, available: i32) -> BookStatus {
        match current {
            BookStatus::Maintenance => BookStatus::Maintenance,
            _ if available <= 0 => BookStatus::Borrowed,
            _ => BookStatus::Available,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    pub isbn: String,
    pub title: String,
    pub author: String,
    pub publisher: Option<String>,
    pub publish_year: Option<i32>,
    pub description: Option<String>,
    pub cover_image: Option<String>,
    pub total_quantity: i32,
    pub available_quantity: i32,
    pub location: Option<String>,
    pub status: BookStatus,
    #[schema(value_type = f64)]
    pub rating: Decimal,
    pub rating_count: i32,
    pub category_id: Option<i32>,
    /// Joined from categories when the query selects it
    #[sqlx(default)]
    pub category_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    /// Check that a copy can be handed out right now
    pub fn ensure_borrowable(&self) -> Result<(), AppError> {
        if self.status == BookStatus::Maintenance {
            return Err(AppError::BusinessRule(
                "Book is under maintenance".to_string(),
            ));
        }
        if self.available_quantity <= 0 {
            return Err(AppError::BusinessRule("Book is out of stock".to_string()));
        }
        Ok(())
    }
}

/// Short book description embedded in borrow and reservation listings
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BookSummary {
    pub id: i32,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub cover_image: Option<String>,
}

/// Book with its category and most recent reviews
#[derive(Debug, Serialize, ToSchema)]
pub struct BookDetails {
    #[serde(flatten)]
    pub book: Book,
    pub category: Option<Category>,
    pub reviews: Vec<ReviewWithUser>,
}

/// Book search parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct BookQuery {
    /// Matches title, author or ISBN (case-insensitive)
    pub keyword: Option<String>,
    /// Category id
    pub category: Option<i32>,
    pub author: Option<String>,
    pub publisher: Option<String>,
    pub status: Option<BookStatus>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BookPage {
    pub books: Vec<Book>,
    pub pagination: Pagination,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 1, max = 20, message = "ISBN is required"))]
    pub isbn: String,
    #[validate(length(min = 1, max = 200, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, max = 100, message = "Author is required"))]
    pub author: String,
    pub publisher: Option<String>,
    pub publish_year: Option<i32>,
    pub description: Option<String>,
    pub cover_image: Option<String>,
    #[validate(range(min = 1, message = "Total quantity must be at least 1"))]
    pub total_quantity: Option<i32>,
    #[validate(range(min = 0))]
    pub available_quantity: Option<i32>,
    pub location: Option<String>,
    pub category_id: Option<i32>,
}

impl CreateBook {
    /// Resolve (total, available) for a new book
    pub fn quantities(&self) -> Result<(i32, i32), AppError> {
        let total = self.total_quantity.unwrap_or(1);
        let available = self.available_quantity.unwrap_or(total);
        if available > total {
            return Err(AppError::Validation(
                "Available quantity cannot exceed total quantity".to_string(),
            ));
        }
        Ok((total, available))
    }
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateBook {
    #[validate(length(min = 1, max = 20))]
    pub isbn: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub author: Option<String>,
    pub publisher: Option<String>,
    pub publish_year: Option<i32>,
    pub description: Option<String>,
    pub cover_image: Option<String>,
    #[validate(range(min = 1, message = "Total quantity must be at least 1"))]
    pub total_quantity: Option<i32>,
    pub location: Option<String>,
    pub status: Option<BookStatus>,
    pub category_id: Option<i32>,
}

impl UpdateBook {
    /// New (total, available, status) after applying this update to `book`.
    /// Copies currently on loan stay on loan, so available shifts by the same
    /// delta as total.
    pub fn resolve_stock(&self, book: &Book) -> Result<(i32, i32, BookStatus), AppError> {
        let total = self.total_quantity.unwrap_or(book.total_quantity);
        let available = book.available_quantity + (total - book.total_quantity);
        if available < 0 {
            return Err(AppError::BusinessRule(format!(
                "Total quantity cannot be lower than the {} copies on loan",
                book.total_quantity - book.available_quantity
            )));
        }

        let status = match self.status {
            Some(BookStatus::Maintenance) => BookStatus::Maintenance,
            Some(_) => BookStatus::for_availability(BookStatus::Available, available),
            None => BookStatus::for_availability(book.status, available),
        };
        Ok((total, available, status))
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateReview {
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i32,
    #[validate(length(max = 2000))]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct DailyCount {
    pub date: chrono::NaiveDate,
    pub count: i64,
}

/// Catalog-wide statistics
#[derive(Debug, Serialize, ToSchema)]
pub struct BookStatistics {
    pub total_books: i64,
    pub available_books: i64,
    pub borrowed_books: i64,
    pub overdue_books: i64,
    pub category_stats: Vec<super::category::CategoryCount>,
    pub borrow_trend: Vec<DailyCount>,
}

#[cfg(test)]
pub(crate) fn sample_book() -> Book {
    let now = Utc::now();
    Book {
        id: 1,
        isbn: "9780131103627".to_string(),
        title: "The C Programming Language".to_string(),
        author: "Kernighan & Ritchie".to_string(),
        publisher: None,
        publish_year: Some(1988),
        description: None,
        cover_image: None,
        total_quantity: 3,
        available_quantity: 2,
        location: Some("A-12".to_string()),
        status: BookStatus::Available,
        rating: Decimal::ZERO,
        rating_count: 0,
        category_id: Some(4),
        category_name: None,
        created_at: now,
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_stock_not_borrowable() {
        let mut book = sample_book();
        assert!(book.ensure_borrowable().is_ok());

        book.available_quantity = 0;
        let err = book.ensure_borrowable().unwrap_err();
        assert!(matches!(err, AppError::BusinessRule(ref m) if m.contains("out of stock")));
    }

    #[test]
    fn test_maintenance_not_borrowable() {
        let mut book = sample_book();
        book.status = BookStatus::Maintenance;
        assert!(book.ensure_borrowable().is_err());
    }

    #[test]
    fn test_status_for_availability() {
        use BookStatus::*;
        assert_eq!(BookStatus::for_availability(Available, 0), Borrowed);
        assert_eq!(BookStatus::for_availability(Borrowed, 1), Available);
        assert_eq!(BookStatus::for_availability(Reserved, 2), Available);
        assert_eq!(BookStatus::for_availability(Maintenance, 2), Maintenance);
    }

    #[test]
    fn test_create_quantities_default_and_bounds() {
        let mut req = CreateBook {
            isbn: "1".into(),
            title: "t".into(),
            author: "a".into(),
            publisher: None,
            publish_year: None,
            description: None,
            cover_image: None,
            total_quantity: None,
            available_quantity: None,
            location: None,
            category_id: None,
        };
        assert_eq!(req.quantities().unwrap(), (1, 1));

        req.total_quantity = Some(4);
        assert_eq!(req.quantities().unwrap(), (4, 4));

        req.available_quantity = Some(5);
        assert!(req.quantities().is_err());
    }

    #[test]
    fn test_update_shifts_available_by_delta() {
        let book = sample_book(); // 3 total, 2 available
        let update = UpdateBook {
            total_quantity: Some(5),
            ..Default::default()
        };
        assert_eq!(update.resolve_stock(&book).unwrap(), (5, 4, BookStatus::Available));

        let update = UpdateBook {
            total_quantity: Some(1),
            ..Default::default()
        };
        assert_eq!(update.resolve_stock(&book).unwrap(), (1, 0, BookStatus::Borrowed));
    }

    #[test]
    fn test_update_cannot_drop_below_loaned_copies() {
        let mut book = sample_book();
        book.available_quantity = 0;
        let update = UpdateBook {
            total_quantity: Some(2),
            ..Default::default()
        };
        assert!(matches!(update.resolve_stock(&book), Err(AppError::BusinessRule(_))));
    }

    #[test]
    fn test_update_explicit_maintenance_kept() {
        let book = sample_book();
        let update = UpdateBook {
            status: Some(BookStatus::Maintenance),
            ..Default::default()
        };
        let (_, _, status) = update.resolve_stock(&book).unwrap();
        assert_eq!(status, BookStatus::Maintenance);

        let mut book = sample_book();
        book.status = BookStatus::Maintenance;
        let update = UpdateBook {
            status: Some(BookStatus::Available),
            ..Default::default()
        };
        let (_, _, status) = update.resolve_stock(&book).unwrap();
        assert_eq!(status, BookStatus::Available);
    }

    #[test]
    fn test_review_rating_range() {
        let review = CreateReview { rating: 6, comment: None };
        assert!(review.validate().is_err());
        let review = CreateReview { rating: 5, comment: Some("Great".into()) };
        assert!(review.validate().is_ok());
    }
}
