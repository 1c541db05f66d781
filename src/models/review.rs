//! Book reviews and rating aggregation

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::user::UserSummary;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Review {
    pub id: i32,
    pub user_id: i32,
    pub book_id: i32,
    pub rating: i32,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Average of `count` ratings summing to `sum`, rounded to one decimal
pub fn average_rating(sum: i64, count: i64) -> Decimal {
    if count <= 0 {
        return Decimal::ZERO;
    }
    (Decimal::from(sum) / Decimal::from(count))
        .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
}

#[derive(Debug, FromRow)]
pub struct ReviewRow {
    #[sqlx(flatten)]
    pub review: Review,
    pub username: String,
    pub full_name: String,
}

/// Review with its author
#[derive(Debug, Serialize, ToSchema)]
pub struct ReviewWithUser {
    #[serde(flatten)]
    pub review: Review,
    pub user: UserSummary,
}

impl From<ReviewRow> for ReviewWithUser {
    fn from(row: ReviewRow) -> Self {
        Self {
            user: UserSummary {
                id: row.review.user_id,
                username: row.username,
                full_name: row.full_name,
            },
            review: row.review,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_rounding() {
        assert_eq!(average_rating(0, 0), Decimal::ZERO);
        assert_eq!(average_rating(5, 1), Decimal::new(50, 1));
        // 4 + 5 + 5 = 14 / 3 = 4.666..
        assert_eq!(average_rating(14, 3), Decimal::new(47, 1));
        // 4 + 5 = 4.5
        assert_eq!(average_rating(9, 2), Decimal::new(45, 1));
        // 1 + 2 + 2 + 2 = 7 / 4 = 1.75
        assert_eq!(average_rating(7, 4), Decimal::new(18, 1));
        // 3 + 3 + 4 = 10 / 3 = 3.333..
        assert_eq!(average_rating(10, 3), Decimal::new(33, 1));
    }
}
