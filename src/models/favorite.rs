//! User favorites

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

use super::book::Book;

/// A favorited book with the time it was added
#[derive(Debug, Serialize, FromRow, ToSchema)]
pub struct FavoriteBook {
    pub favorite_id: i32,
    pub favorited_at: DateTime<Utc>,
    #[sqlx(flatten)]
    pub book: Book,
}
