//! Audit trail entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use super::Pagination;

/// Audited operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Register,
    Login,
    UpdateProfile,
    CreateBook,
    UpdateBook,
    DeleteBook,
    AddReview,
    AddFavorite,
    RemoveFavorite,
    BorrowBook,
    ReturnBook,
    RenewBook,
    ReserveBook,
    CancelReservation,
    CreateCategory,
    UpdateCategory,
    DeleteCategory,
    UpdateUserStatus,
    UpdateUserRole,
    UpdateUserQuota,
    DeleteUser,
    OverdueSweep,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Register => "REGISTER",
            AuditAction::Login => "LOGIN",
            AuditAction::UpdateProfile => "UPDATE_PROFILE",
            AuditAction::CreateBook => "CREATE_BOOK",
            AuditAction::UpdateBook => "UPDATE_BOOK",
            AuditAction::DeleteBook => "DELETE_BOOK",
            AuditAction::AddReview => "ADD_REVIEW",
            AuditAction::AddFavorite => "ADD_FAVORITE",
            AuditAction::RemoveFavorite => "REMOVE_FAVORITE",
            AuditAction::BorrowBook => "BORROW_BOOK",
            AuditAction::ReturnBook => "RETURN_BOOK",
            AuditAction::RenewBook => "RENEW_BOOK",
            AuditAction::ReserveBook => "RESERVE_BOOK",
            AuditAction::CancelReservation => "CANCEL_RESERVATION",
            AuditAction::CreateCategory => "CREATE_CATEGORY",
            AuditAction::UpdateCategory => "UPDATE_CATEGORY",
            AuditAction::DeleteCategory => "DELETE_CATEGORY",
            AuditAction::UpdateUserStatus => "UPDATE_USER_STATUS",
            AuditAction::UpdateUserRole => "UPDATE_USER_ROLE",
            AuditAction::UpdateUserQuota => "UPDATE_USER_QUOTA",
            AuditAction::DeleteUser => "DELETE_USER",
            AuditAction::OverdueSweep => "OVERDUE_SWEEP",
        }
    }

    /// Entity type recorded alongside the action
    pub fn entity_type(&self) -> &'static str {
        match self {
            AuditAction::Register
            | AuditAction::Login
            | AuditAction::UpdateProfile
            | AuditAction::UpdateUserStatus
            | AuditAction::UpdateUserRole
            | AuditAction::UpdateUserQuota
            | AuditAction::DeleteUser => "user",
            AuditAction::CreateBook | AuditAction::UpdateBook | AuditAction::DeleteBook => "book",
            AuditAction::AddReview => "review",
            AuditAction::AddFavorite | AuditAction::RemoveFavorite => "favorite",
            AuditAction::BorrowBook
            | AuditAction::ReturnBook
            | AuditAction::RenewBook
            | AuditAction::OverdueSweep => "borrow",
            AuditAction::ReserveBook | AuditAction::CancelReservation => "reservation",
            AuditAction::CreateCategory
            | AuditAction::UpdateCategory
            | AuditAction::DeleteCategory => "category",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct SystemLog {
    pub id: i32,
    pub user_id: Option<i32>,
    pub action: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<i32>,
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Audit entry to be written
#[derive(Debug, Clone)]
pub struct NewSystemLog {
    pub user_id: Option<i32>,
    pub action: AuditAction,
    pub entity_id: Option<i32>,
    pub details: Option<serde_json::Value>,
    pub ip_address: Option<String>,
}

impl NewSystemLog {
    pub fn new(action: AuditAction) -> Self {
        Self {
            user_id: None,
            action,
            entity_id: None,
            details: None,
            ip_address: None,
        }
    }

    pub fn by(mut self, user_id: i32) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn entity(mut self, entity_id: i32) -> Self {
        self.entity_id = Some(entity_id);
        self
    }

    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn from_ip(mut self, ip: Option<String>) -> Self {
        self.ip_address = ip;
        self
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct LogQuery {
    /// Exact action name, e.g. BORROW_BOOK
    pub action: Option<String>,
    pub user_id: Option<i32>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LogPage {
    pub logs: Vec<SystemLog>,
    pub pagination: Pagination,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let entry = NewSystemLog::new(AuditAction::BorrowBook)
            .by(3)
            .entity(42)
            .details(serde_json::json!({ "book_id": 9 }))
            .from_ip(Some("10.0.0.1".into()));

        assert_eq!(entry.user_id, Some(3));
        assert_eq!(entry.entity_id, Some(42));
        assert_eq!(entry.action.to_string(), "BORROW_BOOK");
        assert_eq!(entry.action.entity_type(), "borrow");
        assert_eq!(entry.details.unwrap()["book_id"], 9);
    }
}
