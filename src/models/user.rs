//! User model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::{borrow::BorrowDetails, Pagination};
use crate::error::AppError;

/// User role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
    Librarian,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::Librarian => "librarian",
        }
    }

    /// Admins and librarians manage the catalog and circulation
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Admin | Role::Librarian)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// User account status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "user_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Inactive,
    Suspended,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Inactive => "inactive",
            UserStatus::Suspended => "suspended",
        }
    }
}

/// Full user model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    /// Hashed password (argon2)
    #[serde(skip_serializing)]
    pub password: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub role: Role,
    pub status: UserStatus,
    pub max_books: i32,
    pub borrow_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    /// Check that this user may take out one more book
    pub fn ensure_can_borrow(&self) -> Result<(), AppError> {
        if !self.is_active() {
            return Err(AppError::BusinessRule(
                "User does not exist or has been disabled".to_string(),
            ));
        }
        if self.borrow_count >= self.max_books {
            return Err(AppError::BusinessRule(format!(
                "Maximum number of borrowed books reached ({} books)",
                self.max_books
            )));
        }
        Ok(())
    }
}

/// Reviewer / borrower summary embedded in other responses
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct UserSummary {
    pub id: i32,
    pub username: String,
    pub full_name: String,
}

/// User query parameters (admin listing)
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct UserQuery {
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
    /// Matches username, email or full name
    pub keyword: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Registration request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 50, message = "Username must be between 3 and 50 characters"))]
    pub username: String,
    #[validate(email(message = "Please enter a valid email address"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    #[validate(length(min = 1, max = 100, message = "Please enter your full name"))]
    pub full_name: String,
    #[validate(length(max = 20, message = "Phone number is too long"))]
    pub phone: Option<String>,
}

/// Login request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email(message = "Please enter a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Please enter your password"))]
    pub password: String,
}

/// Update own profile request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateProfile {
    #[validate(length(min = 1, max = 100))]
    pub full_name: Option<String>,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
    #[validate(email(message = "Please enter a valid email address"))]
    pub email: Option<String>,
    /// Current password (required to change password)
    pub current_password: Option<String>,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub new_password: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateUserStatus {
    pub status: UserStatus,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateUserRole {
    pub role: Role,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateMaxBooks {
    #[validate(range(min = 0, max = 100))]
    pub max_books: i32,
}

/// Token issued on register/login
#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserPage {
    pub users: Vec<User>,
    pub pagination: Pagination,
}

/// Personal dashboard figures
#[derive(Debug, Serialize, ToSchema)]
pub struct UserStatistics {
    pub total_borrows: i64,
    pub active_borrows: i64,
    pub overdue_borrows: i64,
    pub favorite_count: i64,
    pub recent_borrows: Vec<BorrowDetails>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct RoleCount {
    pub role: Role,
    pub count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdminUserStatistics {
    pub total_users: i64,
    pub active_users: i64,
    pub new_users_this_month: i64,
    pub role_stats: Vec<RoleCount>,
    pub top_borrowers: Vec<User>,
}

/// JWT Claims for authenticated users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    /// User id as string
    pub sub: String,
    pub user_id: i32,
    pub email: String,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    pub fn new(user: &User, expiration_hours: u64) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: user.id.to_string(),
            user_id: user.id,
            email: user.email.clone(),
            role: user.role,
            exp: now + (expiration_hours as i64 * 3600),
            iat: now,
        }
    }

    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }

    /// Require admin or librarian
    pub fn require_staff(&self) -> Result<(), AppError> {
        if self.is_staff() {
            Ok(())
        } else {
            Err(AppError::Authorization("Insufficient permissions".to_string()))
        }
    }

    /// Require admin privileges
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Authorization("Administrator privileges required".to_string()))
        }
    }

    /// Require that the resource belongs to the caller, unless the caller is staff
    pub fn require_owner_or_staff(&self, owner_id: i32) -> Result<(), AppError> {
        if self.user_id == owner_id || self.is_staff() {
            Ok(())
        } else {
            Err(AppError::Authorization(
                "You can only manage your own records".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        let now = Utc::now();
        User {
            id: 7,
            username: "reader".to_string(),
            email: "reader@example.com".to_string(),
            password: String::new(),
            full_name: "Avid Reader".to_string(),
            phone: None,
            role: Role::User,
            status: UserStatus::Active,
            max_books: 5,
            borrow_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    fn claims_with_role(role: Role) -> UserClaims {
        let mut user = sample_user();
        user.role = role;
        UserClaims::new(&user, 1)
    }

    #[test]
    fn test_token_round_trip() {
        let claims = claims_with_role(Role::Librarian);
        let token = claims.create_token("secret").unwrap();
        let parsed = UserClaims::from_token(&token, "secret").unwrap();

        assert_eq!(parsed.user_id, 7);
        assert_eq!(parsed.sub, "7");
        assert_eq!(parsed.role, Role::Librarian);
        assert_eq!(parsed.email, "reader@example.com");
    }

    #[test]
    fn test_token_wrong_secret() {
        let token = claims_with_role(Role::User).create_token("secret").unwrap();
        assert!(UserClaims::from_token(&token, "other").is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let mut claims = claims_with_role(Role::User);
        claims.iat -= 10_000;
        claims.exp = Utc::now().timestamp() - 3600;
        let token = claims.create_token("secret").unwrap();
        assert!(UserClaims::from_token(&token, "secret").is_err());
    }

    #[test]
    fn test_role_gates() {
        let user = claims_with_role(Role::User);
        let librarian = claims_with_role(Role::Librarian);
        let admin = claims_with_role(Role::Admin);

        assert!(user.require_staff().is_err());
        assert!(librarian.require_staff().is_ok());
        assert!(admin.require_staff().is_ok());

        assert!(user.require_admin().is_err());
        assert!(librarian.require_admin().is_err());
        assert!(admin.require_admin().is_ok());
    }

    #[test]
    fn test_owner_or_staff() {
        let user = claims_with_role(Role::User);
        assert!(user.require_owner_or_staff(7).is_ok());
        assert!(user.require_owner_or_staff(8).is_err());
        assert!(claims_with_role(Role::Librarian).require_owner_or_staff(8).is_ok());
    }

    #[test]
    fn test_borrow_quota() {
        let mut user = sample_user();
        assert!(user.ensure_can_borrow().is_ok());

        user.borrow_count = 5;
        assert!(matches!(user.ensure_can_borrow(), Err(AppError::BusinessRule(_))));
    }

    #[test]
    fn test_disabled_user_cannot_borrow() {
        let mut user = sample_user();
        user.status = UserStatus::Suspended;
        assert!(user.ensure_can_borrow().is_err());
    }

    #[test]
    fn test_password_not_serialized() {
        let mut user = sample_user();
        user.password = "$argon2id$hash".to_string();
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["role"], "user");
        assert_eq!(json["status"], "active");
    }

    #[test]
    fn test_register_validation() {
        let request = RegisterRequest {
            username: "ab".to_string(),
            email: "not-an-email".to_string(),
            password: "123".to_string(),
            full_name: String::new(),
            phone: None,
        };
        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("username"));
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
        assert!(fields.contains_key("full_name"));
    }
}
