//! Authentication service: accounts, passwords and tokens

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::{
    config::{AdminConfig, AuthConfig},
    error::{AppError, AppResult},
    models::{
        user::{AuthResponse, LoginRequest, RegisterRequest, UpdateProfile, UserClaims},
        Role, User,
    },
    repository::{
        users::{NewUser, ProfileChanges},
        Repository,
    },
};

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

/// Check a password against a stored Argon2 hash
pub fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[derive(Clone)]
pub struct AuthService {
    repository: Repository,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(repository: Repository, config: AuthConfig) -> Self {
        Self { repository, config }
    }

    fn issue(&self, user: User) -> AppResult<AuthResponse> {
        let token = UserClaims::new(&user, self.config.jwt_expiration_hours)
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))?;
        Ok(AuthResponse { token, user })
    }

    /// Create a reader account and sign it in
    pub async fn register(&self, data: &RegisterRequest) -> AppResult<AuthResponse> {
        let username = data.username.trim();
        let email = data.email.trim();

        if let Some(message) = self.repository.users.find_conflict(username, email).await? {
            return Err(AppError::Conflict(message.to_string()));
        }

        let password_hash = hash_password(&data.password)?;
        let user = self
            .repository
            .users
            .create(&NewUser {
                username,
                email,
                password_hash: &password_hash,
                full_name: data.full_name.trim(),
                phone: data.phone.as_deref(),
                role: Role::User,
            })
            .await?;

        tracing::info!(user_id = user.id, username = %user.username, "User registered");
        self.issue(user)
    }

    /// Authenticate by email and password
    pub async fn login(&self, data: &LoginRequest) -> AppResult<AuthResponse> {
        let user = self
            .repository
            .users
            .find_by_email(data.email.trim())
            .await?
            .ok_or_else(|| AppError::Authentication("Invalid email or password".to_string()))?;

        if !verify_password(&data.password, &user.password)? {
            return Err(AppError::Authentication("Invalid email or password".to_string()));
        }
        if !user.is_active() {
            return Err(AppError::Authentication("Account has been disabled".to_string()));
        }

        self.issue(user)
    }

    /// Resolve a bearer token to the current account.
    /// The role is taken from the database, not from the token.
    pub async fn authenticate(&self, token: &str) -> AppResult<(UserClaims, User)> {
        let mut claims = UserClaims::from_token(token, &self.config.jwt_secret)
            .map_err(|_| AppError::Authentication("Invalid or expired token".to_string()))?;

        let user = match self.repository.users.get_by_id(claims.user_id).await {
            Ok(user) => user,
            Err(AppError::NotFound(_)) => {
                return Err(AppError::Authentication("User no longer exists".to_string()))
            }
            Err(e) => return Err(e),
        };
        if !user.is_active() {
            return Err(AppError::Authentication("Account has been disabled".to_string()));
        }

        claims.role = user.role;
        claims.email = user.email.clone();
        Ok((claims, user))
    }

    pub async fn me(&self, user_id: i32) -> AppResult<User> {
        self.repository.users.get_by_id(user_id).await
    }

    /// Update the caller's own profile fields and password
    pub async fn update_profile(&self, user_id: i32, data: &UpdateProfile) -> AppResult<User> {
        let user = self.repository.users.get_by_id(user_id).await?;
        let mut changes = ProfileChanges {
            full_name: data.full_name.as_ref().map(|n| n.trim().to_string()),
            phone: data.phone.clone(),
            ..Default::default()
        };

        if let Some(email) = data.email.as_deref().map(str::trim) {
            if !email.eq_ignore_ascii_case(&user.email) {
                if self.repository.users.email_taken_by_other(email, user_id).await? {
                    return Err(AppError::Conflict("Email already registered".to_string()));
                }
                changes.email = Some(email.to_string());
            }
        }

        if let Some(ref new_password) = data.new_password {
            let current = data.current_password.as_deref().ok_or_else(|| {
                AppError::Validation("Current password is required to set a new one".to_string())
            })?;
            if !verify_password(current, &user.password)? {
                return Err(AppError::Authentication("Current password is incorrect".to_string()));
            }
            changes.password_hash = Some(hash_password(new_password)?);
        }

        self.repository.users.update_profile(user_id, &changes).await
    }

    /// Create the configured administrator account when it does not exist yet
    pub async fn ensure_admin(&self, admin: &AdminConfig) -> AppResult<()> {
        if self.repository.users.find_by_email(&admin.email).await?.is_some() {
            tracing::debug!(email = %admin.email, "Administrator account already present");
            return Ok(());
        }

        let password_hash = hash_password(&admin.password)?;
        let user = self
            .repository
            .users
            .create(&NewUser {
                username: &admin.username,
                email: &admin.email,
                password_hash: &password_hash,
                full_name: &admin.full_name,
                phone: None,
                role: Role::Admin,
            })
            .await?;

        tracing::info!(user_id = user.id, "Administrator account created");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("battery staple", &hash).unwrap());
    }

    #[test]
    fn test_hashes_are_salted() {
        assert_ne!(hash_password("same").unwrap(), hash_password("same").unwrap());
    }

    #[test]
    fn test_malformed_hash_is_an_error() {
        assert!(matches!(
            verify_password("pw", "not-a-hash"),
            Err(AppError::Internal(_))
        ));
    }
}
