//! Authentication endpoints

use axum::{extract::State, http::StatusCode, Json};
use serde_json::json;

use crate::{
    error::AppResult,
    models::{
        system_log::{AuditAction, NewSystemLog},
        user::{AuthResponse, LoginRequest, RegisterRequest, UpdateProfile},
        User,
    },
};

use super::{AuthenticatedUser, ClientIp, ValidatedJson};

/// Register a new reader account
#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Username or email already taken")
    )
)]
pub async fn register(
    State(state): State<crate::AppState>,
    ClientIp(ip): ClientIp,
    ValidatedJson(request): ValidatedJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let response = state.services.auth.register(&request).await?;

    state
        .services
        .audit
        .record(
            NewSystemLog::new(AuditAction::Register)
                .by(response.user.id)
                .entity(response.user.id)
                .details(json!({ "username": response.user.username }))
                .from_ip(ip),
        )
        .await;

    Ok((StatusCode::CREATED, Json(response)))
}

/// Login with email and password
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials or disabled account")
    )
)]
pub async fn login(
    State(state): State<crate::AppState>,
    ClientIp(ip): ClientIp,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let response = state.services.auth.login(&request).await?;

    state
        .services
        .audit
        .record(
            NewSystemLog::new(AuditAction::Login)
                .by(response.user.id)
                .entity(response.user.id)
                .from_ip(ip),
        )
        .await;

    Ok(Json(response))
}

/// Get current user profile
#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn me(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<User>> {
    let user = state.services.auth.me(claims.user_id).await?;
    Ok(Json(user))
}

/// Update own profile
#[utoipa::path(
    put,
    path = "/auth/profile",
    tag = "auth",
    security(("bearer_auth" = [])),
    request_body = UpdateProfile,
    responses(
        (status = 200, description = "Profile updated", body = User),
        (status = 401, description = "Current password incorrect"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn update_profile(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ClientIp(ip): ClientIp,
    ValidatedJson(request): ValidatedJson<UpdateProfile>,
) -> AppResult<Json<User>> {
    let user = state.services.auth.update_profile(claims.user_id, &request).await?;

    state
        .services
        .audit
        .record(
            NewSystemLog::new(AuditAction::UpdateProfile)
                .by(claims.user_id)
                .entity(claims.user_id)
                .details(json!({ "password_changed": request.new_password.is_some() }))
                .from_ip(ip),
        )
        .await;

    Ok(Json(user))
}
