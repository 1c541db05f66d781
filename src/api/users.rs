//! User dashboards and administration endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::json;

use crate::{
    error::AppResult,
    models::{
        system_log::{AuditAction, NewSystemLog},
        user::{
            AdminUserStatistics, UpdateMaxBooks, UpdateUserRole, UpdateUserStatus, UserPage,
            UserQuery, UserStatistics,
        },
        User,
    },
};

use super::{AuthenticatedUser, ClientIp, ValidatedJson};

/// The caller's borrowing dashboard
#[utoipa::path(
    get,
    path = "/users/statistics",
    tag = "users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Personal statistics", body = UserStatistics)
    )
)]
pub async fn my_statistics(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<UserStatistics>> {
    let stats = state.services.users.statistics(claims.user_id).await?;
    Ok(Json(stats))
}

/// List users (staff)
#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    security(("bearer_auth" = [])),
    params(UserQuery),
    responses(
        (status = 200, description = "Paginated users", body = UserPage),
        (status = 403, description = "Staff only")
    )
)]
pub async fn list_users(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<UserQuery>,
) -> AppResult<Json<UserPage>> {
    claims.require_staff()?;
    let page = state.services.users.list(&query).await?;
    Ok(Json(page))
}

/// Get user by ID (staff)
#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "User", body = User),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<User>> {
    claims.require_staff()?;
    let user = state.services.users.get_by_id(id).await?;
    Ok(Json(user))
}

/// Activate, deactivate or suspend an account (admin)
#[utoipa::path(
    put,
    path = "/users/{id}/status",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "User ID")),
    request_body = UpdateUserStatus,
    responses(
        (status = 200, description = "Status updated", body = User),
        (status = 400, description = "Cannot change own status"),
        (status = 403, description = "Administrators only")
    )
)]
pub async fn update_status(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ClientIp(ip): ClientIp,
    Path(id): Path<i32>,
    Json(data): Json<UpdateUserStatus>,
) -> AppResult<Json<User>> {
    claims.require_admin()?;
    let user = state.services.users.update_status(&claims, id, data.status).await?;

    state
        .services
        .audit
        .record(
            NewSystemLog::new(AuditAction::UpdateUserStatus)
                .by(claims.user_id)
                .entity(id)
                .details(json!({ "status": data.status }))
                .from_ip(ip),
        )
        .await;

    Ok(Json(user))
}

/// Change a user's role (admin)
#[utoipa::path(
    put,
    path = "/users/{id}/role",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "User ID")),
    request_body = UpdateUserRole,
    responses(
        (status = 200, description = "Role updated", body = User),
        (status = 400, description = "Cannot change own role"),
        (status = 403, description = "Administrators only")
    )
)]
pub async fn update_role(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ClientIp(ip): ClientIp,
    Path(id): Path<i32>,
    Json(data): Json<UpdateUserRole>,
) -> AppResult<Json<User>> {
    claims.require_admin()?;
    let user = state.services.users.update_role(&claims, id, data.role).await?;

    state
        .services
        .audit
        .record(
            NewSystemLog::new(AuditAction::UpdateUserRole)
                .by(claims.user_id)
                .entity(id)
                .details(json!({ "role": data.role }))
                .from_ip(ip),
        )
        .await;

    Ok(Json(user))
}

/// Change a user's borrowing quota (admin)
#[utoipa::path(
    put,
    path = "/users/{id}/max-books",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "User ID")),
    request_body = UpdateMaxBooks,
    responses(
        (status = 200, description = "Quota updated", body = User),
        (status = 400, description = "Quota below books currently borrowed"),
        (status = 403, description = "Administrators only")
    )
)]
pub async fn update_max_books(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ClientIp(ip): ClientIp,
    Path(id): Path<i32>,
    ValidatedJson(data): ValidatedJson<UpdateMaxBooks>,
) -> AppResult<Json<User>> {
    claims.require_admin()?;
    let user = state.services.users.update_max_books(id, data.max_books).await?;

    state
        .services
        .audit
        .record(
            NewSystemLog::new(AuditAction::UpdateUserQuota)
                .by(claims.user_id)
                .entity(id)
                .details(json!({ "max_books": data.max_books }))
                .from_ip(ip),
        )
        .await;

    Ok(Json(user))
}

/// Delete a user holding no books (admin)
#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 400, description = "User has active borrows or is the caller"),
        (status = 403, description = "Administrators only"),
        (status = 404, description = "User not found")
    )
)]
pub async fn delete_user(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ClientIp(ip): ClientIp,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    claims.require_admin()?;
    state.services.users.delete(&claims, id).await?;

    state
        .services
        .audit
        .record(
            NewSystemLog::new(AuditAction::DeleteUser)
                .by(claims.user_id)
                .entity(id)
                .from_ip(ip),
        )
        .await;

    Ok(StatusCode::NO_CONTENT)
}

/// Member statistics (admin)
#[utoipa::path(
    get,
    path = "/users/admin/statistics",
    tag = "users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Member statistics", body = AdminUserStatistics),
        (status = 403, description = "Administrators only")
    )
)]
pub async fn admin_statistics(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<AdminUserStatistics>> {
    claims.require_admin()?;
    let stats = state.services.users.admin_statistics().await?;
    Ok(Json(stats))
}
