//! Audit log endpoint

use axum::{
    extract::{Query, State},
    Json,
};

use crate::{
    error::AppResult,
    models::system_log::{LogPage, LogQuery},
};

use super::AuthenticatedUser;

/// Browse the audit trail (admin)
#[utoipa::path(
    get,
    path = "/logs",
    tag = "logs",
    security(("bearer_auth" = [])),
    params(LogQuery),
    responses(
        (status = 200, description = "Paginated audit entries", body = LogPage),
        (status = 403, description = "Administrators only")
    )
)]
pub async fn list_logs(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<LogQuery>,
) -> AppResult<Json<LogPage>> {
    claims.require_admin()?;
    let page = state.services.audit.list(&query).await?;
    Ok(Json(page))
}
