//! API handlers for BookFlow REST endpoints

pub mod auth;
pub mod books;
pub mod borrows;
pub mod categories;
pub mod health;
pub mod logs;
pub mod openapi;
pub mod users;

use std::net::{IpAddr, SocketAddr};

use axum::{
    async_trait,
    extract::{ConnectInfo, DefaultBodyLimit, FromRequest, FromRequestParts, Request},
    http::{
        header::{self, AUTHORIZATION},
        request::Parts,
        HeaderMap, HeaderName, HeaderValue,
    },
    routing::{delete, get, post, put},
    Json, Router,
};
use tower_http::{limit::RequestBodyLimitLayer, set_header::SetResponseHeaderLayer};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::{error::AppError, models::user::UserClaims, AppState};

/// Extractor for authenticated user from JWT token
pub struct AuthenticatedUser(pub UserClaims);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Authentication("Missing authorization header".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Authentication("Invalid authorization header format".to_string()))?;

        let (claims, _user) = state.services.auth.authenticate(token.trim()).await?;
        Ok(AuthenticatedUser(claims))
    }
}

/// Client address for the audit trail
pub struct ClientIp(pub Option<String>);

/// First X-Forwarded-For hop when the peer is a local proxy (or unknown),
/// the peer address otherwise
pub fn client_ip(headers: &HeaderMap, peer: Option<IpAddr>) -> Option<String> {
    let trust_forwarded = peer.map_or(true, |ip| ip.is_loopback());
    if trust_forwarded {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return Some(ip.to_string());
        }
    }
    peer.map(|ip| ip.to_string())
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for ClientIp {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        Ok(ClientIp(client_ip(&parts.headers, peer)))
    }
}

/// JSON body that is validated before reaching the handler
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        value.validate()?;
        Ok(ValidatedJson(value))
    }
}

/// Largest accepted request body
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Hardening headers added to every response
const SECURITY_HEADERS: [(HeaderName, &str); 5] = [
    (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
    (header::X_FRAME_OPTIONS, "SAMEORIGIN"),
    (header::REFERRER_POLICY, "no-referrer"),
    (header::X_XSS_PROTECTION, "0"),
    (header::STRICT_TRANSPORT_SECURITY, "max-age=15552000; includeSubDomains"),
];

/// All REST routes, mounted under `/api/v1`
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        // Health
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Auth
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        .route("/auth/profile", put(auth::update_profile))
        // Books
        .route("/books", post(books::create_book))
        .route("/books/search", get(books::search_books))
        .route("/books/popular", get(books::popular_books))
        .route("/books/statistics", get(books::book_statistics))
        .route("/books/recommended/list", get(books::recommended_books))
        .route("/books/user/favorites", get(books::list_favorites))
        .route(
            "/books/:id",
            get(books::get_book).put(books::update_book).delete(books::delete_book),
        )
        .route("/books/:id/reviews", post(books::add_review))
        .route(
            "/books/:id/favorites",
            post(books::add_favorite).delete(books::remove_favorite),
        )
        // Borrows
        .route("/borrows", post(borrows::borrow_book))
        .route("/borrows/history", get(borrows::history))
        .route("/borrows/current", get(borrows::current))
        .route("/borrows/reserve", post(borrows::reserve_book))
        .route("/borrows/reservations", get(borrows::list_reservations))
        .route("/borrows/reservations/:id", delete(borrows::cancel_reservation))
        .route("/borrows/:id/return", post(borrows::return_book))
        .route("/borrows/:id/renew", post(borrows::renew_book))
        .route("/borrows/admin/all", get(borrows::list_all))
        .route("/borrows/admin/statistics", get(borrows::borrow_statistics))
        .route("/borrows/admin/overdue-check", post(borrows::overdue_check))
        // Users
        .route("/users", get(users::list_users))
        .route("/users/statistics", get(users::my_statistics))
        .route("/users/admin/statistics", get(users::admin_statistics))
        .route("/users/:id", get(users::get_user).delete(users::delete_user))
        .route("/users/:id/status", put(users::update_status))
        .route("/users/:id/role", put(users::update_role))
        .route("/users/:id/max-books", put(users::update_max_books))
        // Categories
        .route(
            "/categories",
            get(categories::list_categories).post(categories::create_category),
        )
        .route(
            "/categories/:id",
            get(categories::get_category)
                .put(categories::update_category)
                .delete(categories::delete_category),
        )
        // Audit
        .route("/logs", get(logs::list_logs));

    let mut app = Router::new()
        .nest("/api/v1", api)
        .merge(openapi::create_openapi_router())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES));

    for (name, value) in SECURITY_HEADERS {
        app = app.layer(SetResponseHeaderLayer::if_not_present(
            name,
            HeaderValue::from_static(value),
        ));
    }

    app.with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn forwarded(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_client_ip_from_local_proxy() {
        let headers = forwarded("203.0.113.7, 10.0.0.2");
        let peer = Some("127.0.0.1".parse().unwrap());
        assert_eq!(client_ip(&headers, peer).as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn test_client_ip_ignores_forwarded_from_remote_peer() {
        let headers = forwarded("203.0.113.7");
        let peer = Some("198.51.100.4".parse().unwrap());
        assert_eq!(client_ip(&headers, peer).as_deref(), Some("198.51.100.4"));
    }

    #[test]
    fn test_client_ip_without_header() {
        let peer = Some("::1".parse().unwrap());
        assert_eq!(client_ip(&HeaderMap::new(), peer).as_deref(), Some("::1"));
        assert_eq!(client_ip(&HeaderMap::new(), None), None);
    }
}
