//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{auth, books, borrows, categories, health, logs, users};
use crate::models::{book, borrow, category, favorite, reservation, review, system_log, user};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "BookFlow API",
        version = "1.0.0",
        description = "Library management REST API"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    modifiers(&BearerAuth),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Auth
        auth::register,
        auth::login,
        auth::me,
        auth::update_profile,
        // Books
        books::search_books,
        books::popular_books,
        books::book_statistics,
        books::recommended_books,
        books::get_book,
        books::create_book,
        books::update_book,
        books::delete_book,
        books::add_review,
        books::add_favorite,
        books::remove_favorite,
        books::list_favorites,
        // Borrows
        borrows::borrow_book,
        borrows::return_book,
        borrows::renew_book,
        borrows::history,
        borrows::current,
        borrows::reserve_book,
        borrows::list_reservations,
        borrows::cancel_reservation,
        borrows::list_all,
        borrows::borrow_statistics,
        borrows::overdue_check,
        // Users
        users::my_statistics,
        users::list_users,
        users::get_user,
        users::update_status,
        users::update_role,
        users::update_max_books,
        users::delete_user,
        users::admin_statistics,
        // Categories
        categories::list_categories,
        categories::get_category,
        categories::create_category,
        categories::update_category,
        categories::delete_category,
        // Audit
        logs::list_logs,
    ),
    components(
        schemas(
            // Users
            user::User,
            user::Role,
            user::UserStatus,
            user::UserSummary,
            user::RegisterRequest,
            user::LoginRequest,
            user::UpdateProfile,
            user::UpdateUserStatus,
            user::UpdateUserRole,
            user::UpdateMaxBooks,
            user::AuthResponse,
            user::UserPage,
            user::UserStatistics,
            user::RoleCount,
            user::AdminUserStatistics,
            // Catalog
            category::Category,
            category::CreateCategory,
            category::UpdateCategory,
            category::CategoryCount,
            book::Book,
            book::BookStatus,
            book::BookSummary,
            book::BookDetails,
            book::BookPage,
            book::CreateBook,
            book::UpdateBook,
            book::CreateReview,
            book::DailyCount,
            book::BookStatistics,
            review::Review,
            review::ReviewWithUser,
            favorite::FavoriteBook,
            books::FavoriteAdded,
            // Circulation
            borrow::BorrowRecord,
            borrow::BorrowStatus,
            borrow::BorrowDetails,
            borrow::BorrowRequest,
            borrow::RenewRequest,
            borrow::BorrowPage,
            borrow::ReturnReceipt,
            borrow::BorrowStatistics,
            borrow::OverdueSweep,
            reservation::Reservation,
            reservation::ReservationStatus,
            reservation::ReservationDetails,
            reservation::ReserveRequest,
            // Audit
            system_log::SystemLog,
            system_log::LogPage,
            // Pagination
            crate::models::Pagination,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Registration, login and profile"),
        (name = "books", description = "Catalog, reviews and favorites"),
        (name = "borrows", description = "Loans and reservations"),
        (name = "users", description = "User dashboards and administration"),
        (name = "categories", description = "Book categories"),
        (name = "logs", description = "Audit trail")
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Create the OpenAPI documentation router
pub fn create_openapi_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_document_lists_routes() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;
        assert!(paths.contains_key("/books/search"));
        assert!(paths.contains_key("/borrows/{id}/return"));
        assert!(paths.contains_key("/users/{id}/max-books"));

        let json = serde_json::to_value(&doc).unwrap();
        assert!(json["components"]["securitySchemes"]["bearer_auth"].is_object());
    }
}
