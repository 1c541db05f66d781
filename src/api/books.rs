//! Catalog endpoints: books, reviews and favorites

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::{
        book::{
            BookDetails, BookPage, BookQuery, BookStatistics, CreateBook, CreateReview, LimitQuery,
            UpdateBook,
        },
        system_log::{AuditAction, NewSystemLog},
        Book, FavoriteBook, Review,
    },
};

use super::{AuthenticatedUser, ClientIp, ValidatedJson};

#[derive(Serialize, ToSchema)]
pub struct FavoriteAdded {
    pub favorite_id: i32,
    pub book_id: i32,
}

/// Search the catalog
#[utoipa::path(
    get,
    path = "/books/search",
    tag = "books",
    params(BookQuery),
    responses(
        (status = 200, description = "Paginated books", body = BookPage)
    )
)]
pub async fn search_books(
    State(state): State<crate::AppState>,
    Query(query): Query<BookQuery>,
) -> AppResult<Json<BookPage>> {
    let page = state.services.catalog.search(&query).await?;
    Ok(Json(page))
}

/// Best rated available books
#[utoipa::path(
    get,
    path = "/books/popular",
    tag = "books",
    params(LimitQuery),
    responses(
        (status = 200, description = "Popular books", body = Vec<Book>)
    )
)]
pub async fn popular_books(
    State(state): State<crate::AppState>,
    Query(query): Query<LimitQuery>,
) -> AppResult<Json<Vec<Book>>> {
    let books = state.services.catalog.popular(query.limit).await?;
    Ok(Json(books))
}

/// Catalog statistics
#[utoipa::path(
    get,
    path = "/books/statistics",
    tag = "books",
    responses(
        (status = 200, description = "Catalog statistics", body = BookStatistics)
    )
)]
pub async fn book_statistics(State(state): State<crate::AppState>) -> AppResult<Json<BookStatistics>> {
    let stats = state.services.catalog.statistics().await?;
    Ok(Json(stats))
}

/// Recommendations based on the caller's recent borrows
#[utoipa::path(
    get,
    path = "/books/recommended/list",
    tag = "books",
    security(("bearer_auth" = [])),
    params(LimitQuery),
    responses(
        (status = 200, description = "Recommended books", body = Vec<Book>)
    )
)]
pub async fn recommended_books(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<LimitQuery>,
) -> AppResult<Json<Vec<Book>>> {
    let books = state
        .services
        .catalog
        .recommended(claims.user_id, query.limit)
        .await?;
    Ok(Json(books))
}

/// Get book by ID with category and recent reviews
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    params(("id" = i32, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Book details", body = BookDetails),
        (status = 404, description = "Book not found")
    )
)]
pub async fn get_book(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<BookDetails>> {
    let book = state.services.catalog.get_details(id).await?;
    Ok(Json(book))
}

/// Add a book to the catalog
#[utoipa::path(
    post,
    path = "/books",
    tag = "books",
    security(("bearer_auth" = [])),
    request_body = CreateBook,
    responses(
        (status = 201, description = "Book created", body = Book),
        (status = 403, description = "Staff only"),
        (status = 409, description = "ISBN already exists")
    )
)]
pub async fn create_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ClientIp(ip): ClientIp,
    ValidatedJson(data): ValidatedJson<CreateBook>,
) -> AppResult<(StatusCode, Json<Book>)> {
    claims.require_staff()?;
    let book = state.services.catalog.create(&data).await?;

    state
        .services
        .audit
        .record(
            NewSystemLog::new(AuditAction::CreateBook)
                .by(claims.user_id)
                .entity(book.id)
                .details(json!({ "isbn": book.isbn, "title": book.title }))
                .from_ip(ip),
        )
        .await;

    Ok((StatusCode::CREATED, Json(book)))
}

/// Update a book
#[utoipa::path(
    put,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Book ID")),
    request_body = UpdateBook,
    responses(
        (status = 200, description = "Book updated", body = Book),
        (status = 400, description = "Quantity below copies on loan"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn update_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ClientIp(ip): ClientIp,
    Path(id): Path<i32>,
    ValidatedJson(data): ValidatedJson<UpdateBook>,
) -> AppResult<Json<Book>> {
    claims.require_staff()?;
    let book = state.services.catalog.update(id, &data).await?;

    state
        .services
        .audit
        .record(
            NewSystemLog::new(AuditAction::UpdateBook)
                .by(claims.user_id)
                .entity(id)
                .from_ip(ip),
        )
        .await;

    Ok(Json(book))
}

/// Delete a book with no active loans
#[utoipa::path(
    delete,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Book ID")),
    responses(
        (status = 204, description = "Book deleted"),
        (status = 400, description = "Book is on loan"),
        (status = 403, description = "Administrators only"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn delete_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ClientIp(ip): ClientIp,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    claims.require_admin()?;
    state.services.catalog.delete(id).await?;

    state
        .services
        .audit
        .record(
            NewSystemLog::new(AuditAction::DeleteBook)
                .by(claims.user_id)
                .entity(id)
                .from_ip(ip),
        )
        .await;

    Ok(StatusCode::NO_CONTENT)
}

/// Review a book
#[utoipa::path(
    post,
    path = "/books/{id}/reviews",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Book ID")),
    request_body = CreateReview,
    responses(
        (status = 201, description = "Review added", body = Review),
        (status = 404, description = "Book not found"),
        (status = 409, description = "Book already reviewed")
    )
)]
pub async fn add_review(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ClientIp(ip): ClientIp,
    Path(id): Path<i32>,
    ValidatedJson(data): ValidatedJson<CreateReview>,
) -> AppResult<(StatusCode, Json<Review>)> {
    let review = state.services.catalog.add_review(claims.user_id, id, &data).await?;

    state
        .services
        .audit
        .record(
            NewSystemLog::new(AuditAction::AddReview)
                .by(claims.user_id)
                .entity(review.id)
                .details(json!({ "book_id": id, "rating": review.rating }))
                .from_ip(ip),
        )
        .await;

    Ok((StatusCode::CREATED, Json(review)))
}

/// Add a book to the caller's favorites
#[utoipa::path(
    post,
    path = "/books/{id}/favorites",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Book ID")),
    responses(
        (status = 201, description = "Favorite added", body = FavoriteAdded),
        (status = 404, description = "Book not found"),
        (status = 409, description = "Already a favorite")
    )
)]
pub async fn add_favorite(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ClientIp(ip): ClientIp,
    Path(id): Path<i32>,
) -> AppResult<(StatusCode, Json<FavoriteAdded>)> {
    let favorite_id = state.services.catalog.add_favorite(claims.user_id, id).await?;

    state
        .services
        .audit
        .record(
            NewSystemLog::new(AuditAction::AddFavorite)
                .by(claims.user_id)
                .entity(favorite_id)
                .details(json!({ "book_id": id }))
                .from_ip(ip),
        )
        .await;

    Ok((StatusCode::CREATED, Json(FavoriteAdded { favorite_id, book_id: id })))
}

/// Remove a book from the caller's favorites
#[utoipa::path(
    delete,
    path = "/books/{id}/favorites",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Book ID")),
    responses(
        (status = 204, description = "Favorite removed"),
        (status = 404, description = "Not a favorite")
    )
)]
pub async fn remove_favorite(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ClientIp(ip): ClientIp,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    state.services.catalog.remove_favorite(claims.user_id, id).await?;

    state
        .services
        .audit
        .record(
            NewSystemLog::new(AuditAction::RemoveFavorite)
                .by(claims.user_id)
                .details(json!({ "book_id": id }))
                .from_ip(ip),
        )
        .await;

    Ok(StatusCode::NO_CONTENT)
}

/// List the caller's favorites
#[utoipa::path(
    get,
    path = "/books/user/favorites",
    tag = "books",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Favorite books", body = Vec<FavoriteBook>)
    )
)]
pub async fn list_favorites(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<FavoriteBook>>> {
    let favorites = state.services.catalog.favorites(claims.user_id).await?;
    Ok(Json(favorites))
}
