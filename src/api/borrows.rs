//! Circulation endpoints: loans and reservations

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde_json::json;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        borrow::{
            BorrowPage, BorrowQuery, BorrowRequest, BorrowStatistics, HistoryQuery, OverdueSweep,
            RenewRequest, ReturnReceipt,
        },
        reservation::{ReservationDetails, ReserveRequest},
        system_log::{AuditAction, NewSystemLog},
        BorrowDetails, BorrowRecord, Reservation,
    },
};

use super::{AuthenticatedUser, ClientIp};

/// Borrow a book
#[utoipa::path(
    post,
    path = "/borrows",
    tag = "borrows",
    security(("bearer_auth" = [])),
    request_body = BorrowRequest,
    responses(
        (status = 201, description = "Book borrowed", body = BorrowRecord),
        (status = 400, description = "Quota reached, out of stock or already borrowed"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn borrow_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ClientIp(ip): ClientIp,
    Json(request): Json<BorrowRequest>,
) -> AppResult<(StatusCode, Json<BorrowRecord>)> {
    let record = state
        .services
        .borrows
        .borrow(claims.user_id, request.book_id, request.days)
        .await?;

    state
        .services
        .audit
        .record(
            NewSystemLog::new(AuditAction::BorrowBook)
                .by(claims.user_id)
                .entity(record.id)
                .details(json!({ "book_id": record.book_id, "due_date": record.due_date }))
                .from_ip(ip),
        )
        .await;

    Ok((StatusCode::CREATED, Json(record)))
}

/// Return a borrowed book
#[utoipa::path(
    post,
    path = "/borrows/{id}/return",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Borrow record ID")),
    responses(
        (status = 200, description = "Book returned", body = ReturnReceipt),
        (status = 400, description = "Already returned"),
        (status = 403, description = "Not your loan"),
        (status = 404, description = "Borrow record not found")
    )
)]
pub async fn return_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ClientIp(ip): ClientIp,
    Path(id): Path<i32>,
) -> AppResult<Json<ReturnReceipt>> {
    let receipt = state.services.borrows.return_book(&claims, id).await?;

    state
        .services
        .audit
        .record(
            NewSystemLog::new(AuditAction::ReturnBook)
                .by(claims.user_id)
                .entity(id)
                .details(json!({
                    "book_id": receipt.record.book_id,
                    "fine_amount": receipt.fine_amount,
                    "overdue_days": receipt.overdue_days,
                }))
                .from_ip(ip),
        )
        .await;

    Ok(Json(receipt))
}

/// Requested extension from an optional JSON body; an empty body means the default
fn renew_days(body: &[u8]) -> AppResult<Option<i64>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    let Json(request) = Json::<RenewRequest>::from_bytes(body)
        .map_err(|e| AppError::BadRequest(e.body_text()))?;
    request.validate()?;
    Ok(request.days)
}

/// Renew a loan
#[utoipa::path(
    post,
    path = "/borrows/{id}/renew",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Borrow record ID")),
    request_body(content = RenewRequest, description = "Optional extension in days"),
    responses(
        (status = 200, description = "Loan renewed", body = BorrowRecord),
        (status = 400, description = "Renewal limit reached, overdue or reserved"),
        (status = 403, description = "Not your loan")
    )
)]
pub async fn renew_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ClientIp(ip): ClientIp,
    Path(id): Path<i32>,
    body: Bytes,
) -> AppResult<Json<BorrowRecord>> {
    let days = renew_days(&body)?;
    let record = state.services.borrows.renew(&claims, id, days).await?;

    state
        .services
        .audit
        .record(
            NewSystemLog::new(AuditAction::RenewBook)
                .by(claims.user_id)
                .entity(id)
                .details(json!({ "due_date": record.due_date, "renew_count": record.renew_count }))
                .from_ip(ip),
        )
        .await;

    Ok(Json(record))
}

/// The caller's borrow history
#[utoipa::path(
    get,
    path = "/borrows/history",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(HistoryQuery),
    responses(
        (status = 200, description = "Paginated history", body = BorrowPage)
    )
)]
pub async fn history(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<HistoryQuery>,
) -> AppResult<Json<BorrowPage>> {
    let page = state
        .services
        .borrows
        .history(claims.user_id, query.page, query.limit)
        .await?;
    Ok(Json(page))
}

/// The caller's active loans
#[utoipa::path(
    get,
    path = "/borrows/current",
    tag = "borrows",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Active loans, soonest due first", body = Vec<BorrowDetails>)
    )
)]
pub async fn current(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<BorrowDetails>>> {
    let records = state.services.borrows.current(claims.user_id).await?;
    Ok(Json(records))
}

/// Reserve a book with no copy available
#[utoipa::path(
    post,
    path = "/borrows/reserve",
    tag = "borrows",
    security(("bearer_auth" = [])),
    request_body = ReserveRequest,
    responses(
        (status = 201, description = "Reservation placed", body = Reservation),
        (status = 400, description = "Book available, already reserved or borrowed"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn reserve_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ClientIp(ip): ClientIp,
    Json(request): Json<ReserveRequest>,
) -> AppResult<(StatusCode, Json<Reservation>)> {
    let reservation = state
        .services
        .borrows
        .reserve(claims.user_id, request.book_id)
        .await?;

    state
        .services
        .audit
        .record(
            NewSystemLog::new(AuditAction::ReserveBook)
                .by(claims.user_id)
                .entity(reservation.id)
                .details(json!({ "book_id": request.book_id }))
                .from_ip(ip),
        )
        .await;

    Ok((StatusCode::CREATED, Json(reservation)))
}

/// The caller's reservations
#[utoipa::path(
    get,
    path = "/borrows/reservations",
    tag = "borrows",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Reservations, newest first", body = Vec<ReservationDetails>)
    )
)]
pub async fn list_reservations(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<ReservationDetails>>> {
    let reservations = state.services.borrows.reservations(claims.user_id).await?;
    Ok(Json(reservations))
}

/// Cancel one of the caller's pending reservations
#[utoipa::path(
    delete,
    path = "/borrows/reservations/{id}",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Reservation cancelled", body = Reservation),
        (status = 400, description = "Reservation is not pending"),
        (status = 404, description = "Reservation not found")
    )
)]
pub async fn cancel_reservation(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ClientIp(ip): ClientIp,
    Path(id): Path<i32>,
) -> AppResult<Json<Reservation>> {
    let reservation = state
        .services
        .borrows
        .cancel_reservation(claims.user_id, id)
        .await?;

    state
        .services
        .audit
        .record(
            NewSystemLog::new(AuditAction::CancelReservation)
                .by(claims.user_id)
                .entity(id)
                .from_ip(ip),
        )
        .await;

    Ok(Json(reservation))
}

/// All borrow records (staff)
#[utoipa::path(
    get,
    path = "/borrows/admin/all",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(BorrowQuery),
    responses(
        (status = 200, description = "Paginated records with borrower", body = BorrowPage),
        (status = 403, description = "Staff only")
    )
)]
pub async fn list_all(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<BorrowQuery>,
) -> AppResult<Json<BorrowPage>> {
    claims.require_staff()?;
    let page = state.services.borrows.list_all(&query).await?;
    Ok(Json(page))
}

/// Circulation statistics (staff)
#[utoipa::path(
    get,
    path = "/borrows/admin/statistics",
    tag = "borrows",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Borrow statistics", body = BorrowStatistics),
        (status = 403, description = "Staff only")
    )
)]
pub async fn borrow_statistics(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<BorrowStatistics>> {
    claims.require_staff()?;
    let stats = state.services.borrows.statistics().await?;
    Ok(Json(stats))
}

/// Run the overdue sweep now (admin)
#[utoipa::path(
    post,
    path = "/borrows/admin/overdue-check",
    tag = "borrows",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Sweep results", body = OverdueSweep),
        (status = 403, description = "Administrators only")
    )
)]
pub async fn overdue_check(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ClientIp(ip): ClientIp,
) -> AppResult<Json<OverdueSweep>> {
    claims.require_admin()?;
    let sweep = state.services.borrows.run_overdue_sweep(Utc::now()).await?;

    state
        .services
        .audit
        .record(
            NewSystemLog::new(AuditAction::OverdueSweep)
                .by(claims.user_id)
                .details(json!({
                    "marked_overdue": sweep.marked_overdue,
                    "reminders_sent": sweep.reminders_sent,
                    "expired_reservations": sweep.expired_reservations,
                }))
                .from_ip(ip),
        )
        .await;

    Ok(Json(sweep))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renew_days_defaults_on_empty_body() {
        assert_eq!(renew_days(b"").unwrap(), None);
        assert_eq!(renew_days(b"  \n").unwrap(), None);
        assert_eq!(renew_days(b"{}").unwrap(), None);
    }

    #[test]
    fn test_renew_days_reads_extension() {
        assert_eq!(renew_days(br#"{"days": 7}"#).unwrap(), Some(7));
    }

    #[test]
    fn test_renew_days_rejects_malformed_body() {
        assert!(matches!(renew_days(br#"{"days":"abc"}"#), Err(AppError::BadRequest(_))));
        assert!(matches!(renew_days(b"{"), Err(AppError::BadRequest(_))));
        assert!(matches!(renew_days(br#"{"days": 0}"#), Err(AppError::Validation(_))));
    }
}
