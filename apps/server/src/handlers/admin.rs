use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use std::sync::Arc;

use crate::db;
use crate::error::AppError;
use crate::models::*;
use crate::AppState;

const DEFAULT_PAGE_SIZE: u32 = 10;
const MAX_PAGE_SIZE: u32 = 100;

/// GET /api/bookings?page=&limit=&status= (newest first)
pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    query: Result<Query<BookingsQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<Booking>>>, AppError> {
    let Query(query) = query?;

    let status = match query.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => Some(raw.parse::<BookingStatus>().map_err(AppError::BadRequest)?),
        None => None,
    };
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);

    let total = db::count_bookings(&state.db, status).await?;
    let pagination = Pagination::new(page, limit, total);
    let bookings = db::list_bookings(&state.db, status, i64::from(limit), pagination.offset()).await?;

    Ok(Json(ApiResponse::paginated(bookings, pagination)))
}

/// GET /api/bookings/{id}
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Booking>>, AppError> {
    let booking = db::find_booking(&state.db, id)
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(Json(ApiResponse::success(booking)))
}

/// PATCH /api/bookings/{id}: operator status change.
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<Booking>>, AppError> {
    let Json(body) = payload?;

    let current = db::find_booking(&state.db, id)
        .await?
        .ok_or_else(|| not_found(id))?;

    if !current.status.can_transition_to(body.status) {
        return Err(illegal_transition(current.status, body.status));
    }
    if !db::update_booking_status(&state.db, id, current.status, body.status).await? {
        // Someone else moved it first; report against the status they left behind.
        let latest = db::find_booking(&state.db, id)
            .await?
            .ok_or_else(|| not_found(id))?;
        return Err(illegal_transition(latest.status, body.status));
    }

    let updated = db::find_booking(&state.db, id)
        .await?
        .ok_or_else(|| not_found(id))?;

    tracing::info!(
        booking_id = id,
        from = current.status.as_str(),
        to = updated.status.as_str(),
        "booking status changed"
    );

    Ok(Json(
        ApiResponse::success(updated).with_message(format!("Статус заявки: {}", body.status.label())),
    ))
}

fn not_found(id: i64) -> AppError {
    AppError::NotFound(format!("Заявка №{id} не найдена"))
}

fn illegal_transition(from: BookingStatus, to: BookingStatus) -> AppError {
    AppError::Conflict(format!(
        "Нельзя изменить статус с {} на {}",
        from.as_str(),
        to.as_str()
    ))
}
