use axum::{extract::State, Json};
use std::sync::Arc;

use crate::db;
use crate::error::AppError;
use crate::extract::ValidatedJson;
use crate::models::{ApiResponse, Booking, CreateBookingRequest};
use crate::notify::BookingEmail;
use crate::AppState;

/// POST /api/bookings
///
/// Validate, store as PENDING, then notify in the background.
///
/// The submitted `totalPrice` is stored as sent; it is not re-derived from the
/// price calculator.
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    ValidatedJson(body): ValidatedJson<CreateBookingRequest>,
) -> Result<Json<ApiResponse<Booking>>, AppError> {
    let booking = db::insert_booking(&state.db, &body.to_new_booking()).await?;

    tracing::info!(
        booking_id = booking.id,
        tour_type = %booking.tour_type,
        participants = booking.participants,
        total_price = booking.total_price,
        "booking created"
    );

    // Delivery outcome is logged by the notifier; the response does not wait for it.
    drop(state.notifier.booking_created(BookingEmail::from(&booking)));

    Ok(Json(
        ApiResponse::success(booking).with_message("Заявка на бронирование успешно отправлена!"),
    ))
}
