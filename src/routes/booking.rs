use axum::{
    Json, Router,
    extract::{Path, State},
    routing::post,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::booking::{
        BookingResponse, CancelBookingRequest, CancelBookingResponse, CreateBookingRequest,
    },
    error::AppError,
    services::booking_service,
    state::SharedState,
};

/// Routes handling the booking lifecycle of a class.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/classes/{id}/bookings", post(create_booking))
        .route("/classes/{id}/bookings/cancel", post(cancel_booking))
}

/// Book one seat in a class.
#[utoipa::path(
    post,
    path = "/classes/{id}/bookings",
    tag = "bookings",
    params(("id" = Uuid, Path, description = "Class identifier")),
    request_body = CreateBookingRequest,
    responses(
        (status = 200, description = "Seat booked", body = BookingResponse),
        (status = 403, description = "Member is blacklisted"),
        (status = 404, description = "Class not found"),
        (status = 409, description = "Class full or member already booked")
    )
)]
pub async fn create_booking(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreateBookingRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    payload.validate()?;
    let booking = booking_service::book_seat(&state, id, payload.user_id).await?;
    Ok(Json(booking.into()))
}

/// Cancel a member's booking, applying the late-cancellation policy.
#[utoipa::path(
    post,
    path = "/classes/{id}/bookings/cancel",
    tag = "bookings",
    params(("id" = Uuid, Path, description = "Class identifier")),
    request_body = CancelBookingRequest,
    responses(
        (status = 200, description = "Booking cancelled", body = CancelBookingResponse),
        (status = 404, description = "Booking not found")
    )
)]
pub async fn cancel_booking(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CancelBookingRequest>,
) -> Result<Json<CancelBookingResponse>, AppError> {
    payload.validate()?;
    let cancelled = booking_service::cancel_booking(&state, id, payload.user_id).await?;
    Ok(Json((&cancelled).into()))
}
