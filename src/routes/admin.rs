use axum::{
    Json, Router,
    extract::{Path, State},
    routing::post,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::admin::{
        DirectNotificationRequest, DirectNotificationResponse, ManualBookingsRequest,
        ManualBookingsResponse, StrikeResetResponse, WhitelistResponse,
    },
    error::AppError,
    services::{booking_service, notification_service, strike_service},
    state::SharedState,
};

/// Routes reserved for staff operations.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/classes/{id}/manual-bookings", post(manual_bookings))
        .route("/admin/strike-reset", post(strike_reset))
        .route("/admin/users/{id}/whitelist", post(whitelist_user))
        .route("/admin/notifications", post(send_notification))
}

/// Book seats for a group of members at once.
#[utoipa::path(
    post,
    path = "/classes/{id}/manual-bookings",
    tag = "admin",
    params(("id" = Uuid, Path, description = "Class identifier")),
    request_body = ManualBookingsRequest,
    responses(
        (status = 200, description = "Seats booked", body = ManualBookingsResponse),
        (status = 404, description = "Class not found"),
        (status = 409, description = "Not enough free seats")
    )
)]
pub async fn manual_bookings(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ManualBookingsRequest>,
) -> Result<Json<ManualBookingsResponse>, AppError> {
    payload.validate()?;
    let response = booking_service::manual_bookings(&state, id, payload).await?;
    Ok(Json(response))
}

/// Clear every member's strikes and lift every blacklist.
#[utoipa::path(
    post,
    path = "/admin/strike-reset",
    tag = "admin",
    responses((status = 200, description = "Amnesty swept", body = StrikeResetResponse))
)]
pub async fn strike_reset(
    State(state): State<SharedState>,
) -> Result<Json<StrikeResetResponse>, AppError> {
    let outcome = strike_service::reset_all(&state).await?;
    Ok(Json(outcome.into()))
}

/// Clear one member's strikes.
#[utoipa::path(
    post,
    path = "/admin/users/{id}/whitelist",
    tag = "admin",
    params(("id" = String, Path, description = "Member identifier")),
    responses(
        (status = 200, description = "Strikes cleared", body = WhitelistResponse),
        (status = 404, description = "Member not found")
    )
)]
pub async fn whitelist_user(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<WhitelistResponse>, AppError> {
    let response = strike_service::whitelist_user(&state, id).await?;
    Ok(Json(response))
}

/// Push a free-form message to one member.
#[utoipa::path(
    post,
    path = "/admin/notifications",
    tag = "admin",
    request_body = DirectNotificationRequest,
    responses(
        (status = 200, description = "Delivery attempted", body = DirectNotificationResponse),
        (status = 404, description = "Member not found")
    )
)]
pub async fn send_notification(
    State(state): State<SharedState>,
    Json(payload): Json<DirectNotificationRequest>,
) -> Result<Json<DirectNotificationResponse>, AppError> {
    payload.validate()?;
    let response = notification_service::send_direct(&state, payload).await?;
    Ok(Json(response))
}
