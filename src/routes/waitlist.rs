use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::waitlist::{JoinWaitlistRequest, LeaveWaitlistRequest, WaitlistEntryResponse},
    error::AppError,
    services::waitlist_service,
    state::SharedState,
};

/// Routes handling class waitlists.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route(
            "/classes/{id}/waitlist",
            post(join_waitlist).get(list_waitlist),
        )
        .route("/classes/{id}/waitlist/leave", post(leave_waitlist))
}

/// Join the waitlist of a class.
#[utoipa::path(
    post,
    path = "/classes/{id}/waitlist",
    tag = "waitlist",
    params(("id" = Uuid, Path, description = "Class identifier")),
    request_body = JoinWaitlistRequest,
    responses(
        (status = 200, description = "Queued", body = WaitlistEntryResponse),
        (status = 403, description = "Member is blacklisted"),
        (status = 404, description = "Class not found"),
        (status = 409, description = "Already queued or already booked")
    )
)]
pub async fn join_waitlist(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<JoinWaitlistRequest>,
) -> Result<Json<WaitlistEntryResponse>, AppError> {
    payload.validate()?;
    let entry = waitlist_service::join(&state, id, payload.user_id).await?;
    Ok(Json(entry.into()))
}

/// Leave the waitlist of a class.
#[utoipa::path(
    post,
    path = "/classes/{id}/waitlist/leave",
    tag = "waitlist",
    params(("id" = Uuid, Path, description = "Class identifier")),
    request_body = LeaveWaitlistRequest,
    responses(
        (status = 200, description = "Entry removed", body = WaitlistEntryResponse),
        (status = 404, description = "Member is not queued for this class")
    )
)]
pub async fn leave_waitlist(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<LeaveWaitlistRequest>,
) -> Result<Json<WaitlistEntryResponse>, AppError> {
    payload.validate()?;
    let entry = waitlist_service::leave(&state, id, payload.user_id).await?;
    Ok(Json(entry.into()))
}

/// Waitlist of a class in queue order.
#[utoipa::path(
    get,
    path = "/classes/{id}/waitlist",
    tag = "waitlist",
    params(("id" = Uuid, Path, description = "Class identifier")),
    responses(
        (status = 200, description = "Entries in queue order", body = [WaitlistEntryResponse]),
        (status = 404, description = "Class not found")
    )
)]
pub async fn list_waitlist(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<WaitlistEntryResponse>>, AppError> {
    let entries = waitlist_service::list(&state, id).await?;
    Ok(Json(entries.into_iter().map(Into::into).collect()))
}
