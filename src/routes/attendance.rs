use axum::{
    Json, Router,
    extract::{Path, State},
    routing::post,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::attendance::{AttendanceResponse, MarkAttendanceRequest},
    error::AppError,
    services::booking_service,
    state::SharedState,
};

/// Routes handling attendance marking.
pub fn router() -> Router<SharedState> {
    Router::new().route("/classes/{id}/attendance", post(mark_attendance))
}

/// Record whether a member showed up to a session. Re-marking the same
/// member overwrites the previous record.
#[utoipa::path(
    post,
    path = "/classes/{id}/attendance",
    tag = "attendance",
    params(("id" = Uuid, Path, description = "Class identifier")),
    request_body = MarkAttendanceRequest,
    responses(
        (status = 200, description = "Attendance recorded", body = AttendanceResponse),
        (status = 404, description = "Class not found")
    )
)]
pub async fn mark_attendance(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<MarkAttendanceRequest>,
) -> Result<Json<AttendanceResponse>, AppError> {
    payload.validate()?;
    let record = booking_service::mark_attendance(&state, id, payload).await?;
    Ok(Json(record.into()))
}
