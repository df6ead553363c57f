use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::class::{ClassSummary, CreateClassRequest},
    error::AppError,
    services::class_service,
    state::SharedState,
};

/// Routes handling class session management.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/classes", post(create_class).get(list_classes))
        .route("/classes/{id}", get(get_class).delete(delete_class))
}

/// Create a class session.
#[utoipa::path(
    post,
    path = "/classes",
    tag = "classes",
    request_body = CreateClassRequest,
    responses(
        (status = 200, description = "Class created", body = ClassSummary),
        (status = 400, description = "Invalid payload")
    )
)]
pub async fn create_class(
    State(state): State<SharedState>,
    Json(payload): Json<CreateClassRequest>,
) -> Result<Json<ClassSummary>, AppError> {
    payload.validate()?;
    let class = class_service::create_class(&state, payload).await?;
    Ok(Json(class.into()))
}

/// List every class session.
#[utoipa::path(
    get,
    path = "/classes",
    tag = "classes",
    responses((status = 200, description = "All classes", body = [ClassSummary]))
)]
pub async fn list_classes(
    State(state): State<SharedState>,
) -> Result<Json<Vec<ClassSummary>>, AppError> {
    let classes = class_service::list_classes(&state).await?;
    Ok(Json(classes.into_iter().map(Into::into).collect()))
}

/// Fetch one class session.
#[utoipa::path(
    get,
    path = "/classes/{id}",
    tag = "classes",
    params(("id" = Uuid, Path, description = "Class identifier")),
    responses(
        (status = 200, description = "The class", body = ClassSummary),
        (status = 404, description = "Class not found")
    )
)]
pub async fn get_class(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ClassSummary>, AppError> {
    let class = class_service::get_class(&state, id).await?;
    Ok(Json(class.into()))
}

/// Delete a class session and everything attached to it.
#[utoipa::path(
    delete,
    path = "/classes/{id}",
    tag = "classes",
    params(("id" = Uuid, Path, description = "Class identifier")),
    responses(
        (status = 204, description = "Class deleted"),
        (status = 404, description = "Class not found")
    )
)]
pub async fn delete_class(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    class_service::delete_class(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
