use tracing::info;
use uuid::Uuid;

use crate::{
    dao::models::ClassSessionEntity,
    domain::lateness,
    dto::class::CreateClassRequest,
    error::ServiceError,
    state::SharedState,
};

/// Create a class session from a staff request.
///
/// The date and time strings are normalized into a start instant at
/// creation so later lateness checks never have to re-parse them.
pub async fn create_class(
    state: &SharedState,
    request: CreateClassRequest,
) -> Result<ClassSessionEntity, ServiceError> {
    let store = state.require_store().await?;

    let start_at = lateness::resolve_start(
        None,
        None,
        Some(&request.class_date),
        Some(&request.class_time),
    );

    let class = ClassSessionEntity {
        id: Uuid::new_v4(),
        name: request.name,
        class_date: request.class_date,
        class_time: request.class_time,
        start_at,
        duration_minutes: request
            .duration_minutes
            .unwrap_or(state.config().default_class_duration_minutes),
        capacity: request.capacity,
        enrolled_count: 0,
        hold: None,
    };
    store.insert_class(class.clone()).await?;

    info!(class_id = %class.id, name = %class.name, "class created");
    Ok(class)
}

/// Fetch one class session.
pub async fn get_class(
    state: &SharedState,
    class_id: Uuid,
) -> Result<ClassSessionEntity, ServiceError> {
    let store = state.require_store().await?;
    store
        .find_class(class_id)
        .await?
        .ok_or(ServiceError::ClassNotFound)
}

/// All class sessions.
pub async fn list_classes(state: &SharedState) -> Result<Vec<ClassSessionEntity>, ServiceError> {
    let store = state.require_store().await?;
    store.list_classes().await.map_err(Into::into)
}

/// Delete a class session along with its bookings and waitlist.
pub async fn delete_class(state: &SharedState, class_id: Uuid) -> Result<(), ServiceError> {
    let store = state.require_store().await?;
    if !store.delete_class(class_id).await? {
        return Err(ServiceError::ClassNotFound);
    }
    info!(%class_id, "class deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::state::testing::harness;

    const NOW: time::OffsetDateTime = datetime!(2026-03-01 12:00 UTC);

    fn request(duration: Option<u32>) -> CreateClassRequest {
        CreateClassRequest {
            name: "Morning Yoga".to_owned(),
            class_date: "2026-03-02".to_owned(),
            class_time: "09:30".to_owned(),
            duration_minutes: duration,
            capacity: 12,
        }
    }

    #[tokio::test]
    async fn creation_normalizes_the_start_instant() {
        let h = harness(NOW).await;

        let class = create_class(&h.state, request(Some(45))).await.unwrap();

        assert_eq!(class.start_at, Some(datetime!(2026-03-02 09:30 UTC)));
        assert_eq!(class.duration_minutes, 45);
        assert_eq!(get_class(&h.state, class.id).await.unwrap(), class);
    }

    #[tokio::test]
    async fn missing_duration_falls_back_to_the_configured_default() {
        let h = harness(NOW).await;

        let class = create_class(&h.state, request(None)).await.unwrap();

        assert_eq!(class.duration_minutes, 60);
    }

    #[tokio::test]
    async fn deleting_an_unknown_class_is_an_error() {
        let h = harness(NOW).await;

        let err = delete_class(&h.state, Uuid::new_v4()).await.unwrap_err();

        assert!(matches!(err, ServiceError::ClassNotFound));
    }
}
