use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, warn};

use crate::{
    error::ServiceError,
    sched::TaskPayload,
    services::{reminder_service, waitlist_service},
    state::SharedState,
};

/// Consume fired scheduler payloads for the lifetime of the process.
///
/// Each payload is handled on its own task so one slow delivery cannot
/// stall the queue; failures are logged, never retried. A reminder that is
/// lost this way is annoying, a crashed dispatcher would be worse.
pub async fn run(state: SharedState, mut receiver: UnboundedReceiver<TaskPayload>) {
    while let Some(payload) = receiver.recv().await {
        debug!(?payload, "scheduler task fired");
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(err) = dispatch(&state, payload.clone()).await {
                warn!(?payload, error = %err, "scheduled task failed");
            }
        });
    }
    debug!("task queue closed, dispatcher exiting");
}

async fn dispatch(state: &SharedState, payload: TaskPayload) -> Result<(), ServiceError> {
    match payload {
        TaskPayload::BookingReminder {
            class_id,
            user_id,
            interval_minutes,
        } => {
            reminder_service::fire_booking_reminder(state, class_id, user_id, interval_minutes)
                .await
        }
        TaskPayload::AggregatorReminder { class_id, user_id } => {
            reminder_service::fire_aggregator_reminder(state, class_id, user_id).await
        }
        TaskPayload::WaitlistExpiry { class_id, entry_id } => {
            waitlist_service::handle_expiry(state, class_id, entry_id).await
        }
    }
}

#[cfg(test)]
mod tests {
    use time::{Duration, macros::datetime};
    use uuid::Uuid;

    use super::*;
    use crate::dao::booking_store::BookingStore;
    use crate::dao::models::ClassSessionEntity;
    use crate::state::testing::harness;

    const NOW: time::OffsetDateTime = datetime!(2026-03-01 12:00 UTC);

    #[tokio::test]
    async fn expiry_payloads_reach_the_waitlist_flow() {
        let h = harness(NOW).await;
        let class = ClassSessionEntity {
            id: Uuid::new_v4(),
            name: "HIIT".to_owned(),
            class_date: "2026-03-01".to_owned(),
            class_time: "18:00".to_owned(),
            start_at: Some(datetime!(2026-03-01 18:00 UTC)),
            duration_minutes: 60,
            capacity: 1,
            enrolled_count: 0,
            hold: None,
        };
        h.store.insert_class(class.clone()).await.unwrap();
        h.store
            .join_waitlist(class.id, "alice".to_owned(), NOW)
            .await
            .unwrap();
        let entry = h.store.class_waitlist(class.id).await.unwrap().remove(0);
        h.store
            .place_seat_hold(entry.id, NOW, NOW + Duration::minutes(5))
            .await
            .unwrap();
        h.clock.advance(Duration::minutes(6));

        dispatch(
            &h.state,
            TaskPayload::WaitlistExpiry {
                class_id: class.id,
                entry_id: entry.id,
            },
        )
        .await
        .unwrap();

        assert!(h.store.class_waitlist(class.id).await.unwrap().is_empty());
        let class = h.store.find_class(class.id).await.unwrap().unwrap();
        assert_eq!(class.hold, None);
    }
}
