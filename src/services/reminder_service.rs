use rand::Rng;
use time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    dao::models::{ClassSessionEntity, NotificationKind, UserEntity},
    domain::lateness,
    error::ServiceError,
    sched::{TaskHandle, TaskPayload},
    services::notification_service,
    state::SharedState,
};

/// Schedule the reminder timers for a freshly confirmed booking and return
/// their handles so the booking can persist them for later revocation.
///
/// Intervals that already lie in the past are skipped. Aggregator-pass
/// members additionally get a post-class validation reminder, delayed past
/// the class end by a random jitter so a room full of attendees does not
/// buzz in unison.
pub fn schedule_for_booking(
    state: &SharedState,
    class: &ClassSessionEntity,
    user: &UserEntity,
) -> Vec<TaskHandle> {
    let Some(start) = lateness::resolve_start(
        None,
        class.start_at,
        Some(&class.class_date),
        Some(&class.class_time),
    ) else {
        warn!(class_id = %class.id, "class start unresolvable, skipping reminders");
        return Vec::new();
    };

    let now = state.now();
    let config = state.config();
    let mut handles = Vec::new();

    for &interval in &config.reminder_intervals_minutes {
        let fire_at = start - Duration::minutes(i64::from(interval));
        if fire_at <= now {
            debug!(
                class_id = %class.id,
                interval,
                "reminder interval already passed, skipping"
            );
            continue;
        }
        handles.push(state.tasks().schedule(
            TaskPayload::BookingReminder {
                class_id: class.id,
                user_id: user.id.clone(),
                interval_minutes: interval,
            },
            fire_at,
        ));
    }

    if user.uses_aggregator_pass {
        let duration = if class.duration_minutes > 0 {
            class.duration_minutes
        } else {
            config.default_class_duration_minutes
        };
        let (jitter_min, jitter_max) = config.aggregator_jitter_minutes;
        let jitter = rand::rng().random_range(jitter_min..=jitter_max.max(jitter_min));
        let fire_at =
            start + Duration::minutes(i64::from(duration)) + Duration::minutes(i64::from(jitter));
        handles.push(state.tasks().schedule(
            TaskPayload::AggregatorReminder {
                class_id: class.id,
                user_id: user.id.clone(),
            },
            fire_at,
        ));
    }

    handles
}

/// Deliver an upcoming-class reminder, unless the booking or the class has
/// disappeared since the timer was scheduled.
pub async fn fire_booking_reminder(
    state: &SharedState,
    class_id: Uuid,
    user_id: String,
    interval_minutes: u32,
) -> Result<(), ServiceError> {
    let store = state.require_store().await?;

    if store
        .find_booking(class_id, user_id.clone())
        .await?
        .is_none()
    {
        debug!(%class_id, %user_id, "booking gone, dropping reminder");
        return Ok(());
    }
    let Some(class) = store.find_class(class_id).await? else {
        debug!(%class_id, "class gone, dropping reminder");
        return Ok(());
    };
    let Some(user) = store.find_user(user_id).await? else {
        return Ok(());
    };

    notification_service::deliver_to_user(
        state,
        &user,
        NotificationKind::BookingReminder,
        Some(class_id),
        notification_service::booking_reminder_message(&class, interval_minutes),
    )
    .await?;
    Ok(())
}

/// Deliver the post-class validation reminder to an aggregator-pass member.
///
/// The booking still exists at this point unless it was cancelled, in which
/// case the timer would normally have been revoked; the existence checks
/// cover timers that outlived their booking anyway.
pub async fn fire_aggregator_reminder(
    state: &SharedState,
    class_id: Uuid,
    user_id: String,
) -> Result<(), ServiceError> {
    let store = state.require_store().await?;

    if store
        .find_booking(class_id, user_id.clone())
        .await?
        .is_none()
    {
        debug!(%class_id, %user_id, "booking gone, dropping aggregator reminder");
        return Ok(());
    }
    let Some(class) = store.find_class(class_id).await? else {
        return Ok(());
    };
    let Some(user) = store.find_user(user_id).await? else {
        return Ok(());
    };
    if !user.uses_aggregator_pass {
        return Ok(());
    }

    notification_service::deliver_to_user(
        state,
        &user,
        NotificationKind::AggregatorReminder,
        Some(class_id),
        notification_service::aggregator_reminder_message(&class),
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;
    use uuid::Uuid;

    use super::*;
    use crate::dao::booking_store::BookingStore;
    use crate::dao::models::{ClassSessionEntity, UserEntity};
    use crate::state::testing::harness;

    fn class() -> ClassSessionEntity {
        ClassSessionEntity {
            id: Uuid::new_v4(),
            name: "Spin".to_owned(),
            class_date: "2026-03-01".to_owned(),
            class_time: "18:00".to_owned(),
            start_at: Some(datetime!(2026-03-01 18:00 UTC)),
            duration_minutes: 45,
            capacity: 10,
            enrolled_count: 0,
            hold: None,
        }
    }

    fn member(id: &str, aggregator: bool) -> UserEntity {
        UserEntity {
            id: id.to_owned(),
            name: id.to_owned(),
            fcm_tokens: vec![format!("{id}-token")],
            strikes: Default::default(),
            is_admin: false,
            uses_aggregator_pass: aggregator,
        }
    }

    #[tokio::test]
    async fn intervals_already_past_are_skipped() {
        // 17:35, so only the 15-minute reminder is still ahead.
        let h = harness(datetime!(2026-03-01 17:35 UTC)).await;

        let handles = schedule_for_booking(&h.state, &class(), &member("alice", false));

        assert_eq!(handles.len(), 1);
        let scheduled = h.queue.scheduled();
        assert_eq!(scheduled.len(), 1);
        assert_eq!(scheduled[0].fire_at, datetime!(2026-03-01 17:45 UTC));
        assert!(matches!(
            scheduled[0].payload,
            TaskPayload::BookingReminder {
                interval_minutes: 15,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn aggregator_members_get_a_jittered_post_class_reminder() {
        let h = harness(datetime!(2026-03-01 12:00 UTC)).await;
        let class = class();

        let handles = schedule_for_booking(&h.state, &class, &member("bob", true));

        // Three interval reminders plus the validation reminder.
        assert_eq!(handles.len(), 4);
        let scheduled = h.queue.scheduled();
        let aggregator = scheduled
            .iter()
            .find(|task| matches!(task.payload, TaskPayload::AggregatorReminder { .. }))
            .expect("aggregator reminder scheduled");
        // Class ends 18:45; jitter is 5 to 10 minutes.
        assert!(aggregator.fire_at >= datetime!(2026-03-01 18:50 UTC));
        assert!(aggregator.fire_at <= datetime!(2026-03-01 18:55 UTC));
    }

    #[tokio::test]
    async fn unresolvable_start_schedules_nothing() {
        let h = harness(datetime!(2026-03-01 12:00 UTC)).await;
        let mut class = class();
        class.start_at = None;
        class.class_date = "bad".to_owned();

        let handles = schedule_for_booking(&h.state, &class, &member("carol", false));

        assert!(handles.is_empty());
        assert!(h.queue.scheduled().is_empty());
    }

    #[tokio::test]
    async fn firing_after_the_booking_is_gone_sends_nothing() {
        let h = harness(datetime!(2026-03-01 17:45 UTC)).await;
        let class = class();
        h.store.insert_class(class.clone()).await.unwrap();
        h.store.upsert_user(member("dana", false)).await.unwrap();

        fire_booking_reminder(&h.state, class.id, "dana".to_owned(), 15)
            .await
            .unwrap();

        assert!(h.notifier.sent().is_empty());
    }
}
