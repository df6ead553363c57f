use std::collections::HashMap;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    dao::models::{
        ClassSessionEntity, FailedTokenEntity, NotificationKind, NotificationLogEntity, UserEntity,
    },
    dto::admin::{DirectNotificationRequest, DirectNotificationResponse},
    error::ServiceError,
    notify::{DeliveryStatus, PushMessage},
    state::SharedState,
};

/// Outcome of one delivery, after pruning dead tokens.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeliveryReport {
    /// Tokens that accepted the message.
    pub delivered: u32,
    /// Dead tokens removed from user profiles.
    pub pruned: u32,
}

/// Reminder push for an upcoming class.
pub fn booking_reminder_message(class: &ClassSessionEntity, interval_minutes: u32) -> PushMessage {
    PushMessage {
        title: "Class reminder".to_owned(),
        body: format!(
            "{} starts in {} minutes.",
            class.name, interval_minutes
        ),
        data: HashMap::from([
            ("type".to_owned(), "booking_reminder".to_owned()),
            ("classId".to_owned(), class.id.to_string()),
        ]),
    }
}

/// Post-class validation reminder for aggregator-pass members.
pub fn aggregator_reminder_message(class: &ClassSessionEntity) -> PushMessage {
    PushMessage {
        title: "Validate your attendance".to_owned(),
        body: format!(
            "Remember to validate your {} attendance in the partner app.",
            class.name
        ),
        data: HashMap::from([
            ("type".to_owned(), "aggregator_reminder".to_owned()),
            ("classId".to_owned(), class.id.to_string()),
        ]),
    }
}

/// Seat offer push for the head of a waitlist.
pub fn waitlist_offer_message(
    class: &ClassSessionEntity,
    entry_id: Uuid,
    hold_minutes: u32,
) -> PushMessage {
    PushMessage {
        title: "A seat opened up".to_owned(),
        body: format!(
            "A seat in {} is yours for the next {} minutes.",
            class.name, hold_minutes
        ),
        data: HashMap::from([
            ("type".to_owned(), "waitlist_offer".to_owned()),
            ("classId".to_owned(), class.id.to_string()),
            ("waitlistId".to_owned(), entry_id.to_string()),
        ]),
    }
}

/// Blacklist-lift announcement.
pub fn unlock_message() -> PushMessage {
    PushMessage {
        title: "Booking unlocked".to_owned(),
        body: "Your booking privileges have been restored.".to_owned(),
        data: HashMap::from([("type".to_owned(), "account_unlocked".to_owned())]),
    }
}

/// Staff alert about a fresh booking.
pub fn admin_alert_message(user_name: &str, class: &ClassSessionEntity) -> PushMessage {
    PushMessage {
        title: "New booking".to_owned(),
        body: format!(
            "{} booked {} on {} at {}.",
            user_name, class.name, class.class_date, class.class_time
        ),
        data: HashMap::from([
            ("type".to_owned(), "admin_new_booking".to_owned()),
            ("classId".to_owned(), class.id.to_string()),
        ]),
    }
}

/// Deliver `message` to every device of `user`, prune tokens the push
/// service rejected, and write the audit record.
pub async fn deliver_to_user(
    state: &SharedState,
    user: &UserEntity,
    kind: NotificationKind,
    class_id: Option<Uuid>,
    message: PushMessage,
) -> Result<DeliveryReport, ServiceError> {
    deliver(
        state,
        user.fcm_tokens.clone(),
        kind,
        Some(user.id.clone()),
        class_id,
        message,
    )
    .await
}

/// Alert every staff device about a new booking. Failures are logged and
/// swallowed; an alert never blocks the booking that triggered it.
pub async fn send_admin_alert(state: &SharedState, user_name: &str, class: &ClassSessionEntity) {
    let result = async {
        let store = state.require_store().await?;
        let admins = store.list_admins().await?;
        let tokens: Vec<String> = admins
            .into_iter()
            .flat_map(|admin| admin.fcm_tokens)
            .collect();
        deliver(
            state,
            tokens,
            NotificationKind::AdminAlert,
            None,
            Some(class.id),
            admin_alert_message(user_name, class),
        )
        .await
    }
    .await;

    if let Err(err) = result {
        warn!(error = %err, class_id = %class.id, "failed to deliver staff booking alert");
    }
}

/// Push a free-form staff message to one member.
pub async fn send_direct(
    state: &SharedState,
    request: DirectNotificationRequest,
) -> Result<DirectNotificationResponse, ServiceError> {
    let store = state.require_store().await?;
    let Some(user) = store.find_user(request.user_id.clone()).await? else {
        return Err(ServiceError::NotFound(format!(
            "user `{}` not found",
            request.user_id
        )));
    };

    let message = PushMessage {
        title: request.title,
        body: request.body,
        data: HashMap::from([("type".to_owned(), "direct".to_owned())]),
    };
    let report = deliver_to_user(state, &user, NotificationKind::Direct, None, message).await?;

    Ok(DirectNotificationResponse {
        delivered: report.delivered,
        pruned_tokens: report.pruned,
    })
}

async fn deliver(
    state: &SharedState,
    tokens: Vec<String>,
    kind: NotificationKind,
    user_id: Option<String>,
    class_id: Option<Uuid>,
    message: PushMessage,
) -> Result<DeliveryReport, ServiceError> {
    let store = state.require_store().await?;

    let deliveries = if tokens.is_empty() {
        debug!(?kind, "no registered tokens, recording empty delivery");
        Vec::new()
    } else {
        state.notifier().send(tokens, message.clone()).await
    };

    let mut report = DeliveryReport::default();
    let mut failed_tokens = Vec::new();
    for delivery in deliveries {
        if delivery.is_invalid() {
            store.prune_token(delivery.token.clone()).await?;
            report.pruned += 1;
        }
        match delivery.status {
            DeliveryStatus::Delivered => report.delivered += 1,
            DeliveryStatus::InvalidToken { code } | DeliveryStatus::Failed { code } => {
                failed_tokens.push(FailedTokenEntity {
                    token: delivery.token,
                    code,
                });
            }
        }
    }

    store
        .record_notification(NotificationLogEntity {
            id: Uuid::new_v4(),
            kind,
            user_id,
            class_id,
            title: message.title,
            body: message.body,
            delivered: report.delivered,
            failed_tokens,
            sent_at: state.now(),
        })
        .await?;

    Ok(report)
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::dao::booking_store::BookingStore;
    use crate::dao::models::UserEntity;
    use crate::state::testing::harness;

    fn user(id: &str, tokens: Vec<&str>) -> UserEntity {
        UserEntity {
            id: id.to_owned(),
            name: id.to_owned(),
            fcm_tokens: tokens.into_iter().map(str::to_owned).collect(),
            strikes: Default::default(),
            is_admin: false,
            uses_aggregator_pass: false,
        }
    }

    #[tokio::test]
    async fn rejected_tokens_are_pruned_and_audited() {
        let h = harness(datetime!(2026-03-01 12:00 UTC)).await;
        let alice = user("alice", vec!["good", "dead"]);
        h.store.upsert_user(alice.clone()).await.unwrap();
        h.notifier.mark_invalid("dead");

        let report = deliver_to_user(
            &h.state,
            &alice,
            NotificationKind::Direct,
            None,
            unlock_message(),
        )
        .await
        .unwrap();

        assert_eq!(report.delivered, 1);
        assert_eq!(report.pruned, 1);

        let alice = h.store.find_user("alice".to_owned()).await.unwrap().unwrap();
        assert_eq!(alice.fcm_tokens, vec!["good"]);

        let logs = h.store.logged_notifications().await;
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].delivered, 1);
        assert_eq!(logs[0].failed_tokens.len(), 1);
        assert_eq!(logs[0].failed_tokens[0].token, "dead");
    }

    #[tokio::test]
    async fn tokenless_users_get_an_audit_record_but_no_push() {
        let h = harness(datetime!(2026-03-01 12:00 UTC)).await;
        let bob = user("bob", vec![]);
        h.store.upsert_user(bob.clone()).await.unwrap();

        let report = deliver_to_user(
            &h.state,
            &bob,
            NotificationKind::AccountUnlocked,
            None,
            unlock_message(),
        )
        .await
        .unwrap();

        assert_eq!(report.delivered, 0);
        assert!(h.notifier.sent().is_empty());
        assert_eq!(h.store.logged_notifications().await.len(), 1);
    }
}
