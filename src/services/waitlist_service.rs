use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        booking_store::JoinWaitlistOutcome,
        models::{NotificationKind, WaitlistEntryEntity},
    },
    domain::capacity,
    error::ServiceError,
    sched::TaskPayload,
    services::notification_service,
    state::SharedState,
};

/// Queue a member for a class.
pub async fn join(
    state: &SharedState,
    class_id: Uuid,
    user_id: String,
) -> Result<WaitlistEntryEntity, ServiceError> {
    let store = state.require_store().await?;

    if let Some(user) = store.find_user(user_id.clone()).await?
        && user.strikes.blacklisted
    {
        return Err(ServiceError::UserBlacklisted);
    }

    match store.join_waitlist(class_id, user_id, state.now()).await? {
        JoinWaitlistOutcome::Joined(entry) => Ok(entry),
        JoinWaitlistOutcome::ClassNotFound => Err(ServiceError::ClassNotFound),
        JoinWaitlistOutcome::AlreadyWaitlisted => Err(ServiceError::AlreadyWaitlisted),
        JoinWaitlistOutcome::AlreadyBooked => Err(ServiceError::AlreadyBooked),
    }
}

/// Remove a member from a class waitlist.
///
/// When the departing member was sitting on a seat offer, the freed seat
/// immediately goes to the next candidate.
pub async fn leave(
    state: &SharedState,
    class_id: Uuid,
    user_id: String,
) -> Result<WaitlistEntryEntity, ServiceError> {
    let store = state.require_store().await?;

    let Some(entry) = store
        .remove_user_waitlist_entry(class_id, user_id.clone())
        .await?
    else {
        return Err(ServiceError::NotFound(format!(
            "user `{user_id}` is not waitlisted for this class"
        )));
    };

    if entry.notified_at.is_some()
        && let Err(err) = offer_next_seat(state, class_id).await
    {
        warn!(%class_id, error = %err, "failed to re-offer seat after waitlist departure");
    }

    Ok(entry)
}

/// Waitlist of a class in queue order.
pub async fn list(
    state: &SharedState,
    class_id: Uuid,
) -> Result<Vec<WaitlistEntryEntity>, ServiceError> {
    let store = state.require_store().await?;
    if store.find_class(class_id).await?.is_none() {
        return Err(ServiceError::ClassNotFound);
    }
    store.class_waitlist(class_id).await.map_err(Into::into)
}

/// Try to hand a freed seat to the waitlist.
///
/// Scans the frontmost candidates up to the configured lookahead, passing
/// over members that cannot receive a push (they keep their place in the
/// queue). The chosen candidate gets a seat hold, an expiry timer and an
/// offer notification. Returns the entry that received the offer, if any.
pub async fn offer_next_seat(
    state: &SharedState,
    class_id: Uuid,
) -> Result<Option<WaitlistEntryEntity>, ServiceError> {
    let store = state.require_store().await?;

    let Some(class) = store.find_class(class_id).await? else {
        return Ok(None);
    };
    let now = state.now();

    if let Some(hold) = &class.hold {
        if hold.expires_at > now {
            debug!(%class_id, entry_id = %hold.entry_id, "seat already on hold, no offer");
            return Ok(None);
        }
        // The expiry timer for this hold never ran (lost across a restart,
        // for instance). Retire the lapsed offer before promoting anyone.
        store.remove_waitlist_entry(hold.entry_id).await?;
    }

    if capacity::seats_remaining(class.enrolled_count, class.capacity) == 0 {
        return Ok(None);
    }

    let candidates = store
        .waitlist_candidates(class_id, now, state.config().promotion_lookahead)
        .await?;
    for mut entry in candidates {
        let Some(user) = store.find_user(entry.user_id.clone()).await? else {
            debug!(entry_id = %entry.id, "candidate has no profile, skipping");
            continue;
        };
        if user.fcm_tokens.is_empty() {
            debug!(entry_id = %entry.id, "candidate has no push tokens, skipping");
            continue;
        }

        let expires_at = now + state.config().hold_window();
        if !store.place_seat_hold(entry.id, now, expires_at).await? {
            // Entry vanished between the scan and the stamp.
            continue;
        }
        entry.notified_at = Some(now);
        entry.expires_at = Some(expires_at);

        state.tasks().schedule(
            TaskPayload::WaitlistExpiry {
                class_id,
                entry_id: entry.id,
            },
            expires_at,
        );
        notification_service::deliver_to_user(
            state,
            &user,
            NotificationKind::WaitlistOffer,
            Some(class_id),
            notification_service::waitlist_offer_message(
                &class,
                entry.id,
                state.config().waitlist_hold_minutes,
            ),
        )
        .await?;

        info!(%class_id, entry_id = %entry.id, user_id = %entry.user_id, "seat offered to waitlist");
        return Ok(Some(entry));
    }

    Ok(None)
}

/// React to a seat offer reaching the end of its claim window.
///
/// The timer may be stale: the member may have claimed the seat (entry
/// gone), left the queue, or received a fresh offer since. Only a lapsed
/// offer removes the entry; in every case a freed seat is re-offered.
pub async fn handle_expiry(
    state: &SharedState,
    class_id: Uuid,
    entry_id: Uuid,
) -> Result<(), ServiceError> {
    let store = state.require_store().await?;

    let Some(entry) = store.find_waitlist_entry(entry_id).await? else {
        // Claimed or left already; a hold still pointing here is stale.
        if store.clear_class_hold_if_matches(class_id, entry_id).await? {
            offer_next_seat(state, class_id).await?;
        }
        return Ok(());
    };

    match entry.expires_at {
        // Never notified: a timer from a previous life of this entry.
        None => return Ok(()),
        // The offer was renewed; the newer timer owns it.
        Some(expires_at) if expires_at > state.now() => return Ok(()),
        Some(_) => {}
    }

    info!(%class_id, %entry_id, user_id = %entry.user_id, "seat offer lapsed, removing entry");
    // Removal shifts later positions forward and clears the class hold.
    store.remove_waitlist_entry(entry_id).await?;
    offer_next_seat(state, class_id).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use time::{Duration, macros::datetime};
    use uuid::Uuid;

    use super::*;
    use crate::dao::booking_store::BookingStore;
    use crate::dao::models::{ClassSessionEntity, UserEntity};
    use crate::sched::testing::ScheduledTask;
    use crate::state::testing::{TestHarness, harness};

    const NOW: time::OffsetDateTime = datetime!(2026-03-01 12:00 UTC);

    fn class(capacity: u32, enrolled: u32) -> ClassSessionEntity {
        ClassSessionEntity {
            id: Uuid::new_v4(),
            name: "Boxing".to_owned(),
            class_date: "2026-03-01".to_owned(),
            class_time: "18:00".to_owned(),
            start_at: Some(datetime!(2026-03-01 18:00 UTC)),
            duration_minutes: 60,
            capacity,
            enrolled_count: enrolled,
            hold: None,
        }
    }

    fn member(id: &str, tokens: Vec<&str>) -> UserEntity {
        UserEntity {
            id: id.to_owned(),
            name: id.to_owned(),
            fcm_tokens: tokens.into_iter().map(str::to_owned).collect(),
            strikes: Default::default(),
            is_admin: false,
            uses_aggregator_pass: false,
        }
    }

    async fn seeded(capacity: u32, enrolled: u32) -> (TestHarness, Uuid) {
        let h = harness(NOW).await;
        let class = class(capacity, enrolled);
        let class_id = class.id;
        h.store.insert_class(class).await.unwrap();
        (h, class_id)
    }

    async fn queue_member(h: &TestHarness, class_id: Uuid, id: &str, tokens: Vec<&str>) {
        h.store.upsert_user(member(id, tokens)).await.unwrap();
        h.store
            .join_waitlist(class_id, id.to_owned(), NOW)
            .await
            .unwrap();
    }

    fn expiry_tasks(h: &TestHarness) -> Vec<ScheduledTask> {
        h.queue
            .scheduled()
            .into_iter()
            .filter(|task| matches!(task.payload, TaskPayload::WaitlistExpiry { .. }))
            .collect()
    }

    #[tokio::test]
    async fn offer_holds_the_seat_and_schedules_its_expiry() {
        let (h, class_id) = seeded(1, 0).await;
        queue_member(&h, class_id, "alice", vec!["alice-token"]).await;

        let offered = offer_next_seat(&h.state, class_id)
            .await
            .unwrap()
            .expect("offer made");

        assert_eq!(offered.user_id, "alice");
        assert_eq!(offered.expires_at, Some(NOW + Duration::minutes(5)));

        let class = h.store.find_class(class_id).await.unwrap().unwrap();
        let hold = class.hold.expect("hold stamped on class");
        assert_eq!(hold.entry_id, offered.id);

        let tasks = expiry_tasks(&h);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].fire_at, NOW + Duration::minutes(5));

        let sent = h.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].tokens, vec!["alice-token".to_owned()]);
        assert_eq!(
            sent[0].message.data.get("waitlistId"),
            Some(&offered.id.to_string())
        );
    }

    #[tokio::test]
    async fn offer_passes_over_unreachable_members() {
        let (h, class_id) = seeded(1, 0).await;
        queue_member(&h, class_id, "ghost", vec![]).await;
        queue_member(&h, class_id, "bob", vec!["bob-token"]).await;

        let offered = offer_next_seat(&h.state, class_id)
            .await
            .unwrap()
            .expect("offer made");

        assert_eq!(offered.user_id, "bob");

        // The unreachable head keeps its place and stays never-notified.
        let entries = h.store.class_waitlist(class_id).await.unwrap();
        assert_eq!(entries[0].user_id, "ghost");
        assert_eq!(entries[0].position, 1);
        assert!(entries[0].notified_at.is_none());
    }

    #[tokio::test]
    async fn live_hold_blocks_further_offers() {
        let (h, class_id) = seeded(1, 0).await;
        queue_member(&h, class_id, "alice", vec!["alice-token"]).await;
        queue_member(&h, class_id, "bob", vec!["bob-token"]).await;
        offer_next_seat(&h.state, class_id).await.unwrap().unwrap();

        let second = offer_next_seat(&h.state, class_id).await.unwrap();

        assert!(second.is_none());
        assert_eq!(h.notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn full_class_makes_no_offer() {
        let (h, class_id) = seeded(1, 1).await;
        queue_member(&h, class_id, "alice", vec!["alice-token"]).await;

        let offered = offer_next_seat(&h.state, class_id).await.unwrap();

        assert!(offered.is_none());
        assert!(h.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn lapsed_offer_is_removed_and_the_next_member_promoted() {
        let (h, class_id) = seeded(1, 0).await;
        queue_member(&h, class_id, "alice", vec!["alice-token"]).await;
        queue_member(&h, class_id, "bob", vec!["bob-token"]).await;
        let offered = offer_next_seat(&h.state, class_id).await.unwrap().unwrap();

        h.clock.advance(Duration::minutes(6));
        handle_expiry(&h.state, class_id, offered.id).await.unwrap();

        let entries = h.store.class_waitlist(class_id).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].user_id, "bob");
        assert_eq!(entries[0].position, 1);
        assert!(entries[0].notified_at.is_some());

        let class = h.store.find_class(class_id).await.unwrap().unwrap();
        assert_eq!(class.hold.map(|hold| hold.user_id), Some("bob".to_owned()));
    }

    #[tokio::test]
    async fn expiry_of_a_claimed_offer_is_a_no_op() {
        let (h, class_id) = seeded(1, 0).await;
        queue_member(&h, class_id, "alice", vec!["alice-token"]).await;
        let offered = offer_next_seat(&h.state, class_id).await.unwrap().unwrap();

        // Alice books the seat; the booking clears the hold and her entry.
        h.store
            .create_booking(class_id, "alice".to_owned(), NOW + Duration::minutes(1))
            .await
            .unwrap();
        h.store
            .remove_user_waitlist_entry(class_id, "alice".to_owned())
            .await
            .unwrap();

        h.clock.advance(Duration::minutes(6));
        handle_expiry(&h.state, class_id, offered.id).await.unwrap();

        // No phantom promotion happened.
        assert_eq!(h.notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn expiry_before_the_deadline_is_a_no_op() {
        let (h, class_id) = seeded(1, 0).await;
        queue_member(&h, class_id, "alice", vec!["alice-token"]).await;
        let offered = offer_next_seat(&h.state, class_id).await.unwrap().unwrap();

        handle_expiry(&h.state, class_id, offered.id).await.unwrap();

        let entries = h.store.class_waitlist(class_id).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].user_id, "alice");
    }

    #[tokio::test]
    async fn leaving_with_an_active_offer_promotes_the_next_member() {
        let (h, class_id) = seeded(1, 0).await;
        queue_member(&h, class_id, "alice", vec!["alice-token"]).await;
        queue_member(&h, class_id, "bob", vec!["bob-token"]).await;
        offer_next_seat(&h.state, class_id).await.unwrap().unwrap();

        let left = leave(&h.state, class_id, "alice".to_owned()).await.unwrap();

        assert!(left.notified_at.is_some());
        let class = h.store.find_class(class_id).await.unwrap().unwrap();
        assert_eq!(class.hold.map(|hold| hold.user_id), Some("bob".to_owned()));
    }

    #[tokio::test]
    async fn blacklisted_members_cannot_join() {
        let (h, class_id) = seeded(1, 1).await;
        let mut banned = member("mallory", vec!["m-token"]);
        banned.strikes.blacklisted = true;
        h.store.upsert_user(banned).await.unwrap();

        let err = join(&h.state, class_id, "mallory".to_owned())
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::UserBlacklisted));
    }
}
