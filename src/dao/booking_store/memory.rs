use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::future::BoxFuture;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    BookingStore, CancelBookingOutcome, CancellationRules, CancelledBooking, CreateBookingOutcome,
    JoinWaitlistOutcome, ManualBookingsOutcome, StrikeResetOutcome, WhitelistOutcome,
};
use crate::dao::models::{
    AttendanceEntity, BookingEntity, ClassSessionEntity, NotificationLogEntity, SeatHoldEntity,
    UserEntity, WaitlistEntryEntity,
};
use crate::dao::storage::StorageResult;
use crate::domain::{capacity, lateness, strikes, waitlist};

/// In-process store backed by plain maps behind one lock.
///
/// The single lock makes every operation serializable, which is exactly the
/// isolation the transactional backends provide. Used as the fallback
/// backend when no database is configured, and by service tests.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    classes: HashMap<Uuid, ClassSessionEntity>,
    bookings: HashMap<(Uuid, String), BookingEntity>,
    waitlists: HashMap<Uuid, WaitlistEntryEntity>,
    users: HashMap<String, UserEntity>,
    attendance: HashMap<(String, Uuid, String), AttendanceEntity>,
    notifications: Vec<NotificationLogEntity>,
}

fn class_start(class: &ClassSessionEntity) -> Option<OffsetDateTime> {
    lateness::resolve_start(
        None,
        class.start_at,
        Some(&class.class_date),
        Some(&class.class_time),
    )
}

impl Inner {
    fn create_booking(
        &mut self,
        class_id: Uuid,
        user_id: String,
        now: OffsetDateTime,
    ) -> CreateBookingOutcome {
        let Some(class) = self.classes.get_mut(&class_id) else {
            return CreateBookingOutcome::ClassNotFound;
        };
        if self.bookings.contains_key(&(class_id, user_id.clone())) {
            return CreateBookingOutcome::DuplicateBooking;
        }

        // The seat hold is advisory; capacity is checked against the
        // enrolled count alone.
        if let Err(err) = capacity::occupy(class.enrolled_count, class.capacity, 1) {
            return CreateBookingOutcome::CapacityExceeded {
                remaining: err.remaining,
            };
        }

        class.enrolled_count += 1;
        if class.hold.as_ref().is_some_and(|hold| hold.user_id == user_id) {
            class.hold = None;
        }

        let booking = BookingEntity {
            class_id,
            user_id: user_id.clone(),
            booked_at: now,
            class_start_at: class_start(class),
            reminder_tasks: Vec::new(),
        };
        self.bookings.insert((class_id, user_id), booking.clone());
        CreateBookingOutcome::Created(booking)
    }

    fn create_manual_bookings(
        &mut self,
        class_id: Uuid,
        user_ids: Vec<String>,
        now: OffsetDateTime,
    ) -> ManualBookingsOutcome {
        let Some(class) = self.classes.get_mut(&class_id) else {
            return ManualBookingsOutcome::ClassNotFound;
        };

        let mut seen = HashSet::new();
        let mut fresh = Vec::new();
        let mut skipped = Vec::new();
        for user_id in user_ids {
            if !seen.insert(user_id.clone()) {
                continue;
            }
            if self.bookings.contains_key(&(class_id, user_id.clone())) {
                skipped.push(user_id);
            } else {
                fresh.push(user_id);
            }
        }

        let requested = fresh.len() as u32;
        if let Err(err) = capacity::occupy(class.enrolled_count, class.capacity, requested) {
            return ManualBookingsOutcome::CapacityExceeded {
                remaining: err.remaining,
                requested,
            };
        }

        class.enrolled_count += requested;
        let start = class_start(class);
        let bookings: Vec<BookingEntity> = fresh
            .into_iter()
            .map(|user_id| {
                let booking = BookingEntity {
                    class_id,
                    user_id: user_id.clone(),
                    booked_at: now,
                    class_start_at: start,
                    reminder_tasks: Vec::new(),
                };
                self.bookings.insert((class_id, user_id), booking.clone());
                booking
            })
            .collect();

        ManualBookingsOutcome::Created { bookings, skipped }
    }

    fn cancel_booking(
        &mut self,
        class_id: Uuid,
        user_id: String,
        now: OffsetDateTime,
        rules: CancellationRules,
    ) -> CancelBookingOutcome {
        let Some(booking) = self.bookings.remove(&(class_id, user_id.clone())) else {
            return CancelBookingOutcome::BookingNotFound;
        };

        let mut class_found = false;
        let mut resolved_from_class = None;
        if let Some(class) = self.classes.get_mut(&class_id) {
            class_found = true;
            class.enrolled_count = capacity::release(class.enrolled_count);
            resolved_from_class = class_start(class);
        }

        let start = lateness::resolve_start(booking.class_start_at, resolved_from_class, None, None);
        let late = lateness::is_late(start, now, rules.late_window);

        let (strike_count, blacklisted, newly_blacklisted) = if late {
            match self.users.get_mut(&user_id) {
                Some(user) => {
                    let outcome =
                        strikes::register_late_cancellation(&mut user.strikes, rules.strike_limit, now);
                    (
                        outcome.strikes,
                        user.strikes.blacklisted,
                        outcome.newly_blacklisted,
                    )
                }
                None => (0, false, false),
            }
        } else {
            self.users
                .get(&user_id)
                .map(|user| (user.strikes.late_cancellations, user.strikes.blacklisted, false))
                .unwrap_or((0, false, false))
        };

        CancelBookingOutcome::Cancelled(CancelledBooking {
            booking,
            late,
            strikes: strike_count,
            blacklisted,
            newly_blacklisted,
            class_found,
        })
    }

    fn join_waitlist(
        &mut self,
        class_id: Uuid,
        user_id: String,
        now: OffsetDateTime,
    ) -> JoinWaitlistOutcome {
        if !self.classes.contains_key(&class_id) {
            return JoinWaitlistOutcome::ClassNotFound;
        }
        if self.bookings.contains_key(&(class_id, user_id.clone())) {
            return JoinWaitlistOutcome::AlreadyBooked;
        }
        if self
            .waitlists
            .values()
            .any(|entry| entry.class_id == class_id && entry.user_id == user_id)
        {
            return JoinWaitlistOutcome::AlreadyWaitlisted;
        }

        let current_max = self
            .waitlists
            .values()
            .filter(|entry| entry.class_id == class_id)
            .map(|entry| entry.position)
            .max();
        let entry = WaitlistEntryEntity {
            id: Uuid::new_v4(),
            class_id,
            user_id,
            position: waitlist::next_position(current_max),
            joined_at: now,
            notified_at: None,
            expires_at: None,
        };
        self.waitlists.insert(entry.id, entry.clone());
        JoinWaitlistOutcome::Joined(entry)
    }

    fn class_waitlist(&self, class_id: Uuid) -> Vec<WaitlistEntryEntity> {
        let mut entries: Vec<WaitlistEntryEntity> = self
            .waitlists
            .values()
            .filter(|entry| entry.class_id == class_id)
            .cloned()
            .collect();
        entries.sort_by_key(|entry| entry.position);
        entries
    }

    fn place_seat_hold(
        &mut self,
        entry_id: Uuid,
        notified_at: OffsetDateTime,
        expires_at: OffsetDateTime,
    ) -> bool {
        let Some(entry) = self.waitlists.get_mut(&entry_id) else {
            return false;
        };
        entry.notified_at = Some(notified_at);
        entry.expires_at = Some(expires_at);

        let class_id = entry.class_id;
        let user_id = entry.user_id.clone();
        if let Some(class) = self.classes.get_mut(&class_id) {
            class.hold = Some(SeatHoldEntity {
                user_id,
                entry_id,
                expires_at,
            });
        }
        true
    }

    fn remove_waitlist_entry(&mut self, entry_id: Uuid) -> Option<WaitlistEntryEntity> {
        let entry = self.waitlists.remove(&entry_id)?;

        for other in self
            .waitlists
            .values_mut()
            .filter(|other| other.class_id == entry.class_id)
        {
            other.position = waitlist::position_after_removal(other.position, entry.position);
        }
        self.clear_class_hold_if_matches(entry.class_id, entry.id);

        Some(entry)
    }

    fn clear_class_hold_if_matches(&mut self, class_id: Uuid, entry_id: Uuid) -> bool {
        let Some(class) = self.classes.get_mut(&class_id) else {
            return false;
        };
        if class.hold.as_ref().is_some_and(|hold| hold.entry_id == entry_id) {
            class.hold = None;
            return true;
        }
        false
    }

    fn reset_strikes(&mut self, batch_size: u32) -> StrikeResetOutcome {
        let mut outcome = StrikeResetOutcome::default();
        let mut modified = 0u64;

        for user in self.users.values_mut() {
            outcome.users_scanned += 1;
            let effect = strikes::amnesty(&mut user.strikes);
            if effect.had_strikes {
                outcome.struck_count += 1;
            }
            if effect.was_blacklisted {
                outcome.blacklisted_count += 1;
                outcome.unblacklisted.push(user.clone());
            }
            if effect.had_strikes || effect.was_blacklisted {
                modified += 1;
            }
        }

        outcome.batches = modified.div_ceil(u64::from(batch_size.max(1)));
        outcome.unblacklisted.sort_by(|a, b| a.id.cmp(&b.id));
        outcome
    }

    fn prune_token(&mut self, token: &str) -> u64 {
        let mut touched = 0;
        for user in self.users.values_mut() {
            let before = user.fcm_tokens.len();
            user.fcm_tokens.retain(|candidate| candidate != token);
            if user.fcm_tokens.len() != before {
                touched += 1;
            }
        }
        touched
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
impl MemoryStore {
    /// Delivery audit records captured so far, oldest first.
    pub async fn logged_notifications(&self) -> Vec<NotificationLogEntity> {
        self.inner.lock().await.notifications.clone()
    }
}

impl BookingStore for MemoryStore {
    fn insert_class(&self, class: ClassSessionEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.lock().await.classes.insert(class.id, class);
            Ok(())
        })
    }

    fn find_class(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<ClassSessionEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.lock().await.classes.get(&id).cloned()) })
    }

    fn list_classes(&self) -> BoxFuture<'static, StorageResult<Vec<ClassSessionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let inner = store.inner.lock().await;
            let mut classes: Vec<ClassSessionEntity> = inner.classes.values().cloned().collect();
            classes.sort_by(|a, b| {
                (&a.class_date, &a.class_time).cmp(&(&b.class_date, &b.class_time))
            });
            Ok(classes)
        })
    }

    fn delete_class(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            let mut inner = store.inner.lock().await;
            let found = inner.classes.remove(&id).is_some();
            inner.bookings.retain(|(class_id, _), _| *class_id != id);
            inner.waitlists.retain(|_, entry| entry.class_id != id);
            Ok(found)
        })
    }

    fn create_booking(
        &self,
        class_id: Uuid,
        user_id: String,
        now: OffsetDateTime,
    ) -> BoxFuture<'static, StorageResult<CreateBookingOutcome>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .lock()
                .await
                .create_booking(class_id, user_id, now))
        })
    }

    fn create_manual_bookings(
        &self,
        class_id: Uuid,
        user_ids: Vec<String>,
        now: OffsetDateTime,
    ) -> BoxFuture<'static, StorageResult<ManualBookingsOutcome>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .lock()
                .await
                .create_manual_bookings(class_id, user_ids, now))
        })
    }

    fn find_booking(
        &self,
        class_id: Uuid,
        user_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<BookingEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .lock()
                .await
                .bookings
                .get(&(class_id, user_id))
                .cloned())
        })
    }

    fn cancel_booking(
        &self,
        class_id: Uuid,
        user_id: String,
        now: OffsetDateTime,
        rules: CancellationRules,
    ) -> BoxFuture<'static, StorageResult<CancelBookingOutcome>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .lock()
                .await
                .cancel_booking(class_id, user_id, now, rules))
        })
    }

    fn store_task_handles(
        &self,
        class_id: Uuid,
        user_id: String,
        handles: Vec<String>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let mut inner = store.inner.lock().await;
            if let Some(booking) = inner.bookings.get_mut(&(class_id, user_id)) {
                booking.reminder_tasks = handles;
            }
            Ok(())
        })
    }

    fn join_waitlist(
        &self,
        class_id: Uuid,
        user_id: String,
        now: OffsetDateTime,
    ) -> BoxFuture<'static, StorageResult<JoinWaitlistOutcome>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .lock()
                .await
                .join_waitlist(class_id, user_id, now))
        })
    }

    fn find_waitlist_entry(
        &self,
        entry_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<WaitlistEntryEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.lock().await.waitlists.get(&entry_id).cloned()) })
    }

    fn class_waitlist(
        &self,
        class_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<WaitlistEntryEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.lock().await.class_waitlist(class_id)) })
    }

    fn waitlist_candidates(
        &self,
        class_id: Uuid,
        now: OffsetDateTime,
        lookahead: u32,
    ) -> BoxFuture<'static, StorageResult<Vec<WaitlistEntryEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let inner = store.inner.lock().await;
            Ok(inner
                .class_waitlist(class_id)
                .into_iter()
                .take(lookahead as usize)
                .filter(|entry| waitlist::is_promotable(entry.notified_at, entry.expires_at, now))
                .collect())
        })
    }

    fn place_seat_hold(
        &self,
        entry_id: Uuid,
        notified_at: OffsetDateTime,
        expires_at: OffsetDateTime,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .lock()
                .await
                .place_seat_hold(entry_id, notified_at, expires_at))
        })
    }

    fn remove_waitlist_entry(
        &self,
        entry_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<WaitlistEntryEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.lock().await.remove_waitlist_entry(entry_id)) })
    }

    fn remove_user_waitlist_entry(
        &self,
        class_id: Uuid,
        user_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<WaitlistEntryEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut inner = store.inner.lock().await;
            let entry_id = inner
                .waitlists
                .values()
                .find(|entry| entry.class_id == class_id && entry.user_id == user_id)
                .map(|entry| entry.id);
            Ok(entry_id.and_then(|id| inner.remove_waitlist_entry(id)))
        })
    }

    fn clear_class_hold_if_matches(
        &self,
        class_id: Uuid,
        entry_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .lock()
                .await
                .clear_class_hold_if_matches(class_id, entry_id))
        })
    }

    fn record_attendance(
        &self,
        record: AttendanceEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let key = (
                record.class_date.clone(),
                record.class_id,
                record.user_id.clone(),
            );
            store.inner.lock().await.attendance.insert(key, record);
            Ok(())
        })
    }

    fn find_user(&self, id: String) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.lock().await.users.get(&id).cloned()) })
    }

    fn upsert_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.lock().await.users.insert(user.id.clone(), user);
            Ok(())
        })
    }

    fn list_admins(&self) -> BoxFuture<'static, StorageResult<Vec<UserEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let inner = store.inner.lock().await;
            let mut admins: Vec<UserEntity> = inner
                .users
                .values()
                .filter(|user| user.is_admin)
                .cloned()
                .collect();
            admins.sort_by(|a, b| a.id.cmp(&b.id));
            Ok(admins)
        })
    }

    fn reset_strikes(
        &self,
        batch_size: u32,
    ) -> BoxFuture<'static, StorageResult<StrikeResetOutcome>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.lock().await.reset_strikes(batch_size)) })
    }

    fn clear_strikes(
        &self,
        user_id: String,
    ) -> BoxFuture<'static, StorageResult<WhitelistOutcome>> {
        let store = self.clone();
        Box::pin(async move {
            let mut inner = store.inner.lock().await;
            match inner.users.get_mut(&user_id) {
                Some(user) => {
                    let effect = strikes::amnesty(&mut user.strikes);
                    Ok(WhitelistOutcome::Cleared {
                        user: user.clone(),
                        effect,
                    })
                }
                None => Ok(WhitelistOutcome::UserNotFound),
            }
        })
    }

    fn prune_token(&self, token: String) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.lock().await.prune_token(&token)) })
    }

    fn record_notification(
        &self,
        log: NotificationLogEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.lock().await.notifications.push(log);
            Ok(())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use time::{Duration, macros::datetime};

    use super::*;
    use crate::dao::models::AttendanceStatus;

    const NOW: OffsetDateTime = datetime!(2026-03-01 12:00 UTC);
    const RULES: CancellationRules = CancellationRules {
        late_window: Duration::hours(2),
        strike_limit: 3,
    };

    fn class(capacity: u32) -> ClassSessionEntity {
        ClassSessionEntity {
            id: Uuid::new_v4(),
            name: "Morning Yoga".to_owned(),
            class_date: "2026-03-01".to_owned(),
            class_time: "18:00".to_owned(),
            start_at: None,
            duration_minutes: 60,
            capacity,
            enrolled_count: 0,
            hold: None,
        }
    }

    fn user(id: &str) -> UserEntity {
        UserEntity {
            id: id.to_owned(),
            name: id.to_owned(),
            fcm_tokens: vec![format!("token-{id}")],
            strikes: Default::default(),
            is_admin: false,
            uses_aggregator_pass: false,
        }
    }

    async fn store_with_class(capacity: u32) -> (MemoryStore, Uuid) {
        let store = MemoryStore::new();
        let class = class(capacity);
        let id = class.id;
        store.insert_class(class).await.unwrap();
        (store, id)
    }

    #[tokio::test]
    async fn booking_twice_is_rejected() {
        let (store, class_id) = store_with_class(10).await;

        let first = store
            .create_booking(class_id, "alice".to_owned(), NOW)
            .await
            .unwrap();
        assert!(matches!(first, CreateBookingOutcome::Created(_)));

        let second = store
            .create_booking(class_id, "alice".to_owned(), NOW)
            .await
            .unwrap();
        assert_eq!(second, CreateBookingOutcome::DuplicateBooking);
    }

    #[tokio::test]
    async fn full_class_reports_remaining_seats() {
        let (store, class_id) = store_with_class(1).await;

        store
            .create_booking(class_id, "alice".to_owned(), NOW)
            .await
            .unwrap();
        let outcome = store
            .create_booking(class_id, "bob".to_owned(), NOW)
            .await
            .unwrap();
        assert_eq!(outcome, CreateBookingOutcome::CapacityExceeded { remaining: 0 });
    }

    #[tokio::test]
    async fn live_hold_never_blocks_a_booking() {
        let (store, class_id) = store_with_class(2).await;
        store
            .create_booking(class_id, "alice".to_owned(), NOW)
            .await
            .unwrap();

        let entry = match store
            .join_waitlist(class_id, "carol".to_owned(), NOW)
            .await
            .unwrap()
        {
            JoinWaitlistOutcome::Joined(entry) => entry,
            other => panic!("expected joined entry, got {other:?}"),
        };
        store
            .place_seat_hold(entry.id, NOW, NOW + Duration::minutes(5))
            .await
            .unwrap();

        // The hold is advisory: bob takes the last seat even though carol
        // was offered it first.
        let accepted = store
            .create_booking(class_id, "bob".to_owned(), NOW)
            .await
            .unwrap();
        assert!(matches!(accepted, CreateBookingOutcome::Created(_)));

        let full = store
            .create_booking(class_id, "dave".to_owned(), NOW)
            .await
            .unwrap();
        assert_eq!(full, CreateBookingOutcome::CapacityExceeded { remaining: 0 });

        // Carol's hold survives until she books or the offer lapses.
        let class = store.find_class(class_id).await.unwrap().unwrap();
        assert!(class.hold.is_some());
        assert_eq!(class.enrolled_count, 2);
    }

    #[tokio::test]
    async fn booking_by_the_held_user_consumes_the_hold() {
        let (store, class_id) = store_with_class(2).await;

        let entry = match store
            .join_waitlist(class_id, "carol".to_owned(), NOW)
            .await
            .unwrap()
        {
            JoinWaitlistOutcome::Joined(entry) => entry,
            other => panic!("expected joined entry, got {other:?}"),
        };
        store
            .place_seat_hold(entry.id, NOW, NOW + Duration::minutes(5))
            .await
            .unwrap();

        let accepted = store
            .create_booking(class_id, "carol".to_owned(), NOW)
            .await
            .unwrap();
        assert!(matches!(accepted, CreateBookingOutcome::Created(_)));

        let class = store.find_class(class_id).await.unwrap().unwrap();
        assert_eq!(class.hold, None);
        assert_eq!(class.enrolled_count, 1);
    }

    #[tokio::test]
    async fn third_late_cancellation_blacklists_the_user() {
        let store = MemoryStore::new();
        store.upsert_user(user("alice")).await.unwrap();

        for round in 0..3u8 {
            let class = class(10);
            let class_id = class.id;
            store.insert_class(class).await.unwrap();
            store
                .create_booking(class_id, "alice".to_owned(), NOW)
                .await
                .unwrap();

            // Class starts 2026-03-01 18:00; one hour out is inside the window.
            let outcome = store
                .cancel_booking(
                    class_id,
                    "alice".to_owned(),
                    datetime!(2026-03-01 17:00 UTC),
                    RULES,
                )
                .await
                .unwrap();
            let CancelBookingOutcome::Cancelled(cancelled) = outcome else {
                panic!("expected cancellation");
            };
            assert!(cancelled.late);
            assert_eq!(cancelled.strikes, round + 1);
            assert_eq!(cancelled.newly_blacklisted, round == 2);
        }

        let alice = store.find_user("alice".to_owned()).await.unwrap().unwrap();
        assert!(alice.strikes.blacklisted);
    }

    #[tokio::test]
    async fn early_cancellation_keeps_the_record_clean() {
        let (store, class_id) = store_with_class(10).await;
        store.upsert_user(user("alice")).await.unwrap();
        store
            .create_booking(class_id, "alice".to_owned(), NOW)
            .await
            .unwrap();

        let outcome = store
            .cancel_booking(
                class_id,
                "alice".to_owned(),
                datetime!(2026-03-01 14:00 UTC),
                RULES,
            )
            .await
            .unwrap();
        let CancelBookingOutcome::Cancelled(cancelled) = outcome else {
            panic!("expected cancellation");
        };
        assert!(!cancelled.late);
        assert_eq!(cancelled.strikes, 0);

        let class = store.find_class(class_id).await.unwrap().unwrap();
        assert_eq!(class.enrolled_count, 0);
    }

    #[tokio::test]
    async fn cancellation_returns_stored_task_handles() {
        let (store, class_id) = store_with_class(10).await;
        store
            .create_booking(class_id, "alice".to_owned(), NOW)
            .await
            .unwrap();
        store
            .store_task_handles(
                class_id,
                "alice".to_owned(),
                vec!["task-1".to_owned(), "task-2".to_owned()],
            )
            .await
            .unwrap();

        let outcome = store
            .cancel_booking(class_id, "alice".to_owned(), NOW, RULES)
            .await
            .unwrap();
        let CancelBookingOutcome::Cancelled(cancelled) = outcome else {
            panic!("expected cancellation");
        };
        assert_eq!(cancelled.booking.reminder_tasks, vec!["task-1", "task-2"]);
    }

    #[tokio::test]
    async fn waitlist_entries_queue_in_join_order() {
        let (store, class_id) = store_with_class(0).await;

        for name in ["alice", "bob", "carol"] {
            let outcome = store
                .join_waitlist(class_id, name.to_owned(), NOW)
                .await
                .unwrap();
            assert!(matches!(outcome, JoinWaitlistOutcome::Joined(_)));
        }
        let again = store
            .join_waitlist(class_id, "bob".to_owned(), NOW)
            .await
            .unwrap();
        assert_eq!(again, JoinWaitlistOutcome::AlreadyWaitlisted);

        let entries = store.class_waitlist(class_id).await.unwrap();
        let order: Vec<(&str, u32)> = entries
            .iter()
            .map(|entry| (entry.user_id.as_str(), entry.position))
            .collect();
        assert_eq!(order, vec![("alice", 1), ("bob", 2), ("carol", 3)]);
    }

    #[tokio::test]
    async fn removing_an_entry_closes_the_gap_and_clears_its_hold() {
        let (store, class_id) = store_with_class(0).await;
        let mut ids = Vec::new();
        for name in ["alice", "bob", "carol"] {
            let JoinWaitlistOutcome::Joined(entry) = store
                .join_waitlist(class_id, name.to_owned(), NOW)
                .await
                .unwrap()
            else {
                panic!("expected joined entry");
            };
            ids.push(entry.id);
        }
        store
            .place_seat_hold(ids[1], NOW, NOW + Duration::minutes(5))
            .await
            .unwrap();

        let removed = store.remove_waitlist_entry(ids[1]).await.unwrap();
        assert_eq!(removed.map(|entry| entry.user_id), Some("bob".to_owned()));

        let entries = store.class_waitlist(class_id).await.unwrap();
        let order: Vec<(&str, u32)> = entries
            .iter()
            .map(|entry| (entry.user_id.as_str(), entry.position))
            .collect();
        assert_eq!(order, vec![("alice", 1), ("carol", 2)]);

        let class = store.find_class(class_id).await.unwrap().unwrap();
        assert_eq!(class.hold, None);
    }

    #[tokio::test]
    async fn candidate_search_skips_live_holds_and_respects_lookahead() {
        let (store, class_id) = store_with_class(0).await;
        let mut ids = Vec::new();
        for name in ["alice", "bob", "carol"] {
            let JoinWaitlistOutcome::Joined(entry) = store
                .join_waitlist(class_id, name.to_owned(), NOW)
                .await
                .unwrap()
            else {
                panic!("expected joined entry");
            };
            ids.push(entry.id);
        }

        // Alice holds a live offer, so bob is the first candidate.
        store
            .place_seat_hold(ids[0], NOW, NOW + Duration::minutes(5))
            .await
            .unwrap();
        let candidates = store.waitlist_candidates(class_id, NOW, 10).await.unwrap();
        assert_eq!(
            candidates
                .iter()
                .map(|entry| entry.user_id.as_str())
                .collect::<Vec<_>>(),
            vec!["bob", "carol"]
        );

        // A lookahead of one only ever considers the head.
        let candidates = store.waitlist_candidates(class_id, NOW, 1).await.unwrap();
        assert!(candidates.is_empty());

        // Once alice's offer lapses she is first again.
        let later = NOW + Duration::minutes(6);
        let candidates = store
            .waitlist_candidates(class_id, later, 10)
            .await
            .unwrap();
        assert_eq!(
            candidates.first().map(|entry| entry.user_id.as_str()),
            Some("alice")
        );
    }

    #[tokio::test]
    async fn strike_reset_sweeps_every_user() {
        let store = MemoryStore::new();
        let mut struck = user("alice");
        struck.strikes.late_cancellations = 2;
        let mut barred = user("bob");
        barred.strikes.late_cancellations = 3;
        barred.strikes.blacklisted = true;
        barred.strikes.blacklisted_at = Some(NOW);
        store.upsert_user(struck).await.unwrap();
        store.upsert_user(barred).await.unwrap();
        store.upsert_user(user("carol")).await.unwrap();

        let outcome = store.reset_strikes(400).await.unwrap();
        assert_eq!(outcome.users_scanned, 3);
        assert_eq!(outcome.struck_count, 2);
        assert_eq!(outcome.blacklisted_count, 1);
        assert_eq!(outcome.batches, 1);
        assert_eq!(
            outcome
                .unblacklisted
                .iter()
                .map(|user| user.id.as_str())
                .collect::<Vec<_>>(),
            vec!["bob"]
        );

        let bob = store.find_user("bob".to_owned()).await.unwrap().unwrap();
        assert!(!bob.strikes.blacklisted);
        assert_eq!(bob.strikes.late_cancellations, 0);
    }

    #[tokio::test]
    async fn pruning_removes_the_token_everywhere() {
        let store = MemoryStore::new();
        let mut alice = user("alice");
        alice.fcm_tokens = vec!["shared".to_owned(), "token-alice".to_owned()];
        let mut bob = user("bob");
        bob.fcm_tokens = vec!["shared".to_owned()];
        store.upsert_user(alice).await.unwrap();
        store.upsert_user(bob).await.unwrap();

        let touched = store.prune_token("shared".to_owned()).await.unwrap();
        assert_eq!(touched, 2);

        let alice = store.find_user("alice".to_owned()).await.unwrap().unwrap();
        assert_eq!(alice.fcm_tokens, vec!["token-alice"]);
        let bob = store.find_user("bob".to_owned()).await.unwrap().unwrap();
        assert!(bob.fcm_tokens.is_empty());
    }

    #[tokio::test]
    async fn manual_bookings_skip_existing_seats() {
        let (store, class_id) = store_with_class(3).await;
        store
            .create_booking(class_id, "alice".to_owned(), NOW)
            .await
            .unwrap();

        let outcome = store
            .create_manual_bookings(
                class_id,
                vec!["alice".to_owned(), "bob".to_owned(), "carol".to_owned()],
                NOW,
            )
            .await
            .unwrap();
        let ManualBookingsOutcome::Created { bookings, skipped } = outcome else {
            panic!("expected created bookings");
        };
        assert_eq!(bookings.len(), 2);
        assert_eq!(skipped, vec!["alice"]);

        let class = store.find_class(class_id).await.unwrap().unwrap();
        assert_eq!(class.enrolled_count, 3);
    }

    #[tokio::test]
    async fn manual_bookings_are_all_or_nothing() {
        let (store, class_id) = store_with_class(1).await;

        let outcome = store
            .create_manual_bookings(class_id, vec!["alice".to_owned(), "bob".to_owned()], NOW)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ManualBookingsOutcome::CapacityExceeded {
                remaining: 1,
                requested: 2
            }
        );

        let class = store.find_class(class_id).await.unwrap().unwrap();
        assert_eq!(class.enrolled_count, 0);
    }

    #[tokio::test]
    async fn re_marking_attendance_overwrites_the_record() {
        let (store, class_id) = store_with_class(10).await;
        let record = AttendanceEntity {
            class_date: "2026-03-01".to_owned(),
            class_id,
            user_id: "alice".to_owned(),
            status: AttendanceStatus::Absent,
            marked_at: NOW,
        };
        store.record_attendance(record.clone()).await.unwrap();
        store
            .record_attendance(AttendanceEntity {
                status: AttendanceStatus::Attended,
                marked_at: NOW + Duration::minutes(1),
                ..record
            })
            .await
            .unwrap();

        let inner = store.inner.lock().await;
        assert_eq!(inner.attendance.len(), 1);
        let stored = inner
            .attendance
            .get(&("2026-03-01".to_owned(), class_id, "alice".to_owned()))
            .unwrap();
        assert_eq!(stored.status, AttendanceStatus::Attended);
    }
}
