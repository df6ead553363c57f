/// In-process reference backend, also used by service tests.
pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::{
    AttendanceEntity, BookingEntity, ClassSessionEntity, NotificationLogEntity, UserEntity,
    WaitlistEntryEntity,
};
use crate::dao::storage::StorageResult;
use crate::domain::strikes::AmnestyEffect;
use futures::future::BoxFuture;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

/// Policy knobs a cancellation needs to judge lateness and apply strikes.
///
/// Passed in by the caller so the storage layer stays configuration-free.
#[derive(Debug, Clone, Copy)]
pub struct CancellationRules {
    /// Cancellations at or inside this window before class start are late.
    pub late_window: Duration,
    /// Strike count at which a user is blacklisted.
    pub strike_limit: u8,
}

/// Result of a seat-booking transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateBookingOutcome {
    /// Seat taken; the stored booking is returned.
    Created(BookingEntity),
    /// No class document under that id.
    ClassNotFound,
    /// The user already holds a confirmed seat in this class.
    DuplicateBooking,
    /// Enrollment would exceed capacity; `remaining` counts seats still
    /// open to this user (an active hold for someone else is excluded).
    CapacityExceeded { remaining: u32 },
}

/// Result of a staff bulk-booking transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManualBookingsOutcome {
    /// All new seats taken in one transaction.
    Created {
        /// Bookings created by this call.
        bookings: Vec<BookingEntity>,
        /// Users skipped because they were already booked.
        skipped: Vec<String>,
    },
    /// No class document under that id.
    ClassNotFound,
    /// Not enough seats for the users that are not yet booked.
    CapacityExceeded { remaining: u32, requested: u32 },
}

/// Booking plus everything the cancellation transaction decided about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelledBooking {
    /// The removed booking, including its scheduled reminder handles.
    pub booking: BookingEntity,
    /// Whether the cancellation counted as late.
    pub late: bool,
    /// Strike count after the cancellation.
    pub strikes: u8,
    /// Whether the user is blacklisted after the cancellation.
    pub blacklisted: bool,
    /// Whether this cancellation is the one that crossed the limit.
    pub newly_blacklisted: bool,
    /// False when the class document was already gone; the booking is
    /// still removed and lateness judged from the denormalized start.
    pub class_found: bool,
}

/// Result of a cancellation transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelBookingOutcome {
    /// Booking removed; see [`CancelledBooking`] for the verdict.
    Cancelled(CancelledBooking),
    /// No booking under that `(class, user)` pair.
    BookingNotFound,
}

/// Result of joining a waitlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinWaitlistOutcome {
    /// Entry appended at the tail of the queue.
    Joined(WaitlistEntryEntity),
    /// No class document under that id.
    ClassNotFound,
    /// The user is already queued for this class.
    AlreadyWaitlisted,
    /// The user already holds a confirmed seat in this class.
    AlreadyBooked,
}

/// Result of clearing one user's strikes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WhitelistOutcome {
    /// Strikes cleared; the user document after the reset plus what the
    /// reset actually changed.
    Cleared {
        user: UserEntity,
        effect: AmnestyEffect,
    },
    /// No user document under that id.
    UserNotFound,
}

/// Tally of a full strike-amnesty sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StrikeResetOutcome {
    /// Users examined by the sweep.
    pub users_scanned: u64,
    /// Users that had a nonzero strike count.
    pub struck_count: u64,
    /// Users that were blacklisted before the sweep.
    pub blacklisted_count: u64,
    /// Write batches issued.
    pub batches: u64,
    /// Users whose blacklist was lifted, for unlock notifications.
    pub unblacklisted: Vec<UserEntity>,
}

/// Abstraction over the persistence layer for classes, bookings, waitlists
/// and member profiles.
///
/// Methods return precondition failures (full class, duplicate booking,
/// missing documents) as ordinary outcome values; `StorageError` is
/// reserved for backend unavailability.
pub trait BookingStore: Send + Sync {
    // Classes.
    fn insert_class(&self, class: ClassSessionEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_class(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<ClassSessionEntity>>>;
    fn list_classes(&self) -> BoxFuture<'static, StorageResult<Vec<ClassSessionEntity>>>;
    /// Delete a class along with its bookings and waitlist entries.
    fn delete_class(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;

    // Bookings.
    /// Book one seat, atomically checking capacity against the enrolled
    /// count. The seat hold is advisory and never blocks a booking; when
    /// the held user books, their hold is consumed.
    fn create_booking(
        &self,
        class_id: Uuid,
        user_id: String,
        now: OffsetDateTime,
    ) -> BoxFuture<'static, StorageResult<CreateBookingOutcome>>;
    /// Book seats for several users in one transaction, skipping users
    /// already booked.
    fn create_manual_bookings(
        &self,
        class_id: Uuid,
        user_ids: Vec<String>,
        now: OffsetDateTime,
    ) -> BoxFuture<'static, StorageResult<ManualBookingsOutcome>>;
    fn find_booking(
        &self,
        class_id: Uuid,
        user_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<BookingEntity>>>;
    /// Remove a booking, release its seat and apply the late-cancellation
    /// penalty in one transaction.
    fn cancel_booking(
        &self,
        class_id: Uuid,
        user_id: String,
        now: OffsetDateTime,
        rules: CancellationRules,
    ) -> BoxFuture<'static, StorageResult<CancelBookingOutcome>>;
    /// Persist the reminder task handles scheduled for a booking.
    fn store_task_handles(
        &self,
        class_id: Uuid,
        user_id: String,
        handles: Vec<String>,
    ) -> BoxFuture<'static, StorageResult<()>>;

    // Waitlists.
    fn join_waitlist(
        &self,
        class_id: Uuid,
        user_id: String,
        now: OffsetDateTime,
    ) -> BoxFuture<'static, StorageResult<JoinWaitlistOutcome>>;
    fn find_waitlist_entry(
        &self,
        entry_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<WaitlistEntryEntity>>>;
    /// Entries for a class ordered by position.
    fn class_waitlist(
        &self,
        class_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<WaitlistEntryEntity>>>;
    /// Offer-eligible entries among the `lookahead` frontmost positions,
    /// in position order.
    fn waitlist_candidates(
        &self,
        class_id: Uuid,
        now: OffsetDateTime,
        lookahead: u32,
    ) -> BoxFuture<'static, StorageResult<Vec<WaitlistEntryEntity>>>;
    /// Stamp a seat offer on the entry and the matching hold on the class.
    fn place_seat_hold(
        &self,
        entry_id: Uuid,
        notified_at: OffsetDateTime,
        expires_at: OffsetDateTime,
    ) -> BoxFuture<'static, StorageResult<bool>>;
    /// Remove one entry, shifting later positions forward and clearing a
    /// class hold that points at it.
    fn remove_waitlist_entry(
        &self,
        entry_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<WaitlistEntryEntity>>>;
    /// Remove a user's entry for a class, if any, with the same cascade
    /// as [`BookingStore::remove_waitlist_entry`].
    fn remove_user_waitlist_entry(
        &self,
        class_id: Uuid,
        user_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<WaitlistEntryEntity>>>;
    /// Clear the class seat hold only if it still points at `entry_id`.
    fn clear_class_hold_if_matches(
        &self,
        class_id: Uuid,
        entry_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<bool>>;

    // Attendance.
    /// Upsert keyed by `(class_date, class_id, user_id)`.
    fn record_attendance(&self, record: AttendanceEntity)
    -> BoxFuture<'static, StorageResult<()>>;

    // Users.
    fn find_user(&self, id: String) -> BoxFuture<'static, StorageResult<Option<UserEntity>>>;
    fn upsert_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Users flagged as staff, for new-booking alerts.
    fn list_admins(&self) -> BoxFuture<'static, StorageResult<Vec<UserEntity>>>;
    /// Clear strikes for every user, writing in batches of `batch_size`.
    fn reset_strikes(
        &self,
        batch_size: u32,
    ) -> BoxFuture<'static, StorageResult<StrikeResetOutcome>>;
    /// Clear strikes for one user.
    fn clear_strikes(&self, user_id: String)
    -> BoxFuture<'static, StorageResult<WhitelistOutcome>>;
    /// Remove a rejected push token from every user holding it; returns
    /// how many users were touched.
    fn prune_token(&self, token: String) -> BoxFuture<'static, StorageResult<u64>>;

    // Notification audit log.
    fn record_notification(
        &self,
        log: NotificationLogEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;

    // Liveness.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
