use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::strikes::StrikeRecord;

/// Scheduled class session persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClassSessionEntity {
    /// Primary key of the class session.
    pub id: Uuid,
    /// Display name of the class (e.g. "Morning Yoga").
    pub name: String,
    /// Calendar date of the session, `YYYY-MM-DD`.
    pub class_date: String,
    /// Wall-clock start of the session, `HH:MM`.
    pub class_time: String,
    /// Resolved start instant, when the schedule has been normalized.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub start_at: Option<OffsetDateTime>,
    /// Session length in minutes.
    pub duration_minutes: u32,
    /// Maximum number of confirmed seats.
    pub capacity: u32,
    /// Confirmed seats currently taken.
    pub enrolled_count: u32,
    /// Outstanding seat offer, when a freed seat is on hold for one
    /// waitlisted user.
    pub hold: Option<SeatHoldEntity>,
}

/// Seat offer stamped on a class while one waitlisted user may claim it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeatHoldEntity {
    /// User the seat is reserved for.
    pub user_id: String,
    /// Waitlist entry that received the offer.
    pub entry_id: Uuid,
    /// Instant the offer lapses.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

/// Confirmed booking persisted by the storage layer.
///
/// Keyed by the `(class_id, user_id)` pair; a user holds at most one
/// confirmed booking per class.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookingEntity {
    /// Class the seat belongs to.
    pub class_id: Uuid,
    /// User holding the seat.
    pub user_id: String,
    /// Instant the booking was confirmed.
    #[serde(with = "time::serde::rfc3339")]
    pub booked_at: OffsetDateTime,
    /// Class start instant denormalized at booking time, used to judge
    /// cancellation lateness even if the class document disappears.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub class_start_at: Option<OffsetDateTime>,
    /// Handles of the reminder tasks scheduled for this booking, so a
    /// cancellation can revoke them.
    #[serde(default)]
    pub reminder_tasks: Vec<String>,
}

/// Waitlist entry persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WaitlistEntryEntity {
    /// Primary key of the entry.
    pub id: Uuid,
    /// Class the user is queued for.
    pub class_id: Uuid,
    /// Queued user.
    pub user_id: String,
    /// 1-based slot in the queue, dense per class.
    pub position: u32,
    /// Instant the user joined the queue.
    #[serde(with = "time::serde::rfc3339")]
    pub joined_at: OffsetDateTime,
    /// Instant the current seat offer was sent, if any.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub notified_at: Option<OffsetDateTime>,
    /// Instant the current seat offer lapses, if any.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
}

/// Member profile persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserEntity {
    /// Primary key of the user.
    pub id: String,
    /// Display name shown in staff-facing notifications.
    pub name: String,
    /// Registered push delivery tokens for the user's devices.
    #[serde(default)]
    pub fcm_tokens: Vec<String>,
    /// Late-cancellation penalty state.
    #[serde(default, flatten)]
    pub strikes: StrikeRecord,
    /// Whether the user receives staff alerts (new bookings, etc.).
    #[serde(default)]
    pub is_admin: bool,
    /// Whether the user attends through the external aggregator pass and
    /// must validate attendance in that app after class.
    #[serde(default)]
    pub uses_aggregator_pass: bool,
}

/// Attendance status recorded for one user in one session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    /// User showed up.
    Attended,
    /// User held a seat but did not show up.
    Absent,
}

/// Attendance record persisted by the storage layer.
///
/// Keyed by `(class_date, class_id, user_id)` so re-marking the same user
/// for the same session overwrites rather than duplicates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttendanceEntity {
    /// Calendar date of the session, `YYYY-MM-DD`.
    pub class_date: String,
    /// Class the record belongs to.
    pub class_id: Uuid,
    /// User being marked.
    pub user_id: String,
    /// Recorded status.
    pub status: AttendanceStatus,
    /// Instant the record was last written.
    #[serde(with = "time::serde::rfc3339")]
    pub marked_at: OffsetDateTime,
}

/// Category of a delivered (or attempted) push notification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Upcoming-class reminder sent to a confirmed booking.
    BookingReminder,
    /// Post-class validation reminder for aggregator-pass users.
    AggregatorReminder,
    /// Seat offer sent to the head of a waitlist.
    WaitlistOffer,
    /// Strike/blacklist lift announcement.
    AccountUnlocked,
    /// Staff alert about a new booking.
    AdminAlert,
    /// Free-form message sent by staff to one user.
    Direct,
}

/// Per-token delivery failure captured in the audit record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailedTokenEntity {
    /// Token the push service rejected.
    pub token: String,
    /// Error code reported by the push service.
    pub code: String,
}

/// Audit record of one push delivery attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationLogEntity {
    /// Primary key of the record.
    pub id: Uuid,
    /// What kind of notification was sent.
    pub kind: NotificationKind,
    /// Target user, when the notification addressed a single member.
    pub user_id: Option<String>,
    /// Related class, when applicable.
    pub class_id: Option<Uuid>,
    /// Notification title as sent.
    pub title: String,
    /// Notification body as sent.
    pub body: String,
    /// Number of tokens that accepted the message.
    pub delivered: u32,
    /// Tokens the push service rejected, with their error codes.
    #[serde(default)]
    pub failed_tokens: Vec<FailedTokenEntity>,
    /// Instant the delivery was attempted.
    #[serde(with = "time::serde::rfc3339")]
    pub sent_at: OffsetDateTime,
}
