use mongodb::bson::{Binary, Document, doc, spec::BinarySubtype};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::error::ComponentRange;
use uuid::Uuid;

use crate::dao::models::{
    AttendanceEntity, AttendanceStatus, BookingEntity, ClassSessionEntity, FailedTokenEntity,
    NotificationKind, NotificationLogEntity, SeatHoldEntity, UserEntity, WaitlistEntryEntity,
};
use crate::domain::strikes::StrikeRecord;

/// Timestamps are stored as milliseconds since the Unix epoch.
pub fn millis(ts: OffsetDateTime) -> i64 {
    (ts.unix_timestamp_nanos() / 1_000_000) as i64
}

pub fn from_millis(ms: i64) -> Result<OffsetDateTime, ComponentRange> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(ms) * 1_000_000)
}

fn opt_millis(ts: Option<OffsetDateTime>) -> Option<i64> {
    ts.map(millis)
}

fn opt_from_millis(ms: Option<i64>) -> Result<Option<OffsetDateTime>, ComponentRange> {
    ms.map(from_millis).transpose()
}

pub fn uuid_as_binary(id: Uuid) -> Binary {
    Binary {
        subtype: BinarySubtype::Uuid,
        bytes: id.into_bytes().to_vec(),
    }
}

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": uuid_as_binary(id)}
}

/// Bookings are keyed by the class/user pair so the unique `_id` enforces
/// one seat per user per class.
pub fn booking_doc_id(class_id: Uuid, user_id: &str) -> String {
    format!("{class_id}_{user_id}")
}

/// Attendance is keyed by date, class and user so re-marking overwrites.
pub fn attendance_doc_id(class_date: &str, class_id: Uuid, user_id: &str) -> String {
    format!("{class_date}_{class_id}_{user_id}")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatHoldDocument {
    pub user_id: String,
    pub entry_id: Uuid,
    pub expires_at_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassDocument {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub class_date: String,
    pub class_time: String,
    pub start_at_ms: Option<i64>,
    pub duration_minutes: u32,
    pub capacity: u32,
    pub enrolled_count: u32,
    pub hold: Option<SeatHoldDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub class_id: Uuid,
    pub user_id: String,
    pub booked_at_ms: i64,
    pub class_start_at_ms: Option<i64>,
    #[serde(default)]
    pub reminder_tasks: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitlistDocument {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub class_id: Uuid,
    pub user_id: String,
    pub position: u32,
    pub joined_at_ms: i64,
    pub notified_at_ms: Option<i64>,
    pub expires_at_ms: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub fcm_tokens: Vec<String>,
    #[serde(default)]
    pub late_cancellations: u8,
    #[serde(default)]
    pub blacklisted: bool,
    pub blacklisted_at_ms: Option<i64>,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub uses_aggregator_pass: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub class_date: String,
    pub class_id: Uuid,
    pub user_id: String,
    pub status: AttendanceStatus,
    pub marked_at_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationDocument {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub kind: NotificationKind,
    pub user_id: Option<String>,
    pub class_id: Option<Uuid>,
    pub title: String,
    pub body: String,
    pub delivered: u32,
    #[serde(default)]
    pub failed_tokens: Vec<FailedTokenEntity>,
    pub sent_at_ms: i64,
}

impl From<ClassSessionEntity> for ClassDocument {
    fn from(value: ClassSessionEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            class_date: value.class_date,
            class_time: value.class_time,
            start_at_ms: opt_millis(value.start_at),
            duration_minutes: value.duration_minutes,
            capacity: value.capacity,
            enrolled_count: value.enrolled_count,
            hold: value.hold.map(Into::into),
        }
    }
}

impl TryFrom<ClassDocument> for ClassSessionEntity {
    type Error = ComponentRange;

    fn try_from(value: ClassDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.id,
            name: value.name,
            class_date: value.class_date,
            class_time: value.class_time,
            start_at: opt_from_millis(value.start_at_ms)?,
            duration_minutes: value.duration_minutes,
            capacity: value.capacity,
            enrolled_count: value.enrolled_count,
            hold: value.hold.map(TryInto::try_into).transpose()?,
        })
    }
}

impl From<SeatHoldEntity> for SeatHoldDocument {
    fn from(value: SeatHoldEntity) -> Self {
        Self {
            user_id: value.user_id,
            entry_id: value.entry_id,
            expires_at_ms: millis(value.expires_at),
        }
    }
}

impl TryFrom<SeatHoldDocument> for SeatHoldEntity {
    type Error = ComponentRange;

    fn try_from(value: SeatHoldDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: value.user_id,
            entry_id: value.entry_id,
            expires_at: from_millis(value.expires_at_ms)?,
        })
    }
}

impl From<BookingEntity> for BookingDocument {
    fn from(value: BookingEntity) -> Self {
        Self {
            id: booking_doc_id(value.class_id, &value.user_id),
            class_id: value.class_id,
            user_id: value.user_id,
            booked_at_ms: millis(value.booked_at),
            class_start_at_ms: opt_millis(value.class_start_at),
            reminder_tasks: value.reminder_tasks,
        }
    }
}

impl TryFrom<BookingDocument> for BookingEntity {
    type Error = ComponentRange;

    fn try_from(value: BookingDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            class_id: value.class_id,
            user_id: value.user_id,
            booked_at: from_millis(value.booked_at_ms)?,
            class_start_at: opt_from_millis(value.class_start_at_ms)?,
            reminder_tasks: value.reminder_tasks,
        })
    }
}

impl From<WaitlistEntryEntity> for WaitlistDocument {
    fn from(value: WaitlistEntryEntity) -> Self {
        Self {
            id: value.id,
            class_id: value.class_id,
            user_id: value.user_id,
            position: value.position,
            joined_at_ms: millis(value.joined_at),
            notified_at_ms: opt_millis(value.notified_at),
            expires_at_ms: opt_millis(value.expires_at),
        }
    }
}

impl TryFrom<WaitlistDocument> for WaitlistEntryEntity {
    type Error = ComponentRange;

    fn try_from(value: WaitlistDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.id,
            class_id: value.class_id,
            user_id: value.user_id,
            position: value.position,
            joined_at: from_millis(value.joined_at_ms)?,
            notified_at: opt_from_millis(value.notified_at_ms)?,
            expires_at: opt_from_millis(value.expires_at_ms)?,
        })
    }
}

impl From<UserEntity> for UserDocument {
    fn from(value: UserEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            fcm_tokens: value.fcm_tokens,
            late_cancellations: value.strikes.late_cancellations,
            blacklisted: value.strikes.blacklisted,
            blacklisted_at_ms: opt_millis(value.strikes.blacklisted_at),
            is_admin: value.is_admin,
            uses_aggregator_pass: value.uses_aggregator_pass,
        }
    }
}

impl TryFrom<UserDocument> for UserEntity {
    type Error = ComponentRange;

    fn try_from(value: UserDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.id,
            name: value.name,
            fcm_tokens: value.fcm_tokens,
            strikes: StrikeRecord {
                late_cancellations: value.late_cancellations,
                blacklisted: value.blacklisted,
                blacklisted_at: opt_from_millis(value.blacklisted_at_ms)?,
            },
            is_admin: value.is_admin,
            uses_aggregator_pass: value.uses_aggregator_pass,
        })
    }
}

impl From<AttendanceEntity> for AttendanceDocument {
    fn from(value: AttendanceEntity) -> Self {
        Self {
            id: attendance_doc_id(&value.class_date, value.class_id, &value.user_id),
            class_date: value.class_date,
            class_id: value.class_id,
            user_id: value.user_id,
            status: value.status,
            marked_at_ms: millis(value.marked_at),
        }
    }
}

impl From<NotificationLogEntity> for NotificationDocument {
    fn from(value: NotificationLogEntity) -> Self {
        Self {
            id: value.id,
            kind: value.kind,
            user_id: value.user_id,
            class_id: value.class_id,
            title: value.title,
            body: value.body,
            delivered: value.delivered,
            failed_tokens: value.failed_tokens,
            sent_at_ms: millis(value.sent_at),
        }
    }
}
