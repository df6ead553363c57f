//! DTO definitions for class sessions.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::dao::models::ClassSessionEntity;
use crate::domain::capacity;
use crate::dto::{
    format_timestamp,
    validation::{validate_class_date, validate_class_time},
};

/// Payload used by staff to create a class session.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateClassRequest {
    /// Display name of the class.
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    /// Calendar date of the session, `YYYY-MM-DD`.
    #[validate(custom(function = validate_class_date))]
    pub class_date: String,
    /// Wall-clock start, 24-hour `HH:MM`.
    #[validate(custom(function = validate_class_time))]
    pub class_time: String,
    /// Session length in minutes; defaults to the configured class length.
    #[serde(default)]
    #[validate(range(min = 1, max = 600))]
    pub duration_minutes: Option<u32>,
    /// Maximum number of confirmed seats.
    #[validate(range(min = 1, max = 1000))]
    pub capacity: u32,
}

/// Class session as returned by the API.
#[derive(Debug, Serialize, ToSchema)]
pub struct ClassSummary {
    pub id: Uuid,
    pub name: String,
    pub class_date: String,
    pub class_time: String,
    pub duration_minutes: u32,
    pub capacity: u32,
    pub enrolled_count: u32,
    /// Seats still open to new bookings.
    pub remaining_slots: u32,
    /// RFC 3339 instant the outstanding seat offer lapses, if one exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hold_expires_at: Option<String>,
}

impl From<ClassSessionEntity> for ClassSummary {
    fn from(entity: ClassSessionEntity) -> Self {
        Self {
            id: entity.id,
            name: entity.name,
            class_date: entity.class_date,
            class_time: entity.class_time,
            duration_minutes: entity.duration_minutes,
            capacity: entity.capacity,
            enrolled_count: entity.enrolled_count,
            remaining_slots: capacity::seats_remaining(entity.enrolled_count, entity.capacity),
            hold_expires_at: entity
                .hold
                .map(|hold| format_timestamp(hold.expires_at)),
        }
    }
}
