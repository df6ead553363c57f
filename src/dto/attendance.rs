//! DTO definitions for attendance marking.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::dao::models::{AttendanceEntity, AttendanceStatus};
use crate::dto::{format_timestamp, validation::validate_user_id};

/// Attendance status as exposed by the API.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatusDto {
    Attended,
    Absent,
}

impl From<AttendanceStatusDto> for AttendanceStatus {
    fn from(value: AttendanceStatusDto) -> Self {
        match value {
            AttendanceStatusDto::Attended => AttendanceStatus::Attended,
            AttendanceStatusDto::Absent => AttendanceStatus::Absent,
        }
    }
}

impl From<AttendanceStatus> for AttendanceStatusDto {
    fn from(value: AttendanceStatus) -> Self {
        match value {
            AttendanceStatus::Attended => AttendanceStatusDto::Attended,
            AttendanceStatus::Absent => AttendanceStatusDto::Absent,
        }
    }
}

/// Payload used by staff to mark one member's attendance.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct MarkAttendanceRequest {
    /// Member being marked.
    #[validate(custom(function = validate_user_id))]
    pub user_id: String,
    /// Whether the member showed up.
    pub status: AttendanceStatusDto,
}

/// Stored attendance record as returned by the API.
#[derive(Debug, Serialize, ToSchema)]
pub struct AttendanceResponse {
    pub class_date: String,
    pub class_id: Uuid,
    pub user_id: String,
    pub status: AttendanceStatusDto,
    /// RFC 3339 instant the record was last written.
    pub marked_at: String,
}

impl From<AttendanceEntity> for AttendanceResponse {
    fn from(entity: AttendanceEntity) -> Self {
        Self {
            class_date: entity.class_date,
            class_id: entity.class_id,
            user_id: entity.user_id,
            status: entity.status.into(),
            marked_at: format_timestamp(entity.marked_at),
        }
    }
}
