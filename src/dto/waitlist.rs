//! DTO definitions for the waitlist routes.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::dao::models::WaitlistEntryEntity;
use crate::dto::{format_timestamp, validation::validate_user_id};

/// Payload used to join the waitlist of a full class.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct JoinWaitlistRequest {
    /// Member joining the queue.
    #[validate(custom(function = validate_user_id))]
    pub user_id: String,
}

/// Payload used to leave a waitlist.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct LeaveWaitlistRequest {
    /// Member leaving the queue.
    #[validate(custom(function = validate_user_id))]
    pub user_id: String,
}

/// Waitlist entry as returned by the API.
#[derive(Debug, Serialize, ToSchema)]
pub struct WaitlistEntryResponse {
    pub id: Uuid,
    pub class_id: Uuid,
    pub user_id: String,
    /// 1-based slot in the queue.
    pub position: u32,
    /// RFC 3339 instant the member joined the queue.
    pub joined_at: String,
    /// RFC 3339 instant the current seat offer was sent, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notified_at: Option<String>,
    /// RFC 3339 instant the current seat offer lapses, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
}

impl From<WaitlistEntryEntity> for WaitlistEntryResponse {
    fn from(entity: WaitlistEntryEntity) -> Self {
        Self {
            id: entity.id,
            class_id: entity.class_id,
            user_id: entity.user_id,
            position: entity.position,
            joined_at: format_timestamp(entity.joined_at),
            notified_at: entity.notified_at.map(format_timestamp),
            expires_at: entity.expires_at.map(format_timestamp),
        }
    }
}
