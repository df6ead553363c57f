//! DTO definitions used by the staff REST API.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::dao::booking_store::StrikeResetOutcome;
use crate::dto::validation::{validate_user_id, validate_user_ids};

/// Payload used by staff to book seats for a group of members at once.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct ManualBookingsRequest {
    /// Members receiving a seat.
    #[validate(length(min = 1, max = 30), custom(function = validate_user_ids))]
    pub user_ids: Vec<String>,
}

/// Result of a staff bulk booking.
#[derive(Debug, Serialize, ToSchema)]
pub struct ManualBookingsResponse {
    /// Members who received a new seat.
    pub created: Vec<String>,
    /// Members skipped because they were already booked.
    pub skipped: Vec<String>,
}

/// Tally of a full strike-amnesty sweep.
#[derive(Debug, Serialize, ToSchema)]
pub struct StrikeResetResponse {
    /// Users examined by the sweep.
    pub users_scanned: u64,
    /// Users that had at least one strike.
    pub struck_count: u64,
    /// Users whose blacklist was lifted.
    pub blacklisted_count: u64,
    /// Write batches issued against the store.
    pub batches: u64,
    /// Identifiers of the users whose blacklist was lifted.
    pub unblacklisted: Vec<String>,
}

impl From<StrikeResetOutcome> for StrikeResetResponse {
    fn from(outcome: StrikeResetOutcome) -> Self {
        Self {
            users_scanned: outcome.users_scanned,
            struck_count: outcome.struck_count,
            blacklisted_count: outcome.blacklisted_count,
            batches: outcome.batches,
            unblacklisted: outcome
                .unblacklisted
                .into_iter()
                .map(|user| user.id)
                .collect(),
        }
    }
}

/// Result of clearing one member's strikes.
#[derive(Debug, Serialize, ToSchema)]
pub struct WhitelistResponse {
    pub user_id: String,
    /// Whether the member had strikes to clear.
    pub had_strikes: bool,
    /// Whether the member was blacklisted before the reset.
    pub was_blacklisted: bool,
}

/// Payload used by staff to push a free-form message to one member.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct DirectNotificationRequest {
    /// Target member.
    #[validate(custom(function = validate_user_id))]
    pub user_id: String,
    /// Notification title.
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    /// Notification body.
    #[validate(length(min = 1, max = 1000))]
    pub body: String,
}

/// Result of a direct staff notification.
#[derive(Debug, Serialize, ToSchema)]
pub struct DirectNotificationResponse {
    /// Tokens that accepted the message.
    pub delivered: u32,
    /// Dead tokens removed from the member's profile.
    pub pruned_tokens: u32,
}
