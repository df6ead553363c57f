//! DTO definitions for the booking lifecycle routes.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::dao::booking_store::CancelledBooking;
use crate::dao::models::BookingEntity;
use crate::dto::{format_timestamp, validation::validate_user_id};

/// Payload used to book a seat in a class.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateBookingRequest {
    /// Member taking the seat.
    #[validate(custom(function = validate_user_id))]
    pub user_id: String,
}

/// Payload used to cancel a booking.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CancelBookingRequest {
    /// Member releasing the seat.
    #[validate(custom(function = validate_user_id))]
    pub user_id: String,
}

/// Confirmed booking as returned by the API.
#[derive(Debug, Serialize, ToSchema)]
pub struct BookingResponse {
    pub class_id: Uuid,
    pub user_id: String,
    /// RFC 3339 instant the booking was confirmed.
    pub booked_at: String,
}

impl From<BookingEntity> for BookingResponse {
    fn from(entity: BookingEntity) -> Self {
        Self {
            class_id: entity.class_id,
            user_id: entity.user_id,
            booked_at: format_timestamp(entity.booked_at),
        }
    }
}

/// Result of a cancellation, including the penalty verdict.
#[derive(Debug, Serialize, ToSchema)]
pub struct CancelBookingResponse {
    /// Whether the cancellation happened inside the late window.
    pub late: bool,
    /// Late-cancellation strikes on the user after this cancellation.
    pub strikes: u8,
    /// Whether the user is now barred from booking.
    pub blacklisted: bool,
}

impl From<&CancelledBooking> for CancelBookingResponse {
    fn from(cancelled: &CancelledBooking) -> Self {
        Self {
            late: cancelled.late,
            strikes: cancelled.strikes,
            blacklisted: cancelled.blacklisted,
        }
    }
}
