use time::{OffsetDateTime, format_description::well_known::Rfc3339};

pub mod admin;
pub mod attendance;
pub mod booking;
pub mod class;
pub mod health;
pub mod validation;
pub mod waitlist;

fn format_timestamp(time: OffsetDateTime) -> String {
    time.format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}
