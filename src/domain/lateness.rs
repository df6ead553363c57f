use time::{Duration, OffsetDateTime, PrimitiveDateTime, format_description::FormatItem, macros::format_description};

const DATE_FORMAT: &[FormatItem<'_>] = format_description!("[year]-[month]-[day]");
const TIME_FORMAT: &[FormatItem<'_>] = format_description!("[hour]:[minute]");

/// Resolve the authoritative start instant of a class.
///
/// Preference order: a denormalized instant stored on the booking, then the
/// instant stored on the class, then a `YYYY-MM-DD` + `HH:MM` string pair
/// composed into a UTC instant. Returns `None` when nothing resolves.
pub fn resolve_start(
    booking_start: Option<OffsetDateTime>,
    class_start: Option<OffsetDateTime>,
    class_date: Option<&str>,
    class_time: Option<&str>,
) -> Option<OffsetDateTime> {
    if let Some(start) = booking_start.or(class_start) {
        return Some(start);
    }

    let date = time::Date::parse(class_date?, DATE_FORMAT).ok()?;
    let time = time::Time::parse(class_time?, TIME_FORMAT).ok()?;
    Some(PrimitiveDateTime::new(date, time).assume_utc())
}

/// Whether a cancellation at `now` counts as late.
///
/// A cancellation is late when it happens at or after `start - window`. An
/// unresolvable start instant is treated as late: a missing or malformed
/// timestamp must not let a cancellation dodge the penalty.
pub fn is_late(start: Option<OffsetDateTime>, now: OffsetDateTime, window: Duration) -> bool {
    match start {
        Some(start) => start - now <= window,
        None => true,
    }
}
