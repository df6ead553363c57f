//! Validation helpers for DTOs.

use time::format_description::FormatItem;
use time::macros::format_description;
use validator::ValidationError;

const DATE_FORMAT: &[FormatItem<'_>] = format_description!("[year]-[month]-[day]");
const TIME_FORMAT: &[FormatItem<'_>] = format_description!("[hour]:[minute]");

const MAX_USER_ID_LEN: usize = 128;

/// Validates a member identifier: non-empty, at most 128 characters, no
/// whitespace.
pub fn validate_user_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() || id.len() > MAX_USER_ID_LEN {
        let mut err = ValidationError::new("user_id_length");
        err.message = Some(
            format!(
                "User ID must be 1 to {MAX_USER_ID_LEN} characters (got {})",
                id.len()
            )
            .into(),
        );
        return Err(err);
    }

    if id.chars().any(char::is_whitespace) {
        let mut err = ValidationError::new("user_id_format");
        err.message = Some("User ID must not contain whitespace".into());
        return Err(err);
    }

    Ok(())
}

/// Validates a class date in `YYYY-MM-DD` form.
pub fn validate_class_date(date: &str) -> Result<(), ValidationError> {
    if time::Date::parse(date, DATE_FORMAT).is_err() {
        let mut err = ValidationError::new("class_date_format");
        err.message = Some("Class date must be a valid YYYY-MM-DD date".into());
        return Err(err);
    }
    Ok(())
}

/// Validates a class start time in 24-hour `HH:MM` form.
pub fn validate_class_time(value: &str) -> Result<(), ValidationError> {
    if time::Time::parse(value, TIME_FORMAT).is_err() {
        let mut err = ValidationError::new("class_time_format");
        err.message = Some("Class time must be a valid HH:MM time".into());
        return Err(err);
    }
    Ok(())
}

/// Validates every member identifier in a staff bulk-booking request.
pub fn validate_user_ids(ids: &[String]) -> Result<(), ValidationError> {
    for id in ids {
        validate_user_id(id)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_user_id_valid() {
        assert!(validate_user_id("member-42").is_ok());
        assert!(validate_user_id("a").is_ok());
        assert!(validate_user_id(&"x".repeat(128)).is_ok());
    }

    #[test]
    fn test_validate_user_id_invalid() {
        assert!(validate_user_id("").is_err()); // empty
        assert!(validate_user_id(&"x".repeat(129)).is_err()); // too long
        assert!(validate_user_id("member 42").is_err()); // whitespace
        assert!(validate_user_id("member\t42").is_err()); // whitespace
    }

    #[test]
    fn test_validate_class_date() {
        assert!(validate_class_date("2026-03-01").is_ok());
        assert!(validate_class_date("2026-13-01").is_err()); // no month 13
        assert!(validate_class_date("01/03/2026").is_err()); // wrong format
        assert!(validate_class_date("").is_err());
    }

    #[test]
    fn test_validate_class_time() {
        assert!(validate_class_time("18:30").is_ok());
        assert!(validate_class_time("00:00").is_ok());
        assert!(validate_class_time("24:00").is_err()); // no hour 24
        assert!(validate_class_time("6pm").is_err());
    }

    #[test]
    fn test_validate_user_ids() {
        assert!(validate_user_ids(&["alice".into(), "bob".into()]).is_ok());
        assert!(validate_user_ids(&["alice".into(), "".into()]).is_err());
    }
}
