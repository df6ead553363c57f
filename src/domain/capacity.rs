use thiserror::Error;

/// Raised when occupying seats would push enrollment past capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("class is full: {remaining} seat(s) remaining")]
pub struct CapacityError {
    /// Seats still available before the rejected occupation.
    pub remaining: u32,
}

/// Seats still open given the current enrollment.
pub fn seats_remaining(enrolled: u32, capacity: u32) -> u32 {
    capacity.saturating_sub(enrolled)
}

/// Occupy `count` seats, returning the new enrolled count.
///
/// The check and the increment belong to the same datastore transaction;
/// callers must not split them.
pub fn occupy(enrolled: u32, capacity: u32, count: u32) -> Result<u32, CapacityError> {
    let remaining = seats_remaining(enrolled, capacity);
    if count > remaining {
        return Err(CapacityError { remaining });
    }
    Ok(enrolled + count)
}

/// Release one seat, never dropping below zero.
pub fn release(enrolled: u32) -> u32 {
    enrolled.saturating_sub(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn occupy_within_capacity() {
        assert_eq!(occupy(0, 15, 1), Ok(1));
        assert_eq!(occupy(14, 15, 1), Ok(15));
        assert_eq!(occupy(5, 15, 10), Ok(15));
    }

    #[test]
    fn occupy_rejects_overflow_with_remaining_seats() {
        assert_eq!(occupy(15, 15, 1), Err(CapacityError { remaining: 0 }));
        assert_eq!(occupy(12, 15, 5), Err(CapacityError { remaining: 3 }));
    }

    #[test]
    fn occupy_tolerates_enrollment_above_capacity() {
        // A manually over-booked class reports zero remaining instead of
        // underflowing.
        assert_eq!(seats_remaining(20, 15), 0);
        assert_eq!(occupy(20, 15, 1), Err(CapacityError { remaining: 0 }));
    }

    #[test]
    fn release_saturates_at_zero() {
        assert_eq!(release(1), 0);
        assert_eq!(release(0), 0);
    }
}
