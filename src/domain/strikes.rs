use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Late-cancellation penalty state embedded in a user document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrikeRecord {
    /// Accrued late cancellations since the last amnesty, capped at the limit.
    #[serde(default)]
    pub late_cancellations: u8,
    /// Whether the user is currently barred from booking.
    #[serde(default)]
    pub blacklisted: bool,
    /// Instant the user crossed the strike limit, if blacklisted.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub blacklisted_at: Option<OffsetDateTime>,
}

/// Result of registering one late cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrikeOutcome {
    /// Strike count after the increment.
    pub strikes: u8,
    /// True when this strike pushed the user over the limit.
    pub newly_blacklisted: bool,
}

/// Effect of an amnesty pass on one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmnestyEffect {
    /// User had a nonzero strike count before the reset.
    pub had_strikes: bool,
    /// User was blacklisted before the reset.
    pub was_blacklisted: bool,
}

/// Register one late cancellation, capping the count at `limit` and flipping
/// the blacklist flag the first time the limit is reached.
pub fn register_late_cancellation(
    record: &mut StrikeRecord,
    limit: u8,
    now: OffsetDateTime,
) -> StrikeOutcome {
    record.late_cancellations = record.late_cancellations.saturating_add(1).min(limit);

    let newly_blacklisted = record.late_cancellations >= limit && !record.blacklisted;
    if newly_blacklisted {
        record.blacklisted = true;
        record.blacklisted_at = Some(now);
    }

    StrikeOutcome {
        strikes: record.late_cancellations,
        newly_blacklisted,
    }
}

/// Clear strikes and the blacklist flag, reporting what was cleared.
pub fn amnesty(record: &mut StrikeRecord) -> AmnestyEffect {
    let effect = AmnestyEffect {
        had_strikes: record.late_cancellations != 0,
        was_blacklisted: record.blacklisted,
    };

    record.late_cancellations = 0;
    record.blacklisted = false;
    record.blacklisted_at = None;

    effect
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    const LIMIT: u8 = 3;
    const NOW: OffsetDateTime = datetime!(2026-03-01 12:00 UTC);

    #[test]
    fn strikes_accumulate_until_blacklist() {
        let mut record = StrikeRecord::default();

        let first = register_late_cancellation(&mut record, LIMIT, NOW);
        assert_eq!(first.strikes, 1);
        assert!(!first.newly_blacklisted);

        let second = register_late_cancellation(&mut record, LIMIT, NOW);
        assert_eq!(second.strikes, 2);
        assert!(!record.blacklisted);

        let third = register_late_cancellation(&mut record, LIMIT, NOW);
        assert_eq!(third.strikes, 3);
        assert!(third.newly_blacklisted);
        assert!(record.blacklisted);
        assert_eq!(record.blacklisted_at, Some(NOW));
    }

    #[test]
    fn strikes_cap_at_limit() {
        let mut record = StrikeRecord {
            late_cancellations: 3,
            blacklisted: true,
            blacklisted_at: Some(NOW),
        };

        let outcome = register_late_cancellation(&mut record, LIMIT, NOW);
        assert_eq!(outcome.strikes, 3);
        // Already blacklisted: the flag does not flip again.
        assert!(!outcome.newly_blacklisted);
    }

    #[test]
    fn amnesty_clears_everything() {
        let mut record = StrikeRecord {
            late_cancellations: 2,
            blacklisted: true,
            blacklisted_at: Some(NOW),
        };

        let effect = amnesty(&mut record);
        assert!(effect.had_strikes);
        assert!(effect.was_blacklisted);
        assert_eq!(record, StrikeRecord::default());
    }

    #[test]
    fn amnesty_on_clean_record_reports_nothing() {
        let mut record = StrikeRecord::default();
        let effect = amnesty(&mut record);
        assert!(!effect.had_strikes);
        assert!(!effect.was_blacklisted);
    }
}
