use time::OffsetDateTime;

/// Position assigned to a new entry given the current maximum for the class.
///
/// Positions are 1-based and dense; appending always takes `max + 1`.
pub fn next_position(current_max: Option<u32>) -> u32 {
    current_max.map_or(1, |max| max.saturating_add(1))
}

/// Whether an entry is eligible to receive a seat offer.
///
/// Eligible entries were either never notified, or held an offer whose window
/// already lapsed. An entry with a live hold (`expires_at` in the future) is
/// skipped so only one offer is outstanding per class.
pub fn is_promotable(
    notified_at: Option<OffsetDateTime>,
    expires_at: Option<OffsetDateTime>,
    now: OffsetDateTime,
) -> bool {
    if notified_at.is_none() {
        return true;
    }
    matches!(expires_at, Some(expires) if expires <= now)
}

/// New position for `position` after the entry at `removed` left the list.
///
/// Entries behind the removed one shift forward by one; everything else keeps
/// its slot, so the sequence stays gap-free.
pub fn position_after_removal(position: u32, removed: u32) -> u32 {
    if position > removed {
        position - 1
    } else {
        position
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    const NOW: OffsetDateTime = datetime!(2026-03-01 12:00 UTC);

    #[test]
    fn first_entry_takes_position_one() {
        assert_eq!(next_position(None), 1);
        assert_eq!(next_position(Some(4)), 5);
    }

    #[test]
    fn never_notified_entries_are_promotable() {
        assert!(is_promotable(None, None, NOW));
    }

    #[test]
    fn live_hold_blocks_promotion() {
        let notified = datetime!(2026-03-01 11:58 UTC);
        let expires = datetime!(2026-03-01 12:03 UTC);
        assert!(!is_promotable(Some(notified), Some(expires), NOW));
    }

    #[test]
    fn lapsed_hold_is_promotable_again() {
        let notified = datetime!(2026-03-01 11:50 UTC);
        let expires = datetime!(2026-03-01 11:55 UTC);
        assert!(is_promotable(Some(notified), Some(expires), NOW));
        // Expiry exactly at `now` counts as lapsed.
        assert!(is_promotable(Some(notified), Some(NOW), NOW));
    }

    #[test]
    fn notified_without_expiry_is_not_promotable() {
        // Defensive: a half-written offer should not be re-offered until the
        // expiry sweep cleans it up.
        assert!(!is_promotable(Some(NOW), None, NOW));
    }

    #[test]
    fn removal_shifts_only_later_positions() {
        // Entry at position 2 left; survivors 1, 3, 4 compact to 1, 2, 3.
        let survivors = [1u32, 3, 4];
        let shifted: Vec<u32> = survivors
            .iter()
            .map(|&p| position_after_removal(p, 2))
            .collect();
        assert_eq!(shifted, vec![1, 2, 3]);
    }
}
