/// Seat-occupancy arithmetic for class capacity.
pub mod capacity;
/// Class-start resolution and the late-cancellation predicate.
pub mod lateness;
/// Late-cancellation strike accrual and amnesty.
pub mod strikes;
/// Waitlist ordering, gap closing, and promotion eligibility.
pub mod waitlist;
