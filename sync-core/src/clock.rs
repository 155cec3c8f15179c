//! Simulation clock abstraction shared by the monitor, trigger, and telemetry.

use core::ops::Add;
use core::time::Duration;

/// Monotonic instant supplied by the host scheduler.
///
/// The monitor never reads a wall clock; every step entry point receives the
/// current simulated instant from the caller.
pub trait SimInstant: Copy + Ord + Add<Duration, Output = Self> {
    /// Returns the saturating duration from `earlier` to `self`.
    fn saturating_duration_since(&self, earlier: Self) -> Duration;
}

/// Offsets from the start of a run are the simplest instant representation.
impl SimInstant for Duration {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        self.saturating_sub(earlier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_instant_saturates_backwards() {
        let earlier = Duration::from_secs(5);
        let later = Duration::from_secs(7);
        assert_eq!(
            later.saturating_duration_since(earlier),
            Duration::from_secs(2)
        );
        assert_eq!(earlier.saturating_duration_since(later), Duration::ZERO);
    }
}
