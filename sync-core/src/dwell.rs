//! Continuous-compliance timer gating the close command.

use core::time::Duration;

/// Outcome of feeding one evaluation into the [`DwellTimer`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum DwellProgress {
    /// The evaluation failed and the accumulator returned to zero.
    Reset,
    /// Compliant, but the dwell period has not yet elapsed.
    Accumulating { accumulated_sec: f64 },
    /// Compliant for at least the full dwell period.
    Satisfied { accumulated_sec: f64 },
}

/// Accumulates compliant time and resets on any non-compliant evaluation.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DwellTimer {
    accumulated_sec: f64,
    period_sec: f64,
}

impl DwellTimer {
    #[must_use]
    pub const fn new(period_sec: f64) -> Self {
        Self {
            accumulated_sec: 0.0,
            period_sec,
        }
    }

    /// Records one evaluation verdict covering `elapsed` simulated time.
    pub fn record(&mut self, compliant: bool, elapsed: Duration) -> DwellProgress {
        if !compliant {
            self.reset();
            return DwellProgress::Reset;
        }

        self.accumulated_sec += elapsed.as_secs_f64();
        if self.accumulated_sec >= self.period_sec {
            DwellProgress::Satisfied {
                accumulated_sec: self.accumulated_sec,
            }
        } else {
            DwellProgress::Accumulating {
                accumulated_sec: self.accumulated_sec,
            }
        }
    }

    pub fn reset(&mut self) {
        self.accumulated_sec = 0.0;
    }

    #[must_use]
    pub const fn accumulated_sec(&self) -> f64 {
        self.accumulated_sec
    }

    #[must_use]
    pub const fn period_sec(&self) -> f64 {
        self.period_sec
    }

    /// Changes the required dwell without discarding accumulated time.
    pub fn set_period_sec(&mut self, period_sec: f64) {
        self.period_sec = period_sec;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICK: Duration = Duration::from_secs(1);

    #[test]
    fn requires_two_one_second_ticks_for_default_dwell() {
        let mut timer = DwellTimer::new(1.2);
        assert_eq!(
            timer.record(true, TICK),
            DwellProgress::Accumulating {
                accumulated_sec: 1.0
            }
        );
        assert_eq!(
            timer.record(true, TICK),
            DwellProgress::Satisfied {
                accumulated_sec: 2.0
            }
        );
    }

    #[test]
    fn accumulator_grows_while_compliant() {
        let mut timer = DwellTimer::new(100.0);
        let mut previous = timer.accumulated_sec();
        for _ in 0..10 {
            timer.record(true, Duration::from_millis(250));
            assert!(timer.accumulated_sec() > previous);
            previous = timer.accumulated_sec();
        }
    }

    #[test]
    fn single_failure_resets_to_exactly_zero() {
        let mut timer = DwellTimer::new(100.0);
        for _ in 0..50 {
            timer.record(true, TICK);
        }
        assert_eq!(timer.record(false, TICK), DwellProgress::Reset);
        assert_eq!(timer.accumulated_sec().to_bits(), 0.0_f64.to_bits());
    }

    #[test]
    fn zero_elapsed_compliance_does_not_advance() {
        let mut timer = DwellTimer::new(1.0);
        timer.record(true, Duration::ZERO);
        assert_eq!(timer.accumulated_sec().to_bits(), 0.0_f64.to_bits());
    }
}
