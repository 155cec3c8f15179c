//! Two-island network model driving the emulated tie switch.

use std::fmt;
use std::time::Duration;

use num_complex::Complex64;
use sync_core::measurement::{BusLinks, BusNode, BusReading, Phase, PhaseSet};
use sync_core::metric::wrap_angle_deg;
use sync_core::{SwitchSite, SwitchStatus};

pub const NOMINAL_VOLTS: f64 = 7_200.0;

/// One electrical island seen from its side of the switch.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Island {
    pub frequency_hz: f64,
    pub magnitude_volts: f64,
    pub angle_deg: f64,
}

impl Island {
    pub const fn new(frequency_hz: f64, magnitude_volts: f64, angle_deg: f64) -> Self {
        Self {
            frequency_hz,
            magnitude_volts,
            angle_deg,
        }
    }

    fn reading(&self) -> BusReading {
        BusReading::balanced(self.frequency_hz, self.magnitude_volts, self.angle_deg)
    }
}

impl BusNode for Island {
    fn links(&self) -> BusLinks {
        BusLinks::complete(NOMINAL_VOLTS)
    }

    fn frequency_hz(&self) -> f64 {
        self.frequency_hz
    }

    fn voltage(&self, phase: Phase) -> Complex64 {
        self.reading().phase(phase)
    }
}

/// Close failure reported by a jammed breaker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BreakerFault;

impl fmt::Display for BreakerFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("breaker mechanism jammed")
    }
}

/// Reference island plus an islanded generator whose governor pulls its
/// frequency toward the reference at a bounded rate.
#[derive(Clone, Debug)]
pub struct IslandGrid {
    reference: Island,
    islanded: Island,
    governor_ramp_hz_per_sec: f64,
    status: SwitchStatus,
    jammed: bool,
    close_attempts: usize,
}

impl IslandGrid {
    pub fn new(reference: Island, islanded: Island, governor_ramp_hz_per_sec: f64) -> Self {
        Self {
            reference,
            islanded,
            governor_ramp_hz_per_sec,
            status: SwitchStatus::Open,
            jammed: false,
            close_attempts: 0,
        }
    }

    pub fn jammed(mut self) -> Self {
        self.jammed = true;
        self
    }

    pub fn reference(&self) -> &Island {
        &self.reference
    }

    pub fn islanded(&self) -> &Island {
        &self.islanded
    }

    pub fn close_attempts(&self) -> usize {
        self.close_attempts
    }

    /// Advances both islands by `dt`. The islanded angle drifts by the slip
    /// frequency; once closed the islands move together.
    pub fn advance(&mut self, dt: Duration) {
        let seconds = dt.as_secs_f64();
        if self.status == SwitchStatus::Closed {
            self.islanded = self.reference;
            return;
        }

        let error = self.reference.frequency_hz - self.islanded.frequency_hz;
        let limit = self.governor_ramp_hz_per_sec * seconds;
        self.islanded.frequency_hz += error.clamp(-limit, limit);

        let slip_hz = self.islanded.frequency_hz - self.reference.frequency_hz;
        self.islanded.angle_deg = normalize_deg(self.islanded.angle_deg + 360.0 * slip_hz * seconds);
    }

    /// Phase angle of the islanded bus relative to the reference, in `[0, 180]`.
    pub fn separation_deg(&self) -> f64 {
        let raw = (self.islanded.angle_deg - self.reference.angle_deg).rem_euclid(360.0);
        wrap_angle_deg(raw)
    }
}

fn normalize_deg(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(360.0);
    if wrapped > 180.0 { wrapped - 360.0 } else { wrapped }
}

impl SwitchSite for IslandGrid {
    type Bus = Island;
    type Error = BreakerFault;

    fn phases(&self) -> PhaseSet {
        PhaseSet::ABC
    }

    fn status(&self) -> SwitchStatus {
        self.status
    }

    fn from_bus(&self) -> Option<&Island> {
        Some(&self.reference)
    }

    fn to_bus(&self) -> Option<&Island> {
        Some(&self.islanded)
    }

    fn close(&mut self) -> Result<(), BreakerFault> {
        self.close_attempts += 1;
        if self.jammed {
            return Err(BreakerFault);
        }
        self.status = SwitchStatus::Closed;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(islanded_hz: f64, angle_deg: f64) -> IslandGrid {
        IslandGrid::new(
            Island::new(60.0, NOMINAL_VOLTS, 0.0),
            Island::new(islanded_hz, NOMINAL_VOLTS, angle_deg),
            0.01,
        )
    }

    #[test]
    fn governor_ramps_toward_reference() {
        let mut grid = grid(60.05, 0.0);
        grid.advance(Duration::from_secs(1));
        assert!((grid.islanded().frequency_hz - 60.04).abs() < 1e-9);
        for _ in 0..10 {
            grid.advance(Duration::from_secs(1));
        }
        assert!((grid.islanded().frequency_hz - 60.0).abs() < 1e-9);
    }

    #[test]
    fn slip_advances_angle() {
        let mut grid = IslandGrid::new(
            Island::new(60.0, NOMINAL_VOLTS, 0.0),
            Island::new(60.1, NOMINAL_VOLTS, 0.0),
            0.0,
        );
        grid.advance(Duration::from_millis(500));
        assert!((grid.islanded().angle_deg - 18.0).abs() < 1e-9);
    }

    #[test]
    fn separation_wraps_near_half_turn() {
        let grid = grid(60.0, -179.0);
        assert!((grid.separation_deg() - 179.0).abs() < 1e-9);
        let grid = IslandGrid::new(
            Island::new(60.0, NOMINAL_VOLTS, 179.0),
            Island::new(60.0, NOMINAL_VOLTS, -179.0),
            0.0,
        );
        assert!((grid.separation_deg() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn jammed_breaker_stays_open() {
        let mut grid = grid(60.0, 0.0).jammed();
        assert_eq!(grid.close(), Err(BreakerFault));
        assert_eq!(grid.status(), SwitchStatus::Open);
        assert_eq!(grid.close_attempts(), 1);
    }

    #[test]
    fn closed_islands_move_together() {
        let mut grid = grid(60.2, 30.0);
        grid.close().expect("breaker closes");
        grid.advance(Duration::from_millis(10));
        assert_eq!(grid.islanded(), grid.reference());
    }
}
