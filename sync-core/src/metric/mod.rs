//! Pass/fail comparison of the two buses against one tolerance set.
//!
//! Evaluation is pure. The monitor runs the same snapshot through the strict
//! band (close authorization) and the relaxed band (step-size requests).

use num_traits::Float;

use crate::config::{MetricMode, ToleranceSet};
use crate::measurement::{MeasurementSnapshot, Phase, PhaseSet};

/// Wraps an absolute angle difference in `[0, 360]` degrees onto `[0, 180]`.
#[must_use]
pub fn wrap_angle_deg(raw_deg: f64) -> f64 {
    if raw_deg > 180.0 {
        360.0 - raw_deg
    } else {
        raw_deg
    }
}

/// Deviation measured on one active phase.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PhaseMetric {
    /// Magnitude of the complex phasor difference, per unit.
    pub difference_pu: f64,
    /// Difference of the phasor magnitudes, per unit.
    pub magnitude_pu: f64,
    /// Wrapped angle separation in degrees.
    pub angle_deg: f64,
}

impl PhaseMetric {
    fn between(snapshot: &MeasurementSnapshot, phase: Phase) -> Self {
        let from = snapshot.from.phase(phase);
        let to = snapshot.to.phase(phase);
        let base = snapshot.base_volts;

        let raw_angle_deg = (from.arg() - to.arg()).to_degrees().abs();

        Self {
            difference_pu: (from - to).norm() / base,
            magnitude_pu: (from.norm() - to.norm()).abs() / base,
            angle_deg: wrap_angle_deg(raw_angle_deg),
        }
    }

    /// Returns `true` when this phase is inside `tolerances` for `mode`.
    #[must_use]
    pub fn passes(&self, mode: MetricMode, tolerances: &ToleranceSet) -> bool {
        match mode {
            MetricMode::MagnitudeDifference => self.difference_pu <= tolerances.voltage_pu,
            MetricMode::SeparationDifference => {
                self.magnitude_pu <= tolerances.voltage_magnitude_pu
                    && self.angle_deg <= tolerances.voltage_angle_deg
            }
        }
    }
}

/// Every deviation computed from one snapshot.
///
/// Inactive phases carry `None` and never affect the verdict.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MetricReport {
    pub mode: MetricMode,
    pub frequency_diff_hz: f64,
    pub phases: [Option<PhaseMetric>; 3],
}

impl MetricReport {
    /// Verdict against one tolerance set.
    #[must_use]
    pub fn passes(&self, tolerances: &ToleranceSet) -> bool {
        self.frequency_diff_hz <= tolerances.frequency_hz
            && self
                .phases
                .iter()
                .flatten()
                .all(|metric| metric.passes(self.mode, tolerances))
    }

    #[must_use]
    pub const fn phase(&self, phase: Phase) -> Option<&PhaseMetric> {
        self.phases[phase.index()].as_ref()
    }

    /// Largest complex-difference deviation over the active phases.
    #[must_use]
    pub fn worst_difference_pu(&self) -> f64 {
        self.phases
            .iter()
            .flatten()
            .map(|metric| metric.difference_pu)
            .fold(0.0, f64::max)
    }
}

/// Computes the frequency and per-phase deviations for `active` phases.
#[must_use]
pub fn assess(snapshot: &MeasurementSnapshot, mode: MetricMode, active: PhaseSet) -> MetricReport {
    let mut phases = [None; 3];
    for phase in active.iter() {
        phases[phase.index()] = Some(PhaseMetric::between(snapshot, phase));
    }

    MetricReport {
        mode,
        frequency_diff_hz: (snapshot.from.frequency_hz - snapshot.to.frequency_hz).abs(),
        phases,
    }
}

/// Returns `true` when frequency and every active phase are within `tolerances`.
#[must_use]
pub fn evaluate(
    snapshot: &MeasurementSnapshot,
    tolerances: &ToleranceSet,
    mode: MetricMode,
    active: PhaseSet,
) -> bool {
    assess(snapshot, mode, active).passes(tolerances)
}
