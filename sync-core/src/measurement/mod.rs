//! Typed access to the buses on either side of the switch.
//!
//! [`BusPair::resolve`] checks every link once at setup. After that the monitor
//! only reads values through [`BusNode`] and copies them into a
//! [`MeasurementSnapshot`] when an evaluation is due.

use core::fmt;

use num_complex::Complex64;
use num_traits::Float;

use crate::config::SetupError;

/// One conductor of a three-phase switch.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Phase {
    A,
    B,
    C,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::A, Phase::B, Phase::C];

    /// Position of the phase in per-phase arrays.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Phase::A => 0,
            Phase::B => 1,
            Phase::C => 2,
        }
    }

    const fn bit(self) -> u8 {
        1 << self.index()
    }

    #[must_use]
    pub const fn label(self) -> char {
        match self {
            Phase::A => 'A',
            Phase::B => 'B',
            Phase::C => 'C',
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Subset of phases physically present on the switch.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct PhaseSet(u8);

impl PhaseSet {
    pub const EMPTY: Self = Self(0);
    pub const ABC: Self = Self(0b111);

    /// Builds a set from the low three bits of `bits` (A = bit 0).
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & Self::ABC.0)
    }

    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn with(self, phase: Phase) -> Self {
        Self(self.0 | phase.bit())
    }

    #[must_use]
    pub const fn contains(self, phase: Phase) -> bool {
        self.0 & phase.bit() != 0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterates the present phases in A, B, C order.
    pub fn iter(self) -> impl Iterator<Item = Phase> {
        Phase::ALL
            .into_iter()
            .filter(move |phase| self.contains(*phase))
    }
}

impl FromIterator<Phase> for PhaseSet {
    fn from_iter<T: IntoIterator<Item = Phase>>(iter: T) -> Self {
        iter.into_iter().fold(Self::EMPTY, Self::with)
    }
}

impl fmt::Display for PhaseSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("-");
        }
        for phase in self.iter() {
            write!(f, "{phase}")?;
        }
        Ok(())
    }
}

/// Which end of the switch a bus sits on.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BusSide {
    From,
    To,
}

impl fmt::Display for BusSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BusSide::From => "from",
            BusSide::To => "to",
        })
    }
}

/// Bus property the monitor depends on.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BusProperty {
    Frequency,
    Voltage(Phase),
    NominalVoltage,
}

impl fmt::Display for BusProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusProperty::Frequency => f.write_str("frequency"),
            BusProperty::Voltage(phase) => write!(f, "voltage_{phase}"),
            BusProperty::NominalVoltage => f.write_str("nominal_voltage"),
        }
    }
}

/// Properties a bus publishes, inspected once during setup.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BusLinks {
    pub frequency: bool,
    pub voltages: PhaseSet,
    pub nominal_voltage: Option<f64>,
}

impl BusLinks {
    /// Links for a bus exposing frequency and all three phase voltages.
    #[must_use]
    pub const fn complete(nominal_voltage: f64) -> Self {
        Self {
            frequency: true,
            voltages: PhaseSet::ABC,
            nominal_voltage: Some(nominal_voltage),
        }
    }
}

/// Read-only view of an electrical bus produced by the power-flow solver.
pub trait BusNode {
    /// Describes which properties this bus can supply.
    fn links(&self) -> BusLinks;

    /// Present bus frequency in hertz.
    fn frequency_hz(&self) -> f64;

    /// Present phase-to-neutral voltage phasor in volts.
    fn voltage(&self, phase: Phase) -> Complex64;
}

/// Frequency and phasors copied from one bus.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BusReading {
    pub frequency_hz: f64,
    pub voltage: [Complex64; 3],
}

impl BusReading {
    #[must_use]
    pub const fn new(frequency_hz: f64, voltage: [Complex64; 3]) -> Self {
        Self {
            frequency_hz,
            voltage,
        }
    }

    /// Balanced positive-sequence set with phase A at `angle_deg`.
    #[must_use]
    pub fn balanced(frequency_hz: f64, magnitude_volts: f64, angle_deg: f64) -> Self {
        let phasor = |offset_deg: f64| {
            Complex64::from_polar(magnitude_volts, (angle_deg + offset_deg).to_radians())
        };
        Self::new(frequency_hz, [phasor(0.0), phasor(-120.0), phasor(120.0)])
    }

    #[must_use]
    pub const fn phase(&self, phase: Phase) -> Complex64 {
        self.voltage[phase.index()]
    }

    fn capture<B: BusNode + ?Sized>(&mut self, bus: &B, phases: PhaseSet) {
        self.frequency_hz = bus.frequency_hz();
        for phase in phases.iter() {
            self.voltage[phase.index()] = bus.voltage(phase);
        }
    }
}

impl Default for BusReading {
    fn default() -> Self {
        Self::new(0.0, [Complex64::new(0.0, 0.0); 3])
    }
}

/// Per-evaluation copy of both buses plus the per-unit base.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MeasurementSnapshot {
    pub from: BusReading,
    pub to: BusReading,
    pub base_volts: f64,
}

impl MeasurementSnapshot {
    #[must_use]
    pub const fn new(from: BusReading, to: BusReading, base_volts: f64) -> Self {
        Self {
            from,
            to,
            base_volts,
        }
    }

    /// Empty snapshot that normalizes against `base_volts`.
    #[must_use]
    pub fn empty(base_volts: f64) -> Self {
        Self::new(BusReading::default(), BusReading::default(), base_volts)
    }

    /// Copies the present bus values for the active phases. Inactive phases keep
    /// whatever was captured before.
    pub fn refresh<B: BusNode + ?Sized>(&mut self, from: &B, to: &B, phases: PhaseSet) {
        self.from.capture(from, phases);
        self.to.capture(to, phases);
    }
}

/// Validated link between the switch and its two buses.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BusPair {
    phases: PhaseSet,
    from_nominal_volts: f64,
    to_nominal_volts: f64,
    base_volts: f64,
}

impl BusPair {
    /// Checks that both buses supply every property the active phases need and
    /// that their nominal voltages agree within `voltage_tolerance_pu`.
    ///
    /// # Errors
    ///
    /// Returns a [`SetupError`] naming the missing link, the unusable nominal
    /// voltage, or the mismatch between the two buses.
    pub fn resolve<B: BusNode + ?Sized>(
        from: Option<&B>,
        to: Option<&B>,
        phases: PhaseSet,
        voltage_tolerance_pu: f64,
    ) -> Result<Self, SetupError> {
        let from_nominal_volts = resolve_side(from, BusSide::From, phases)?;
        let to_nominal_volts = resolve_side(to, BusSide::To, phases)?;

        let base_volts = (from_nominal_volts + to_nominal_volts) / 2.0;
        if (from_nominal_volts - to_nominal_volts).abs() > voltage_tolerance_pu * base_volts {
            return Err(SetupError::NominalVoltageMismatch {
                from_volts: from_nominal_volts,
                to_volts: to_nominal_volts,
                base_volts,
                tolerance_pu: voltage_tolerance_pu,
            });
        }

        Ok(Self {
            phases,
            from_nominal_volts,
            to_nominal_volts,
            base_volts,
        })
    }

    #[must_use]
    pub const fn phases(&self) -> PhaseSet {
        self.phases
    }

    /// Average nominal voltage used as the per-unit base.
    #[must_use]
    pub const fn base_volts(&self) -> f64 {
        self.base_volts
    }

    #[must_use]
    pub const fn nominal_volts(&self, side: BusSide) -> f64 {
        match side {
            BusSide::From => self.from_nominal_volts,
            BusSide::To => self.to_nominal_volts,
        }
    }
}

fn resolve_side<B: BusNode + ?Sized>(
    bus: Option<&B>,
    side: BusSide,
    phases: PhaseSet,
) -> Result<f64, SetupError> {
    let bus = bus.ok_or(SetupError::MissingBusLink { side })?;
    let links = bus.links();

    if !links.frequency {
        return Err(SetupError::MissingBusProperty {
            side,
            property: BusProperty::Frequency,
        });
    }

    if let Some(phase) = phases.iter().find(|phase| !links.voltages.contains(*phase)) {
        return Err(SetupError::MissingBusProperty {
            side,
            property: BusProperty::Voltage(phase),
        });
    }

    let volts = links.nominal_voltage.ok_or(SetupError::MissingBusProperty {
        side,
        property: BusProperty::NominalVoltage,
    })?;
    if !(volts.is_finite() && volts > 0.0) {
        return Err(SetupError::InvalidNominalVoltage { side, volts });
    }

    Ok(volts)
}
