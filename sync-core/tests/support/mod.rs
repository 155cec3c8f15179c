#![allow(dead_code)]

use core::time::Duration;

use num_complex::Complex64;
use sync_core::measurement::{BusLinks, BusNode, BusReading, Phase, PhaseSet};
use sync_core::{SwitchSite, SwitchStatus, SyncMonitor, SystemSettings, ToleranceConfig};

pub const NOMINAL_VOLTS: f64 = 7_200.0;

#[derive(Copy, Clone, Debug)]
pub struct TestBus {
    pub links: BusLinks,
    pub reading: BusReading,
}

impl TestBus {
    pub fn at(frequency_hz: f64, angle_deg: f64) -> Self {
        Self::with_magnitude(frequency_hz, NOMINAL_VOLTS, angle_deg)
    }

    pub fn with_magnitude(frequency_hz: f64, magnitude: f64, angle_deg: f64) -> Self {
        Self {
            links: BusLinks::complete(NOMINAL_VOLTS),
            reading: BusReading::balanced(frequency_hz, magnitude, angle_deg),
        }
    }
}

impl BusNode for TestBus {
    fn links(&self) -> BusLinks {
        self.links
    }

    fn frequency_hz(&self) -> f64 {
        self.reading.frequency_hz
    }

    fn voltage(&self, phase: Phase) -> Complex64 {
        self.reading.phase(phase)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Stuck;

#[derive(Debug)]
pub struct TestSwitch {
    pub from: Option<TestBus>,
    pub to: Option<TestBus>,
    pub phases: PhaseSet,
    pub status: SwitchStatus,
    pub close_calls: usize,
}

impl TestSwitch {
    pub fn between(from: TestBus, to: TestBus) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
            phases: PhaseSet::ABC,
            status: SwitchStatus::Open,
            close_calls: 0,
        }
    }

    pub fn matched() -> Self {
        Self::between(TestBus::at(60.0, 0.0), TestBus::at(60.0, 0.0))
    }
}

impl SwitchSite for TestSwitch {
    type Bus = TestBus;
    type Error = Stuck;

    fn phases(&self) -> PhaseSet {
        self.phases
    }

    fn status(&self) -> SwitchStatus {
        self.status
    }

    fn from_bus(&self) -> Option<&TestBus> {
        self.from.as_ref()
    }

    fn to_bus(&self) -> Option<&TestBus> {
        self.to.as_ref()
    }

    fn close(&mut self) -> Result<(), Stuck> {
        self.close_calls += 1;
        self.status = SwitchStatus::Closed;
        Ok(())
    }
}

pub fn armed(frequency_tolerance_hz: f64) -> ToleranceConfig {
    ToleranceConfig {
        armed: true,
        frequency_tolerance_hz,
        ..ToleranceConfig::default()
    }
}

pub fn monitor(switch: &TestSwitch, config: ToleranceConfig) -> SyncMonitor<Duration> {
    SyncMonitor::setup(
        Some(switch),
        config,
        &SystemSettings::default(),
        Duration::ZERO,
    )
    .expect("setup should succeed")
}
