mod support;

use core::time::Duration;

use support::{NOMINAL_VOLTS, TestBus, TestSwitch, armed, monitor};
use sync_core::config::{ConfigError, ConfigField};
use sync_core::measurement::{BusProperty, BusSide, Phase, PhaseSet};
use sync_core::{ConfigWarning, SetupError, SyncMonitor, SystemSettings, ToleranceConfig};

fn setup(switch: &TestSwitch, config: ToleranceConfig) -> Result<SyncMonitor<Duration>, SetupError> {
    SyncMonitor::setup(
        Some(switch),
        config,
        &SystemSettings::default(),
        Duration::ZERO,
    )
}

#[test]
fn missing_to_bus_is_reported_by_side() {
    let mut switch = TestSwitch::matched();
    switch.to = None;
    assert!(matches!(
        setup(&switch, armed(0.01)),
        Err(SetupError::MissingBusLink { side: BusSide::To })
    ));
}

#[test]
fn missing_frequency_link_is_fatal() {
    let mut bus = TestBus::at(60.0, 0.0);
    bus.links.frequency = false;
    let switch = TestSwitch::between(bus, TestBus::at(60.0, 0.0));
    assert!(matches!(
        setup(&switch, armed(0.01)),
        Err(SetupError::MissingBusProperty {
            side: BusSide::From,
            property: BusProperty::Frequency,
        })
    ));
}

#[test]
fn voltage_links_only_matter_for_active_phases() {
    let mut bus = TestBus::at(60.0, 0.0);
    bus.links.voltages = PhaseSet::EMPTY.with(Phase::A);
    let mut switch = TestSwitch::between(TestBus::at(60.0, 0.0), bus);

    assert!(matches!(
        setup(&switch, armed(0.01)),
        Err(SetupError::MissingBusProperty {
            side: BusSide::To,
            property: BusProperty::Voltage(Phase::B),
        })
    ));

    switch.phases = PhaseSet::EMPTY.with(Phase::A);
    assert!(setup(&switch, armed(0.01)).is_ok());
}

#[test]
fn nominal_voltage_mismatch_is_fatal() {
    let mut bus = TestBus::at(60.0, 0.0);
    bus.links.nominal_voltage = Some(NOMINAL_VOLTS + 100.0);
    let switch = TestSwitch::between(TestBus::at(60.0, 0.0), bus);
    assert!(matches!(
        setup(&switch, armed(0.01)),
        Err(SetupError::NominalVoltageMismatch { .. })
    ));
}

#[test]
fn small_nominal_difference_sets_average_base() {
    let mut bus = TestBus::at(60.0, 0.0);
    bus.links.nominal_voltage = Some(NOMINAL_VOLTS + 20.0);
    let switch = TestSwitch::between(TestBus::at(60.0, 0.0), bus);
    let monitor = setup(&switch, armed(0.01)).expect("within tolerance");
    assert!((monitor.bus_pair().base_volts() - (NOMINAL_VOLTS + 10.0)).abs() < 1e-9);
}

#[test]
fn infinite_dwell_period_is_rejected() {
    let switch = TestSwitch::matched();
    let config = ToleranceConfig {
        dwell_period_sec: f64::INFINITY,
        ..armed(0.01)
    };
    assert!(matches!(
        setup(&switch, config),
        Err(SetupError::Config(ConfigError::UnboundedDwellPeriod))
    ));
}

#[test]
fn unset_values_are_defaulted_with_warnings() {
    let switch = TestSwitch::matched();
    let monitor = monitor(&switch, ToleranceConfig::unset());

    let defaulted: Vec<ConfigField> = monitor
        .warnings()
        .iter()
        .filter_map(|warning| match warning {
            ConfigWarning::Defaulted { field, .. } => Some(*field),
            _ => None,
        })
        .collect();
    assert!(defaulted.contains(&ConfigField::FrequencyTolerance));
    assert!(defaulted.contains(&ConfigField::MetricsPeriod));
    assert!(!monitor.is_armed());
    assert!((monitor.dwell_period_sec() - 1.2).abs() < 1e-12);
}
