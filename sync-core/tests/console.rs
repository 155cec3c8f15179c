mod support;

use core::time::Duration;

use support::{TestSwitch, monitor};
use sync_core::config::{ConfigField, ConfigWarnings, Setting};
use sync_core::monitor::SettingError;
use sync_core::repl::commands::{CommandError, CommandExecutor, CommandOutcome, MonitorControl};
use sync_core::repl::status::{StatusFormatter, StatusSnapshot};
use sync_core::{MonitorError, SwitchStatus, SyncMonitor, SystemSettings, ToleranceConfig};

const COARSE_STEP: Duration = Duration::from_secs(1);

#[derive(Debug, PartialEq)]
enum HostError {
    Setting(SettingError),
    Tick(MonitorError<support::Stuck>),
}

struct Host {
    monitor: SyncMonitor<Duration>,
    switch: TestSwitch,
    settings: SystemSettings,
    now: Duration,
}

impl Host {
    fn new(config: ToleranceConfig) -> Self {
        let switch = TestSwitch::matched();
        Self {
            monitor: monitor(&switch, config),
            switch,
            settings: SystemSettings::default(),
            now: Duration::ZERO,
        }
    }
}

impl MonitorControl for Host {
    type Error = HostError;

    fn arm(&mut self) -> Result<(), HostError> {
        self.monitor
            .apply_setting(&self.switch, Setting::Armed(true), &self.settings, self.now)
            .map(|_| ())
            .map_err(HostError::Setting)
    }

    fn disarm(&mut self) {
        self.monitor.disarm(self.now);
    }

    fn apply(&mut self, setting: Setting) -> Result<ConfigWarnings, HostError> {
        self.monitor
            .apply_setting(&self.switch, setting, &self.settings, self.now)
            .map_err(HostError::Setting)
    }

    fn advance(&mut self, duration: Duration) -> Result<(), HostError> {
        let end = self.now + duration;
        while self.now + COARSE_STEP <= end {
            self.now += COARSE_STEP;
            self.monitor
                .coarse_step(&mut self.switch, self.now)
                .map_err(HostError::Tick)?;
        }
        self.now = end;
        Ok(())
    }
}

fn status_line(host: &Host) -> String {
    let snapshot = StatusSnapshot::capture(&host.monitor, host.switch.status);
    let mut line = String::new();
    StatusFormatter::new(&snapshot)
        .write_monitor_line(&mut line)
        .expect("writing to a String cannot fail");
    line
}

#[test]
fn operator_session_arms_and_closes() {
    let mut console = CommandExecutor::new(Host::new(ToleranceConfig::default()));

    console
        .execute("set frequency_tolerance 0.01")
        .expect("tolerance accepted");
    assert_eq!(console.execute("arm"), Ok(CommandOutcome::Armed));
    assert!(status_line(console.control()).contains("state=armed-idle"));

    assert_eq!(
        console.execute("run 1s"),
        Ok(CommandOutcome::Advanced {
            duration: Duration::from_secs(1),
        })
    );
    assert!(status_line(console.control()).contains("state=armed-accumulating"));

    console.execute("run 1s").expect("second second");
    let host = console.into_inner();
    assert_eq!(host.switch.status, SwitchStatus::Closed);
    assert!(status_line(&host).contains("state=closed"));
}

#[test]
fn arming_a_closed_switch_is_rejected() {
    let mut host = Host::new(ToleranceConfig::default());
    host.switch.status = SwitchStatus::Closed;
    let mut console = CommandExecutor::new(host);

    assert!(matches!(
        console.execute("arm"),
        Err(CommandError::Rejected(HostError::Setting(SettingError::Arm(_))))
    ));
}

#[test]
fn defaulted_value_is_surfaced_to_the_operator() {
    let mut console = CommandExecutor::new(Host::new(ToleranceConfig::default()));

    match console.execute("set metrics_period -2") {
        Ok(CommandOutcome::Updated { property, warnings }) => {
            assert_eq!(property, ConfigField::MetricsPeriod);
            assert_eq!(warnings.len(), 1);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!((console.control().monitor.dwell_period_sec() - 1.2).abs() < 1e-12);
}

#[test]
fn disarm_stops_accumulation() {
    let mut console = CommandExecutor::new(Host::new(ToleranceConfig {
        dwell_period_sec: 5.0,
        ..ToleranceConfig::default()
    }));

    console.execute("arm").expect("arm");
    console.execute("run 2s").expect("run");
    assert!(console.control().monitor.dwell_accumulated_sec() > 0.0);

    console.execute("disarm").expect("disarm");
    console.execute("run 10s").expect("run");
    let host = console.into_inner();
    assert_eq!(host.switch.status, SwitchStatus::Open);
    assert_eq!(host.monitor.dwell_accumulated_sec(), 0.0);
}
