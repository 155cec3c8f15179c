use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use sync_core::config::{ConfigWarnings, Setting};
use sync_core::monitor::{MonitorError, SettingError};
use sync_core::repl::catalog::{self, ValueSpec};
use sync_core::repl::commands::{CommandError, CommandExecutor, CommandOutcome, MonitorControl};
use sync_core::repl::status::{StatusFormatter, StatusProvider, StatusSnapshot};
use sync_core::{SwitchSite, SyncMonitor, SystemSettings, ToleranceConfig};

use crate::grid::{BreakerFault, Island, IslandGrid, NOMINAL_VOLTS};
use crate::scheduler::{StepEvent, StepScheduler};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TranscriptProfile {
    Slip,
    Matched,
    Jammed,
}

impl TranscriptProfile {
    pub fn log_path(self) -> &'static str {
        match self {
            TranscriptProfile::Slip => "transcripts/emulator-slip.log",
            TranscriptProfile::Matched => "transcripts/emulator-matched.log",
            TranscriptProfile::Jammed => "transcripts/emulator-jammed.log",
        }
    }

    pub fn header(self) -> &'static str {
        match self {
            TranscriptProfile::Slip => "Sync Check Emulator slipping island transcript",
            TranscriptProfile::Matched => "Sync Check Emulator matched island transcript",
            TranscriptProfile::Jammed => "Sync Check Emulator jammed breaker transcript",
        }
    }

    pub fn from_tag(tag: &str) -> Result<Self, String> {
        if tag.eq_ignore_ascii_case("slip") {
            Ok(Self::Slip)
        } else if tag.eq_ignore_ascii_case("matched") {
            Ok(Self::Matched)
        } else if tag.eq_ignore_ascii_case("jammed") {
            Ok(Self::Jammed)
        } else {
            Err(format!("Unknown transcript profile `{tag}`"))
        }
    }

    fn grid(self) -> IslandGrid {
        let reference = Island::new(60.0, NOMINAL_VOLTS, 0.0);
        match self {
            TranscriptProfile::Slip => {
                IslandGrid::new(reference, Island::new(60.001, NOMINAL_VOLTS, -10.0), 0.0)
            }
            TranscriptProfile::Matched => IslandGrid::new(reference, reference, 0.0),
            TranscriptProfile::Jammed => IslandGrid::new(reference, reference, 0.0).jammed(),
        }
    }
}

/// Failures reported by the simulated host back to the console.
#[derive(Debug, PartialEq)]
pub enum HostError {
    Setting(SettingError),
    Step(MonitorError<BreakerFault>),
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostError::Setting(err) => err.fmt(f),
            HostError::Step(err) => err.fmt(f),
        }
    }
}

/// Monitor, grid model and scheduler bundled behind the console.
pub struct SimulationHost {
    monitor: SyncMonitor<Duration>,
    grid: IslandGrid,
    scheduler: StepScheduler,
    settings: SystemSettings,
    events: Vec<StepEvent>,
}

impl SimulationHost {
    pub fn new(profile: TranscriptProfile) -> io::Result<Self> {
        let grid = profile.grid();
        let settings = SystemSettings::default();
        let monitor = SyncMonitor::setup(
            Some(&grid),
            ToleranceConfig::default(),
            &settings,
            Duration::ZERO,
        )
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err.to_string()))?;

        Ok(Self {
            monitor,
            scheduler: StepScheduler::new(settings.trigger_interval),
            grid,
            settings,
            events: Vec::new(),
        })
    }

    pub fn now(&self) -> Duration {
        self.scheduler.now()
    }

    pub fn monitor(&self) -> &SyncMonitor<Duration> {
        &self.monitor
    }

    fn take_events(&mut self) -> Vec<StepEvent> {
        std::mem::take(&mut self.events)
    }
}

impl MonitorControl for SimulationHost {
    type Error = HostError;

    fn arm(&mut self) -> Result<(), HostError> {
        self.monitor
            .arm(&self.grid, self.now())
            .map_err(|err| HostError::Setting(err.into()))
    }

    fn disarm(&mut self) {
        self.monitor.disarm(self.now());
    }

    fn apply(&mut self, setting: Setting) -> Result<ConfigWarnings, HostError> {
        let now = self.now();
        self.monitor
            .apply_setting(&self.grid, setting, &self.settings, now)
            .map_err(HostError::Setting)
    }

    fn advance(&mut self, duration: Duration) -> Result<(), HostError> {
        self.scheduler
            .advance(duration, &mut self.grid, &mut self.monitor, &mut self.events)
            .map_err(HostError::Step)
    }
}

impl StatusProvider for SimulationHost {
    fn snapshot(&self) -> Option<StatusSnapshot> {
        Some(StatusSnapshot::capture(&self.monitor, self.grid.status()))
    }
}

pub struct Session {
    executor: CommandExecutor<SimulationHost>,
    transcript: TranscriptLogger,
    command_count: usize,
}

impl Session {
    pub fn new(profile: TranscriptProfile) -> io::Result<Self> {
        let transcript = TranscriptLogger::new(profile)?;
        let executor = CommandExecutor::new(SimulationHost::new(profile)?);

        Ok(Self {
            executor,
            transcript,
            command_count: 0,
        })
    }

    pub fn host(&self) -> &SimulationHost {
        self.executor.control()
    }

    pub fn command_count(&self) -> usize {
        self.command_count
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        self.command_count += 1;
        let started = self.host().now();
        self.transcript
            .append_line(started, TranscriptRole::Host, trimmed)?;

        let lines = match self.executor.execute(trimmed) {
            Ok(CommandOutcome::Armed) => vec!["OK armed".to_string()],
            Ok(CommandOutcome::Disarmed) => vec!["OK disarmed".to_string()],
            Ok(CommandOutcome::Updated { property, warnings }) => {
                let mut lines = vec![format!("OK {} updated", property.keyword())];
                lines.extend(warnings.iter().map(|warning| format!("WARN {warning}")));
                lines
            }
            Ok(CommandOutcome::Advanced { duration }) => self.describe_advance(duration),
            Ok(CommandOutcome::Status) => self.describe_status(),
            Ok(CommandOutcome::Help { topic }) => help_lines(topic),
            Err(CommandError::Parse(err)) => vec![format!("ERR syntax {err}")],
            Err(CommandError::Unsupported(what)) => vec![format!("ERR unsupported {what}")],
            Err(CommandError::Rejected(err)) => {
                let mut lines = self.describe_events();
                lines.push(format!("ERR rejected {err}"));
                lines
            }
        };

        let finished = self.host().now();
        self.record_output(finished, &lines)?;
        Ok(lines)
    }

    fn describe_advance(&mut self, duration: Duration) -> Vec<String> {
        let mut lines = self.describe_events();
        let (coarse, fine) = self
            .executor
            .control()
            .scheduler
            .step_counts();
        lines.push(format!(
            "OK advanced {} ms t={:.2}s steps coarse={coarse} fine={fine}",
            duration.as_millis(),
            self.host().now().as_secs_f64()
        ));
        lines
    }

    fn describe_events(&mut self) -> Vec<String> {
        self.executor
            .control_mut()
            .take_events()
            .into_iter()
            .map(|event| match event {
                StepEvent::FineStepEntered { at, slip_hz } => format!(
                    "  t={:.2}s fine stepping requested slip={slip_hz:.4}Hz",
                    at.as_secs_f64()
                ),
                StepEvent::FineStepLeft { at } => {
                    format!("  t={:.2}s fine stepping released", at.as_secs_f64())
                }
                StepEvent::SwitchClosed { at, separation_deg } => format!(
                    "  t={:.2}s switch closed separation={separation_deg:.3}deg",
                    at.as_secs_f64()
                ),
            })
            .collect()
    }

    fn describe_status(&self) -> Vec<String> {
        let Some(snapshot) = self.host().snapshot() else {
            return vec!["ERR status unavailable".to_string()];
        };

        let formatter = StatusFormatter::new(&snapshot);
        let mut monitor_line = String::new();
        let mut metric_line = String::new();
        if formatter.write_monitor_line(&mut monitor_line).is_err()
            || formatter.write_metric_line(&mut metric_line).is_err()
        {
            return vec!["ERR status formatting failed".to_string()];
        }

        let grid = &self.host().grid;
        let grid_line = format!(
            "grid ref={:.4}Hz island={:.4}Hz separation={:.2}deg",
            grid.reference().frequency_hz,
            grid.islanded().frequency_hz,
            grid.separation_deg()
        );
        vec![monitor_line, metric_line, grid_line]
    }

    fn record_output(&mut self, elapsed: Duration, lines: &[String]) -> io::Result<()> {
        for line in lines {
            self.transcript
                .append_line(elapsed, TranscriptRole::Emulator, line)?;
        }
        Ok(())
    }
}

fn help_lines(topic: Option<&str>) -> Vec<String> {
    let mut lines = Vec::new();
    match topic {
        Some(target) => {
            if let Some(spec) = catalog::find(target) {
                lines.push(format!("{:<24} - {}", spec.usage, spec.summary));
                if spec.name == "set" {
                    lines.extend(property_lines());
                }
            } else {
                lines.push(format!("No help available for `{target}`."));
                lines.push(format!("Available topics: {}", help_topic_list()));
            }
        }
        None => {
            lines.push("Available commands:".to_string());
            for spec in catalog::commands() {
                lines.push(format!("  {:<24} - {}", spec.usage, spec.summary));
            }
            lines.push("Type `help <topic>` for a specific command.".to_string());
        }
    }
    lines
}

fn property_lines() -> Vec<String> {
    catalog::properties()
        .iter()
        .map(|spec| {
            let keyword = spec.field.keyword();
            let value = match spec.value {
                ValueSpec::Flag => catalog::FLAG_KEYWORDS.join("|"),
                ValueSpec::Number => match spec.field.unit() {
                    "" => "<number>".to_string(),
                    unit => format!("<number> [{unit}]"),
                },
                ValueSpec::Keyword(options) => options.join("|"),
            };
            format!("  {keyword:<28} {value}")
        })
        .collect()
}

fn help_topic_list() -> String {
    catalog::commands()
        .iter()
        .map(|spec| spec.name)
        .collect::<Vec<_>>()
        .join(", ")
}

struct TranscriptLogger {
    writer: BufWriter<std::fs::File>,
}

impl TranscriptLogger {
    fn new(profile: TranscriptProfile) -> io::Result<Self> {
        let path = Path::new(profile.log_path());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };

        logger.write_header(profile)?;
        Ok(logger)
    }

    fn write_header(&mut self, profile: TranscriptProfile) -> io::Result<()> {
        writeln!(self.writer, "# {}", profile.header())?;
        writeln!(
            self.writer,
            "# Timestamps are simulated milliseconds since session start"
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(
        &mut self,
        elapsed: Duration,
        role: TranscriptRole,
        line: &str,
    ) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>6} ms] {} {}",
            elapsed.as_millis(),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }
}

enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(&self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}
