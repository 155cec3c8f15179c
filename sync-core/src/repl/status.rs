//! Shared status surface for the console.
//!
//! Hosts implement [`StatusProvider`] so that the `status` command can surface
//! the live monitor state without duplicating platform logic.
//! [`StatusFormatter`] keeps the textual rendering consistent across
//! front-ends.

use core::fmt;

use crate::clock::SimInstant;
use crate::config::MetricMode;
use crate::measurement::Phase;
use crate::metric::MetricReport;
use crate::monitor::{SwitchStatus, SyncMonitor, SyncState};
use crate::trigger::StepRecommendation;

/// Snapshot of reusable status information surfaced by the console.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StatusSnapshot {
    pub armed: bool,
    pub state: SyncState,
    pub dwell_accumulated_sec: f64,
    pub dwell_period_sec: f64,
    pub recommendation: StepRecommendation,
    pub switch: SwitchStatus,
    pub mode: MetricMode,
    pub report: Option<MetricReport>,
}

impl StatusSnapshot {
    /// Captures the current state of `monitor` alongside the switch status.
    #[must_use]
    pub fn capture<I: SimInstant>(monitor: &SyncMonitor<I>, switch: SwitchStatus) -> Self {
        Self {
            armed: monitor.is_armed(),
            state: monitor.state(),
            dwell_accumulated_sec: monitor.dwell_accumulated_sec(),
            dwell_period_sec: monitor.dwell_period_sec(),
            recommendation: monitor.recommendation(),
            switch,
            mode: monitor.config().mode(),
            report: monitor.last_report().copied(),
        }
    }
}

/// Platform hook that supplies live status information.
pub trait StatusProvider {
    /// Returns a snapshot if the platform can currently provide one.
    fn snapshot(&self) -> Option<StatusSnapshot>;
}

/// Helper that renders a [`StatusSnapshot`] into human-readable lines.
#[derive(Clone, Copy, Debug)]
pub struct StatusFormatter<'a> {
    snapshot: &'a StatusSnapshot,
}

impl<'a> StatusFormatter<'a> {
    #[must_use]
    pub const fn new(snapshot: &'a StatusSnapshot) -> Self {
        Self { snapshot }
    }

    /// Writes the monitor line (e.g. `monitor armed=true state=armed-accumulating dwell=0.40s/1.20s step=fine-step switch=open`).
    ///
    /// # Errors
    ///
    /// Propagates failures from `writer`.
    pub fn write_monitor_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        let snapshot = self.snapshot;
        write!(
            writer,
            "monitor armed={} state={} dwell={:.2}s/{:.2}s step={} switch={}",
            snapshot.armed,
            snapshot.state,
            snapshot.dwell_accumulated_sec,
            snapshot.dwell_period_sec,
            snapshot.recommendation,
            snapshot.switch,
        )
    }

    /// Writes the metric line (e.g. `metric mode=mag_diff df=0.005Hz A=0.0012pu B=0.0012pu C=-`).
    ///
    /// # Errors
    ///
    /// Propagates failures from `writer`.
    pub fn write_metric_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        let Some(report) = self.snapshot.report.as_ref() else {
            return write!(writer, "metric mode={} n/a", self.snapshot.mode);
        };

        write!(
            writer,
            "metric mode={} df={:.3}Hz",
            report.mode, report.frequency_diff_hz
        )?;

        for phase in Phase::ALL {
            write!(writer, " {phase}=")?;
            match (report.phase(phase), report.mode) {
                (None, _) => writer.write_char('-')?,
                (Some(metric), MetricMode::MagnitudeDifference) => {
                    write!(writer, "{:.4}pu", metric.difference_pu)?;
                }
                (Some(metric), MetricMode::SeparationDifference) => {
                    write!(
                        writer,
                        "{:.4}pu/{:.2}deg",
                        metric.magnitude_pu, metric.angle_deg
                    )?;
                }
            }
        }

        Ok(())
    }
}
