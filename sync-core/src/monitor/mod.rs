//! Synchronization state machine for one open tie switch.
//!
//! [`SyncMonitor`] owns the validated tolerances, the dwell timer, and the
//! step-mode controller. The host scheduler drives it through
//! [`SyncMonitor::coarse_step`] and [`SyncMonitor::fine_step`] after the
//! power-flow solver has produced the present bus values.

use core::fmt;
use core::time::Duration;

use crate::clock::SimInstant;
use crate::config::{
    ConfigError, ConfigField, ConfigWarning, ConfigWarnings, MetricMode, SetupError, Setting,
    SystemSettings, ToleranceConfig, ValidatedConfig, note_warning,
};
use crate::dwell::{DwellProgress, DwellTimer};
use crate::fmt::{debug, info, warn};
use crate::measurement::{BusNode, BusPair, BusSide, MeasurementSnapshot, PhaseSet};
use crate::metric::{MetricReport, assess};
use crate::telemetry::{DisarmReason, DwellTelemetry, TelemetryRecorder};
use crate::trigger::{FinePass, StepModeController, StepRecommendation, resolve_registration};

/// Position of the switch contacts.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SwitchStatus {
    Open,
    Closed,
}

impl fmt::Display for SwitchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SwitchStatus::Open => "open",
            SwitchStatus::Closed => "closed",
        })
    }
}

/// The switch a monitor is attached to, together with its two buses.
pub trait SwitchSite {
    type Bus: BusNode;
    /// Failure reported when the switch refuses a close command.
    type Error;

    /// Phases physically present on the switch.
    fn phases(&self) -> PhaseSet;

    fn status(&self) -> SwitchStatus;

    fn from_bus(&self) -> Option<&Self::Bus>;

    fn to_bus(&self) -> Option<&Self::Bus>;

    /// Commands the switch closed.
    fn close(&mut self) -> Result<(), Self::Error>;
}

/// Lifecycle of a monitor as seen from outside.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SyncState {
    Disarmed,
    ArmedIdle,
    ArmedAccumulating,
    /// The monitor closed its switch and disarmed itself.
    Closed,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SyncState::Disarmed => "disarmed",
            SyncState::ArmedIdle => "armed-idle",
            SyncState::ArmedAccumulating => "armed-accumulating",
            SyncState::Closed => "closed",
        })
    }
}

/// Runtime failures surfaced from an evaluation tick.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MonitorError<E = ()> {
    /// The switch rejected the close command.
    CloseRejected(E),
    /// A bus resolved at setup is no longer reachable through the switch.
    LinkLost(BusSide),
}

impl<E> MonitorError<E> {
    /// Maps the switch-specific error type.
    pub fn map_other<F, M>(self, mapper: M) -> MonitorError<F>
    where
        M: FnOnce(E) -> F,
    {
        match self {
            MonitorError::CloseRejected(err) => MonitorError::CloseRejected(mapper(err)),
            MonitorError::LinkLost(side) => MonitorError::LinkLost(side),
        }
    }
}

impl<E: fmt::Display> fmt::Display for MonitorError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorError::CloseRejected(err) => write!(f, "switch rejected close command: {err}"),
            MonitorError::LinkLost(side) => write!(f, "lost link to the '{side}' bus"),
        }
    }
}

/// Reason an arm request was refused.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ArmError {
    SwitchNotOpen,
}

impl fmt::Display for ArmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArmError::SwitchNotOpen => f.write_str("switch is not open"),
        }
    }
}

/// Failure applying a single [`Setting`] at runtime.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SettingError {
    Arm(ArmError),
    Config(ConfigError),
}

impl From<ArmError> for SettingError {
    fn from(value: ArmError) -> Self {
        SettingError::Arm(value)
    }
}

impl From<ConfigError> for SettingError {
    fn from(value: ConfigError) -> Self {
        SettingError::Config(value)
    }
}

impl fmt::Display for SettingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingError::Arm(err) => write!(f, "arm rejected: {err}"),
            SettingError::Config(err) => err.fmt(f),
        }
    }
}

/// Synchronization check and fine-step trigger for one switch.
pub struct SyncMonitor<I>
where
    I: SimInstant,
{
    config: ValidatedConfig,
    pair: BusPair,
    snapshot: MeasurementSnapshot,
    dwell: DwellTimer,
    trigger: StepModeController<I>,
    armed: bool,
    closed: bool,
    in_window: bool,
    last_evaluation: Option<I>,
    last_report: Option<MetricReport>,
    warnings: ConfigWarnings,
    telemetry: TelemetryRecorder<I>,
}

impl<I> SyncMonitor<I>
where
    I: SimInstant,
{
    /// Validates the configuration against `parent` and builds a monitor.
    ///
    /// Recoverable problems are corrected and available from
    /// [`SyncMonitor::warnings`].
    ///
    /// # Errors
    ///
    /// Returns [`SetupError`] when no switch is supplied, a bus link or property
    /// is missing, the nominal voltages disagree, or the configuration cannot
    /// be corrected.
    pub fn setup<S: SwitchSite>(
        parent: Option<&S>,
        config: ToleranceConfig,
        settings: &SystemSettings,
        now: I,
    ) -> Result<Self, SetupError> {
        let site = parent.ok_or(SetupError::MissingParentSwitch)?;

        let mut warnings = ConfigWarnings::new();
        let config = ValidatedConfig::new(config, settings, &mut warnings)?;
        let pair = BusPair::resolve(
            site.from_bus(),
            site.to_bus(),
            site.phases(),
            config.strict().voltage_pu,
        )?;
        let capable = resolve_registration(
            settings.fine_stepping_enabled,
            config.config().fine_step_inclusive,
            &mut warnings,
        );

        let mut telemetry = TelemetryRecorder::new();
        for warning in &warnings {
            if let ConfigWarning::Defaulted { field, .. } = warning {
                telemetry.record_defaulted(*field, now);
            }
        }

        let mut armed = config.config().armed;
        if armed && site.status() != SwitchStatus::Open {
            warn!("sync-check: armed with a closed switch, monitor disarmed");
            note_warning(&mut warnings, ConfigWarning::ArmedWithClosedSwitch);
            telemetry.record_disarmed(DisarmReason::SwitchNotOpen, now);
            armed = false;
        } else if armed {
            telemetry.record_armed(now);
        }

        info!(
            "sync-check: setup phases={=u8} base={=f64}V armed={=bool} fine-step={=bool}",
            pair.phases().bits(),
            pair.base_volts(),
            armed,
            capable
        );

        Ok(Self {
            snapshot: MeasurementSnapshot::empty(pair.base_volts()),
            dwell: DwellTimer::new(config.dwell_period_sec()),
            trigger: StepModeController::new(capable, settings.trigger_interval, now),
            config,
            pair,
            armed,
            closed: false,
            in_window: false,
            last_evaluation: armed.then_some(now),
            last_report: None,
            warnings,
            telemetry,
        })
    }

    /// Coarse-step entry point, called once per coarse step on the late pass.
    ///
    /// Work is only performed when the trigger cadence is due; other calls
    /// return [`StepRecommendation::StayEventDriven`] without touching state.
    ///
    /// # Errors
    ///
    /// Propagates a rejected close command or a lost bus link.
    pub fn coarse_step<S: SwitchSite>(
        &mut self,
        site: &mut S,
        now: I,
    ) -> Result<StepRecommendation, MonitorError<S::Error>> {
        if !self.trigger.coarse_due(now) {
            return Ok(StepRecommendation::StayEventDriven);
        }

        if !self.armed {
            self.hold_idle(now);
            return Ok(StepRecommendation::StayEventDriven);
        }

        self.evaluate_tick(site, now)
    }

    /// Fine-step entry point, called on every pass of every sub-step.
    ///
    /// Only the pre-update pass of iteration zero evaluates; every other pass
    /// returns the recommendation already held.
    ///
    /// # Errors
    ///
    /// Propagates a rejected close command or a lost bus link.
    pub fn fine_step<S: SwitchSite>(
        &mut self,
        site: &mut S,
        now: I,
        pass: FinePass,
    ) -> Result<StepRecommendation, MonitorError<S::Error>> {
        if !self.armed {
            self.hold_idle(now);
            return Ok(StepRecommendation::StayEventDriven);
        }

        if !pass.evaluates() {
            return Ok(self.trigger.recommendation());
        }

        self.evaluate_tick(site, now)
    }

    fn evaluate_tick<S: SwitchSite>(
        &mut self,
        site: &mut S,
        now: I,
    ) -> Result<StepRecommendation, MonitorError<S::Error>> {
        let from = site
            .from_bus()
            .ok_or(MonitorError::<S::Error>::LinkLost(BusSide::From))?;
        let to = site
            .to_bus()
            .ok_or(MonitorError::<S::Error>::LinkLost(BusSide::To))?;
        self.snapshot.refresh(from, to, self.pair.phases());

        let report = assess(&self.snapshot, self.config.mode(), self.pair.phases());
        self.last_report = Some(report);

        let relaxed_pass = report.passes(self.config.relaxed());
        let strict_pass = report.passes(self.config.strict());
        self.update_trigger(relaxed_pass, now);
        self.note_window(strict_pass, now);

        let elapsed = self
            .last_evaluation
            .map_or(Duration::ZERO, |previous| {
                now.saturating_duration_since(previous)
            });
        self.last_evaluation = Some(now);

        match self.dwell.record(strict_pass, elapsed) {
            DwellProgress::Satisfied { accumulated_sec } => {
                self.issue_close(site, accumulated_sec, now)?;
                Ok(StepRecommendation::StayEventDriven)
            }
            DwellProgress::Accumulating { .. } | DwellProgress::Reset => {
                Ok(self.trigger.recommendation())
            }
        }
    }

    fn issue_close<S: SwitchSite>(
        &mut self,
        site: &mut S,
        accumulated_sec: f64,
        now: I,
    ) -> Result<(), MonitorError<S::Error>> {
        site.close().map_err(MonitorError::CloseRejected)?;

        info!(
            "sync-check: close issued after {=f64}s inside the window",
            accumulated_sec
        );
        self.telemetry.record_close(
            DwellTelemetry::from_secs(accumulated_sec, self.dwell.period_sec()),
            now,
        );
        self.closed = true;
        self.disarm_with(DisarmReason::Closed, now);
        Ok(())
    }

    fn update_trigger(&mut self, relaxed_pass: bool, now: I) {
        let before = self.trigger.recommendation();
        let after = self.trigger.update(relaxed_pass);
        if before != after {
            debug!("sync-check: fine step requested={=bool}", after.is_fine());
            self.telemetry.record_step_change(after, now);
        }
    }

    fn release_trigger(&mut self, now: I) {
        if self.trigger.recommendation().is_fine() {
            self.trigger.release();
            self.telemetry
                .record_step_change(StepRecommendation::StayEventDriven, now);
        }
    }

    fn note_window(&mut self, strict_pass: bool, now: I) {
        if strict_pass != self.in_window {
            self.in_window = strict_pass;
            self.telemetry.record_window_transition(strict_pass, now);
        }
    }

    /// Disarmed ticks keep the accumulator at zero and drop any request.
    fn hold_idle(&mut self, now: I) {
        self.dwell.reset();
        self.last_evaluation = None;
        self.in_window = false;
        self.release_trigger(now);
    }

    fn disarm_with(&mut self, reason: DisarmReason, now: I) {
        self.armed = false;
        self.hold_idle(now);
        self.telemetry.record_disarmed(reason, now);
    }

    /// Arms the monitor for one synchronization event.
    ///
    /// # Errors
    ///
    /// Returns [`ArmError::SwitchNotOpen`] when the switch is already closed.
    pub fn arm<S: SwitchSite>(&mut self, site: &S, now: I) -> Result<(), ArmError> {
        if site.status() != SwitchStatus::Open {
            warn!("sync-check: arm request ignored, switch is not open");
            note_warning(&mut self.warnings, ConfigWarning::ArmRejectedSwitchClosed);
            return Err(ArmError::SwitchNotOpen);
        }
        if self.armed {
            return Ok(());
        }

        self.armed = true;
        self.closed = false;
        self.dwell.reset();
        self.last_evaluation = Some(now);
        self.telemetry.record_armed(now);
        info!("sync-check: armed");
        Ok(())
    }

    /// Stops evaluation immediately and clears the dwell accumulator.
    pub fn disarm(&mut self, now: I) {
        if self.armed {
            self.disarm_with(DisarmReason::Operator, now);
            info!("sync-check: disarmed by operator");
        }
    }

    /// Switches the voltage metric. Accumulated dwell is kept.
    pub fn set_mode(&mut self, mode: MetricMode) {
        self.config.set_mode(mode);
    }

    /// Replaces the trigger multiplier and recomputes the relaxed band.
    pub fn set_trigger_multiplier(&mut self, multiplier: f64, now: I) -> ConfigWarnings {
        let mut warnings = ConfigWarnings::new();
        self.config.set_trigger_multiplier(multiplier, &mut warnings);
        self.absorb_warnings(&warnings, now);
        warnings
    }

    /// Applies a new tolerance configuration without re-running setup.
    ///
    /// The `armed` and `fine_step_inclusive` fields are ignored; use
    /// [`SyncMonitor::arm`] and [`SyncMonitor::disarm`] to change arming.
    /// Accumulated dwell is kept and compared against the new period.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the new values cannot be corrected; the
    /// previous configuration stays in effect.
    pub fn reconfigure(
        &mut self,
        config: ToleranceConfig,
        settings: &SystemSettings,
        now: I,
    ) -> Result<ConfigWarnings, ConfigError> {
        let mut warnings = ConfigWarnings::new();
        let mut validated = ValidatedConfig::new(config, settings, &mut warnings)?;
        validated.retain_flags(self.config.config());

        self.dwell.set_period_sec(validated.dwell_period_sec());
        self.config = validated;
        self.absorb_warnings(&warnings, now);
        Ok(warnings)
    }

    /// Applies one configuration-surface assignment.
    ///
    /// # Errors
    ///
    /// Returns [`SettingError`] when arming is refused or the resulting
    /// configuration cannot be corrected.
    pub fn apply_setting<S: SwitchSite>(
        &mut self,
        site: &S,
        setting: Setting,
        settings: &SystemSettings,
        now: I,
    ) -> Result<ConfigWarnings, SettingError> {
        match setting {
            Setting::Armed(true) => {
                self.arm(site, now)?;
                Ok(ConfigWarnings::new())
            }
            Setting::Armed(false) => {
                self.disarm(now);
                Ok(ConfigWarnings::new())
            }
            Setting::Mode(mode) => {
                self.set_mode(mode);
                Ok(ConfigWarnings::new())
            }
            Setting::Value {
                field: ConfigField::TriggerMultiplier,
                value,
            } => Ok(self.set_trigger_multiplier(value, now)),
            other => {
                let mut config = *self.config.config();
                config.apply(other);
                Ok(self.reconfigure(config, settings, now)?)
            }
        }
    }

    fn absorb_warnings(&mut self, warnings: &ConfigWarnings, now: I) {
        for warning in warnings {
            if let ConfigWarning::Defaulted { field, .. } = warning {
                self.telemetry.record_defaulted(*field, now);
            }
            note_warning(&mut self.warnings, *warning);
        }
    }

    #[must_use]
    pub fn state(&self) -> SyncState {
        if self.armed {
            if self.dwell.accumulated_sec() > 0.0 {
                SyncState::ArmedAccumulating
            } else {
                SyncState::ArmedIdle
            }
        } else if self.closed {
            SyncState::Closed
        } else {
            SyncState::Disarmed
        }
    }

    #[must_use]
    pub const fn is_armed(&self) -> bool {
        self.armed
    }

    #[must_use]
    pub const fn dwell_accumulated_sec(&self) -> f64 {
        self.dwell.accumulated_sec()
    }

    #[must_use]
    pub const fn dwell_period_sec(&self) -> f64 {
        self.dwell.period_sec()
    }

    /// Recommendation held from the most recent evaluation.
    #[must_use]
    pub const fn recommendation(&self) -> StepRecommendation {
        self.trigger.recommendation()
    }

    #[must_use]
    pub const fn is_fine_step_capable(&self) -> bool {
        self.trigger.is_capable()
    }

    #[must_use]
    pub const fn config(&self) -> &ValidatedConfig {
        &self.config
    }

    #[must_use]
    pub const fn bus_pair(&self) -> &BusPair {
        &self.pair
    }

    #[must_use]
    pub const fn snapshot(&self) -> &MeasurementSnapshot {
        &self.snapshot
    }

    /// Deviations computed by the most recent evaluation.
    #[must_use]
    pub const fn last_report(&self) -> Option<&MetricReport> {
        self.last_report.as_ref()
    }

    /// Every warning raised since setup, oldest first.
    #[must_use]
    pub fn warnings(&self) -> &[ConfigWarning] {
        &self.warnings
    }

    #[must_use]
    pub const fn telemetry(&self) -> &TelemetryRecorder<I> {
        &self.telemetry
    }
}
