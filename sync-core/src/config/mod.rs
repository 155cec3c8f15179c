//! Tolerance configuration, documented defaults, and setup-time validation.
//!
//! Configuration values arrive from the host before the first evaluation.
//! Non-positive tolerances are replaced with documented defaults and reported
//! as [`ConfigWarning`]s. Only conditions the monitor cannot recover from
//! surface as [`SetupError`].

use core::fmt;
use core::time::Duration;

use heapless::Vec;

use crate::fmt::warn;
use crate::measurement::{BusProperty, BusSide};

/// Nominal system frequency assumed when the host does not provide one.
pub const DEFAULT_NOMINAL_FREQUENCY_HZ: f64 = 60.0;
/// Fraction of nominal frequency used when no frequency tolerance is configured.
pub const DEFAULT_FREQUENCY_TOLERANCE_FRACTION: f64 = 0.01;
/// Default complex-difference voltage tolerance (1%).
pub const DEFAULT_VOLTAGE_TOLERANCE_PU: f64 = 1e-2;
/// Default magnitude-separation voltage tolerance (1%).
pub const DEFAULT_VOLTAGE_MAGNITUDE_TOLERANCE_PU: f64 = 1e-2;
/// Default angle-separation tolerance.
pub const DEFAULT_VOLTAGE_ANGLE_TOLERANCE_DEG: f64 = 5.0;
/// Default continuous compliant duration required before closing.
pub const DEFAULT_DWELL_PERIOD_SEC: f64 = 1.2;
/// Default scale applied to the strict band to build the fine-step trigger band.
pub const DEFAULT_TRIGGER_MULTIPLIER: f64 = 2.0;
/// Default cadence of coarse-step evaluations.
pub const DEFAULT_TRIGGER_INTERVAL: Duration = Duration::from_secs(1);
/// Upper bound on warnings collected during a single validation pass.
pub const MAX_CONFIG_WARNINGS: usize = 8;

/// Bounded list of warnings produced while validating configuration.
pub type ConfigWarnings = Vec<ConfigWarning, MAX_CONFIG_WARNINGS>;

/// Selects how voltage compliance is judged.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum MetricMode {
    /// Magnitude of the complex phasor difference, per unit.
    #[default]
    MagnitudeDifference,
    /// Separate magnitude (per unit) and angle (degrees) differences.
    SeparationDifference,
}

impl MetricMode {
    /// Keyword used by the configuration surface.
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            MetricMode::MagnitudeDifference => "mag_diff",
            MetricMode::SeparationDifference => "sep_diff",
        }
    }

    /// Parses a configuration keyword (case insensitive).
    #[must_use]
    pub fn from_keyword(text: &str) -> Option<Self> {
        [
            MetricMode::MagnitudeDifference,
            MetricMode::SeparationDifference,
        ]
        .into_iter()
        .find(|mode| mode.keyword().eq_ignore_ascii_case(text))
    }
}

impl fmt::Display for MetricMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Named fields of the configuration surface.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConfigField {
    Armed,
    FrequencyTolerance,
    VoltageTolerance,
    VoltageMagnitudeTolerance,
    VoltageAngleTolerance,
    MetricsPeriod,
    VoltCompareMode,
    TriggerMultiplier,
}

/// Every configuration field in declaration order.
pub const ALL_FIELDS: [ConfigField; 8] = [
    ConfigField::Armed,
    ConfigField::FrequencyTolerance,
    ConfigField::VoltageTolerance,
    ConfigField::VoltageMagnitudeTolerance,
    ConfigField::VoltageAngleTolerance,
    ConfigField::MetricsPeriod,
    ConfigField::VoltCompareMode,
    ConfigField::TriggerMultiplier,
];

impl ConfigField {
    /// Property keyword accepted by the configuration surface.
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            ConfigField::Armed => "armed",
            ConfigField::FrequencyTolerance => "frequency_tolerance",
            ConfigField::VoltageTolerance => "voltage_tolerance",
            ConfigField::VoltageMagnitudeTolerance => "voltage_magnitude_tolerance",
            ConfigField::VoltageAngleTolerance => "voltage_angle_tolerance",
            ConfigField::MetricsPeriod => "metrics_period",
            ConfigField::VoltCompareMode => "volt_compare_mode",
            ConfigField::TriggerMultiplier => "delta_trigger_mult",
        }
    }

    /// Engineering unit of the field, empty for flags and enumerations.
    #[must_use]
    pub const fn unit(self) -> &'static str {
        match self {
            ConfigField::FrequencyTolerance => "Hz",
            ConfigField::VoltageTolerance | ConfigField::VoltageMagnitudeTolerance => "pu",
            ConfigField::VoltageAngleTolerance => "deg",
            ConfigField::MetricsPeriod => "s",
            ConfigField::Armed | ConfigField::VoltCompareMode | ConfigField::TriggerMultiplier => {
                ""
            }
        }
    }

    /// Looks up a field by keyword (case insensitive).
    #[must_use]
    pub fn from_keyword(text: &str) -> Option<Self> {
        ALL_FIELDS
            .into_iter()
            .find(|field| field.keyword().eq_ignore_ascii_case(text))
    }
}

/// One assignment from the configuration surface.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Setting {
    Armed(bool),
    Mode(MetricMode),
    /// Any numeric field; `field` is never `Armed` or `VoltCompareMode`.
    Value { field: ConfigField, value: f64 },
}

impl Setting {
    /// Builds a numeric setting, rejecting fields that do not take a number.
    #[must_use]
    pub const fn numeric(field: ConfigField, value: f64) -> Option<Self> {
        match field {
            ConfigField::Armed | ConfigField::VoltCompareMode => None,
            _ => Some(Setting::Value { field, value }),
        }
    }

    #[must_use]
    pub const fn field(&self) -> ConfigField {
        match self {
            Setting::Armed(_) => ConfigField::Armed,
            Setting::Mode(_) => ConfigField::VoltCompareMode,
            Setting::Value { field, .. } => *field,
        }
    }
}

/// Thresholds and flags configured for one synchronization monitor.
///
/// A value of `0.0` (or any non-positive value) marks a tolerance as unset;
/// validation replaces it with the documented default.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ToleranceConfig {
    pub armed: bool,
    pub mode: MetricMode,
    pub frequency_tolerance_hz: f64,
    pub voltage_tolerance_pu: f64,
    pub voltage_magnitude_tolerance_pu: f64,
    pub voltage_angle_tolerance_deg: f64,
    pub dwell_period_sec: f64,
    pub trigger_multiplier: f64,
    /// Whether this monitor opts into fine-step execution.
    pub fine_step_inclusive: bool,
}

impl ToleranceConfig {
    /// Documented defaults for a system running at `nominal_hz`.
    #[must_use]
    pub const fn for_nominal_frequency(nominal_hz: f64) -> Self {
        Self {
            armed: false,
            mode: MetricMode::MagnitudeDifference,
            frequency_tolerance_hz: nominal_hz * DEFAULT_FREQUENCY_TOLERANCE_FRACTION,
            voltage_tolerance_pu: DEFAULT_VOLTAGE_TOLERANCE_PU,
            voltage_magnitude_tolerance_pu: DEFAULT_VOLTAGE_MAGNITUDE_TOLERANCE_PU,
            voltage_angle_tolerance_deg: DEFAULT_VOLTAGE_ANGLE_TOLERANCE_DEG,
            dwell_period_sec: DEFAULT_DWELL_PERIOD_SEC,
            trigger_multiplier: DEFAULT_TRIGGER_MULTIPLIER,
            fine_step_inclusive: true,
        }
    }

    /// Configuration with every numeric field left unset.
    #[must_use]
    pub const fn unset() -> Self {
        Self {
            armed: false,
            mode: MetricMode::MagnitudeDifference,
            frequency_tolerance_hz: 0.0,
            voltage_tolerance_pu: 0.0,
            voltage_magnitude_tolerance_pu: 0.0,
            voltage_angle_tolerance_deg: 0.0,
            dwell_period_sec: 0.0,
            trigger_multiplier: 0.0,
            fine_step_inclusive: true,
        }
    }

    /// Writes `setting` into the matching field. Values are validated later.
    pub fn apply(&mut self, setting: Setting) {
        match setting {
            Setting::Armed(armed) => self.armed = armed,
            Setting::Mode(mode) => self.mode = mode,
            Setting::Value { field, value } => match field {
                ConfigField::FrequencyTolerance => self.frequency_tolerance_hz = value,
                ConfigField::VoltageTolerance => self.voltage_tolerance_pu = value,
                ConfigField::VoltageMagnitudeTolerance => {
                    self.voltage_magnitude_tolerance_pu = value;
                }
                ConfigField::VoltageAngleTolerance => self.voltage_angle_tolerance_deg = value,
                ConfigField::MetricsPeriod => self.dwell_period_sec = value,
                ConfigField::TriggerMultiplier => self.trigger_multiplier = value,
                ConfigField::Armed | ConfigField::VoltCompareMode => {}
            },
        }
    }

    /// Strict tolerance band described by this configuration.
    #[must_use]
    pub const fn strict_tolerances(&self) -> ToleranceSet {
        ToleranceSet {
            frequency_hz: self.frequency_tolerance_hz,
            voltage_pu: self.voltage_tolerance_pu,
            voltage_magnitude_pu: self.voltage_magnitude_tolerance_pu,
            voltage_angle_deg: self.voltage_angle_tolerance_deg,
        }
    }
}

impl Default for ToleranceConfig {
    fn default() -> Self {
        Self::for_nominal_frequency(DEFAULT_NOMINAL_FREQUENCY_HZ)
    }
}

/// One complete set of thresholds evaluated together.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ToleranceSet {
    pub frequency_hz: f64,
    pub voltage_pu: f64,
    pub voltage_magnitude_pu: f64,
    pub voltage_angle_deg: f64,
}

impl ToleranceSet {
    /// Scales every threshold by `multiplier`.
    #[must_use]
    pub fn scaled(&self, multiplier: f64) -> Self {
        Self {
            frequency_hz: self.frequency_hz * multiplier,
            voltage_pu: self.voltage_pu * multiplier,
            voltage_magnitude_pu: self.voltage_magnitude_pu * multiplier,
            voltage_angle_deg: self.voltage_angle_deg * multiplier,
        }
    }

    /// Returns `true` when every threshold is at least as loose as `other`'s.
    #[must_use]
    pub fn covers(&self, other: &Self) -> bool {
        self.frequency_hz >= other.frequency_hz
            && self.voltage_pu >= other.voltage_pu
            && self.voltage_magnitude_pu >= other.voltage_magnitude_pu
            && self.voltage_angle_deg >= other.voltage_angle_deg
    }
}

/// Host-wide settings shared by every monitor in a run.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SystemSettings {
    pub nominal_frequency_hz: f64,
    /// Whether the host scheduler supports fine-step execution at all.
    pub fine_stepping_enabled: bool,
    /// Cadence of coarse-step evaluations.
    pub trigger_interval: Duration,
}

impl Default for SystemSettings {
    fn default() -> Self {
        Self {
            nominal_frequency_hz: DEFAULT_NOMINAL_FREQUENCY_HZ,
            fine_stepping_enabled: true,
            trigger_interval: DEFAULT_TRIGGER_INTERVAL,
        }
    }
}

/// Recoverable configuration problems. Each one is corrected and reported.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ConfigWarning {
    /// A field was unset or invalid and has been replaced with `value`.
    Defaulted { field: ConfigField, value: f64 },
    /// The monitor was configured armed but its switch starts closed.
    ArmedWithClosedSwitch,
    /// A runtime arm request arrived while the switch was closed.
    ArmRejectedSwitchClosed,
    /// The host enables fine stepping but this monitor does not opt in.
    FineStepModuleOnly,
    /// This monitor opts into fine stepping but the host does not support it.
    FineStepObjectOnly,
}

impl ConfigWarning {
    /// Short identifier used in log lines.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            ConfigWarning::Defaulted { .. } => "defaulted",
            ConfigWarning::ArmedWithClosedSwitch => "armed-with-closed-switch",
            ConfigWarning::ArmRejectedSwitchClosed => "arm-rejected-switch-closed",
            ConfigWarning::FineStepModuleOnly => "fine-step-module-only",
            ConfigWarning::FineStepObjectOnly => "fine-step-object-only",
        }
    }
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigWarning::Defaulted { field, value } => {
                write!(f, "{} reset to {value}", field.keyword())?;
                let unit = field.unit();
                if unit.is_empty() {
                    Ok(())
                } else {
                    write!(f, " [{unit}]")
                }
            }
            ConfigWarning::ArmedWithClosedSwitch => {
                f.write_str("switch starts closed, monitor disarmed")
            }
            ConfigWarning::ArmRejectedSwitchClosed => {
                f.write_str("switch is closed, arm request ignored")
            }
            ConfigWarning::FineStepModuleOnly => {
                f.write_str("fine stepping enabled for the host but not this monitor")
            }
            ConfigWarning::FineStepObjectOnly => {
                f.write_str("fine stepping enabled for this monitor but not the host")
            }
        }
    }
}

/// Configuration values that cannot be corrected with a default.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConfigError {
    /// The nominal system frequency is not a positive finite number.
    InvalidNominalFrequency,
    /// The dwell period is positive but not finite, so closure could never occur.
    UnboundedDwellPeriod,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidNominalFrequency => {
                f.write_str("nominal frequency must be positive and finite")
            }
            ConfigError::UnboundedDwellPeriod => f.write_str("metrics_period must be finite"),
        }
    }
}

/// Fatal errors that abort monitor setup.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum SetupError {
    /// No parent switch was supplied.
    MissingParentSwitch,
    /// The switch does not reference a bus on `side`.
    MissingBusLink { side: BusSide },
    /// A bus does not expose a property the monitor must read.
    MissingBusProperty {
        side: BusSide,
        property: BusProperty,
    },
    /// A bus reports a nominal voltage that cannot serve as a per-unit base.
    InvalidNominalVoltage { side: BusSide, volts: f64 },
    /// The two buses are not electrically compatible for synchronization checking.
    NominalVoltageMismatch {
        from_volts: f64,
        to_volts: f64,
        base_volts: f64,
        tolerance_pu: f64,
    },
    Config(ConfigError),
}

impl From<ConfigError> for SetupError {
    fn from(value: ConfigError) -> Self {
        SetupError::Config(value)
    }
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupError::MissingParentSwitch => f.write_str("parent switch must be specified"),
            SetupError::MissingBusLink { side } => {
                write!(f, "switch has no '{side}' bus")
            }
            SetupError::MissingBusProperty { side, property } => {
                write!(f, "failed to map {property} on the '{side}' bus")
            }
            SetupError::InvalidNominalVoltage { side, volts } => {
                write!(f, "nominal voltage {volts} V on the '{side}' bus is not usable")
            }
            SetupError::NominalVoltageMismatch {
                from_volts,
                to_volts,
                base_volts,
                tolerance_pu,
            } => write!(
                f,
                "nominal voltages {from_volts} V and {to_volts} V differ by more than \
                 {tolerance_pu} pu of {base_volts} V"
            ),
            SetupError::Config(err) => err.fmt(f),
        }
    }
}

/// Tolerance configuration after defaults have been applied.
///
/// Holds the strict band used to authorize closing and the relaxed band used
/// only for step-size decisions.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ValidatedConfig {
    config: ToleranceConfig,
    strict: ToleranceSet,
    relaxed: ToleranceSet,
}

impl ValidatedConfig {
    /// Applies defaults to `config` and derives the relaxed band.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the nominal frequency or dwell period
    /// cannot be brought into range with a default.
    pub fn new(
        config: ToleranceConfig,
        settings: &SystemSettings,
        warnings: &mut ConfigWarnings,
    ) -> Result<Self, ConfigError> {
        let nominal_hz = settings.nominal_frequency_hz;
        if !(nominal_hz.is_finite() && nominal_hz > 0.0) {
            return Err(ConfigError::InvalidNominalFrequency);
        }

        let mut config = config;
        default_non_positive(
            &mut config.frequency_tolerance_hz,
            ConfigField::FrequencyTolerance,
            nominal_hz * DEFAULT_FREQUENCY_TOLERANCE_FRACTION,
            warnings,
        );
        // Both voltage bands are validated regardless of mode.
        default_non_positive(
            &mut config.voltage_tolerance_pu,
            ConfigField::VoltageTolerance,
            DEFAULT_VOLTAGE_TOLERANCE_PU,
            warnings,
        );
        default_non_positive(
            &mut config.voltage_magnitude_tolerance_pu,
            ConfigField::VoltageMagnitudeTolerance,
            DEFAULT_VOLTAGE_MAGNITUDE_TOLERANCE_PU,
            warnings,
        );
        default_non_positive(
            &mut config.voltage_angle_tolerance_deg,
            ConfigField::VoltageAngleTolerance,
            DEFAULT_VOLTAGE_ANGLE_TOLERANCE_DEG,
            warnings,
        );
        default_non_positive(
            &mut config.dwell_period_sec,
            ConfigField::MetricsPeriod,
            DEFAULT_DWELL_PERIOD_SEC,
            warnings,
        );
        if !config.dwell_period_sec.is_finite() {
            return Err(ConfigError::UnboundedDwellPeriod);
        }

        config.trigger_multiplier = checked_trigger_multiplier(config.trigger_multiplier, warnings);

        Ok(Self::from_sanitized(config))
    }

    fn from_sanitized(config: ToleranceConfig) -> Self {
        let strict = config.strict_tolerances();
        Self {
            config,
            strict,
            relaxed: strict.scaled(config.trigger_multiplier),
        }
    }

    /// Returns the sanitized configuration.
    #[must_use]
    pub const fn config(&self) -> &ToleranceConfig {
        &self.config
    }

    /// Thresholds that authorize closing.
    #[must_use]
    pub const fn strict(&self) -> &ToleranceSet {
        &self.strict
    }

    /// Thresholds that only drive fine-step requests.
    #[must_use]
    pub const fn relaxed(&self) -> &ToleranceSet {
        &self.relaxed
    }

    #[must_use]
    pub const fn mode(&self) -> MetricMode {
        self.config.mode
    }

    #[must_use]
    pub const fn dwell_period_sec(&self) -> f64 {
        self.config.dwell_period_sec
    }

    #[must_use]
    pub const fn trigger_multiplier(&self) -> f64 {
        self.config.trigger_multiplier
    }

    /// Carries the arming and fine-step flags over from `previous`.
    pub fn retain_flags(&mut self, previous: &ToleranceConfig) {
        self.config.armed = previous.armed;
        self.config.fine_step_inclusive = previous.fine_step_inclusive;
    }

    /// Switches the metric definition. Both bands already cover either mode.
    pub fn set_mode(&mut self, mode: MetricMode) {
        self.config.mode = mode;
    }

    /// Replaces the trigger multiplier and recomputes the relaxed band.
    pub fn set_trigger_multiplier(&mut self, multiplier: f64, warnings: &mut ConfigWarnings) {
        self.config.trigger_multiplier = checked_trigger_multiplier(multiplier, warnings);
        self.relaxed = self.strict.scaled(self.config.trigger_multiplier);
    }
}

fn default_non_positive(
    value: &mut f64,
    field: ConfigField,
    default: f64,
    warnings: &mut ConfigWarnings,
) {
    if *value > 0.0 {
        return;
    }

    *value = default;
    warn!(
        "sync-check: {=str} was not positive, reset to {=f64}",
        field.keyword(),
        default
    );
    note_warning(
        warnings,
        ConfigWarning::Defaulted {
            field,
            value: default,
        },
    );
}

fn checked_trigger_multiplier(multiplier: f64, warnings: &mut ConfigWarnings) -> f64 {
    if multiplier.is_finite() && multiplier > 1.0 {
        return multiplier;
    }

    warn!(
        "sync-check: delta_trigger_mult {=f64} must exceed 1.0, defaulted to {=f64}",
        multiplier,
        DEFAULT_TRIGGER_MULTIPLIER
    );
    note_warning(
        warnings,
        ConfigWarning::Defaulted {
            field: ConfigField::TriggerMultiplier,
            value: DEFAULT_TRIGGER_MULTIPLIER,
        },
    );
    DEFAULT_TRIGGER_MULTIPLIER
}

/// Stores a warning, dropping it when the bounded list is already full.
pub(crate) fn note_warning(warnings: &mut ConfigWarnings, warning: ConfigWarning) {
    if warnings.push(warning).is_err() {
        warn!("sync-check: warning list full, dropped {=str}", warning.label());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate(config: ToleranceConfig) -> (ValidatedConfig, ConfigWarnings) {
        let mut warnings = ConfigWarnings::new();
        let validated = ValidatedConfig::new(config, &SystemSettings::default(), &mut warnings)
            .expect("configuration should validate");
        (validated, warnings)
    }

    #[test]
    fn unset_configuration_receives_documented_defaults() {
        let (validated, warnings) = validate(ToleranceConfig::unset());
        let config = validated.config();

        assert!((config.frequency_tolerance_hz - 0.6).abs() < 1e-12);
        assert_eq!(config.voltage_tolerance_pu, DEFAULT_VOLTAGE_TOLERANCE_PU);
        assert_eq!(
            config.voltage_magnitude_tolerance_pu,
            DEFAULT_VOLTAGE_MAGNITUDE_TOLERANCE_PU
        );
        assert_eq!(
            config.voltage_angle_tolerance_deg,
            DEFAULT_VOLTAGE_ANGLE_TOLERANCE_DEG
        );
        assert_eq!(config.dwell_period_sec, DEFAULT_DWELL_PERIOD_SEC);
        assert_eq!(config.trigger_multiplier, DEFAULT_TRIGGER_MULTIPLIER);
        assert_eq!(warnings.len(), 6);
    }

    #[test]
    fn valid_configuration_produces_no_warnings() {
        let (validated, warnings) = validate(ToleranceConfig::default());
        assert!(warnings.is_empty());
        assert_eq!(*validated.config(), ToleranceConfig::default());
    }

    #[test]
    fn negative_tolerance_is_reported_with_replacement_value() {
        let config = ToleranceConfig {
            voltage_angle_tolerance_deg: -3.0,
            ..ToleranceConfig::default()
        };
        let (validated, warnings) = validate(config);

        assert_eq!(validated.strict().voltage_angle_deg, 5.0);
        assert_eq!(
            warnings.as_slice(),
            &[ConfigWarning::Defaulted {
                field: ConfigField::VoltageAngleTolerance,
                value: 5.0,
            }]
        );
    }

    #[test]
    fn nan_tolerance_is_treated_as_unset() {
        let config = ToleranceConfig {
            voltage_tolerance_pu: f64::NAN,
            ..ToleranceConfig::default()
        };
        let (validated, warnings) = validate(config);
        assert_eq!(validated.strict().voltage_pu, DEFAULT_VOLTAGE_TOLERANCE_PU);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn trigger_multiplier_at_or_below_one_is_defaulted() {
        for multiplier in [1.0, 0.5, -2.0] {
            let config = ToleranceConfig {
                trigger_multiplier: multiplier,
                ..ToleranceConfig::default()
            };
            let (validated, warnings) = validate(config);
            assert_eq!(validated.trigger_multiplier(), DEFAULT_TRIGGER_MULTIPLIER);
            assert_eq!(
                warnings.as_slice(),
                &[ConfigWarning::Defaulted {
                    field: ConfigField::TriggerMultiplier,
                    value: DEFAULT_TRIGGER_MULTIPLIER,
                }]
            );
        }
    }

    #[test]
    fn relaxed_band_scales_every_strict_threshold() {
        let config = ToleranceConfig {
            frequency_tolerance_hz: 0.01,
            voltage_tolerance_pu: 0.02,
            voltage_magnitude_tolerance_pu: 0.03,
            voltage_angle_tolerance_deg: 4.0,
            trigger_multiplier: 3.0,
            ..ToleranceConfig::default()
        };
        let (validated, _) = validate(config);
        let relaxed = validated.relaxed();

        assert!((relaxed.frequency_hz - 0.03).abs() < 1e-12);
        assert!((relaxed.voltage_pu - 0.06).abs() < 1e-12);
        assert!((relaxed.voltage_magnitude_pu - 0.09).abs() < 1e-12);
        assert!((relaxed.voltage_angle_deg - 12.0).abs() < 1e-12);
        assert!(relaxed.covers(validated.strict()));
        assert!(!validated.strict().covers(relaxed));
    }

    #[test]
    fn updating_trigger_multiplier_recomputes_relaxed_band() {
        let (mut validated, _) = validate(ToleranceConfig::default());
        let mut warnings = ConfigWarnings::new();

        validated.set_trigger_multiplier(4.0, &mut warnings);
        assert!(warnings.is_empty());
        assert!((validated.relaxed().voltage_angle_deg - 20.0).abs() < 1e-12);

        validated.set_trigger_multiplier(0.9, &mut warnings);
        assert_eq!(warnings.len(), 1);
        assert!((validated.relaxed().voltage_angle_deg - 10.0).abs() < 1e-12);
    }

    #[test]
    fn infinite_dwell_period_is_fatal() {
        let config = ToleranceConfig {
            dwell_period_sec: f64::INFINITY,
            ..ToleranceConfig::default()
        };
        let mut warnings = ConfigWarnings::new();
        let result = ValidatedConfig::new(config, &SystemSettings::default(), &mut warnings);
        assert_eq!(result, Err(ConfigError::UnboundedDwellPeriod));
    }

    #[test]
    fn non_positive_nominal_frequency_is_fatal() {
        let settings = SystemSettings {
            nominal_frequency_hz: 0.0,
            ..SystemSettings::default()
        };
        let mut warnings = ConfigWarnings::new();
        let result = ValidatedConfig::new(ToleranceConfig::default(), &settings, &mut warnings);
        assert_eq!(result, Err(ConfigError::InvalidNominalFrequency));
    }

    #[test]
    fn frequency_default_follows_nominal_frequency() {
        let settings = SystemSettings {
            nominal_frequency_hz: 50.0,
            ..SystemSettings::default()
        };
        let mut warnings = ConfigWarnings::new();
        let validated = ValidatedConfig::new(ToleranceConfig::unset(), &settings, &mut warnings)
            .expect("configuration should validate");
        assert!((validated.strict().frequency_hz - 0.5).abs() < 1e-12);
    }

    #[test]
    fn settings_write_their_field() {
        let mut config = ToleranceConfig::default();
        config.apply(Setting::Mode(MetricMode::SeparationDifference));
        config.apply(Setting::Armed(true));
        config.apply(
            Setting::numeric(ConfigField::VoltageAngleTolerance, 2.5).expect("numeric field"),
        );

        assert_eq!(config.mode, MetricMode::SeparationDifference);
        assert!(config.armed);
        assert!((config.voltage_angle_tolerance_deg - 2.5).abs() < 1e-12);
        assert_eq!(Setting::numeric(ConfigField::Armed, 1.0), None);
    }

    #[test]
    fn keywords_round_trip_case_insensitively() {
        assert_eq!(
            ConfigField::from_keyword("DELTA_TRIGGER_MULT"),
            Some(ConfigField::TriggerMultiplier)
        );
        assert_eq!(
            MetricMode::from_keyword("Sep_Diff"),
            Some(MetricMode::SeparationDifference)
        );
        assert_eq!(ConfigField::from_keyword("bogus"), None);
    }
}
