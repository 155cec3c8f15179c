//! Monitor event log with compact numeric codes.
//!
//! Events are kept in a fixed-size ring so the monitor stays `no_std`
//! and allocation free. Each kind encodes to a `u16` for transport over
//! whatever diagnostics channel the host provides.

use core::{fmt, time::Duration};

use heapless::HistoryBuf;

use crate::clock::SimInstant;
use crate::config::{ALL_FIELDS, ConfigField};
use crate::trigger::StepRecommendation;

/// Sequential identifier assigned to each record.
pub type EventId = u32;

/// Total number of telemetry entries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 64;

/// Why the monitor stopped watching its switch.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DisarmReason {
    /// An operator or configuration change disarmed the monitor.
    Operator,
    /// The monitor closed the switch and disarmed itself.
    Closed,
    /// Setup found the switch already closed.
    SwitchNotOpen,
}

impl DisarmReason {
    const ALL: [DisarmReason; 3] = [
        DisarmReason::Operator,
        DisarmReason::Closed,
        DisarmReason::SwitchNotOpen,
    ];

    const fn index(self) -> u16 {
        match self {
            DisarmReason::Operator => 0,
            DisarmReason::Closed => 1,
            DisarmReason::SwitchNotOpen => 2,
        }
    }
}

impl fmt::Display for DisarmReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DisarmReason::Operator => "operator",
            DisarmReason::Closed => "closed",
            DisarmReason::SwitchNotOpen => "switch-not-open",
        })
    }
}

/// Discriminated monitor events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TelemetryEventKind {
    Armed,
    Disarmed(DisarmReason),
    ConfigDefaulted(ConfigField),
    WindowEntered,
    WindowLost,
    FineStepRequested,
    FineStepReleased,
    CloseIssued,
    Custom(u16),
}

impl fmt::Display for TelemetryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryEventKind::Armed => f.write_str("armed"),
            TelemetryEventKind::Disarmed(reason) => write!(f, "disarmed {reason}"),
            TelemetryEventKind::ConfigDefaulted(field) => {
                write!(f, "config-defaulted {}", field.keyword())
            }
            TelemetryEventKind::WindowEntered => f.write_str("window-entered"),
            TelemetryEventKind::WindowLost => f.write_str("window-lost"),
            TelemetryEventKind::FineStepRequested => f.write_str("fine-step-requested"),
            TelemetryEventKind::FineStepReleased => f.write_str("fine-step-released"),
            TelemetryEventKind::CloseIssued => f.write_str("close-issued"),
            TelemetryEventKind::Custom(code) => write!(f, "custom({code})"),
        }
    }
}

impl TelemetryEventKind {
    const ARMED_CODE: u16 = 0x0001;
    const DISARMED_BASE: u16 = 0x0010;
    const CONFIG_DEFAULTED_BASE: u16 = 0x0020;
    const WINDOW_ENTERED_CODE: u16 = 0x0030;
    const WINDOW_LOST_CODE: u16 = 0x0031;
    const FINE_STEP_REQUESTED_CODE: u16 = 0x0040;
    const FINE_STEP_RELEASED_CODE: u16 = 0x0041;
    const CLOSE_ISSUED_CODE: u16 = 0x0050;

    /// Encodes the event into a compact transport-friendly discriminant.
    #[must_use]
    pub const fn to_raw(self) -> u16 {
        match self {
            TelemetryEventKind::Armed => Self::ARMED_CODE,
            TelemetryEventKind::Disarmed(reason) => Self::DISARMED_BASE + reason.index(),
            TelemetryEventKind::ConfigDefaulted(field) => {
                Self::CONFIG_DEFAULTED_BASE + field_index(field)
            }
            TelemetryEventKind::WindowEntered => Self::WINDOW_ENTERED_CODE,
            TelemetryEventKind::WindowLost => Self::WINDOW_LOST_CODE,
            TelemetryEventKind::FineStepRequested => Self::FINE_STEP_REQUESTED_CODE,
            TelemetryEventKind::FineStepReleased => Self::FINE_STEP_RELEASED_CODE,
            TelemetryEventKind::CloseIssued => Self::CLOSE_ISSUED_CODE,
            TelemetryEventKind::Custom(code) => code,
        }
    }

    /// Decodes a raw discriminant, falling back to [`TelemetryEventKind::Custom`].
    #[must_use]
    pub fn from_raw(code: u16) -> Self {
        match code {
            Self::ARMED_CODE => TelemetryEventKind::Armed,
            Self::WINDOW_ENTERED_CODE => TelemetryEventKind::WindowEntered,
            Self::WINDOW_LOST_CODE => TelemetryEventKind::WindowLost,
            Self::FINE_STEP_REQUESTED_CODE => TelemetryEventKind::FineStepRequested,
            Self::FINE_STEP_RELEASED_CODE => TelemetryEventKind::FineStepReleased,
            Self::CLOSE_ISSUED_CODE => TelemetryEventKind::CloseIssued,
            value if (Self::DISARMED_BASE..Self::CONFIG_DEFAULTED_BASE).contains(&value) => {
                let offset = usize::from(value - Self::DISARMED_BASE);
                DisarmReason::ALL
                    .get(offset)
                    .map_or(TelemetryEventKind::Custom(value), |reason| {
                        TelemetryEventKind::Disarmed(*reason)
                    })
            }
            value if (Self::CONFIG_DEFAULTED_BASE..Self::WINDOW_ENTERED_CODE).contains(&value) => {
                let offset = usize::from(value - Self::CONFIG_DEFAULTED_BASE);
                ALL_FIELDS
                    .get(offset)
                    .map_or(TelemetryEventKind::Custom(value), |field| {
                        TelemetryEventKind::ConfigDefaulted(*field)
                    })
            }
            other => TelemetryEventKind::Custom(other),
        }
    }
}

/// Payloads carried alongside telemetry events.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TelemetryPayload {
    /// No additional metadata accompanies the event.
    None,
    /// Dwell progress at the moment of the event.
    Dwell(DwellTelemetry),
    /// Timing of a compliance window transition.
    Window(WindowTelemetry),
}

impl TelemetryPayload {
    #[must_use]
    pub const fn none() -> Self {
        TelemetryPayload::None
    }
}

/// Dwell accumulator snapshot.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DwellTelemetry {
    pub accumulated: Duration,
    pub period: Duration,
}

impl DwellTelemetry {
    /// Converts second counts, saturating values that do not fit a [`Duration`].
    #[must_use]
    pub fn from_secs(accumulated_sec: f64, period_sec: f64) -> Self {
        Self {
            accumulated: saturating_duration(accumulated_sec),
            period: saturating_duration(period_sec),
        }
    }
}

/// Compliance window transition payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct WindowTelemetry {
    pub elapsed_since_previous: Option<Duration>,
}

/// Telemetry record stored in the ring buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TelemetryRecord<I>
where
    I: Copy,
{
    pub id: EventId,
    pub timestamp: I,
    pub event: TelemetryEventKind,
    pub details: TelemetryPayload,
}

/// Telemetry ring buffer type alias.
pub type TelemetryRing<I, const CAPACITY: usize = TELEMETRY_RING_CAPACITY> =
    HistoryBuf<TelemetryRecord<I>, CAPACITY>;

/// Records monitor events into a fixed-size ring buffer.
pub struct TelemetryRecorder<I, const CAPACITY: usize = TELEMETRY_RING_CAPACITY>
where
    I: Copy,
{
    ring: TelemetryRing<I, CAPACITY>,
    last_window_transition_at: Option<I>,
    next_event_id: EventId,
}

impl<I, const CAPACITY: usize> TelemetryRecorder<I, CAPACITY>
where
    I: SimInstant,
{
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            last_window_transition_at: None,
            next_event_id: 0,
        }
    }

    /// Iterates the recorded telemetry in chronological order.
    pub fn oldest_first(&self) -> impl Iterator<Item = &TelemetryRecord<I>> + '_ {
        self.ring.oldest_ordered()
    }

    /// Returns the most recent telemetry record, if available.
    pub fn latest(&self) -> Option<&TelemetryRecord<I>> {
        self.ring.recent()
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn record_armed(&mut self, timestamp: I) -> EventId {
        self.record(
            TelemetryEventKind::Armed,
            TelemetryPayload::none(),
            timestamp,
        )
    }

    pub fn record_disarmed(&mut self, reason: DisarmReason, timestamp: I) -> EventId {
        self.last_window_transition_at = None;
        self.record(
            TelemetryEventKind::Disarmed(reason),
            TelemetryPayload::none(),
            timestamp,
        )
    }

    pub fn record_defaulted(&mut self, field: ConfigField, timestamp: I) -> EventId {
        self.record(
            TelemetryEventKind::ConfigDefaulted(field),
            TelemetryPayload::none(),
            timestamp,
        )
    }

    /// Records entry into or exit from the strict window along with the time
    /// spent in the previous state.
    pub fn record_window_transition(&mut self, entered: bool, timestamp: I) -> EventId {
        let elapsed = self
            .last_window_transition_at
            .map(|previous| timestamp.saturating_duration_since(previous));
        self.last_window_transition_at = Some(timestamp);

        let event = if entered {
            TelemetryEventKind::WindowEntered
        } else {
            TelemetryEventKind::WindowLost
        };
        self.record(
            event,
            TelemetryPayload::Window(WindowTelemetry {
                elapsed_since_previous: elapsed,
            }),
            timestamp,
        )
    }

    pub fn record_step_change(
        &mut self,
        recommendation: StepRecommendation,
        timestamp: I,
    ) -> EventId {
        let event = match recommendation {
            StepRecommendation::RequestFineStep => TelemetryEventKind::FineStepRequested,
            StepRecommendation::StayEventDriven => TelemetryEventKind::FineStepReleased,
        };
        self.record(event, TelemetryPayload::none(), timestamp)
    }

    pub fn record_close(&mut self, dwell: DwellTelemetry, timestamp: I) -> EventId {
        self.record(
            TelemetryEventKind::CloseIssued,
            TelemetryPayload::Dwell(dwell),
            timestamp,
        )
    }

    /// Records an arbitrary telemetry event with the supplied payload.
    pub fn record(
        &mut self,
        event: TelemetryEventKind,
        payload: TelemetryPayload,
        timestamp: I,
    ) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);

        self.ring.write(TelemetryRecord {
            id,
            timestamp,
            event,
            details: payload,
        });

        id
    }
}

impl<I, const CAPACITY: usize> Default for TelemetryRecorder<I, CAPACITY>
where
    I: SimInstant,
{
    fn default() -> Self {
        Self::new()
    }
}

fn saturating_duration(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(if secs > 0.0 {
        Duration::MAX
    } else {
        Duration::ZERO
    })
}

const fn field_index(field: ConfigField) -> u16 {
    match field {
        ConfigField::Armed => 0,
        ConfigField::FrequencyTolerance => 1,
        ConfigField::VoltageTolerance => 2,
        ConfigField::VoltageMagnitudeTolerance => 3,
        ConfigField::VoltageAngleTolerance => 4,
        ConfigField::MetricsPeriod => 5,
        ConfigField::VoltCompareMode => 6,
        ConfigField::TriggerMultiplier => 7,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    #[test]
    fn event_codes_round_trip() {
        let fixtures = [
            TelemetryEventKind::Armed,
            TelemetryEventKind::Disarmed(DisarmReason::Operator),
            TelemetryEventKind::Disarmed(DisarmReason::SwitchNotOpen),
            TelemetryEventKind::ConfigDefaulted(ConfigField::FrequencyTolerance),
            TelemetryEventKind::ConfigDefaulted(ConfigField::TriggerMultiplier),
            TelemetryEventKind::WindowEntered,
            TelemetryEventKind::WindowLost,
            TelemetryEventKind::FineStepRequested,
            TelemetryEventKind::FineStepReleased,
            TelemetryEventKind::CloseIssued,
        ];

        for event in fixtures {
            assert_eq!(TelemetryEventKind::from_raw(event.to_raw()), event);
        }
    }

    #[test]
    fn unknown_codes_decode_as_custom() {
        assert_eq!(
            TelemetryEventKind::from_raw(0x0013),
            TelemetryEventKind::Custom(0x0013)
        );
        assert_eq!(
            TelemetryEventKind::from_raw(0x0028),
            TelemetryEventKind::Custom(0x0028)
        );
        assert_eq!(TelemetryEventKind::Custom(0xBEEF).to_raw(), 0xBEEF);
    }

    #[test]
    fn window_transitions_capture_elapsed_time() {
        let mut recorder = TelemetryRecorder::<Duration>::new();

        let first = recorder.record_window_transition(true, at(1_000));
        assert_eq!(first, 0);
        match recorder.latest().map(|record| record.details) {
            Some(TelemetryPayload::Window(details)) => {
                assert_eq!(details.elapsed_since_previous, None);
            }
            other => panic!("expected window payload, got {other:?}"),
        }

        recorder.record_window_transition(false, at(3_250));
        let latest = recorder.latest().copied().expect("record stored");
        assert_eq!(latest.event, TelemetryEventKind::WindowLost);
        match latest.details {
            TelemetryPayload::Window(details) => {
                assert_eq!(details.elapsed_since_previous, Some(at(2_250)));
            }
            other => panic!("expected window payload, got {other:?}"),
        }
    }

    #[test]
    fn disarm_restarts_window_timing() {
        let mut recorder = TelemetryRecorder::<Duration>::new();
        recorder.record_window_transition(true, at(0));
        recorder.record_disarmed(DisarmReason::Operator, at(500));
        recorder.record_window_transition(true, at(900));

        match recorder.latest().map(|record| record.details) {
            Some(TelemetryPayload::Window(details)) => {
                assert_eq!(details.elapsed_since_previous, None);
            }
            other => panic!("expected window payload, got {other:?}"),
        }
    }

    #[test]
    fn ring_keeps_most_recent_records_in_order() {
        let mut recorder = TelemetryRecorder::<Duration, 4>::new();
        for step in 0..6 {
            recorder.record_step_change(StepRecommendation::RequestFineStep, at(step));
        }

        assert_eq!(recorder.len(), 4);
        let ids: heapless::Vec<EventId, 4> =
            recorder.oldest_first().map(|record| record.id).collect();
        assert_eq!(ids.as_slice(), &[2, 3, 4, 5]);
    }

    #[test]
    fn close_payload_converts_seconds() {
        let dwell = DwellTelemetry::from_secs(2.0, 1.5);
        assert_eq!(dwell.accumulated, Duration::from_secs(2));
        assert_eq!(dwell.period, Duration::from_millis(1_500));

        let clamped = DwellTelemetry::from_secs(-1.0, f64::INFINITY);
        assert_eq!(clamped.accumulated, Duration::ZERO);
        assert_eq!(clamped.period, Duration::MAX);
    }
}
