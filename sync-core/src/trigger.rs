//! Fine-step escalation requests for the host scheduler.
//!
//! The controller only ever asserts a need for fine stepping. Arbitration
//! between multiple requesters belongs to the scheduler.

use core::fmt;
use core::time::Duration;

use crate::clock::SimInstant;
use crate::config::{ConfigWarning, ConfigWarnings, note_warning};

/// Step-size recommendation returned from every evaluation entry point.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum StepRecommendation {
    #[default]
    StayEventDriven,
    RequestFineStep,
}

impl StepRecommendation {
    #[must_use]
    pub const fn is_fine(self) -> bool {
        matches!(self, StepRecommendation::RequestFineStep)
    }
}

impl fmt::Display for StepRecommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StepRecommendation::StayEventDriven => "event-driven",
            StepRecommendation::RequestFineStep => "fine-step",
        })
    }
}

/// Where a fine-step invocation sits in the host's sub-step protocol.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FinePass {
    /// Solver iteration within the current sub-step.
    pub iteration: u32,
    /// `true` for the pass that runs after the solver has updated the buses.
    pub post_update: bool,
}

impl FinePass {
    /// The single pass per sub-step on which the monitor evaluates.
    pub const EVALUATE: Self = Self {
        iteration: 0,
        post_update: false,
    };

    #[must_use]
    pub const fn evaluates(self) -> bool {
        self.iteration == 0 && !self.post_update
    }
}

/// Tracks the relaxed-band verdict and the coarse evaluation cadence.
#[derive(Copy, Clone, Debug)]
pub struct StepModeController<I> {
    capable: bool,
    interval: Duration,
    next_update: I,
    requested: bool,
}

impl<I: SimInstant> StepModeController<I> {
    /// A controller whose first coarse evaluation is due at `now`.
    #[must_use]
    pub fn new(capable: bool, interval: Duration, now: I) -> Self {
        Self {
            capable,
            interval,
            next_update: now,
            requested: false,
        }
    }

    /// Returns `true` and schedules the next slot when a coarse evaluation is due.
    pub fn coarse_due(&mut self, now: I) -> bool {
        if now < self.next_update {
            return false;
        }
        self.next_update = now + self.interval;
        true
    }

    /// Feeds the relaxed-band verdict and returns the resulting recommendation.
    pub fn update(&mut self, relaxed_pass: bool) -> StepRecommendation {
        self.requested = self.capable && relaxed_pass;
        self.recommendation()
    }

    /// Drops any outstanding fine-step request.
    pub fn release(&mut self) {
        self.requested = false;
    }

    #[must_use]
    pub const fn recommendation(&self) -> StepRecommendation {
        if self.requested {
            StepRecommendation::RequestFineStep
        } else {
            StepRecommendation::StayEventDriven
        }
    }

    #[must_use]
    pub const fn is_capable(&self) -> bool {
        self.capable
    }

    #[must_use]
    pub const fn next_update(&self) -> I {
        self.next_update
    }
}

/// Decides whether this monitor participates in fine stepping.
///
/// Participation needs both the host and the monitor to opt in. A one-sided
/// opt-in is reported as a warning and treated as non-participation.
pub fn resolve_registration(
    host_enabled: bool,
    monitor_inclusive: bool,
    warnings: &mut ConfigWarnings,
) -> bool {
    match (host_enabled, monitor_inclusive) {
        (true, true) => true,
        (true, false) => {
            note_warning(warnings, ConfigWarning::FineStepModuleOnly);
            false
        }
        (false, true) => {
            note_warning(warnings, ConfigWarning::FineStepObjectOnly);
            false
        }
        (false, false) => false,
    }
}
