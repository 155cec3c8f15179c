//! Mixed coarse/fine step scheduler for the emulated solver.
//!
//! Coarse steps follow the monitor's trigger interval. While the monitor
//! requests fine stepping the scheduler switches to fixed sub-steps and runs
//! both passes of each sub-step.

use std::time::Duration;

use sync_core::monitor::MonitorError;
use sync_core::trigger::FinePass;
use sync_core::{StepRecommendation, SwitchSite, SwitchStatus, SyncMonitor};

use crate::grid::{BreakerFault, IslandGrid};

pub const FINE_STEP: Duration = Duration::from_millis(10);

/// Notable transitions observed while advancing time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StepEvent {
    FineStepEntered { at: Duration, slip_hz: f64 },
    FineStepLeft { at: Duration },
    SwitchClosed { at: Duration, separation_deg: f64 },
}

pub struct StepScheduler {
    coarse_step: Duration,
    now: Duration,
    mode: StepRecommendation,
    coarse_steps: u64,
    fine_steps: u64,
}

impl StepScheduler {
    pub fn new(coarse_step: Duration) -> Self {
        Self {
            coarse_step,
            now: Duration::ZERO,
            mode: StepRecommendation::StayEventDriven,
            coarse_steps: 0,
            fine_steps: 0,
        }
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn mode(&self) -> StepRecommendation {
        self.mode
    }

    pub fn step_counts(&self) -> (u64, u64) {
        (self.coarse_steps, self.fine_steps)
    }

    /// Runs the solver loop until `duration` of simulated time has passed.
    pub fn advance(
        &mut self,
        duration: Duration,
        grid: &mut IslandGrid,
        monitor: &mut SyncMonitor<Duration>,
        events: &mut Vec<StepEvent>,
    ) -> Result<(), MonitorError<BreakerFault>> {
        let end = self.now + duration;
        while self.now < end {
            let was_open = grid.status() == SwitchStatus::Open;
            let recommendation = if self.mode.is_fine() {
                self.fine_step(end, grid, monitor)?
            } else {
                self.coarse_step(end, grid, monitor)?
            };

            if was_open && grid.status() == SwitchStatus::Closed {
                events.push(StepEvent::SwitchClosed {
                    at: self.now,
                    separation_deg: grid.separation_deg(),
                });
            }

            if recommendation != self.mode {
                events.push(match recommendation {
                    StepRecommendation::RequestFineStep => StepEvent::FineStepEntered {
                        at: self.now,
                        slip_hz: grid.islanded().frequency_hz - grid.reference().frequency_hz,
                    },
                    StepRecommendation::StayEventDriven => {
                        StepEvent::FineStepLeft { at: self.now }
                    }
                });
                self.mode = recommendation;
            }
        }
        Ok(())
    }

    fn coarse_step(
        &mut self,
        end: Duration,
        grid: &mut IslandGrid,
        monitor: &mut SyncMonitor<Duration>,
    ) -> Result<StepRecommendation, MonitorError<BreakerFault>> {
        let phase = self.now.as_nanos() % self.coarse_step.as_nanos();
        let to_boundary = self.coarse_step - Duration::from_nanos(u64::try_from(phase).unwrap_or(0));
        let dt = to_boundary.min(end - self.now);

        grid.advance(dt);
        self.now += dt;
        self.coarse_steps += 1;
        monitor.coarse_step(grid, self.now)
    }

    fn fine_step(
        &mut self,
        end: Duration,
        grid: &mut IslandGrid,
        monitor: &mut SyncMonitor<Duration>,
    ) -> Result<StepRecommendation, MonitorError<BreakerFault>> {
        let dt = FINE_STEP.min(end - self.now);
        grid.advance(dt);
        self.now += dt;
        self.fine_steps += 1;

        let recommendation = monitor.fine_step(grid, self.now, FinePass::EVALUATE)?;
        let post = FinePass {
            iteration: 0,
            post_update: true,
        };
        monitor.fine_step(grid, self.now, post)?;
        Ok(recommendation)
    }
}
