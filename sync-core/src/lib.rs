#![no_std]

#[cfg(feature = "alloc")]
extern crate alloc;

// Synchronization-check logic for an open tie switch between two network islands.
//
// The crate stays portable across embedded relays and host simulators by avoiding
// the Rust standard library. Hosts supply bus measurements and the switch device
// through the traits in [`measurement`] and [`monitor`].

pub(crate) mod fmt;

pub mod clock;
pub mod config;
pub mod dwell;
pub mod measurement;
pub mod metric;
pub mod monitor;
pub mod repl;
pub mod telemetry;
pub mod trigger;

pub use config::{ConfigWarning, MetricMode, SetupError, SystemSettings, ToleranceConfig};
pub use monitor::{MonitorError, SwitchSite, SwitchStatus, SyncMonitor, SyncState};
pub use trigger::StepRecommendation;
