//! High-level console command dispatcher.
//!
//! This module glues parsed grammar output to a [`MonitorControl`] host. It
//! stays `no_std` friendly so the core tests and the emulator share the same
//! implementation.

use core::fmt;
use core::time::Duration;

use crate::config::{ConfigField, ConfigWarnings, Setting};

use super::grammar::{self, Command};

/// Longest span a single `run` command may advance the simulation.
pub const MAX_RUN_DURATION: Duration = Duration::from_secs(3600);

/// Command execution successes.
#[derive(Clone, Debug, PartialEq)]
pub enum CommandOutcome<'a> {
    Armed,
    Disarmed,
    Updated {
        property: ConfigField,
        warnings: ConfigWarnings,
    },
    Advanced {
        duration: Duration,
    },
    Status,
    Help {
        topic: Option<&'a str>,
    },
}

/// Errors surfaced while executing a command.
#[derive(Debug, PartialEq)]
pub enum CommandError<'a, E> {
    Parse(grammar::ParseError<'a>),
    Unsupported(&'static str),
    Rejected(E),
}

impl<'a, E> From<grammar::ParseError<'a>> for CommandError<'a, E> {
    fn from(error: grammar::ParseError<'a>) -> Self {
        Self::Parse(error)
    }
}

impl<E: fmt::Display> fmt::Display for CommandError<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Parse(err) => write!(f, "parse error: {err}"),
            CommandError::Unsupported(what) => write!(f, "unsupported: {what}"),
            CommandError::Rejected(err) => write!(f, "rejected: {err}"),
        }
    }
}

type CommandResult<'a, C> =
    Result<CommandOutcome<'a>, CommandError<'a, <C as MonitorControl>::Error>>;

/// Operations a console host exposes over its monitor.
pub trait MonitorControl {
    type Error;

    /// Arms the monitor.
    ///
    /// # Errors
    ///
    /// Returns the host error when arming is refused.
    fn arm(&mut self) -> Result<(), Self::Error>;

    fn disarm(&mut self);

    /// Applies a single configuration setting.
    ///
    /// # Errors
    ///
    /// Returns the host error when the setting is rejected.
    fn apply(&mut self, setting: Setting) -> Result<ConfigWarnings, Self::Error>;

    /// Advances simulated time by `duration`.
    ///
    /// # Errors
    ///
    /// Returns the host error when the simulation cannot progress.
    fn advance(&mut self, duration: Duration) -> Result<(), Self::Error>;
}

/// Dispatches console commands into a [`MonitorControl`] host.
pub struct CommandExecutor<C> {
    control: C,
}

impl<C> CommandExecutor<C> {
    /// Creates a new executor around the provided host.
    pub const fn new(control: C) -> Self {
        Self { control }
    }

    #[must_use]
    pub fn control(&self) -> &C {
        &self.control
    }

    pub fn control_mut(&mut self) -> &mut C {
        &mut self.control
    }

    /// Consumes the executor and yields the inner host.
    pub fn into_inner(self) -> C {
        self.control
    }
}

impl<C> CommandExecutor<C>
where
    C: MonitorControl,
{
    /// Parses and executes a console command.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Parse`] for malformed input,
    /// [`CommandError::Unsupported`] for out-of-range arguments, and
    /// [`CommandError::Rejected`] when the host refuses the request.
    pub fn execute<'a>(&mut self, line: &'a str) -> CommandResult<'a, C> {
        let command = grammar::parse(line)?;
        self.dispatch(command)
    }

    /// Executes an already parsed command.
    ///
    /// # Errors
    ///
    /// See [`CommandExecutor::execute`].
    pub fn dispatch<'a>(&mut self, command: Command<'a>) -> CommandResult<'a, C> {
        match command {
            Command::Arm => self
                .control
                .arm()
                .map(|()| CommandOutcome::Armed)
                .map_err(CommandError::Rejected),
            Command::Disarm => {
                self.control.disarm();
                Ok(CommandOutcome::Disarmed)
            }
            Command::Set(setting) => {
                let property = setting.field();
                self.control
                    .apply(setting)
                    .map(|warnings| CommandOutcome::Updated { property, warnings })
                    .map_err(CommandError::Rejected)
            }
            Command::Run(duration) => {
                if duration.is_zero() {
                    return Err(CommandError::Unsupported("run duration must be positive"));
                }
                if duration > MAX_RUN_DURATION {
                    return Err(CommandError::Unsupported("run duration exceeds 3600s"));
                }
                self.control
                    .advance(duration)
                    .map(|()| CommandOutcome::Advanced { duration })
                    .map_err(CommandError::Rejected)
            }
            Command::Status => Ok(CommandOutcome::Status),
            Command::Help(help) => Ok(CommandOutcome::Help { topic: help.topic }),
        }
    }
}
