//! Supervisor error types.

use crate::classify::ClassifyError;
use crate::logging::SinkError;
use crate::process::{CharsetError, OptionError, SpawnError};

/// Errors returned by [`Supervisor`](super::Supervisor) construction and runs.
#[derive(thiserror::Error, Debug)]
pub enum SupervisorError {
    /// The name collides with the supervisor's own diagnostic logger.
    #[error("Illegal supervisor name: {0}")]
    ReservedName(String),

    /// The name is empty.
    #[error("Supervisor name must not be empty")]
    EmptyName,

    /// The charset cannot be used for line decoding.
    #[error(transparent)]
    Charset(#[from] CharsetError),

    /// The command has no program.
    #[error("Command is empty")]
    EmptyCommand,

    /// A process option is forbidden or malformed.
    #[error(transparent)]
    Option(#[from] OptionError),

    /// The child process could not be started.
    #[error(transparent)]
    Spawn(#[from] SpawnError),
}

impl SupervisorError {
    /// True for errors raised before any process was started.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        !matches!(self, Self::Spawn(_))
    }
}

/// Failure to classify or log one line of child output.
///
/// Never returned from a run; the supervisor logs it and keeps reading.
#[derive(thiserror::Error, Debug)]
pub enum LineError {
    #[error(transparent)]
    Classify(#[from] ClassifyError),
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error("Classifier panicked: {0}")]
    Panicked(String),
}
