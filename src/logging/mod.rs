//! Leveled logging sink used for child output and supervisor diagnostics.
//!
//! The supervisor never reaches for a global registry. It asks a
//! [`LoggerFactory`] for two named [`Logger`] handles when it is built and
//! writes to those for the rest of its life.

mod memory;
mod tracing_sink;

use std::fmt;
use std::sync::Arc;

pub use memory::*;
pub use tracing_sink::*;

use crate::classify::Level;

/// Error type for log sinks.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// The sink can no longer accept records.
    #[error("Log sink unavailable: {0}")]
    Unavailable(String),
    /// A single record could not be written.
    #[error("Failed to write log record: {0}")]
    Write(String),
}

/// Extra key/value pairs attached to a record.
pub type Attributes<'a> = &'a [(&'a str, &'a str)];

/// A named, leveled logging channel.
pub trait Logger: Send + Sync {
    /// Name this logger was obtained under.
    fn name(&self) -> &str;

    /// Write one record.
    ///
    /// # Errors
    ///
    /// Returns `SinkError` if the record could not be written.
    fn log(
        &self,
        level: Level,
        message: &str,
        attributes: Attributes<'_>,
    ) -> Result<(), SinkError>;

    /// Write a `debug` record.
    ///
    /// # Errors
    ///
    /// See [`Logger::log`].
    fn debug(&self, message: &str, attributes: Attributes<'_>) -> Result<(), SinkError> {
        self.log(Level::Debug, message, attributes)
    }

    /// Write an `info` record.
    ///
    /// # Errors
    ///
    /// See [`Logger::log`].
    fn info(&self, message: &str, attributes: Attributes<'_>) -> Result<(), SinkError> {
        self.log(Level::Info, message, attributes)
    }

    /// Write a `warning` record.
    ///
    /// # Errors
    ///
    /// See [`Logger::log`].
    fn warning(&self, message: &str, attributes: Attributes<'_>) -> Result<(), SinkError> {
        self.log(Level::Warning, message, attributes)
    }

    /// Write an `error` record.
    ///
    /// # Errors
    ///
    /// See [`Logger::log`].
    fn error(&self, message: &str, attributes: Attributes<'_>) -> Result<(), SinkError> {
        self.log(Level::Error, message, attributes)
    }

    /// Write a `critical` record.
    ///
    /// # Errors
    ///
    /// See [`Logger::log`].
    fn critical(&self, message: &str, attributes: Attributes<'_>) -> Result<(), SinkError> {
        self.log(Level::Critical, message, attributes)
    }
}

/// Hands out named loggers.
pub trait LoggerFactory: Send + Sync {
    /// Get the logger registered under `name`.
    fn logger(&self, name: &str) -> Arc<dyn Logger>;
}

/// Logger that drops every record.
#[derive(Debug, Clone)]
pub struct NullLogger {
    name: String,
}

impl NullLogger {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Logger for NullLogger {
    fn name(&self) -> &str {
        &self.name
    }

    fn log(
        &self,
        _level: Level,
        _message: &str,
        _attributes: Attributes<'_>,
    ) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Factory for [`NullLogger`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLoggers;

impl LoggerFactory for NullLoggers {
    fn logger(&self, name: &str) -> Arc<dyn Logger> {
        Arc::new(NullLogger::new(name))
    }
}

/// Renders attributes as `key="value"` pairs separated by spaces.
pub struct DisplayAttributes<'a>(pub Attributes<'a>);

impl fmt::Display for DisplayAttributes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{key}={value:?}")?;
        }
        Ok(())
    }
}
