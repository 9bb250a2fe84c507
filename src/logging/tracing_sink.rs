//! Logger backed by `tracing`.

use std::sync::Arc;

use crate::classify::Level;
use crate::supervisor::SUPERVISOR_LOGGER;

use super::{Attributes, DisplayAttributes, Logger, LoggerFactory, SinkError};

/// Target of events from child loggers.
pub const CHILD_TARGET: &str = "kiddo::child";

/// Target of events from the supervisor's diagnostic logger.
pub const SUPERVISOR_TARGET: &str = "kiddo::supervisor";

macro_rules! event_at {
    ($level:expr, $($rest:tt)+) => {
        match $level {
            Level::Debug => tracing::debug!($($rest)+),
            Level::Info => tracing::info!($($rest)+),
            Level::Warning => tracing::warn!($($rest)+),
            Level::Error | Level::Critical => tracing::error!($($rest)+),
        }
    };
}

macro_rules! emit {
    ($target:expr, $level:expr, $logger:expr, $message:expr, $attributes:expr) => {
        if $attributes.is_empty() {
            event_at!(
                $level,
                target: $target,
                logger = %$logger,
                severity = %$level,
                "{}",
                $message
            );
        } else {
            event_at!(
                $level,
                target: $target,
                logger = %$logger,
                severity = %$level,
                attributes = %DisplayAttributes($attributes),
                "{}",
                $message
            );
        }
    };
}

/// Logger that turns each record into a `tracing` event.
///
/// The logger named [`SUPERVISOR_LOGGER`] emits under [`SUPERVISOR_TARGET`],
/// every other logger under [`CHILD_TARGET`]. `critical` has no `tracing`
/// counterpart; it is emitted at `ERROR` with `severity = "critical"`. With
/// no subscriber installed every call is a no-op.
#[derive(Debug, Clone)]
pub struct TracingLogger {
    name: String,
    diagnostic: bool,
}

impl TracingLogger {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let diagnostic = name == SUPERVISOR_LOGGER;
        Self { name, diagnostic }
    }

    /// Target this logger's events are emitted under.
    #[must_use]
    pub fn target(&self) -> &'static str {
        if self.diagnostic {
            SUPERVISOR_TARGET
        } else {
            CHILD_TARGET
        }
    }
}

impl Logger for TracingLogger {
    fn name(&self) -> &str {
        &self.name
    }

    fn log(
        &self,
        level: Level,
        message: &str,
        attributes: Attributes<'_>,
    ) -> Result<(), SinkError> {
        if self.diagnostic {
            emit!(SUPERVISOR_TARGET, level, self.name, message, attributes);
        } else {
            emit!(CHILD_TARGET, level, self.name, message, attributes);
        }
        Ok(())
    }
}

/// Default factory: every logger writes to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLoggers;

impl LoggerFactory for TracingLoggers {
    fn logger(&self, name: &str) -> Arc<dyn Logger> {
        Arc::new(TracingLogger::new(name))
    }
}
