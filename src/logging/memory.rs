//! In-memory log capture.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::classify::Level;

use super::{Attributes, Logger, LoggerFactory, SinkError};

/// A record captured by [`MemoryLoggers`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub logger: String,
    pub level: Level,
    pub message: String,
    pub attributes: Vec<(String, String)>,
    pub timestamp: DateTime<Utc>,
}

impl LogRecord {
    /// Look up an attribute by key.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug)]
struct Buffer {
    records: VecDeque<LogRecord>,
    capacity: Option<usize>,
}

/// Factory whose loggers all append to one shared buffer.
///
/// Clones share the buffer, so a test can keep one handle and pass another
/// to the supervisor.
#[derive(Debug, Clone)]
pub struct MemoryLoggers {
    buffer: Arc<Mutex<Buffer>>,
}

impl MemoryLoggers {
    /// Unbounded buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::from_buffer(None)
    }

    /// Buffer holding at most `capacity` records; the oldest are dropped first.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self::from_buffer(Some(capacity))
    }

    fn from_buffer(capacity: Option<usize>) -> Self {
        Self {
            buffer: Arc::new(Mutex::new(Buffer {
                records: VecDeque::new(),
                capacity,
            })),
        }
    }

    /// Snapshot of every captured record, oldest first.
    #[must_use]
    pub fn records(&self) -> Vec<LogRecord> {
        let buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        buffer.records.iter().cloned().collect()
    }

    /// Records written through the logger named `name`.
    #[must_use]
    pub fn records_for(&self, name: &str) -> Vec<LogRecord> {
        let buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        buffer
            .records
            .iter()
            .filter(|r| r.logger == name)
            .cloned()
            .collect()
    }

    /// Most recent record written through the logger named `name`.
    #[must_use]
    pub fn last_for(&self, name: &str) -> Option<LogRecord> {
        let buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        buffer.records.iter().rev().find(|r| r.logger == name).cloned()
    }

    /// Drop every captured record.
    pub fn clear(&self) {
        let mut buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        buffer.records.clear();
    }
}

impl Default for MemoryLoggers {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggerFactory for MemoryLoggers {
    fn logger(&self, name: &str) -> Arc<dyn Logger> {
        Arc::new(MemoryLogger {
            name: name.to_string(),
            buffer: Arc::clone(&self.buffer),
        })
    }
}

/// Logger handed out by [`MemoryLoggers`].
#[derive(Debug, Clone)]
pub struct MemoryLogger {
    name: String,
    buffer: Arc<Mutex<Buffer>>,
}

impl Logger for MemoryLogger {
    fn name(&self) -> &str {
        &self.name
    }

    fn log(
        &self,
        level: Level,
        message: &str,
        attributes: Attributes<'_>,
    ) -> Result<(), SinkError> {
        let mut buffer = self
            .buffer
            .lock()
            .map_err(|_| SinkError::Unavailable("memory buffer poisoned".to_string()))?;

        if buffer.capacity == Some(0) {
            return Ok(());
        }
        if let Some(capacity) = buffer.capacity {
            while buffer.records.len() >= capacity {
                buffer.records.pop_front();
            }
        }

        buffer.records.push_back(LogRecord {
            logger: self.name.clone(),
            level,
            message: message.to_string(),
            attributes: attributes
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            timestamp: Utc::now(),
        });
        Ok(())
    }
}
