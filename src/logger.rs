//! # Injectable logger.
//!
//! [`Logger`] is what user code receives under the inbuilt `$logger`
//! identity. Every record is forwarded to `tracing` (the embedding
//! application decides where it goes) and kept in a bounded buffer of recent
//! records, which debugging code can drain with [`Logger::recent_logs`].
//!
//! ```text
//! info("listening") ─► tracing::info!(target: "taskscope::logger", ...)
//!                  └─► [ring buffer, capacity N] ─► recent_logs() drains
//! ```

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::core::queue::Queue;

/// Severity of a logged record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Plain log line.
    Log,
    /// Informational.
    Info,
    /// Something looks wrong but work continues.
    Warn,
    /// A failure.
    Error,
}

impl Level {
    /// Returns a short stable label (lowercase).
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Log => "log",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        }
    }
}

/// One retained record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Severity.
    pub level: Level,
    /// Rendered message.
    pub message: String,
}

struct Buffer {
    records: Queue<LogRecord>,
    capacity: usize,
}

/// Logger handle; clones share the same buffer.
#[derive(Clone)]
pub struct Logger {
    buffer: Rc<RefCell<Buffer>>,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("retained", &self.buffer.borrow().records.len())
            .finish()
    }
}

impl Logger {
    /// Creates a logger retaining at most `capacity` records (min 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buffer: Rc::new(RefCell::new(Buffer {
                records: Queue::with_capacity(capacity.min(64)),
                capacity,
            })),
        }
    }

    /// Logs a plain line.
    pub fn log(&self, message: impl fmt::Display) {
        self.record(Level::Log, message.to_string());
    }

    /// Logs an informational line.
    pub fn info(&self, message: impl fmt::Display) {
        self.record(Level::Info, message.to_string());
    }

    /// Logs a warning.
    pub fn warn(&self, message: impl fmt::Display) {
        self.record(Level::Warn, message.to_string());
    }

    /// Logs an error.
    pub fn error(&self, message: impl fmt::Display) {
        self.record(Level::Error, message.to_string());
    }

    /// Takes every retained record, oldest first. The buffer is empty afterwards.
    pub fn recent_logs(&self) -> Vec<LogRecord> {
        let mut buffer = self.buffer.borrow_mut();
        let mut out = Vec::with_capacity(buffer.records.len());
        while let Some(record) = buffer.records.shift() {
            out.push(record);
        }
        out
    }

    fn record(&self, level: Level, message: String) {
        match level {
            Level::Log | Level::Info => tracing::info!(target: "taskscope::logger", "{message}"),
            Level::Warn => tracing::warn!(target: "taskscope::logger", "{message}"),
            Level::Error => tracing::error!(target: "taskscope::logger", "{message}"),
        }
        let mut buffer = self.buffer.borrow_mut();
        buffer.records.push(LogRecord { level, message });
        if buffer.records.len() > buffer.capacity {
            buffer.records.shift();
        }
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new(1024)
    }
}
