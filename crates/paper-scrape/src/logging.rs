//! Log sink used by callers around pipeline invocations.

use std::sync::{Mutex, PoisonError};

/// Severity of a [`LogEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// One reportable event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub level: LogLevel,
    pub message: String,
    /// Rendered error, if the event reports a failure.
    pub error: Option<String>,
    /// Whether the user should see this event.
    pub notify_user: bool,
    /// Component that produced the event.
    pub source_tag: String,
}

impl LogEvent {
    #[must_use]
    pub fn info(message: impl Into<String>, source_tag: impl Into<String>) -> Self {
        Self {
            level: LogLevel::Info,
            message: message.into(),
            error: None,
            notify_user: false,
            source_tag: source_tag.into(),
        }
    }

    #[must_use]
    pub fn error(
        message: impl Into<String>,
        error: &dyn std::error::Error,
        source_tag: impl Into<String>,
    ) -> Self {
        Self {
            level: LogLevel::Error,
            message: message.into(),
            error: Some(error.to_string()),
            notify_user: true,
            source_tag: source_tag.into(),
        }
    }

    #[must_use]
    pub fn warn(message: impl Into<String>, source_tag: impl Into<String>) -> Self {
        Self { level: LogLevel::Warn, ..Self::info(message, source_tag) }
    }
}

/// Receiver of log events.
pub trait LogSink: Send + Sync {
    fn log(&self, event: LogEvent);
}

/// Forwards events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, event: LogEvent) {
        let LogEvent { level, message, error, notify_user, source_tag } = event;
        match level {
            LogLevel::Info => {
                tracing::info!(source = %source_tag, notify_user, "{message}");
            }
            LogLevel::Warn => {
                tracing::warn!(source = %source_tag, notify_user, error = ?error, "{message}");
            }
            LogLevel::Error => {
                tracing::error!(source = %source_tag, notify_user, error = ?error, "{message}");
            }
        }
    }
}

/// Keeps every event in memory; useful for embedding hosts and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<LogEvent>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<LogEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl LogSink for MemorySink {
    fn log(&self, event: LogEvent) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).push(event);
    }
}
