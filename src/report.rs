//! Run logging
//!
//! Components never log through a global handle. A `RunLog` is created once
//! per run and handed to every processor's constructor.

use serde::Serialize;
use std::sync::Mutex;

/// Severity of a run log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

/// Leveled message sink threaded through the pipeline
pub trait RunLog {
    fn log(&self, level: Level, message: &str);

    fn debug(&self, message: &str) {
        self.log(Level::Debug, message);
    }

    fn info(&self, message: &str) {
        self.log(Level::Info, message);
    }

    fn warn(&self, message: &str) {
        self.log(Level::Warn, message);
    }

    fn error(&self, message: &str) {
        self.log(Level::Error, message);
    }
}

/// Forwards entries to the `tracing` macros
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLog;

impl RunLog for TracingLog {
    fn log(&self, level: Level, message: &str) {
        match level {
            Level::Debug => tracing::debug!("{}", message),
            Level::Info => tracing::info!("{}", message),
            Level::Warn => tracing::warn!("{}", message),
            Level::Error => tracing::error!("{}", message),
        }
    }
}

/// A captured log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub level: Level,
    pub message: String,
}

/// Keeps entries in memory, optionally forwarding them to another sink
#[derive(Default)]
pub struct MemoryLog<'a> {
    entries: Mutex<Vec<LogEntry>>,
    forward: Option<&'a dyn RunLog>,
}

impl<'a> MemoryLog<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture entries and also pass them on to `inner`
    pub fn forwarding(inner: &'a dyn RunLog) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            forward: Some(inner),
        }
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Messages logged at exactly `level`
    pub fn messages(&self, level: Level) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|e| e.level == level)
            .map(|e| e.message)
            .collect()
    }
}

impl RunLog for MemoryLog<'_> {
    fn log(&self, level: Level, message: &str) {
        let entry = LogEntry {
            level,
            message: message.to_string(),
        };
        match self.entries.lock() {
            Ok(mut entries) => entries.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
        if let Some(inner) = self.forward {
            inner.log(level, message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_log_captures_levels() {
        let log = MemoryLog::new();
        log.debug("loading");
        log.warn("file_name_50 is missing");
        log.error("boom");

        assert_eq!(log.entries().len(), 3);
        assert_eq!(log.messages(Level::Warn), vec!["file_name_50 is missing".to_string()]);
        assert!(log.messages(Level::Info).is_empty());
    }

    #[test]
    fn test_memory_log_forwards() {
        let inner = MemoryLog::new();
        {
            let outer = MemoryLog::forwarding(&inner);
            outer.info("hello");
            assert_eq!(outer.entries().len(), 1);
        }
        assert_eq!(inner.messages(Level::Info), vec!["hello".to_string()]);
    }
}
