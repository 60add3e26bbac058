//! Transformation progress logs, echoed to stderr and streamed via SSE.
//!
//! Every pipeline step reports through [`LOG_BROADCASTER`]; the `/api/logs`
//! endpoint forwards entries to the browser form. Work run inside
//! [`with_job`] tags its entries with the job id so each form only shows
//! its own upload.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use std::cell::RefCell;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Entries buffered per subscriber before the oldest are dropped.
const CHANNEL_CAPACITY: usize = 100;

/// Log level for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A single log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    /// Nesting depth, for per-group detail lines
    #[serde(default)]
    pub indent: u8,
    pub timestamp: DateTime<Utc>,
    /// Upload this entry belongs to; `None` for CLI runs and server events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            indent: 0,
            timestamp: Utc::now(),
            job_id: None,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, message)
    }

    pub fn with_indent(mut self, indent: u8) -> Self {
        self.indent = indent;
        self
    }

    /// Line printed to stderr.
    pub fn render(&self) -> String {
        let prefix = match self.level {
            LogLevel::Info => "   ",
            LogLevel::Success => "   ✓",
            LogLevel::Warning => "   ⚠️",
            LogLevel::Error => "   ❌",
        };
        let indent = "   ".repeat(self.indent as usize);
        format!("{}{} {}", indent, prefix, self.message)
    }
}

thread_local! {
    static CURRENT_JOB: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Run `f` with every entry it logs on this thread tagged with `job_id`.
pub fn with_job<T>(job_id: &str, f: impl FnOnce() -> T) -> T {
    let previous = CURRENT_JOB.with(|job| job.replace(Some(job_id.to_string())));
    let result = f();
    CURRENT_JOB.with(|job| *job.borrow_mut() = previous);
    result
}

/// Global log broadcaster
pub static LOG_BROADCASTER: Lazy<LogBroadcaster> = Lazy::new(LogBroadcaster::new);

/// Broadcasts log entries to all connected SSE clients
pub struct LogBroadcaster {
    sender: broadcast::Sender<LogEntry>,
}

impl LogBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Print an entry and send it to all subscribers.
    ///
    /// Goes to stderr so the CLI can stream CSV on stdout.
    pub fn log(&self, mut entry: LogEntry) {
        if entry.job_id.is_none() {
            entry.job_id = CURRENT_JOB.with(|job| job.borrow().clone());
        }
        eprintln!("{}", entry.render());

        // No receivers is fine: the CLI never subscribes.
        let _ = self.sender.send(entry);
    }

    /// Get a receiver for SSE streaming
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.sender.subscribe()
    }
}

impl Default for LogBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

pub fn log_info(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::info(msg));
}

pub fn log_success(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::success(msg));
}

pub fn log_warning(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::warning(msg));
}

pub fn log_error(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::error(msg));
}

pub fn log_info_indent(msg: impl Into<String>, indent: u8) {
    LOG_BROADCASTER.log(LogEntry::info(msg).with_indent(indent));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscriber_receives_entries() {
        let broadcaster = LogBroadcaster::new();
        let mut rx = broadcaster.subscribe();

        broadcaster.log(LogEntry::warning("No columns for Term3"));

        let entry = rx.try_recv().unwrap();
        assert_eq!(entry.level, LogLevel::Warning);
        assert_eq!(entry.message, "No columns for Term3");
    }

    #[test]
    fn test_entries_tagged_inside_job_scope() {
        let broadcaster = LogBroadcaster::new();
        let mut rx = broadcaster.subscribe();

        with_job("job-a", || broadcaster.log(LogEntry::info("parsing")));
        broadcaster.log(LogEntry::info("idle"));

        let tagged = rx.try_recv().unwrap();
        assert_eq!(tagged.job_id.as_deref(), Some("job-a"));
        let untagged = rx.try_recv().unwrap();
        assert_eq!(untagged.job_id, None);
    }

    #[test]
    fn test_job_id_serialized_only_when_set() {
        let plain = serde_json::to_value(LogEntry::info("x")).unwrap();
        assert!(plain.get("jobId").is_none());

        let mut entry = LogEntry::info("x");
        entry.job_id = Some("job-b".into());
        let json = serde_json::to_value(entry).unwrap();
        assert_eq!(json["jobId"], "job-b");
    }

    #[test]
    fn test_render_indent() {
        let line = LogEntry::info("AUTO EVAL: 3 columns").with_indent(1).render();
        assert!(line.starts_with("      "));
        assert!(line.ends_with("AUTO EVAL: 3 columns"));
    }

    #[test]
    fn test_entry_serializes_camel_case() {
        let json = serde_json::to_value(LogEntry::success("done")).unwrap();
        assert_eq!(json["level"], "success");
        assert!(json.get("timestamp").is_some());
    }
}
