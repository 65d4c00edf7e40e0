//! Processing log stream served over Server-Sent Events at `/api/logs`.
//!
//! Entries are tagged with the batch (and row) they describe so a client
//! can follow a single upload with `/api/logs?batch_id=<id>`. Every entry
//! is mirrored to `tracing` with the same fields.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Entries buffered per subscriber before a slow client starts lagging.
const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// One processing event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    /// Absent for events raised before a batch exists (parse errors, limits).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
    /// 1-based data row, for per-row events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row: Option<usize>,
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            batch_id: None,
            row: None,
            timestamp: Utc::now(),
        }
    }

    pub fn for_batch(mut self, batch_id: impl Into<String>) -> Self {
        self.batch_id = Some(batch_id.into());
        self
    }

    pub fn for_row(mut self, row: usize) -> Self {
        self.row = Some(row);
        self
    }
}

/// Query string of `/api/logs`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogFilter {
    pub batch_id: Option<String>,
}

impl LogFilter {
    /// Without a batch id every entry passes; with one, only that batch's.
    pub fn accepts(&self, entry: &LogEntry) -> bool {
        match &self.batch_id {
            None => true,
            Some(wanted) => entry.batch_id.as_deref() == Some(wanted.as_str()),
        }
    }
}

pub static LOG_BROADCASTER: Lazy<LogBroadcaster> = Lazy::new(LogBroadcaster::new);

/// Fan-out of log entries to every connected SSE client.
pub struct LogBroadcaster {
    sender: broadcast::Sender<LogEntry>,
}

impl LogBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn publish(&self, entry: LogEntry) {
        let batch_id = entry.batch_id.as_deref();
        let row = entry.row;
        match entry.level {
            LogLevel::Info | LogLevel::Success => {
                tracing::info!(batch_id, row, "{}", entry.message)
            }
            LogLevel::Warning => tracing::warn!(batch_id, row, "{}", entry.message),
            LogLevel::Error => tracing::error!(batch_id, row, "{}", entry.message),
        }

        // Err only means nobody is listening.
        let _ = self.sender.send(entry);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.sender.subscribe()
    }
}

impl Default for LogBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

/// Publish on the process-wide broadcaster.
pub fn emit(entry: LogEntry) {
    LOG_BROADCASTER.publish(entry);
}

/// Log handle bound to one batch.
#[derive(Debug, Clone, Copy)]
pub struct BatchLog<'a> {
    batch_id: &'a str,
}

impl<'a> BatchLog<'a> {
    pub fn new(batch_id: &'a str) -> Self {
        Self { batch_id }
    }

    pub fn batch(&self, level: LogLevel, message: impl Into<String>) {
        emit(LogEntry::new(level, message).for_batch(self.batch_id));
    }

    pub fn row(&self, row: usize, level: LogLevel, message: impl Into<String>) {
        emit(
            LogEntry::new(level, message)
                .for_batch(self.batch_id)
                .for_row(row),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_tagged_entries() {
        let broadcaster = LogBroadcaster::new();
        let mut rx = broadcaster.subscribe();

        broadcaster.publish(
            LogEntry::new(LogLevel::Warning, "rejected")
                .for_batch("b-1")
                .for_row(2),
        );

        let entry = rx.recv().await.unwrap();
        assert_eq!(entry.level, LogLevel::Warning);
        assert_eq!(entry.message, "rejected");
        assert_eq!(entry.batch_id.as_deref(), Some("b-1"));
        assert_eq!(entry.row, Some(2));
    }

    #[test]
    fn test_entry_serialization_uses_snake_case_fields() {
        let json = serde_json::to_value(
            LogEntry::new(LogLevel::Success, "done").for_batch("b-1").for_row(3),
        )
        .unwrap();
        assert_eq!(json["level"], "success");
        assert_eq!(json["batch_id"], "b-1");
        assert_eq!(json["row"], 3);
        assert!(json.get("timestamp").is_some());

        let json = serde_json::to_value(LogEntry::new(LogLevel::Error, "bad file")).unwrap();
        assert!(json.get("batch_id").is_none());
        assert!(json.get("row").is_none());
    }

    #[test]
    fn test_filter_by_batch() {
        let tagged = LogEntry::new(LogLevel::Info, "row ok").for_batch("a");
        let other = LogEntry::new(LogLevel::Info, "row ok").for_batch("b");
        let untagged = LogEntry::new(LogLevel::Error, "bad file");

        let all = LogFilter::default();
        assert!(all.accepts(&tagged) && all.accepts(&other) && all.accepts(&untagged));

        let only_a = LogFilter { batch_id: Some("a".into()) };
        assert!(only_a.accepts(&tagged));
        assert!(!only_a.accepts(&other));
        assert!(!only_a.accepts(&untagged));
    }
}
