//! Logging for the update orchestrator.
//!
//! The orchestrator never logs through globals: it is handed an
//! `Arc<dyn LogSink>` at construction. [`TracingSink`] forwards to `tracing`
//! (the console subscriber installed by the binary). [`RingSink`] additionally
//! keeps the most recent entries in a [`LogRingBuffer`], which is what the
//! admin console's log viewer reads through `GET /logs`.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// A single log entry stored in the ring buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: u64,
    pub timestamp_ms: i64,
    pub level: LogLevel,
    pub source: String,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Ring buffer
// ---------------------------------------------------------------------------

pub const LOG_RING_CAPACITY: usize = 1000;

/// Fixed-capacity log store; the oldest entry is dropped when full.
pub struct LogRingBuffer {
    entries: VecDeque<LogEntry>,
    capacity: usize,
    /// Monotonic, survives `clear`.
    next_id: u64,
}

impl LogRingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            next_id: 1,
        }
    }

    /// Store an entry and return its id.
    pub fn push(&mut self, level: LogLevel, source: &str, message: &str) -> u64 {
        let id = self.next_id;
        self.next_id += 1;

        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(LogEntry {
            id,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            level,
            source: source.to_string(),
            message: message.to_string(),
        });
        id
    }

    /// The most recent `limit` entries, oldest first. `0` means all.
    pub fn get_entries(&self, limit: usize) -> Vec<LogEntry> {
        let take = if limit == 0 {
            self.entries.len()
        } else {
            limit.min(self.entries.len())
        };
        self.entries
            .iter()
            .skip(self.entries.len() - take)
            .cloned()
            .collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub type SharedLogBuffer = Arc<Mutex<LogRingBuffer>>;

pub fn shared_log_buffer() -> SharedLogBuffer {
    Arc::new(Mutex::new(LogRingBuffer::new(LOG_RING_CAPACITY)))
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Destination for orchestrator log lines.
pub trait LogSink: Send + Sync {
    fn log(&self, level: LogLevel, source: &str, message: &str);
}

/// Forwards to the `tracing` macros.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, level: LogLevel, source: &str, message: &str) {
        match level {
            LogLevel::Debug => tracing::debug!(source, "{message}"),
            LogLevel::Info => tracing::info!(source, "{message}"),
            LogLevel::Warn => tracing::warn!(source, "{message}"),
            LogLevel::Error => tracing::error!(source, "{message}"),
        }
    }
}

/// Records into a shared ring buffer, then forwards to tracing.
/// Debug lines go to tracing only.
#[derive(Clone)]
pub struct RingSink {
    buffer: SharedLogBuffer,
}

impl RingSink {
    pub fn new(buffer: SharedLogBuffer) -> Self {
        Self { buffer }
    }
}

impl LogSink for RingSink {
    fn log(&self, level: LogLevel, source: &str, message: &str) {
        if level != LogLevel::Debug {
            self.buffer.lock().push(level, source, message);
        }
        TracingSink.log(level, source, message);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_assigns_monotonic_ids() {
        let mut buf = LogRingBuffer::new(10);
        assert_eq!(buf.push(LogLevel::Info, "npm", "first"), 1);
        assert_eq!(buf.push(LogLevel::Warn, "git", "second"), 2);
        assert_eq!(buf.push(LogLevel::Error, "npm", "third"), 3);
    }

    #[test]
    fn get_entries_with_limit_returns_most_recent() {
        let mut buf = LogRingBuffer::new(10);
        for msg in ["a", "b", "c"] {
            buf.push(LogLevel::Info, "npm", msg);
        }
        let entries = buf.get_entries(2);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "b");
        assert_eq!(entries[1].message, "c");
        assert_eq!(buf.get_entries(100).len(), 3);
    }

    #[test]
    fn ring_buffer_drops_oldest_when_full() {
        let mut buf = LogRingBuffer::new(3);
        for i in 0..10 {
            buf.push(LogLevel::Info, "git", &format!("msg-{i}"));
        }
        assert_eq!(buf.len(), 3);
        let messages: Vec<String> = buf.get_entries(0).into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["msg-7", "msg-8", "msg-9"]);
    }

    #[test]
    fn clear_keeps_next_id() {
        let mut buf = LogRingBuffer::new(10);
        buf.push(LogLevel::Info, "npm", "a");
        buf.push(LogLevel::Info, "npm", "b");
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.push(LogLevel::Info, "npm", "after-clear"), 3);
    }

    #[test]
    fn ring_sink_records_entries_but_not_debug() {
        let buffer = shared_log_buffer();
        let sink = RingSink::new(buffer.clone());
        sink.log(LogLevel::Debug, "git", "git fetch");
        sink.log(LogLevel::Warn, "npm", "rate limited");

        let entries = buffer.lock().get_entries(0);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].level, LogLevel::Warn);
        assert_eq!(entries[0].source, "npm");
        assert_eq!(entries[0].message, "rate limited");
        assert!(entries[0].timestamp_ms > 0);
    }
}
