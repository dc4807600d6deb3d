//! Notification sink for human-readable completion and failure events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Fire-and-forget receiver of notifications. Nothing is acknowledged.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, kind: NotificationKind, title: &str, message: &str);

    fn success(&self, title: &str, message: &str) {
        self.notify(NotificationKind::Success, title, message);
    }

    fn error(&self, title: &str, message: &str) {
        self.notify(NotificationKind::Error, title, message);
    }
}

/// Writes notifications to the tracing subscriber
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, kind: NotificationKind, title: &str, message: &str) {
        match kind {
            NotificationKind::Success => tracing::info!(title, "{}", message),
            NotificationKind::Error => tracing::warn!(title, "{}", message),
        }
    }
}

/// Keeps the most recent notifications in memory
#[derive(Debug, Clone)]
pub struct MemorySink {
    notifications: Arc<Mutex<Vec<Notification>>>,
    max_notifications: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::with_capacity(50)
    }

    pub fn with_capacity(max_notifications: usize) -> Self {
        Self {
            notifications: Arc::new(Mutex::new(Vec::new())),
            max_notifications,
        }
    }

    pub fn all(&self) -> Vec<Notification> {
        match self.notifications.lock() {
            Ok(list) => list.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn titles(&self) -> Vec<String> {
        self.all().into_iter().map(|n| n.title).collect()
    }

    pub fn clear(&self) {
        if let Ok(mut list) = self.notifications.lock() {
            list.clear();
        }
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationSink for MemorySink {
    fn notify(&self, kind: NotificationKind, title: &str, message: &str) {
        let Ok(mut list) = self.notifications.lock() else {
            return;
        };
        list.push(Notification {
            kind,
            title: title.to_string(),
            message: message.to_string(),
            timestamp: Utc::now(),
        });
        if list.len() > self.max_notifications {
            list.remove(0);
        }
    }
}

/// Forwards every notification to several sinks
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl NotificationSink for FanoutSink {
    fn notify(&self, kind: NotificationKind, title: &str, message: &str) {
        for sink in &self.sinks {
            sink.notify(kind, title, message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_keeps_only_recent() {
        let sink = MemorySink::with_capacity(2);
        sink.success("one", "");
        sink.success("two", "");
        sink.error("three", "boom");

        assert_eq!(sink.titles(), vec!["two".to_string(), "three".to_string()]);
        assert_eq!(sink.all()[1].kind, NotificationKind::Error);
    }

    #[test]
    fn test_fanout_reaches_every_sink() {
        let a = MemorySink::new();
        let b = MemorySink::new();
        let fanout = FanoutSink::new()
            .with(Arc::new(a.clone()))
            .with(Arc::new(b.clone()));

        fanout.success("Task completed", "done");
        assert_eq!(a.titles(), vec!["Task completed".to_string()]);
        assert_eq!(b.titles(), vec!["Task completed".to_string()]);
    }
}
