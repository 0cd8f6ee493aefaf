//! Bounded per-registration activity log.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity of an [`Activity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// Normal operation.
    Info,
    /// Something worth a look.
    Warning,
    /// Something failed.
    Error,
}

/// One entry an executable wrote about itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    /// Severity.
    pub severity: Severity,
    /// Short category, e.g. `"request"`.
    pub tag: String,
    /// Free text.
    pub message: String,
    /// When the entry was recorded.
    pub timestamp: DateTime<Utc>,
}

impl Activity {
    fn at_now(severity: Severity, tag: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            tag: tag.into(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    /// An [`Severity::Info`] entry stamped now.
    pub fn info(tag: impl Into<String>, message: impl Into<String>) -> Self {
        Self::at_now(Severity::Info, tag, message)
    }

    /// A [`Severity::Warning`] entry stamped now.
    pub fn warning(tag: impl Into<String>, message: impl Into<String>) -> Self {
        Self::at_now(Severity::Warning, tag, message)
    }

    /// An [`Severity::Error`] entry stamped now.
    pub fn error(tag: impl Into<String>, message: impl Into<String>) -> Self {
        Self::at_now(Severity::Error, tag, message)
    }
}

/// FIFO of the most recent activities; the oldest entry is evicted first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityLog {
    entries: VecDeque<Activity>,
    capacity: usize,
}

impl ActivityLog {
    /// An empty log holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an entry.
    pub fn push(&mut self, activity: Activity) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(activity);
    }

    /// Entries, oldest first.
    pub fn entries(&self) -> Vec<Activity> {
        self.entries.iter().cloned().collect()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
