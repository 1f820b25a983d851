//! Record of failed research attempts.

use crate::capability::CapabilityError;
use crate::research::ResearchMethod;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// One failed attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorLogEntry {
    /// When the attempt failed
    pub timestamp: DateTime<Utc>,
    /// The method that was called
    pub method: ResearchMethod,
    /// The call's arguments, joined with `" | "`
    pub payload: String,
    /// What went wrong
    pub error: CapabilityError,
    /// 0 for the first attempt, n for the n-th retry
    pub retry_count: u32,
}

impl ErrorLogEntry {
    /// Creates an entry stamped with the current time.
    #[must_use]
    pub fn new(
        method: ResearchMethod,
        payload: impl Into<String>,
        error: CapabilityError,
        retry_count: u32,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            method,
            payload: payload.into(),
            error,
            retry_count,
        }
    }
}

/// Append-only list of [`ErrorLogEntry`]s, readable as a snapshot.
#[derive(Debug, Default)]
pub struct ErrorLog {
    entries: Mutex<Vec<ErrorLogEntry>>,
}

impl ErrorLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry.
    pub async fn record(&self, entry: ErrorLogEntry) {
        self.entries.lock().await.push(entry);
    }

    /// A copy of every entry in insertion order.
    pub async fn snapshot(&self) -> Vec<ErrorLogEntry> {
        self.entries.lock().await.clone()
    }

    /// Drops every entry.
    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    /// Number of entries.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// True if nothing has been recorded.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
