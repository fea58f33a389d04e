use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

/// One finalized or abandoned request, as rendered by the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityEntry {
    pub recorded_at: DateTime<Utc>,
    pub text: String,
}

/// Process-wide, append-only record of request outcomes.
///
/// Cloning the log yields another handle to the same entries. Appends from
/// concurrent sessions are serialized by the inner mutex and appear in the
/// order they complete.
#[derive(Debug, Clone, Default)]
pub struct ActivityLog {
    entries: Arc<Mutex<Vec<ActivityEntry>>>,
}

impl ActivityLog {
    pub const EMPTY_PLACEHOLDER: &'static str = "No logs";
    const SEPARATOR: &'static str = "\n\n";

    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave the vector half-pushed,
    // so a poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, Vec<ActivityEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn append(&self, text: impl Into<String>) {
        let entry = ActivityEntry {
            recorded_at: Utc::now(),
            text: text.into(),
        };
        self.lock().push(entry);
    }

    /// Copy of every entry recorded so far.
    pub fn snapshot(&self) -> Vec<ActivityEntry> {
        self.lock().clone()
    }

    /// Entries recorded so far as one text block, blank-line separated.
    pub fn render(&self) -> String {
        let entries = self.lock();
        if entries.is_empty() {
            return Self::EMPTY_PLACEHOLDER.to_string();
        }
        entries
            .iter()
            .map(|e| e.text.as_str())
            .collect::<Vec<_>>()
            .join(Self::SEPARATOR)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
