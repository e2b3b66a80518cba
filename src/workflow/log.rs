use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    Running,
    Success,
    Error,
}

/// One line of the activity log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub id: u64,
    pub message: String,
    pub status: LogStatus,
    pub recorded_at: DateTime<Utc>,
}

/// Append-only activity log for one workflow run.
///
/// Entries are never removed or reordered. Only the most recently appended
/// entry may change status, which is how a `running` step is settled into
/// `success` or `error`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLog {
    entries: Vec<LogEntry>,
    next_id: u64,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a `running` entry and returns its id.
    pub fn append(&mut self, message: impl Into<String>) -> u64 {
        self.append_with_status(message, LogStatus::Running)
    }

    pub fn append_with_status(&mut self, message: impl Into<String>, status: LogStatus) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        self.entries.push(LogEntry {
            id,
            message: message.into(),
            status,
            recorded_at: Utc::now(),
        });
        id
    }

    /// Sets the status of the last entry. Returns `false` on an empty log.
    pub fn set_last_status(&mut self, status: LogStatus) -> bool {
        match self.entries.last_mut() {
            Some(entry) => {
                entry.status = status;
                true
            }
            None => false,
        }
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count_with_status(&self, status: LogStatus) -> usize {
        self.entries.iter().filter(|e| e.status == status).count()
    }

    /// Ids strictly increase in insertion order.
    pub(crate) fn is_consistent(&self) -> bool {
        self.entries.windows(2).all(|w| w[0].id < w[1].id)
            && self.entries.last().is_none_or(|e| e.id <= self.next_id)
    }
}
