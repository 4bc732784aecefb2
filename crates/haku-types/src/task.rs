//! Task identification and listing types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Monotonic index of an in-flight task.
///
/// Indices are never reused within a process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which task a cancellation request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskSelector {
    /// A specific task by index.
    Index(TaskId),
    /// The most recently registered live task.
    Last,
}

impl fmt::Display for TaskSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskSelector::Index(id) => write!(f, "{id}"),
            TaskSelector::Last => f.write_str("last"),
        }
    }
}

/// Error returned when a task selector can't be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid task selector: {0:?} (expected an index, -1, or \"last\")")]
pub struct ParseSelectorError(pub String);

impl FromStr for TaskSelector {
    type Err = ParseSelectorError;

    /// `last` and `-1` select the most recent task; anything else must be an index.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("last") || s == "-1" {
            return Ok(TaskSelector::Last);
        }
        s.parse::<u64>()
            .map(|n| TaskSelector::Index(TaskId(n)))
            .map_err(|_| ParseSelectorError(s.to_string()))
    }
}

/// Information about a live task for listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskInfo {
    /// Task index.
    pub id: TaskId,
    /// Who invoked it.
    pub identity: String,
    /// Command name (`eval`, `inspect`, ...).
    pub command: String,
    /// When it was registered.
    pub started_at: DateTime<Utc>,
}

impl TaskInfo {
    /// One-line description used by task listings and cancel confirmations.
    pub fn describe(&self) -> String {
        format!(
            "{}: `{}`, invoked at {} UTC",
            self.id,
            self.command,
            self.started_at.format("%Y-%m-%d %H:%M:%S")
        )
    }
}
