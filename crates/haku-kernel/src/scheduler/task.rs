//! In-flight task tracking.
//!
//! Every kernel operation registers itself for its whole lifetime and gets a
//! [`TaskGuard`] back. Dropping the guard deregisters the task; cancelling a
//! task through the registry fires its cancel handle and removes it at once.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use haku_types::{TaskId, TaskInfo, TaskSelector};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors from task registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// No live task has the requested index.
    #[error("Unknown task id {0}")]
    NotFound(TaskId),
    /// `last` was requested but nothing is running.
    #[error("No tasks to cancel.")]
    NoTasks,
}

struct Entry {
    info: TaskInfo,
    cancel: CancellationToken,
}

type Entries = Arc<Mutex<VecDeque<Entry>>>;

fn lock(entries: &Entries) -> MutexGuard<'_, VecDeque<Entry>> {
    entries.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Registry of running tasks, in registration order.
#[derive(Clone)]
pub struct TaskRegistry {
    /// Counter for generating task indices.
    next_id: Arc<AtomicU64>,
    tasks: Entries,
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskRegistry {
    /// Create an empty registry. Indices start at 1.
    pub fn new() -> Self {
        Self {
            next_id: Arc::new(AtomicU64::new(1)),
            tasks: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Register a task. It stays listed until the guard drops or the task
    /// is cancelled.
    pub fn register(&self, identity: impl Into<String>, command: impl Into<String>) -> TaskGuard {
        let id = TaskId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let info = TaskInfo {
            id,
            identity: identity.into(),
            command: command.into(),
            started_at: Utc::now(),
        };
        let cancel = CancellationToken::new();
        tracing::debug!(task = %id, command = %info.command, "task registered");

        lock(&self.tasks).push_back(Entry {
            info: info.clone(),
            cancel: cancel.clone(),
        });

        TaskGuard {
            tasks: Arc::clone(&self.tasks),
            info,
            cancel,
        }
    }

    /// Live tasks in registration order.
    pub fn list(&self) -> Vec<TaskInfo> {
        lock(&self.tasks).iter().map(|e| e.info.clone()).collect()
    }

    /// Number of live tasks.
    pub fn len(&self) -> usize {
        lock(&self.tasks).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cancel one task by index, or the most recently registered one.
    pub fn cancel(&self, selector: TaskSelector) -> Result<TaskInfo, TaskError> {
        let entry = {
            let mut tasks = lock(&self.tasks);
            let position = match selector {
                TaskSelector::Last => tasks.len().checked_sub(1).ok_or(TaskError::NoTasks)?,
                TaskSelector::Index(id) => tasks
                    .iter()
                    .position(|e| e.info.id == id)
                    .ok_or(TaskError::NotFound(id))?,
            };
            tasks.remove(position).ok_or(TaskError::NoTasks)?
        };
        entry.cancel.cancel();
        tracing::info!(task = %entry.info.id, command = %entry.info.command, "task cancelled");
        Ok(entry.info)
    }

    /// Cancel every live task running `command`. Returns what was cancelled.
    pub fn cancel_command(&self, command: &str) -> Vec<TaskInfo> {
        let cancelled: Vec<Entry> = {
            let mut tasks = lock(&self.tasks);
            let (matching, rest): (VecDeque<Entry>, VecDeque<Entry>) =
                tasks.drain(..).partition(|e| e.info.command == command);
            *tasks = rest;
            matching.into_iter().collect()
        };
        for entry in &cancelled {
            entry.cancel.cancel();
        }
        tracing::info!(command, count = cancelled.len(), "tasks cancelled by command");
        cancelled.into_iter().map(|e| e.info).collect()
    }
}

/// Registration handle for one task. Deregisters on drop.
pub struct TaskGuard {
    tasks: Entries,
    info: TaskInfo,
    cancel: CancellationToken,
}

impl TaskGuard {
    pub fn id(&self) -> TaskId {
        self.info.id
    }

    pub fn info(&self) -> &TaskInfo {
        &self.info
    }

    /// Token that fires when the task is cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        let mut tasks = lock(&self.tasks);
        if let Some(position) = tasks.iter().position(|e| e.info.id == self.info.id) {
            tasks.remove(position);
        }
    }
}
