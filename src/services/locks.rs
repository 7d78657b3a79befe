//! Per-task advisory locks.
//!
//! Episode appends and pending-reviewer recomputes for one task must
//! serialise so that `prev_action`/`event_number` and the projection diff
//! are computed against a stable view. Locks are keyed by task id and live
//! for the life of the process.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::Mutex as AsyncMutex;

#[derive(Default)]
pub struct TaskLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl TaskLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The advisory lock for one task id.
    pub fn for_task(&self, task_id: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks
            .entry(task_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Drop the lock entry of a deleted task.
    pub fn forget(&self, task_id: &str) {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.remove(task_id);
    }
}
