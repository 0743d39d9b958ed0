use std::sync::{Arc, Mutex, MutexGuard};

use super::Task;

enum TaskState {
    Pending(Task),
    Running,
    Done,
    Cancelled,
}

/// Single-shot task that can be cancelled until it starts running.
///
/// Clones share the same state, so one clone can be posted while another is kept to
/// cancel it later.
#[derive(Clone)]
pub struct CancelableTask {
    state: Arc<Mutex<TaskState>>,
}

impl std::fmt::Debug for CancelableTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &*self.lock() {
            TaskState::Pending(_) => "pending",
            TaskState::Running => "running",
            TaskState::Done => "done",
            TaskState::Cancelled => "cancelled",
        };
        f.debug_struct("CancelableTask").field("state", &state).finish()
    }
}

impl CancelableTask {
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            state: Arc::new(Mutex::new(TaskState::Pending(Box::new(f)))),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TaskState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Cancels the task. Returns `false` when it already started, finished or was cancelled.
    pub fn cancel(&self) -> bool {
        let mut state = self.lock();
        if matches!(*state, TaskState::Pending(_)) {
            *state = TaskState::Cancelled;
            true
        } else {
            false
        }
    }

    /// Runs the task if it is still pending. The lock is not held while the task runs.
    pub fn run(&self) -> bool {
        let task = {
            let mut state = self.lock();
            match std::mem::replace(&mut *state, TaskState::Running) {
                TaskState::Pending(task) => task,
                other => {
                    *state = other;
                    return false;
                }
            }
        };

        task();
        *self.lock() = TaskState::Done;
        true
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(*self.lock(), TaskState::Cancelled)
    }

    pub fn is_done(&self) -> bool {
        matches!(*self.lock(), TaskState::Done)
    }
}
