//! Task executor contract.
//!
//! Work in the framework is dispatched to one of a fixed set of queues, see [`TaskType`].
//! Each queue runs its tasks in FIFO order on a single thread. There is no ordering
//! guarantee between different queues.
//!
//! Two implementations are provided:
//!
//! - [`ThreadTaskExecutor`]: one named OS thread per queue, delayed tasks timed on an
//!   owned tokio runtime.
//! - [`ManualTaskExecutor`]: a deterministic executor driven by hand, with a virtual clock.

use std::sync::Arc;
use std::time::Duration;

mod manual;
mod task;
mod threaded;

pub use manual::ManualTaskExecutor;
pub use task::CancelableTask;
pub use threaded::ThreadTaskExecutor;

/// A unit of work posted to a queue.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Callback invoked on the UI queue after every UI task.
pub type TaskObserver = Arc<dyn Fn() + Send + Sync + 'static>;

/// The queues known to the framework.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskType {
    Platform,
    Ui,
    Io,
    Gpu,
    Js,
    Background,
}

impl TaskType {
    pub const ALL: [TaskType; 6] = [
        TaskType::Platform,
        TaskType::Ui,
        TaskType::Io,
        TaskType::Gpu,
        TaskType::Js,
        TaskType::Background,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Platform => "platform",
            TaskType::Ui => "ui",
            TaskType::Io => "io",
            TaskType::Gpu => "gpu",
            TaskType::Js => "js",
            TaskType::Background => "background",
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Posts work onto the framework queues.
///
/// All methods return `false` instead of failing when the task cannot be accepted,
/// for instance because the executor has been destroyed.
pub trait TaskExecutor: Send + Sync {
    /// Posts a task to the end of the given queue.
    fn post_task(&self, task: Task, task_type: TaskType) -> bool;

    /// Posts a task that becomes runnable after `delay`. Cancelling the task before it
    /// starts prevents it from running.
    fn post_delayed_task(&self, task: CancelableTask, task_type: TaskType, delay: Duration) -> bool;

    /// Runs a task on the given queue and blocks until it finished. When the caller is
    /// already on that queue the task runs inline.
    fn post_sync_task(&self, task: Task, task_type: TaskType) -> bool;

    /// Whether tasks of this type run on the calling thread.
    fn will_run_on_current_thread(&self, task_type: TaskType) -> bool;

    fn add_task_observer(&self, observer: TaskObserver);

    fn remove_task_observer(&self);
}

/// Shared, type erased executor handle.
pub type SharedExecutor = Arc<dyn TaskExecutor>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_type_names() {
        let names: Vec<_> = TaskType::ALL.iter().map(|t| t.to_string()).collect();
        assert_eq!(names, vec!["platform", "ui", "io", "gpu", "js", "background"]);
    }
}
