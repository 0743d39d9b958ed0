use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::thread::ThreadId;
use std::time::Duration;

use super::{CancelableTask, Task, TaskExecutor, TaskObserver, TaskType};

struct DelayedTask {
    due: Duration,
    seq: u64,
    task_type: TaskType,
    task: CancelableTask,
}

#[derive(Default)]
struct ManualState {
    ready: VecDeque<(TaskType, Task)>,
    delayed: Vec<DelayedTask>,
    now: Duration,
    seq: u64,
}

/// Deterministic executor driven by its owner.
///
/// Every queue is served by the thread that created the executor, and nothing runs
/// until [`run_until_idle`](Self::run_until_idle) or [`advance`](Self::advance) is called.
/// Delayed tasks use a virtual clock that only moves through `advance`.
pub struct ManualTaskExecutor {
    owner: ThreadId,
    state: Mutex<ManualState>,
    observer: Mutex<Option<TaskObserver>>,
    destroyed: AtomicBool,
}

impl Default for ManualTaskExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualTaskExecutor {
    pub fn new() -> Self {
        Self {
            owner: std::thread::current().id(),
            state: Mutex::new(ManualState::default()),
            observer: Mutex::new(None),
            destroyed: AtomicBool::new(false),
        }
    }

    fn state(&self) -> MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.state().now
    }

    /// Number of tasks ready to run on the given queue.
    pub fn pending(&self, task_type: TaskType) -> usize {
        self.state().ready.iter().filter(|(t, _)| *t == task_type).count()
    }

    /// Number of delayed tasks that are not yet due.
    pub fn pending_delayed(&self) -> usize {
        self.state().delayed.len()
    }

    /// Runs ready tasks in posting order until no task is left, including tasks posted
    /// by the tasks themselves. Returns the number of tasks run.
    pub fn run_until_idle(&self) -> usize {
        let mut count = 0;
        loop {
            let next = self.state().ready.pop_front();
            let Some((task_type, task)) = next else {
                break;
            };

            task();
            count += 1;

            if task_type == TaskType::Ui {
                let observer = self.observer.lock().unwrap_or_else(|e| e.into_inner()).clone();
                if let Some(observer) = observer {
                    observer();
                }
            }
        }
        count
    }

    /// Moves the virtual clock forward, releases every delayed task that became due (in
    /// deadline order) and runs until idle.
    pub fn advance(&self, by: Duration) -> usize {
        {
            let mut state = self.state();
            state.now += by;
            let now = state.now;

            let (mut due, later): (Vec<_>, Vec<_>) = std::mem::take(&mut state.delayed)
                .into_iter()
                .partition(|d| d.due <= now);
            state.delayed = later;

            due.sort_by_key(|d| (d.due, d.seq));
            for d in due {
                let task = d.task;
                state.ready.push_back((d.task_type, Box::new(move || {
                    task.run();
                })));
            }
        }
        self.run_until_idle()
    }

    pub fn destroy(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
        let mut state = self.state();
        state.ready.clear();
        state.delayed.clear();
    }

    fn refuse(&self, task_type: TaskType) -> bool {
        if self.destroyed.load(Ordering::SeqCst) {
            log::warn!("post to {} queue failed: executor destroyed", task_type);
            return true;
        }
        false
    }
}

impl TaskExecutor for ManualTaskExecutor {
    fn post_task(&self, task: Task, task_type: TaskType) -> bool {
        if self.refuse(task_type) {
            return false;
        }
        self.state().ready.push_back((task_type, task));
        true
    }

    fn post_delayed_task(&self, task: CancelableTask, task_type: TaskType, delay: Duration) -> bool {
        if self.refuse(task_type) {
            return false;
        }

        let mut state = self.state();
        if delay.is_zero() {
            state.ready.push_back((task_type, Box::new(move || {
                task.run();
            })));
            return true;
        }

        state.seq += 1;
        let due = state.now + delay;
        let seq = state.seq;
        state.delayed.push(DelayedTask { due, seq, task_type, task });
        true
    }

    /// Every queue lives on the owner thread, so sync tasks run inline there. Other
    /// threads cannot reach the queues and are refused.
    fn post_sync_task(&self, task: Task, task_type: TaskType) -> bool {
        if self.refuse(task_type) {
            return false;
        }
        if !self.will_run_on_current_thread(task_type) {
            log::warn!("sync post to {} queue refused, caller is not the owner thread", task_type);
            return false;
        }
        task();
        true
    }

    fn will_run_on_current_thread(&self, _task_type: TaskType) -> bool {
        std::thread::current().id() == self.owner
    }

    fn add_task_observer(&self, observer: TaskObserver) {
        *self.observer.lock().unwrap_or_else(|e| e.into_inner()) = Some(observer);
    }

    fn remove_task_observer(&self) {
        *self.observer.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}
