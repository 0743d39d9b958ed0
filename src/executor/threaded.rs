use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{JoinHandle, ThreadId};
use std::time::Duration;

use tokio::runtime::{Handle, Runtime};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use super::{CancelableTask, Task, TaskExecutor, TaskObserver, TaskType};
use crate::config::FrameworkConfig;
use crate::errors::ExecutorError;

type ObserverSlot = Arc<Mutex<Option<TaskObserver>>>;

/// Executor with one dedicated OS thread per queue.
///
/// Each queue thread blocks on an unbounded channel and runs tasks in the order they
/// were posted. Delayed tasks sleep on a small owned tokio runtime and are forwarded
/// into their queue once due.
pub struct ThreadTaskExecutor {
    senders: Mutex<HashMap<TaskType, mpsc::UnboundedSender<Task>>>,
    thread_ids: HashMap<TaskType, ThreadId>,
    threads: Mutex<Vec<JoinHandle<()>>>,
    timer_handle: Handle,
    timer_runtime: Mutex<Option<Runtime>>,
    cancel: CancellationToken,
    observer: ObserverSlot,
    destroyed: AtomicBool,
}

impl ThreadTaskExecutor {
    pub fn new(config: &FrameworkConfig) -> Result<Self, ExecutorError> {
        let timer_runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name(format!("{}.timer", config.thread_name_prefix))
            .enable_time()
            .build()
            .map_err(|e| {
                log::error!("cannot build timer runtime: {}", e);
                ExecutorError::TimerRuntime
            })?;

        let observer: ObserverSlot = Arc::new(Mutex::new(None));
        let mut senders = HashMap::new();
        let mut thread_ids = HashMap::new();
        let mut threads = Vec::new();

        for task_type in TaskType::ALL {
            let (tx, rx) = mpsc::unbounded_channel::<Task>();
            let observer = observer.clone();
            let handle = std::thread::Builder::new()
                .name(config.thread_name(task_type))
                .spawn(move || run_queue(task_type, rx, observer))
                .map_err(|e| {
                    log::error!("cannot spawn {} queue thread: {}", task_type, e);
                    ExecutorError::ThreadSpawn(task_type)
                })?;

            thread_ids.insert(task_type, handle.thread().id());
            senders.insert(task_type, tx);
            threads.push(handle);
        }

        log::debug!("thread task executor started with {} queues", threads.len());

        Ok(Self {
            senders: Mutex::new(senders),
            thread_ids,
            threads: Mutex::new(threads),
            timer_handle: timer_runtime.handle().clone(),
            timer_runtime: Mutex::new(Some(timer_runtime)),
            cancel: CancellationToken::new(),
            observer,
            destroyed: AtomicBool::new(false),
        })
    }

    fn sender(&self, task_type: TaskType) -> Result<mpsc::UnboundedSender<Task>, ExecutorError> {
        let senders = self.senders.lock().unwrap_or_else(|e| e.into_inner());
        senders.get(&task_type).cloned().ok_or(ExecutorError::Destroyed)
    }

    fn send(&self, task: Task, task_type: TaskType) -> Result<(), ExecutorError> {
        self.sender(task_type)?
            .send(task)
            .map_err(|_| ExecutorError::Destroyed)
    }

    fn run_sync(&self, task: Task, task_type: TaskType) -> Result<(), ExecutorError> {
        let (done_tx, done_rx) = oneshot::channel();
        self.send(
            Box::new(move || {
                task();
                let _ = done_tx.send(());
            }),
            task_type,
        )?;

        done_rx
            .blocking_recv()
            .map_err(|_| ExecutorError::SyncTaskDropped(task_type))
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Stops every queue, drops pending timers and joins the queue threads. Tasks already
    /// queued still run before their thread exits.
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.cancel.cancel();
        self.senders.lock().unwrap_or_else(|e| e.into_inner()).clear();

        let runtime = self.timer_runtime.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(runtime) = runtime {
            runtime.shutdown_timeout(Duration::from_millis(100));
        }

        let threads = std::mem::take(&mut *self.threads.lock().unwrap_or_else(|e| e.into_inner()));
        let current = std::thread::current().id();
        for handle in threads {
            // A queue thread cannot join itself; it exits once its channel drains.
            if handle.thread().id() == current {
                continue;
            }
            let name = handle.thread().name().unwrap_or("queue").to_string();
            if handle.join().is_err() {
                log::warn!("queue thread {} panicked", name);
            }
        }

        log::debug!("thread task executor destroyed");
    }
}

fn run_queue(task_type: TaskType, mut rx: mpsc::UnboundedReceiver<Task>, observer: ObserverSlot) {
    while let Some(task) = rx.blocking_recv() {
        task();

        if task_type == TaskType::Ui {
            let observer = observer.lock().unwrap_or_else(|e| e.into_inner()).clone();
            if let Some(observer) = observer {
                observer();
            }
        }
    }
    log::trace!("{} queue stopped", task_type);
}

impl TaskExecutor for ThreadTaskExecutor {
    fn post_task(&self, task: Task, task_type: TaskType) -> bool {
        match self.send(task, task_type) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("post to {} queue failed: {}", task_type, e);
                false
            }
        }
    }

    fn post_delayed_task(&self, task: CancelableTask, task_type: TaskType, delay: Duration) -> bool {
        if delay.is_zero() {
            return self.post_task(Box::new(move || {
                task.run();
            }), task_type);
        }

        let tx = match self.sender(task_type) {
            Ok(tx) => tx,
            Err(e) => {
                log::warn!("delayed post to {} queue failed: {}", task_type, e);
                return false;
            }
        };

        let token = self.cancel.child_token();
        self.timer_handle.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    if task.is_cancelled() {
                        return;
                    }
                    let _ = tx.send(Box::new(move || {
                        task.run();
                    }));
                }
            }
        });
        true
    }

    fn post_sync_task(&self, task: Task, task_type: TaskType) -> bool {
        if self.will_run_on_current_thread(task_type) {
            task();
            return true;
        }

        match self.run_sync(task, task_type) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("sync post to {} queue failed: {}", task_type, e);
                false
            }
        }
    }

    fn will_run_on_current_thread(&self, task_type: TaskType) -> bool {
        self.thread_ids
            .get(&task_type)
            .is_some_and(|id| *id == std::thread::current().id())
    }

    fn add_task_observer(&self, observer: TaskObserver) {
        *self.observer.lock().unwrap_or_else(|e| e.into_inner()) = Some(observer);
    }

    fn remove_task_observer(&self) {
        *self.observer.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

impl Drop for ThreadTaskExecutor {
    fn drop(&mut self) {
        self.destroy();
    }
}
