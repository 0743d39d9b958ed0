use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::PageRouter;
use crate::executor::{CancelableTask, TaskType};

#[derive(Default)]
struct AnimationFrames {
    tasks: HashMap<String, CancelableTask>,
    order: VecDeque<String>,
}

/// Armed timer. `seq` tells a re-armed timer apart from the run that armed it.
struct Timeout {
    seq: u64,
    task: CancelableTask,
}

/// Script timers and animation frame requests, keyed by script callback id.
#[derive(Default)]
pub(super) struct JsTimers {
    next_seq: AtomicU64,
    timeouts: Mutex<HashMap<String, Timeout>>,
    frames: Mutex<AnimationFrames>,
}

impl JsTimers {
    fn timeouts(&self) -> MutexGuard<'_, HashMap<String, Timeout>> {
        self.timeouts.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn frames(&self) -> MutexGuard<'_, AnimationFrames> {
        self.frames.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn realtime_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}

impl PageRouter {
    /// Arms a script timer. Interval timers re-arm themselves with `is_first == false`;
    /// a re-arm of a timer that was cleared in the meantime is ignored. One-shot timers
    /// are forgotten once they fired, interval timers stay until [`clear_timer`](Self::clear_timer).
    pub fn wait_timer(&self, callback_id: &str, delay_ms: u64, is_interval: bool, is_first: bool) {
        let mut timeouts = self.timers.timeouts();
        if !is_first && !timeouts.contains_key(callback_id) {
            log::debug!("timer {} was cleared, not re-arming", callback_id);
            return;
        }

        let seq = self.timers.next_seq.fetch_add(1, Ordering::Relaxed);
        let weak = self.weak_self.clone();
        let id = callback_id.to_string();
        let task = CancelableTask::new(move || {
            let Some(router) = weak.upgrade() else {
                return;
            };
            if !is_interval {
                let mut timeouts = router.timers.timeouts();
                if timeouts.get(&id).is_some_and(|armed| armed.seq == seq) {
                    timeouts.remove(&id);
                }
            }
            router.bridge.timer_fired(&id, delay_ms, is_interval);
        });
        timeouts.insert(callback_id.to_string(), Timeout { seq, task: task.clone() });
        drop(timeouts);

        self.executor
            .post_delayed_task(task, TaskType::Js, Duration::from_millis(delay_ms));
    }

    pub fn clear_timer(&self, callback_id: &str) {
        match self.timers.timeouts().remove(callback_id) {
            Some(armed) => {
                armed.task.cancel();
            }
            None => log::warn!("clear timer: callback id {} not found", callback_id),
        }
    }

    /// Queues `callback_id` for the next frame.
    pub fn request_animation_frame(&self, callback_id: &str) {
        let weak = self.weak_self.clone();
        let id = callback_id.to_string();
        let task = CancelableTask::new(move || {
            if let Some(router) = weak.upgrade() {
                router.bridge.animation_frame(&id, realtime_millis());
            }
        });

        let mut frames = self.timers.frames();
        if frames.tasks.contains_key(callback_id) {
            return;
        }
        frames.tasks.insert(callback_id.to_string(), task);
        frames.order.push_back(callback_id.to_string());
    }

    pub fn cancel_animation_frame(&self, callback_id: &str) {
        match self.timers.frames().tasks.remove(callback_id) {
            Some(task) => {
                task.cancel();
            }
            None => log::warn!("cancel animation frame: callback id {} not found", callback_id),
        }
    }

    /// Posts every pending animation frame callback to the JS queue, in request order.
    pub fn flush_animation_tasks(&self) {
        let due: Vec<CancelableTask> = {
            let mut frames = self.timers.frames();
            let order = std::mem::take(&mut frames.order);
            order
                .into_iter()
                .filter_map(|id| frames.tasks.remove(&id))
                .collect()
        };

        for task in due {
            self.executor.post_task(
                Box::new(move || {
                    task.run();
                }),
                TaskType::Js,
            );
        }
    }
}
