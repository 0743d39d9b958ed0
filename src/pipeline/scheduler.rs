//! Per-frame animation ticking.
//!
//! A [`Scheduler`] registers a [`ScheduleTask`] with the pipeline context. The context runs
//! every registered task once per vsync and forgets it; a running scheduler re-registers
//! itself after each frame, so stopping it is just a matter of not re-registering.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use super::PipelineContext;

const NANOS_PER_MILLI: u64 = 1_000_000;

/// Callback run once per vsync by the pipeline context.
pub trait ScheduleTask: Send + Sync {
    fn on_frame(self: Arc<Self>, ctx: &mut PipelineContext, nano_timestamp: u64);
}

/// Owner callback, receives the time since the previous frame in milliseconds.
pub type FrameCallback = Box<dyn FnMut(&mut PipelineContext, &SchedulerHandle, u64) + Send>;

#[derive(Debug, Default)]
struct SchedulerState {
    running: bool,
    /// Bumped on every start and stop. Entries from an older generation are stale.
    generation: u64,
    schedule_id: Option<u32>,
    last_timestamp: u64,
}

struct SchedulerShared {
    state: Mutex<SchedulerState>,
    callback: Mutex<FrameCallback>,
}

impl SchedulerShared {
    fn state(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Entry registered with the context. It only holds the scheduler weakly, so a dropped
/// scheduler's registration is discarded on its next frame.
struct FrameEntry {
    shared: Weak<SchedulerShared>,
    generation: u64,
}

impl ScheduleTask for FrameEntry {
    fn on_frame(self: Arc<Self>, ctx: &mut PipelineContext, nano_timestamp: u64) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };

        let elapsed_ms = {
            let mut state = shared.state();
            if !state.running || state.generation != self.generation {
                return;
            }
            state.schedule_id = None;
            let elapsed = nano_timestamp.saturating_sub(state.last_timestamp) / NANOS_PER_MILLI;
            state.last_timestamp = nano_timestamp;
            elapsed
        };

        let handle = SchedulerHandle { shared: Arc::downgrade(&shared) };
        {
            let mut callback = shared.callback.lock().unwrap_or_else(|e| e.into_inner());
            (*callback)(ctx, &handle, elapsed_ms);
        }

        let mut state = shared.state();
        if state.running && state.generation == self.generation && state.schedule_id.is_none() {
            state.schedule_id = Some(ctx.add_schedule_task(self));
        }
    }
}

fn start(shared: &Arc<SchedulerShared>, ctx: &mut PipelineContext) {
    let mut state = shared.state();
    if state.running {
        return;
    }
    state.last_timestamp = ctx.time_now();
    state.running = true;
    state.generation += 1;
    let entry = Arc::new(FrameEntry { shared: Arc::downgrade(shared), generation: state.generation });
    state.schedule_id = Some(ctx.add_schedule_task(entry));
}

fn stop(shared: &SchedulerShared, ctx: &mut PipelineContext) {
    let mut state = shared.state();
    if !state.running {
        return;
    }
    state.running = false;
    state.generation += 1;
    if let Some(id) = state.schedule_id.take() {
        ctx.remove_schedule_task(id);
    }
}

/// Restartable per-frame ticker. Dropping it stops it.
pub struct Scheduler {
    shared: Arc<SchedulerShared>,
}

impl Scheduler {
    pub fn new<F>(callback: F) -> Self
    where
        F: FnMut(&mut PipelineContext, &SchedulerHandle, u64) + Send + 'static,
    {
        Self {
            shared: Arc::new(SchedulerShared {
                state: Mutex::new(SchedulerState::default()),
                callback: Mutex::new(Box::new(callback)),
            }),
        }
    }

    /// Starts ticking from the context's current time. No-op when already running.
    pub fn start(&self, ctx: &mut PipelineContext) {
        start(&self.shared, ctx);
    }

    pub fn stop(&self, ctx: &mut PipelineContext) {
        stop(&self.shared, ctx);
    }

    pub fn is_running(&self) -> bool {
        self.shared.state().running
    }

    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle { shared: Arc::downgrade(&self.shared) }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shared.state().running = false;
    }
}

/// Weak handle to a scheduler, handed to the frame callback.
#[derive(Clone)]
pub struct SchedulerHandle {
    shared: Weak<SchedulerShared>,
}

impl SchedulerHandle {
    pub fn start(&self, ctx: &mut PipelineContext) {
        if let Some(shared) = self.shared.upgrade() {
            start(&shared, ctx);
        }
    }

    pub fn stop(&self, ctx: &mut PipelineContext) {
        if let Some(shared) = self.shared.upgrade() {
            stop(&shared, ctx);
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.upgrade().is_some_and(|shared| shared.state().running)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::lock;
    use crate::pipeline::testing::harness;

    const MS: u64 = NANOS_PER_MILLI;

    fn recording_scheduler() -> (Scheduler, Arc<Mutex<Vec<u64>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let scheduler = Scheduler::new(move |_, _, elapsed| s.lock().unwrap().push(elapsed));
        (scheduler, seen)
    }

    #[test]
    fn reports_time_since_previous_frame() {
        let h = harness();
        let mut ctx = lock(&h.pipeline);
        let t0 = 1_000 * MS;
        ctx.set_time_provider(Box::new(move || t0));

        let (scheduler, seen) = recording_scheduler();
        scheduler.start(&mut ctx);
        assert!(scheduler.is_running());

        ctx.flush_animation(t0);
        ctx.flush_animation(t0 + 16 * MS);
        ctx.flush_animation(t0 + 48 * MS);

        assert_eq!(*seen.lock().unwrap(), vec![0, 16, 32]);
        assert!(scheduler.is_running());
        assert_eq!(ctx.schedule_task_count(), 1);
    }

    #[test]
    fn start_twice_registers_once() {
        let h = harness();
        let mut ctx = lock(&h.pipeline);
        let (scheduler, _seen) = recording_scheduler();

        scheduler.start(&mut ctx);
        scheduler.start(&mut ctx);
        assert_eq!(ctx.schedule_task_count(), 1);
    }

    #[test]
    fn callback_can_stop_its_scheduler() {
        let h = harness();
        let mut ctx = lock(&h.pipeline);
        ctx.set_time_provider(Box::new(|| 0));

        let ticks = Arc::new(Mutex::new(0));
        let t = ticks.clone();
        let scheduler = Scheduler::new(move |ctx, handle, _| {
            *t.lock().unwrap() += 1;
            handle.stop(ctx);
        });

        scheduler.start(&mut ctx);
        ctx.flush_animation(16 * MS);
        ctx.flush_animation(32 * MS);

        assert_eq!(*ticks.lock().unwrap(), 1);
        assert!(!scheduler.is_running());
        assert_eq!(ctx.schedule_task_count(), 0);
    }

    #[test]
    fn stop_deregisters_and_restart_resumes() {
        let h = harness();
        let mut ctx = lock(&h.pipeline);
        ctx.set_time_provider(Box::new(|| 0));
        let (scheduler, seen) = recording_scheduler();

        scheduler.start(&mut ctx);
        scheduler.stop(&mut ctx);
        assert_eq!(ctx.schedule_task_count(), 0);
        ctx.flush_animation(16 * MS);
        assert!(seen.lock().unwrap().is_empty());

        scheduler.start(&mut ctx);
        ctx.flush_animation(16 * MS);
        assert_eq!(*seen.lock().unwrap(), vec![16]);
    }

    #[test]
    fn restart_during_a_frame_keeps_a_single_registration() {
        let h = harness();
        let mut ctx = lock(&h.pipeline);
        ctx.set_time_provider(Box::new(|| 0));

        let (b, b_seen) = recording_scheduler();
        let b_handle = b.handle();
        let restarted = Arc::new(Mutex::new(false));
        let r = restarted.clone();
        let a = Scheduler::new(move |ctx, _, _| {
            let mut restarted = r.lock().unwrap();
            if !*restarted {
                *restarted = true;
                b_handle.stop(ctx);
                b_handle.start(ctx);
            }
        });

        a.start(&mut ctx);
        b.start(&mut ctx);

        // b's entry from before the restart is still in this frame's batch
        ctx.flush_animation(16 * MS);
        assert!(b_seen.lock().unwrap().is_empty());

        ctx.flush_animation(32 * MS);
        assert_eq!(b_seen.lock().unwrap().len(), 1);
        ctx.flush_animation(48 * MS);
        assert_eq!(*b_seen.lock().unwrap(), vec![16, 16]);
        assert_eq!(ctx.schedule_task_count(), 2);

        b.stop(&mut ctx);
        assert_eq!(ctx.schedule_task_count(), 1);
        ctx.flush_animation(64 * MS);
        assert_eq!(b_seen.lock().unwrap().len(), 2);
        assert!(*restarted.lock().unwrap());
    }

    #[test]
    fn dropped_scheduler_never_ticks_again() {
        let h = harness();
        let mut ctx = lock(&h.pipeline);
        let (scheduler, seen) = recording_scheduler();
        let handle = scheduler.handle();

        scheduler.start(&mut ctx);
        drop(scheduler);
        assert!(!handle.is_running());

        ctx.flush_animation(16 * MS);
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(ctx.schedule_task_count(), 0);
    }
}
