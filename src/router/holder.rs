use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::pipeline::SharedPipeline;

/// Slot for the pipeline context, filled once the window and root exist.
///
/// Router operations that need the context wait a bounded time for it to be attached.
#[derive(Default)]
pub struct PipelineHolder {
    slot: Mutex<Option<SharedPipeline>>,
    attached: Condvar,
}

impl PipelineHolder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, pipeline: SharedPipeline) {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_some() {
            log::warn!("pipeline context attached twice, replacing the previous one");
        }
        *slot = Some(pipeline);
        self.attached.notify_all();
    }

    pub fn try_get(&self) -> Option<SharedPipeline> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Returns the context, waiting up to `timeout` for it to be attached.
    pub fn get(&self, timeout: Duration) -> Option<SharedPipeline> {
        let slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        let (slot, _) = self
            .attached
            .wait_timeout_while(slot, timeout, |slot| slot.is_none())
            .unwrap_or_else(|e| e.into_inner());

        if slot.is_none() {
            log::error!("pipeline context not attached after {:?}", timeout);
        }
        slot.clone()
    }
}
