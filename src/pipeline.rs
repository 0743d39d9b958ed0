//! Frame pipeline.
//!
//! The [`PipelineContext`] owns the dirty sets of the element and render trees and turns
//! them into frames on vsync. Nodes are never owned by the pipeline: they register
//! themselves through the capability traits in [`node`] and are held weakly until the
//! next flush.

mod blur;
mod context;
mod dirty;
mod dump;
pub mod node;
mod scheduler;
mod transition;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::{Arc, Mutex, MutexGuard};

pub use blur::{BlurRegionHandler, RoundedRect, WindowBlurRegions, WindowBlurStyle};
pub use context::{AnimationCallback, ComposeId, FlushCallback, FlushPhase, PipelineContext, TimeProvider};
pub use dirty::DirtySet;
pub use node::{AccessibilityManager, Buildable, DumpKind, Focusable, Layoutable, Renderable, RootElement, Stage, TreeNode, Window};
pub use scheduler::{FrameCallback, ScheduleTask, Scheduler, SchedulerHandle};
pub use transition::{ListenerId, TransitionCallback, TransitionListeners};

/// Pipeline context shared between the router and the UI queue.
pub type SharedPipeline = Arc<Mutex<PipelineContext>>;

/// Locks the context. A panic inside a node callback does not make the context unusable.
pub fn lock(pipeline: &SharedPipeline) -> MutexGuard<'_, PipelineContext> {
    pipeline.lock().unwrap_or_else(|e| e.into_inner())
}
