//! Frame pipeline and page router for a declarative UI runtime.
//!
//! The crate is organised around three parts:
//!
//! - [`executor`]: the task queues (platform, UI, IO, GPU, JS, background) work is posted to.
//! - [`pipeline`]: the per-window [`PipelineContext`] that turns dirty elements and render
//!   nodes into frames on vsync.
//! - [`router`]: the [`PageRouter`] that loads page scripts and keeps the route stack in
//!   sync with the stage.

pub mod config;
pub mod errors;
pub mod events;
pub mod executor;
pub mod geometry;
pub mod page;
pub mod pipeline;
pub mod router;

pub use config::{FrameworkConfig, RouterConfig};
pub use errors::{ExecutorError, ManifestError, RouterError};
pub use events::{EventReporter, FrameworkEvent};
pub use executor::{ManualTaskExecutor, SharedExecutor, TaskExecutor, TaskType, ThreadTaskExecutor};
pub use pipeline::{PipelineContext, SharedPipeline};
pub use router::{FrontendBridge, PageId, PageRouter};
