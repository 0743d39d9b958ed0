//! Capability traits for the nodes the pipeline drives.
//!
//! The element and render trees live outside this crate. The pipeline only holds weak
//! references to their nodes and calls them through these traits. Callbacks receive the
//! pipeline context mutably so nodes can register further work without locking it again.

use std::sync::Arc;

use super::PipelineContext;
use crate::events::{KeyEvent, MouseEvent, RotationEvent, TouchPoint};
use crate::geometry::Rect;
use crate::page::Page;
use crate::router::PageId;

/// Position of a node in its tree. Dirty sets are ordered by depth.
pub trait TreeNode: Send + Sync {
    fn depth(&self) -> u32;
}

/// An element that can be rebuilt.
pub trait Buildable: TreeNode {
    fn rebuild(&self, ctx: &mut PipelineContext);

    /// Rebuilds the focus sub-tree under this element.
    fn rebuild_focus_tree(&self, _ctx: &mut PipelineContext) {}

    /// Global rect of the element's render node.
    fn render_rect(&self) -> Rect {
        Rect::default()
    }
}

/// A render node that can be laid out.
pub trait Layoutable: TreeNode {
    fn on_layout(&self, ctx: &mut PipelineContext);

    /// Speculative layout done while the UI queue is idle.
    fn on_predict_layout(&self, _ctx: &mut PipelineContext) {}
}

/// A render node that can be repainted.
pub trait Renderable: TreeNode {
    fn repaint(&self, ctx: &mut PipelineContext);

    /// Area touched by the last repaint, in logical pixels.
    fn dirty_rect(&self) -> Rect;
}

pub trait Focusable: Send + Sync {
    fn request_focus_immediately(&self);

    /// Scopes group focusable children. A dirty leaf wins over a dirty scope.
    fn is_scope(&self) -> bool;
}

/// Kind of tree printed by the dump command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpKind {
    Element,
    Render,
    Focus,
    Layer,
}

/// Root of the element tree, created by the embedder and handed to the context.
pub trait RootElement: Send + Sync {
    fn stage(&self) -> Option<Arc<dyn Stage>>;

    fn is_current_focus(&self) -> bool;

    fn request_focus_immediately(&self);

    fn lost_focus(&self) {}

    /// Presents a frame. `dirty` is in device pixels.
    fn finish_render(&self, dirty: Rect);

    fn dispatch_touch(&self, point: &TouchPoint);

    /// Returns `true` when the key was consumed.
    fn dispatch_key(&self, event: &KeyEvent) -> bool;

    fn dispatch_mouse(&self, event: &MouseEvent);

    fn dispatch_rotation(&self, event: &RotationEvent) -> bool;

    /// Hit tests blur regions against the current render tree.
    fn window_blur_test(&self) {}

    fn set_root_size(&self, _width: f64, _height: f64, _scale: f64) {}

    fn notify_show(&self, _visible: bool) {}

    fn dump(&self, kind: DumpKind, out: &mut Vec<String>);
}

/// Page container of the element tree.
///
/// Navigation calls return immediately; the stage reports the end of a transition by
/// calling [`PipelineContext::notify_page_transition`].
pub trait Stage: Send + Sync {
    fn can_push_page(&self) -> bool;

    fn can_pop_page(&self) -> bool;

    fn can_replace_page(&self) -> bool;

    fn push_page(&self, ctx: &mut PipelineContext, page: Arc<Page>);

    fn replace_page(&self, ctx: &mut PipelineContext, page: Arc<Page>);

    fn pop_page(&self, ctx: &mut PipelineContext);

    fn pop_to_page(&self, ctx: &mut PipelineContext, page_id: PageId);

    /// Removes every page below the top one. Returns `false` when nothing was removed.
    fn clear_off_stage(&self, ctx: &mut PipelineContext) -> bool;

    fn refresh_focus(&self, _ctx: &mut PipelineContext) {}

    fn page_count(&self) -> usize;

    fn pop_dialog(&self, _ctx: &mut PipelineContext) -> bool {
        false
    }

    fn pop_popup(&self, _ctx: &mut PipelineContext) -> bool {
        false
    }
}

/// Platform window the context renders into.
pub trait Window: Send + Sync {
    fn request_frame(&self);

    fn set_root_render_node(&self, root: Arc<dyn RootElement>);
}

pub trait AccessibilityManager: Send + Sync {
    fn handle_component_post_binding(&self);

    fn dump_tree(&self, out: &mut Vec<String>);

    fn dump_property(&self, node_id: i64, out: &mut Vec<String>);

    fn dump_handle_event(&self, node_id: i64, action: i32, out: &mut Vec<String>);
}
