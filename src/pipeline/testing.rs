//! Test doubles for the element tree and the platform window.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::node::{AccessibilityManager, Buildable, DumpKind, Focusable, Layoutable, Renderable, RootElement, Stage, TreeNode, Window};
use super::{lock, PipelineContext, ScheduleTask, SharedPipeline};
use crate::config::FrameworkConfig;
use crate::events::{EventReporter, KeyEvent, MouseEvent, RotationEvent, TouchPoint};
use crate::executor::ManualTaskExecutor;
use crate::geometry::Rect;
use crate::page::Page;
use crate::router::PageId;

pub type Log = Arc<Mutex<Vec<&'static str>>>;

pub struct Harness {
    pub executor: Arc<ManualTaskExecutor>,
    pub window: Arc<FakeWindow>,
    pub root: Arc<FakeRoot>,
    pub stage: Arc<FakeStage>,
    pub reporter: EventReporter,
    pub pipeline: SharedPipeline,
}

pub fn harness() -> Harness {
    let h = harness_without_root();
    lock(&h.pipeline).setup_root_element(h.root.clone());
    h
}

pub fn harness_without_root() -> Harness {
    let _ = env_logger::builder().is_test(true).try_init();

    let executor = Arc::new(ManualTaskExecutor::new());
    let window = Arc::new(FakeWindow::default());
    let stage = Arc::new(FakeStage::default());
    let root = Arc::new(FakeRoot::new(stage.clone()));
    let reporter = EventReporter::new(64);
    let pipeline = PipelineContext::new(&FrameworkConfig::default(), executor.clone(), window.clone(), reporter.clone());

    Harness { executor, window, root, stage, reporter, pipeline }
}

#[derive(Default, Clone)]
pub struct Visits(Arc<Mutex<Vec<u32>>>);

impl Visits {
    pub fn depths(&self) -> Vec<u32> {
        self.0.lock().unwrap().clone()
    }
}

pub struct FakeElement {
    depth: u32,
    visits: Visits,
    child: Option<Arc<dyn Buildable>>,
    log: Option<Log>,
}

impl FakeElement {
    pub fn new(depth: u32, visits: &Visits) -> Arc<Self> {
        Arc::new(Self { depth, visits: visits.clone(), child: None, log: None })
    }

    /// Marks `child` dirty while being rebuilt.
    pub fn with_child(depth: u32, visits: &Visits, child: Arc<dyn Buildable>) -> Arc<Self> {
        Arc::new(Self { depth, visits: visits.clone(), child: Some(child), log: None })
    }

    pub fn recording(depth: u32, visits: &Visits, log: Log) -> Arc<Self> {
        Arc::new(Self { depth, visits: visits.clone(), child: None, log: Some(log) })
    }
}

impl TreeNode for FakeElement {
    fn depth(&self) -> u32 {
        self.depth
    }
}

impl Buildable for FakeElement {
    fn rebuild(&self, ctx: &mut PipelineContext) {
        self.visits.0.lock().unwrap().push(self.depth);
        if let Some(log) = &self.log {
            log.lock().unwrap().push("build");
        }
        if let Some(child) = &self.child {
            ctx.add_dirty_element(child);
        }
    }

    fn render_rect(&self) -> Rect {
        Rect::new(0.0, 0.0, 10.0, f64::from(self.depth))
    }
}

pub struct FakeRenderNode {
    depth: u32,
    rect: Rect,
    log: Log,
}

impl FakeRenderNode {
    pub fn new(depth: u32, rect: Rect, log: Log) -> Arc<Self> {
        Arc::new(Self { depth, rect, log })
    }
}

impl TreeNode for FakeRenderNode {
    fn depth(&self) -> u32 {
        self.depth
    }
}

impl Layoutable for FakeRenderNode {
    fn on_layout(&self, _ctx: &mut PipelineContext) {
        self.log.lock().unwrap().push("layout");
    }
}

impl Renderable for FakeRenderNode {
    fn repaint(&self, _ctx: &mut PipelineContext) {
        self.log.lock().unwrap().push("render");
    }

    fn dirty_rect(&self) -> Rect {
        self.rect
    }
}

pub struct FakeFocus {
    scope: bool,
    requests: AtomicUsize,
}

impl FakeFocus {
    pub fn new(scope: bool) -> Arc<Self> {
        Arc::new(Self { scope, requests: AtomicUsize::new(0) })
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl Focusable for FakeFocus {
    fn request_focus_immediately(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
    }

    fn is_scope(&self) -> bool {
        self.scope
    }
}

#[derive(Default)]
pub struct FakeWindow {
    frames: AtomicUsize,
    has_root: AtomicBool,
}

impl FakeWindow {
    pub fn frames(&self) -> usize {
        self.frames.load(Ordering::SeqCst)
    }

    pub fn has_root(&self) -> bool {
        self.has_root.load(Ordering::SeqCst)
    }
}

impl Window for FakeWindow {
    fn request_frame(&self) {
        self.frames.fetch_add(1, Ordering::SeqCst);
    }

    fn set_root_render_node(&self, _root: Arc<dyn RootElement>) {
        self.has_root.store(true, Ordering::SeqCst);
    }
}

pub struct FakeRoot {
    stage: Arc<FakeStage>,
    focused: AtomicBool,
    focus_requests: AtomicUsize,
    rendered: Mutex<Vec<Rect>>,
    touches: Mutex<Vec<(f64, f64)>>,
    keys: AtomicUsize,
    mice: AtomicUsize,
    rotations: AtomicUsize,
    blur_tests: AtomicUsize,
}

impl FakeRoot {
    pub fn new(stage: Arc<FakeStage>) -> Self {
        Self {
            stage,
            focused: AtomicBool::new(false),
            focus_requests: AtomicUsize::new(0),
            rendered: Mutex::new(Vec::new()),
            touches: Mutex::new(Vec::new()),
            keys: AtomicUsize::new(0),
            mice: AtomicUsize::new(0),
            rotations: AtomicUsize::new(0),
            blur_tests: AtomicUsize::new(0),
        }
    }

    pub fn set_focused(&self, focused: bool) {
        self.focused.store(focused, Ordering::SeqCst);
    }

    pub fn focus_requests(&self) -> usize {
        self.focus_requests.load(Ordering::SeqCst)
    }

    pub fn take_rendered(&self) -> Vec<Rect> {
        std::mem::take(&mut *self.rendered.lock().unwrap())
    }

    pub fn touches(&self) -> Vec<(f64, f64)> {
        self.touches.lock().unwrap().clone()
    }

    pub fn keys(&self) -> usize {
        self.keys.load(Ordering::SeqCst)
    }

    pub fn mice(&self) -> usize {
        self.mice.load(Ordering::SeqCst)
    }

    pub fn rotations(&self) -> usize {
        self.rotations.load(Ordering::SeqCst)
    }

    pub fn blur_tests(&self) -> usize {
        self.blur_tests.load(Ordering::SeqCst)
    }
}

impl RootElement for FakeRoot {
    fn stage(&self) -> Option<Arc<dyn Stage>> {
        Some(self.stage.clone())
    }

    fn is_current_focus(&self) -> bool {
        self.focused.load(Ordering::SeqCst)
    }

    fn request_focus_immediately(&self) {
        self.focus_requests.fetch_add(1, Ordering::SeqCst);
    }

    fn finish_render(&self, dirty: Rect) {
        self.rendered.lock().unwrap().push(dirty);
    }

    fn dispatch_touch(&self, point: &TouchPoint) {
        self.touches.lock().unwrap().push((point.x, point.y));
    }

    fn dispatch_key(&self, _event: &KeyEvent) -> bool {
        self.keys.fetch_add(1, Ordering::SeqCst);
        true
    }

    fn dispatch_mouse(&self, _event: &MouseEvent) {
        self.mice.fetch_add(1, Ordering::SeqCst);
    }

    fn dispatch_rotation(&self, _event: &RotationEvent) -> bool {
        self.rotations.fetch_add(1, Ordering::SeqCst);
        true
    }

    fn window_blur_test(&self) {
        self.blur_tests.fetch_add(1, Ordering::SeqCst);
    }

    fn dump(&self, kind: DumpKind, out: &mut Vec<String>) {
        out.push(format!("{:?} tree", kind));
    }
}

/// Stage keeping a plain page stack. Transitions never end on their own: tests call
/// [`PipelineContext::notify_page_transition`] to finish them.
pub struct FakeStage {
    pages: Mutex<Vec<Arc<Page>>>,
    calls: Mutex<Vec<String>>,
    can_push: AtomicBool,
    can_pop: AtomicBool,
    can_replace: AtomicBool,
}

impl Default for FakeStage {
    fn default() -> Self {
        Self {
            pages: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            can_push: AtomicBool::new(true),
            can_pop: AtomicBool::new(true),
            can_replace: AtomicBool::new(true),
        }
    }
}

impl FakeStage {
    pub fn set_can_push(&self, value: bool) {
        self.can_push.store(value, Ordering::SeqCst);
    }

    pub fn set_can_pop(&self, value: bool) {
        self.can_pop.store(value, Ordering::SeqCst);
    }

    pub fn set_can_replace(&self, value: bool) {
        self.can_replace.store(value, Ordering::SeqCst);
    }

    pub fn page_ids(&self) -> Vec<PageId> {
        self.pages.lock().unwrap().iter().map(|page| page.id()).collect()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Stage for FakeStage {
    fn can_push_page(&self) -> bool {
        self.can_push.load(Ordering::SeqCst)
    }

    fn can_pop_page(&self) -> bool {
        self.can_pop.load(Ordering::SeqCst)
    }

    fn can_replace_page(&self) -> bool {
        self.can_replace.load(Ordering::SeqCst)
    }

    fn push_page(&self, _ctx: &mut PipelineContext, page: Arc<Page>) {
        self.record(format!("push {}", page.id()));
        self.pages.lock().unwrap().push(page);
    }

    fn replace_page(&self, _ctx: &mut PipelineContext, page: Arc<Page>) {
        self.record(format!("replace {}", page.id()));
        let mut pages = self.pages.lock().unwrap();
        pages.pop();
        pages.push(page);
    }

    fn pop_page(&self, _ctx: &mut PipelineContext) {
        self.record("pop".to_string());
        self.pages.lock().unwrap().pop();
    }

    fn pop_to_page(&self, _ctx: &mut PipelineContext, page_id: PageId) {
        self.record(format!("pop to {}", page_id));
        let mut pages = self.pages.lock().unwrap();
        while pages.last().is_some_and(|page| page.id() != page_id) {
            pages.pop();
        }
    }

    fn clear_off_stage(&self, _ctx: &mut PipelineContext) -> bool {
        self.record("clear".to_string());
        let mut pages = self.pages.lock().unwrap();
        if pages.len() <= 1 {
            return false;
        }
        let below = pages.len() - 1;
        pages.drain(..below);
        true
    }

    fn page_count(&self) -> usize {
        self.pages.lock().unwrap().len()
    }
}

#[derive(Default)]
pub struct FakeAccessibility {
    bindings: AtomicUsize,
}

impl FakeAccessibility {
    pub fn bindings(&self) -> usize {
        self.bindings.load(Ordering::SeqCst)
    }
}

impl AccessibilityManager for FakeAccessibility {
    fn handle_component_post_binding(&self) {
        self.bindings.fetch_add(1, Ordering::SeqCst);
    }

    fn dump_tree(&self, out: &mut Vec<String>) {
        out.push("accessibility tree".to_string());
    }

    fn dump_property(&self, node_id: i64, out: &mut Vec<String>) {
        out.push(format!("property of {}", node_id));
    }

    fn dump_handle_event(&self, node_id: i64, action: i32, out: &mut Vec<String>) {
        out.push(format!("action {} on {}", action, node_id));
    }
}

pub struct NoopTask;

impl ScheduleTask for NoopTask {
    fn on_frame(self: Arc<Self>, _ctx: &mut PipelineContext, _nano_timestamp: u64) {}
}
