use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, Weak};
use std::time::Instant;

use super::blur::{BlurRegionHandler, RoundedRect, WindowBlurRegions, WindowBlurStyle};
use super::dirty::DirtySet;
use super::node::{AccessibilityManager, Buildable, Focusable, Layoutable, Renderable, RootElement, Stage, Window};
use super::scheduler::ScheduleTask;
use super::transition::{ListenerId, TransitionCallback, TransitionListeners};
use super::{lock, SharedPipeline};
use crate::config::FrameworkConfig;
use crate::events::{
    AppStartExceptionKind, EventReporter, FrameworkEvent, KeyAction, KeyCode, KeyEvent, MouseEvent, RotationEvent,
    TouchPoint, TouchType, TransitionEvent,
};
use crate::executor::{SharedExecutor, TaskType};
use crate::geometry::Rect;
use crate::page::Page;
use crate::router::PageId;

/// One-shot callback run with the context.
pub type FlushCallback = Box<dyn FnOnce(&mut PipelineContext) + Send>;

/// Monotonic clock in nanoseconds.
pub type TimeProvider = Box<dyn Fn() -> u64 + Send>;

/// Callback posted to the JS queue after every frame.
pub type AnimationCallback = Arc<dyn Fn() + Send + Sync>;

/// Identifier of a composed element, shared by all elements built from one component.
pub type ComposeId = String;

/// Current step of the flush pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlushPhase {
    #[default]
    Idle,
    Build,
    Layout,
    Render,
    WindowBlur,
    Focus,
    PostFlush,
}

/// Per-window frame scheduler.
///
/// The context collects dirty nodes and frame callbacks between vsyncs and flushes them
/// in a fixed order: build, layout, render, window blur, focus, post flush. It is shared as
/// [`SharedPipeline`] and is only ever locked from the UI queue.
pub struct PipelineContext {
    weak_self: Weak<Mutex<PipelineContext>>,
    executor: SharedExecutor,
    window: Arc<dyn Window>,
    reporter: EventReporter,
    root: Option<Arc<dyn RootElement>>,
    accessibility: Option<Arc<dyn AccessibilityManager>>,
    phase: FlushPhase,

    dirty_elements: DirtySet<dyn Buildable>,
    need_rebuild_focus_elements: DirtySet<dyn Buildable>,
    dirty_layout_nodes: DirtySet<dyn Layoutable>,
    predict_layout_nodes: DirtySet<dyn Layoutable>,
    dirty_render_nodes: DirtySet<dyn Renderable>,
    dirty_render_nodes_in_overlay: DirtySet<dyn Renderable>,
    dirty_focus_node: Option<Weak<dyn Focusable>>,
    dirty_focus_scope: Option<Weak<dyn Focusable>>,

    after_build_callbacks: Vec<FlushCallback>,
    pre_flush_listeners: Vec<FlushCallback>,
    post_flush_listeners: Vec<FlushCallback>,
    page_update_tasks: VecDeque<FlushCallback>,
    schedule_tasks: BTreeMap<u32, Arc<dyn ScheduleTask>>,
    next_schedule_task_id: u32,

    composed_elements: HashMap<ComposeId, Vec<Weak<dyn Buildable>>>,
    deactivate_elements: HashMap<i32, Arc<dyn Buildable>>,
    transition_listeners: TransitionListeners,
    blur_regions: WindowBlurRegions,
    blur_handler: Option<BlurRegionHandler>,

    time_provider: TimeProvider,
    flush_animation_timestamp: u64,
    is_flushing_animation: bool,
    animation_callback: Option<AnimationCallback>,
    finish_handler: Option<Box<dyn Fn() + Send>>,
    animation_scale: f64,

    width: i32,
    height: i32,
    root_width: f64,
    root_height: f64,
    view_scale: f64,
    dirty_rect: Rect,
    surface_ready: bool,
    need_forced_refresh: bool,
    has_idle_tasks: bool,
    is_moving: bool,
    is_key_event: bool,
    on_show: bool,
}

impl PipelineContext {
    pub fn new(
        config: &FrameworkConfig,
        executor: SharedExecutor,
        window: Arc<dyn Window>,
        reporter: EventReporter,
    ) -> SharedPipeline {
        let started = Instant::now();
        let view_scale = if config.view_scale > 0.0 { config.view_scale } else { 1.0 };

        Arc::new_cyclic(|weak_self| {
            Mutex::new(PipelineContext {
                weak_self: weak_self.clone(),
                executor,
                window,
                reporter,
                root: None,
                accessibility: None,
                phase: FlushPhase::Idle,
                dirty_elements: DirtySet::new(),
                need_rebuild_focus_elements: DirtySet::new(),
                dirty_layout_nodes: DirtySet::new(),
                predict_layout_nodes: DirtySet::new(),
                dirty_render_nodes: DirtySet::new(),
                dirty_render_nodes_in_overlay: DirtySet::new(),
                dirty_focus_node: None,
                dirty_focus_scope: None,
                after_build_callbacks: Vec::new(),
                pre_flush_listeners: Vec::new(),
                post_flush_listeners: Vec::new(),
                page_update_tasks: VecDeque::new(),
                schedule_tasks: BTreeMap::new(),
                next_schedule_task_id: 0,
                composed_elements: HashMap::new(),
                deactivate_elements: HashMap::new(),
                transition_listeners: TransitionListeners::new(),
                blur_regions: WindowBlurRegions::default(),
                blur_handler: None,
                time_provider: Box::new(move || started.elapsed().as_nanos() as u64),
                flush_animation_timestamp: 0,
                is_flushing_animation: false,
                animation_callback: None,
                finish_handler: None,
                animation_scale: 1.0,
                width: 0,
                height: 0,
                root_width: 0.0,
                root_height: 0.0,
                view_scale,
                dirty_rect: Rect::default(),
                surface_ready: false,
                need_forced_refresh: false,
                has_idle_tasks: false,
                is_moving: false,
                is_key_event: false,
                on_show: false,
            })
        })
    }

    pub fn executor(&self) -> &SharedExecutor {
        &self.executor
    }

    pub fn reporter(&self) -> &EventReporter {
        &self.reporter
    }

    pub fn phase(&self) -> FlushPhase {
        self.phase
    }

    /// Posts `task` to the UI queue. The task is skipped if the context is gone by then.
    pub fn post_ui_task<F>(&self, task: F) -> bool
    where
        F: FnOnce(&mut PipelineContext) + Send + 'static,
    {
        let weak = self.weak_self.clone();
        self.executor.post_task(
            Box::new(move || {
                if let Some(pipeline) = weak.upgrade() {
                    task(&mut *lock(&pipeline));
                }
            }),
            TaskType::Ui,
        )
    }

    // ****************************************
    // ** Root, stage and collaborators

    pub fn setup_root_element(&mut self, root: Arc<dyn RootElement>) {
        self.window.set_root_render_node(root.clone());
        self.root = Some(root);
        self.apply_root_size();
        log::info!("root element attached");
    }

    pub fn root(&self) -> Option<Arc<dyn RootElement>> {
        self.root.clone()
    }

    /// Root element, reporting a start failure when it is missing.
    pub(crate) fn require_root(&self, action: &str) -> Option<Arc<dyn RootElement>> {
        if self.root.is_none() {
            log::error!("root element is missing, cannot {}", action);
            self.reporter.app_start_exception(AppStartExceptionKind::PipelineContext);
        }
        self.root.clone()
    }

    pub fn stage(&self) -> Option<Arc<dyn Stage>> {
        let stage = self.require_root("get the stage")?.stage();
        if stage.is_none() {
            log::error!("stage element is missing");
        }
        stage
    }

    pub fn set_accessibility_manager(&mut self, manager: Arc<dyn AccessibilityManager>) {
        self.accessibility = Some(manager);
    }

    pub fn accessibility_manager(&self) -> Option<Arc<dyn AccessibilityManager>> {
        self.accessibility.clone()
    }

    // ****************************************
    // ** Dirty registration

    pub fn add_dirty_element(&mut self, element: &Arc<dyn Buildable>) {
        log::trace!("schedule rebuild at depth {}", element.depth());
        self.dirty_elements.insert(element);
        self.has_idle_tasks = true;
        self.window.request_frame();
    }

    pub fn add_need_rebuild_focus_element(&mut self, element: &Arc<dyn Buildable>) {
        self.need_rebuild_focus_elements.insert(element);
    }

    pub fn add_dirty_layout_node(&mut self, node: &Arc<dyn Layoutable>) {
        log::trace!("schedule layout at depth {}", node.depth());
        self.dirty_layout_nodes.insert(node);
        self.has_idle_tasks = true;
        self.window.request_frame();
    }

    pub fn add_predict_layout_node(&mut self, node: &Arc<dyn Layoutable>) {
        self.predict_layout_nodes.insert(node);
        self.has_idle_tasks = true;
        self.window.request_frame();
    }

    pub fn add_dirty_render_node(&mut self, node: &Arc<dyn Renderable>, overlay: bool) {
        log::trace!("schedule render at depth {} (overlay: {})", node.depth(), overlay);
        if overlay {
            self.dirty_render_nodes_in_overlay.insert(node);
        } else {
            self.dirty_render_nodes.insert(node);
        }
        self.has_idle_tasks = true;
        self.window.request_frame();
    }

    pub fn add_dirty_focus(&mut self, node: &Arc<dyn Focusable>) {
        if node.is_scope() {
            self.dirty_focus_scope = Some(Arc::downgrade(node));
        } else {
            self.dirty_focus_node = Some(Arc::downgrade(node));
        }
        self.window.request_frame();
    }

    pub fn add_after_build_callback(&mut self, callback: FlushCallback) {
        self.after_build_callbacks.push(callback);
    }

    pub fn add_pre_flush_listener(&mut self, listener: FlushCallback) {
        self.pre_flush_listeners.push(listener);
        self.window.request_frame();
    }

    pub fn add_post_flush_listener(&mut self, listener: FlushCallback) {
        self.post_flush_listeners.push(listener);
        self.window.request_frame();
    }

    /// Registers a task for the next vsync and returns its id. Ids increase monotonically.
    pub fn add_schedule_task(&mut self, task: Arc<dyn ScheduleTask>) -> u32 {
        self.next_schedule_task_id = self.next_schedule_task_id.wrapping_add(1);
        self.schedule_tasks.insert(self.next_schedule_task_id, task);
        self.window.request_frame();
        self.next_schedule_task_id
    }

    pub fn remove_schedule_task(&mut self, id: u32) {
        self.schedule_tasks.remove(&id);
    }

    pub fn schedule_task_count(&self) -> usize {
        self.schedule_tasks.len()
    }

    /// Queues a page update. With `direct_execute` the queue is flushed right away,
    /// otherwise it runs on the next idle tick.
    pub fn add_page_update_task(&mut self, task: FlushCallback, direct_execute: bool) {
        self.page_update_tasks.push_back(task);
        if direct_execute {
            self.flush_page_update_tasks();
        } else {
            self.window.request_frame();
        }
    }

    pub fn mark_forced_refresh(&mut self) {
        self.need_forced_refresh = true;
    }

    // ****************************************
    // ** Composed and deactivated elements

    pub fn add_composed_element(&mut self, id: &str, element: &Arc<dyn Buildable>) {
        self.composed_elements
            .entry(id.to_string())
            .or_default()
            .push(Arc::downgrade(element));
    }

    pub fn remove_composed_element(&mut self, id: &str, element: &Arc<dyn Buildable>) {
        let target = Arc::as_ptr(element) as *const ();
        if let Some(elements) = self.composed_elements.get_mut(id) {
            elements.retain(|weak| weak.strong_count() > 0 && weak.as_ptr() as *const () != target);
            if elements.is_empty() {
                self.composed_elements.remove(id);
            }
        }
    }

    pub fn composed_element(&self, id: &str) -> Option<Arc<dyn Buildable>> {
        self.composed_elements.get(id)?.iter().find_map(Weak::upgrade)
    }

    /// Marks every element built from the component `id` for rebuild.
    pub fn schedule_update(&mut self, id: &str) {
        let elements: Vec<Arc<dyn Buildable>> = match self.composed_elements.get(id) {
            Some(elements) => elements.iter().filter_map(Weak::upgrade).collect(),
            None => {
                log::debug!("no composed element for id {}", id);
                Vec::new()
            }
        };
        for element in &elements {
            self.add_dirty_element(element);
        }
        self.flush_build_and_layout_before_surface_ready();
    }

    pub fn composed_element_rect(&self, id: &str) -> Option<Rect> {
        self.composed_element(id).map(|element| element.render_rect())
    }

    /// Soft-deleted elements are kept alive until the end of the current frame.
    pub fn add_deactivate_element(&mut self, id: i32, element: Arc<dyn Buildable>) {
        self.deactivate_elements.insert(id, element);
    }

    pub fn deactivate_element(&self, id: i32) -> Option<Arc<dyn Buildable>> {
        self.deactivate_elements.get(&id).cloned()
    }

    pub fn clear_deactivate_elements(&mut self) {
        self.deactivate_elements.clear();
    }

    // ****************************************
    // ** Page stage

    pub fn can_push_page(&self) -> bool {
        self.stage().is_some_and(|stage| stage.can_push_page())
    }

    pub fn can_pop_page(&self) -> bool {
        self.stage().is_some_and(|stage| stage.can_pop_page())
    }

    pub fn can_replace_page(&self) -> bool {
        self.stage().is_some_and(|stage| stage.can_replace_page())
    }

    pub fn push_page(&mut self, page: Arc<Page>) {
        let Some(stage) = self.stage() else {
            return;
        };
        log::debug!("push page {}", page.id());
        stage.push_page(self, page);
        self.flush_build_and_layout_before_surface_ready();
    }

    pub fn replace_page(&mut self, page: Arc<Page>) {
        let Some(stage) = self.stage() else {
            return;
        };
        log::debug!("replace page with {}", page.id());
        stage.replace_page(self, page);
    }

    pub fn pop_page(&mut self) {
        if let Some(stage) = self.stage() {
            stage.pop_page(self);
        }
    }

    pub fn pop_to_page(&mut self, page_id: PageId) {
        if let Some(stage) = self.stage() {
            stage.pop_to_page(self, page_id);
        }
    }

    /// Removes every page below the top one without a transition.
    pub fn clear_invisible_pages(&mut self) -> bool {
        match self.stage() {
            Some(stage) => stage.clear_off_stage(self),
            None => false,
        }
    }

    pub fn pop_dialog(&mut self) -> bool {
        match self.stage() {
            Some(stage) => stage.pop_dialog(self),
            None => false,
        }
    }

    pub fn pop_popup(&mut self) -> bool {
        match self.stage() {
            Some(stage) => stage.pop_popup(self),
            None => false,
        }
    }

    pub fn is_last_page(&self) -> bool {
        self.stage().map_or(true, |stage| stage.page_count() <= 1)
    }

    pub fn refresh_stage_focus(&mut self) {
        if let Some(stage) = self.stage() {
            stage.refresh_focus(self);
        }
    }

    /// Registers a one-shot callback for `event`. Returns `None` when there is no stage
    /// to produce transitions.
    pub fn add_page_transition_listener(
        &mut self,
        event: TransitionEvent,
        callback: TransitionCallback,
    ) -> Option<ListenerId> {
        self.stage()?;
        Some(self.transition_listeners.add(event, callback))
    }

    pub fn remove_page_transition_listener(&mut self, id: ListenerId) {
        self.transition_listeners.remove(id);
    }

    pub fn clear_page_transition_listeners(&mut self) {
        self.transition_listeners.clear();
    }

    /// Called by the stage when a page transition reaches `event`.
    pub fn notify_page_transition(&mut self, event: TransitionEvent) {
        let callbacks = self.transition_listeners.take_matching(event);
        log::debug!("transition {:?}, {} listener(s)", event, callbacks.len());
        for callback in callbacks {
            callback(self);
        }
    }

    // ****************************************
    // ** Window blur

    pub fn set_window_blur_region_handler(&mut self, handler: BlurRegionHandler) {
        self.blur_handler = Some(handler);
    }

    pub fn update_window_blur_region(
        &mut self,
        id: i32,
        inner: RoundedRect,
        progress: f32,
        style: WindowBlurStyle,
        coords: Vec<RoundedRect>,
    ) {
        self.blur_regions.update(id, inner, progress, style, coords);
    }

    pub fn clear_window_blur_region(&mut self, id: i32) {
        self.blur_regions.clear(id);
    }

    // ****************************************
    // ** Time, animation and lifecycle hooks

    pub fn set_time_provider(&mut self, provider: TimeProvider) {
        self.time_provider = provider;
    }

    /// Current time in nanoseconds. While animations are flushed this is the timestamp
    /// of the frame being produced.
    pub fn time_now(&self) -> u64 {
        if self.is_flushing_animation {
            self.flush_animation_timestamp
        } else {
            (self.time_provider)()
        }
    }

    pub fn set_animation_callback(&mut self, callback: AnimationCallback) {
        self.animation_callback = Some(callback);
    }

    pub fn set_animation_scale(&mut self, scale: f64) {
        self.animation_scale = scale;
    }

    pub fn animation_scale(&self) -> f64 {
        self.animation_scale
    }

    pub fn set_finish_handler(&mut self, handler: Box<dyn Fn() + Send>) {
        self.finish_handler = Some(handler);
    }

    /// Asks the embedder to close the window.
    pub fn finish(&self) {
        match &self.finish_handler {
            Some(handler) => handler(),
            None => log::error!("cannot finish, no finish handler set"),
        }
    }

    pub fn on_show(&mut self) {
        self.on_show = true;
        if let Some(root) = &self.root {
            root.notify_show(true);
        }
    }

    pub fn on_hide(&mut self) {
        self.on_show = false;
        if let Some(root) = &self.root {
            root.notify_show(false);
        }
    }

    pub fn is_shown(&self) -> bool {
        self.on_show
    }

    // ****************************************
    // ** Surface

    pub fn on_surface_changed(&mut self, width: i32, height: i32) {
        if self.width == width && self.height == height {
            return;
        }
        log::debug!("surface changed to {}x{}", width, height);
        self.width = width;
        self.height = height;
        self.apply_root_size();

        if self.surface_ready {
            return;
        }
        self.surface_ready = true;
        self.reporter.emit(FrameworkEvent::SurfaceReady { width, height });
        self.flush_pipeline_without_animation();
        self.mark_forced_refresh();
    }

    pub fn on_surface_destroyed(&mut self) {
        self.surface_ready = false;
    }

    pub fn is_surface_ready(&self) -> bool {
        self.surface_ready
    }

    pub fn set_view_scale(&mut self, scale: f64) {
        if scale <= 0.0 {
            log::warn!("ignoring invalid view scale {}", scale);
            return;
        }
        self.view_scale = scale;
        self.apply_root_size();
    }

    pub fn view_scale(&self) -> f64 {
        self.view_scale
    }

    /// Root rect in logical pixels.
    pub fn root_rect(&self) -> Rect {
        Rect::new(0.0, 0.0, self.root_width, self.root_height)
    }

    fn apply_root_size(&mut self) {
        self.root_width = f64::from(self.width) / self.view_scale;
        self.root_height = f64::from(self.height) / self.view_scale;
        if let Some(root) = &self.root {
            root.set_root_size(self.root_width, self.root_height, self.view_scale);
        }
    }

    // ****************************************
    // ** Frame entry points

    pub fn on_vsync_event(&mut self, nano_timestamp: u64, frame_count: u32) {
        log::trace!("vsync {} at {}", frame_count, nano_timestamp);

        if self.surface_ready {
            let now = self.time_now();
            self.flush_animation(now);
            self.flush_pipeline_without_animation();
            self.flush_animation_tasks();
            self.has_idle_tasks = false;
        } else {
            log::warn!("the surface is not ready, waiting");
        }

        if self.is_moving {
            self.window.request_frame();
            self.mark_forced_refresh();
            self.is_moving = false;
        }
    }

    pub fn on_idle(&mut self, deadline: u64) {
        log::trace!("idle until {}", deadline);
        self.flush_predict_layout();
        if self.has_idle_tasks {
            self.flush_pipeline_immediately();
            self.window.request_frame();
            self.mark_forced_refresh();
            self.has_idle_tasks = false;
        }
        self.flush_page_update_tasks();
    }

    pub fn flush_pipeline_immediately(&mut self) {
        if self.surface_ready {
            self.flush_pipeline_without_animation();
        } else {
            log::warn!("the surface is not ready, waiting");
        }
    }

    fn flush_pipeline_without_animation(&mut self) {
        self.phase = FlushPhase::Build;
        self.flush_build();
        self.phase = FlushPhase::Layout;
        self.flush_layout();
        self.phase = FlushPhase::Render;
        self.flush_render();
        self.phase = FlushPhase::WindowBlur;
        self.flush_window_blur();
        self.phase = FlushPhase::Focus;
        self.flush_focus();
        self.phase = FlushPhase::PostFlush;
        self.process_post_flush();
        self.phase = FlushPhase::Idle;
        self.clear_deactivate_elements();
    }

    /// Builds and lays out pages pushed before the first surface size arrives.
    pub fn flush_build_and_layout_before_surface_ready(&self) {
        if self.surface_ready {
            return;
        }
        self.post_ui_task(|ctx| {
            if ctx.surface_ready {
                return;
            }
            ctx.flush_build();
            ctx.flush_layout();
        });
    }

    // ****************************************
    // ** Phases

    /// Runs pre-flush listeners, then every registered schedule task once.
    pub fn flush_animation(&mut self, nano_timestamp: u64) {
        self.flush_animation_timestamp = nano_timestamp;
        self.is_flushing_animation = true;

        self.process_pre_flush();
        let tasks = std::mem::take(&mut self.schedule_tasks);
        for task in tasks.into_values() {
            task.on_frame(self, nano_timestamp);
        }

        self.is_flushing_animation = false;
    }

    pub fn flush_build(&mut self) {
        if self.dirty_elements.is_empty() {
            return;
        }
        for element in self.dirty_elements.drain() {
            element.rebuild(self);
        }
        for callback in std::mem::take(&mut self.after_build_callbacks) {
            callback(self);
        }
    }

    pub fn flush_layout(&mut self) {
        for node in self.dirty_layout_nodes.drain() {
            node.on_layout(self);
        }
    }

    pub fn flush_predict_layout(&mut self) {
        for node in self.predict_layout_nodes.drain() {
            node.on_predict_layout(self);
        }
    }

    pub fn flush_render(&mut self) {
        if self.dirty_render_nodes.is_empty() && self.dirty_render_nodes_in_overlay.is_empty() && !self.need_forced_refresh
        {
            return;
        }

        let root_rect = self.root_rect();
        let mut dirty = Rect::default();
        let mut is_root_rect = false;
        if self.need_forced_refresh {
            dirty = root_rect;
            is_root_rect = true;
        }

        let main = self.dirty_render_nodes.drain();
        self.repaint_all(main, root_rect, &mut dirty, &mut is_root_rect);
        let overlay = self.dirty_render_nodes_in_overlay.drain();
        self.repaint_all(overlay, root_rect, &mut dirty, &mut is_root_rect);

        if let Some(root) = self.require_root("finish render") {
            let scaled = dirty.scale(self.view_scale);
            root.finish_render(self.dirty_rect.combine(&scaled));
            self.dirty_rect = scaled;
        }
        self.need_forced_refresh = false;
    }

    fn repaint_all(&mut self, nodes: Vec<Arc<dyn Renderable>>, root_rect: Rect, dirty: &mut Rect, is_root_rect: &mut bool) {
        for node in nodes {
            node.repaint(self);
            if *is_root_rect {
                continue;
            }
            let rect = node.dirty_rect();
            if rect == root_rect {
                *dirty = rect;
                *is_root_rect = true;
            } else {
                *dirty = dirty.combine(&rect);
            }
        }
    }

    pub fn flush_window_blur(&mut self) {
        let Some(handler) = self.blur_handler.as_mut() else {
            return;
        };
        let Some(root) = self.root.clone() else {
            log::error!("root element is missing, skipping window blur");
            return;
        };

        if !self.blur_regions.is_empty() {
            root.window_blur_test();
        }
        if self.blur_regions.needs_refresh() {
            handler(self.blur_regions.take_rectangles(self.view_scale));
        }
    }

    pub fn flush_focus(&mut self) {
        if let Some(node) = self.dirty_focus_node.take().and_then(|weak| weak.upgrade()) {
            node.request_focus_immediately();
            self.dirty_focus_scope = None;
        } else if let Some(scope) = self.dirty_focus_scope.take().and_then(|weak| weak.upgrade()) {
            scope.request_focus_immediately();
        } else if let Some(root) = &self.root {
            if !root.is_current_focus() {
                root.request_focus_immediately();
            }
        }

        for element in self.need_rebuild_focus_elements.drain() {
            element.rebuild_focus_tree(self);
        }
    }

    fn process_pre_flush(&mut self) {
        for listener in std::mem::take(&mut self.pre_flush_listeners) {
            listener(self);
        }
    }

    fn process_post_flush(&mut self) {
        for listener in std::mem::take(&mut self.post_flush_listeners) {
            listener(self);
        }
    }

    pub fn flush_page_update_tasks(&mut self) {
        while let Some(task) = self.page_update_tasks.pop_front() {
            task(self);
        }
    }

    fn flush_animation_tasks(&self) {
        if let Some(callback) = &self.animation_callback {
            let callback = callback.clone();
            self.executor.post_task(Box::new(move || callback()), TaskType::Js);
        }
    }

    // ****************************************
    // ** Input

    pub fn on_touch_event(&mut self, point: &TouchPoint) {
        let Some(root) = self.require_root("dispatch touch event") else {
            return;
        };
        let scaled = point.scaled(self.view_scale);
        log::debug!("touch {:?} at ({}, {})", scaled.kind, scaled.x, scaled.y);

        if scaled.kind == TouchType::Move {
            self.is_moving = true;
        }
        if self.is_key_event {
            self.is_key_event = false;
        }
        root.dispatch_touch(&scaled);
    }

    /// Returns `true` when the key was consumed. The first direction key only switches
    /// the window into key navigation mode.
    pub fn on_key_event(&mut self, event: &KeyEvent) -> bool {
        let Some(root) = self.require_root("dispatch key event") else {
            return false;
        };

        if !self.is_key_event {
            if event.code.is_direction() {
                if event.action == KeyAction::Up {
                    self.is_key_event = true;
                }
                return true;
            }
            if event.code == KeyCode::Enter && event.action == KeyAction::Click {
                self.is_key_event = true;
            }
        }
        root.dispatch_key(event)
    }

    pub fn on_mouse_event(&mut self, event: &MouseEvent) {
        if event.is_left_touch() {
            self.on_touch_event(&event.to_touch_point());
        }
        let Some(root) = self.require_root("dispatch mouse event") else {
            return;
        };
        root.dispatch_mouse(&event.scaled(self.view_scale));
    }

    pub fn on_rotation_event(&mut self, event: &RotationEvent) -> bool {
        match self.require_root("dispatch rotation event") {
            Some(root) => root.dispatch_rotation(event),
            None => false,
        }
    }

    pub fn is_key_event(&self) -> bool {
        self.is_key_event
    }

    pub fn set_is_key_event(&mut self, is_key_event: bool) {
        self.is_key_event = is_key_event;
    }

    pub fn root_lost_focus(&self) {
        if let Some(root) = &self.root {
            root.lost_focus();
        }
    }

    /// Drops the root and every pending registration.
    pub fn destroy(&mut self) {
        self.root = None;
        self.composed_elements.clear();
        self.deactivate_elements.clear();
        self.dirty_elements.clear();
        self.need_rebuild_focus_elements.clear();
        self.dirty_layout_nodes.clear();
        self.predict_layout_nodes.clear();
        self.dirty_render_nodes.clear();
        self.dirty_render_nodes_in_overlay.clear();
        self.dirty_focus_node = None;
        self.dirty_focus_scope = None;
        self.after_build_callbacks.clear();
        self.pre_flush_listeners.clear();
        self.post_flush_listeners.clear();
        self.page_update_tasks.clear();
        self.schedule_tasks.clear();
        self.transition_listeners.clear();
        log::debug!("pipeline context destroyed");
    }
}
