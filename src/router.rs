//! Page stack management.
//!
//! The [`PageRouter`] owns the route stack and drives page loads across the two queues a
//! page lives on: the page script is loaded on the JS queue, then the built page is
//! attached to the stage on the UI queue. At most one page is staging (loaded but not
//! attached yet) at any time.
//!
//! Pops are asynchronous: the stage is asked to start a transition and the route stack
//! is only updated once the stage reports [`TransitionEvent::PopEnd`].

mod holder;
mod manifest;
mod page_id;
mod staging;
mod timers;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

pub use holder::PipelineHolder;
pub use manifest::{Manifest, RouteResolver};
pub use page_id::{PageId, PageIdPool, MAX_PAGE_ID_SIZE};
pub use staging::StagingGate;

use crate::config::{FrameworkConfig, RouterConfig};
use crate::errors::RouterError;
use crate::events::{AppStartExceptionKind, EventReporter, FrameworkEvent, PageRouterExceptionKind, TransitionEvent};
use crate::executor::{SharedExecutor, Task, TaskObserver, TaskType};
use crate::geometry::Rect;
use crate::page::{NodeId, Page, PageCommand};
use crate::pipeline::{lock, ListenerId, PipelineContext, SharedPipeline, TransitionCallback};

const SCRIPT_SUFFIX: &str = ".js";
const ROOT_EVENT_ID: &str = "_root";
const VIEW_APPEAR_PARAM: &str = "\"viewappear\",null,null";
const VIEW_DISAPPEAR_PARAM: &str = "\"viewdisappear\",null,null";

/// Callbacks into the script engine. Unless noted otherwise they are invoked on the JS
/// queue.
pub trait FrontendBridge: Send + Sync {
    /// Runs the page script. Commands the script pushes into `page` are applied once the
    /// page is attached.
    fn load_js(&self, url: &str, page: &Arc<Page>, is_main: bool);

    fn destroy_page(&self, page_id: PageId);

    /// Makes `page` the page scripts run against.
    fn update_page(&self, page: &Arc<Page>);

    /// Discards the page the engine was staging.
    fn reset_staging_page(&self);

    fn fire_async_event(&self, event_id: &str, args: &str);

    /// A timer armed with [`PageRouter::wait_timer`] fired. One-shot timers are already
    /// forgotten by the router; interval timers stay armed until
    /// [`PageRouter::clear_timer`] and are re-armed with `is_first == false`.
    fn timer_fired(&self, callback_id: &str, delay_ms: u64, is_interval: bool);

    fn animation_frame(&self, callback_id: &str, timestamp_ms: u64);

    /// Restyles the whole page. Invoked on the UI queue.
    fn rebuild_page(&self, page: &Page, ctx: &mut PipelineContext);
}

/// One route stack entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageInfo {
    pub page_id: PageId,
    pub url: String,
}

/// Router state as exposed to scripts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageState {
    /// Number of pages on the route stack
    pub index: usize,
    /// Last path segment of the top page, without the script suffix
    pub name: String,
    /// Directory of the top page, with a trailing `/`
    pub path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadMode {
    Main,
    Push,
    Replace,
}

impl LoadMode {
    fn exception_kind(self) -> PageRouterExceptionKind {
        match self {
            LoadMode::Replace => PageRouterExceptionKind::ReplacePage,
            LoadMode::Main | LoadMode::Push => PageRouterExceptionKind::LoadPage,
        }
    }
}

#[derive(Default)]
struct RouteState {
    stack: Vec<PageInfo>,
    pages: HashMap<PageId, Arc<Page>>,
    is_stack_full: bool,
}

pub struct PageRouter {
    weak_self: Weak<PageRouter>,
    config: RouterConfig,
    executor: SharedExecutor,
    bridge: Arc<dyn FrontendBridge>,
    resolver: Arc<dyn RouteResolver>,
    reporter: EventReporter,
    page_ids: PageIdPool,
    staging: StagingGate,
    holder: PipelineHolder,
    routes: Mutex<RouteState>,
    pop_listener: Mutex<Option<ListenerId>>,
    timers: timers::JsTimers,
}

impl PageRouter {
    pub fn new(
        config: &FrameworkConfig,
        executor: SharedExecutor,
        bridge: Arc<dyn FrontendBridge>,
        resolver: Arc<dyn RouteResolver>,
        reporter: EventReporter,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| PageRouter {
            weak_self: weak_self.clone(),
            config: config.router.clone(),
            executor,
            bridge,
            resolver,
            reporter,
            page_ids: PageIdPool::new(),
            staging: StagingGate::new(),
            holder: PipelineHolder::new(),
            routes: Mutex::new(RouteState::default()),
            pop_listener: Mutex::new(None),
            timers: timers::JsTimers::default(),
        })
    }

    fn routes(&self) -> MutexGuard<'_, RouteState> {
        self.routes.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Makes `pipeline` available to the router and hooks the animation frame callbacks
    /// into its vsync.
    pub fn attach_pipeline_context(&self, pipeline: SharedPipeline) {
        {
            let weak = self.weak_self.clone();
            lock(&pipeline).set_animation_callback(Arc::new(move || {
                if let Some(router) = weak.upgrade() {
                    router.flush_animation_tasks();
                }
            }));
        }
        self.holder.attach(pipeline);
    }

    // ****************************************
    // ** Navigation

    /// Loads the main page. An empty url loads the manifest entry page.
    pub fn run_page(&self, url: &str, params: &str) -> Result<PageId, RouterError> {
        let path = if url.is_empty() { self.resolver.entry() } else { self.resolver.page_path(url) };
        let Some(path) = path else {
            log::error!("cannot run page '{}', no such page in the manifest", url);
            self.reporter.app_start_exception(AppStartExceptionKind::RunPage);
            return Err(RouterError::RouteNotFound(url.to_string()));
        };
        self.load_page(path, params, LoadMode::Main)
    }

    pub fn push(&self, uri: &str, params: &str) -> Result<PageId, RouterError> {
        if uri.is_empty() {
            log::error!("router push: uri is empty");
            return Err(RouterError::EmptyUri);
        }
        if self.routes().is_stack_full {
            log::error!(
                "the route stack has reached its max size {}, cannot push '{}'",
                self.config.max_router_stack,
                uri
            );
            return Err(RouterError::RouteStackFull);
        }
        let path = self.resolve(uri)?;
        self.load_page(path, params, LoadMode::Push)
    }

    pub fn replace(&self, uri: &str, params: &str) -> Result<PageId, RouterError> {
        if uri.is_empty() {
            log::error!("router replace: uri is empty");
            return Err(RouterError::EmptyUri);
        }
        let path = self.resolve(uri)?;
        self.load_page(path, params, LoadMode::Replace)
    }

    /// Goes back one page, or back to `uri` when it is not empty.
    pub fn back(&self, uri: &str) -> Result<(), RouterError> {
        if uri.is_empty() {
            return self.pop_page();
        }
        let path = self.resolve(uri)?;
        self.pop_to_page(&path)
    }

    /// Pops the top page. Popping the last page destroys it and finishes the window.
    pub fn pop_page(&self) -> Result<(), RouterError> {
        self.post_ui(|router, ctx| router.pop_page_on_ui(ctx))
    }

    /// Pops every page above the most recent page loaded from `url`. Unknown urls are ignored.
    pub fn pop_to_page(&self, url: &str) -> Result<(), RouterError> {
        let url = url.to_string();
        self.post_ui(move |router, ctx| router.pop_to_page_on_ui(ctx, url))
    }

    /// Removes every page below the top one.
    pub fn clear(&self) -> Result<(), RouterError> {
        self.post_ui(|router, ctx| {
            if ctx.clear_invisible_pages() {
                router.on_clear_invisible_pages_success();
            }
        })
    }

    fn resolve(&self, uri: &str) -> Result<String, RouterError> {
        self.resolver.page_path(uri).ok_or_else(|| {
            log::warn!("uri '{}' is not supported by the router", uri);
            RouterError::RouteNotFound(uri.to_string())
        })
    }

    // ****************************************
    // ** Queries

    pub fn stack_size(&self) -> usize {
        self.routes().stack.len()
    }

    pub fn route_stack(&self) -> Vec<PageInfo> {
        self.routes().stack.clone()
    }

    pub fn running_page_id(&self) -> Option<PageId> {
        self.routes().stack.last().map(|info| info.page_id)
    }

    /// Url of the top page without its script suffix.
    pub fn running_page_url(&self) -> Option<String> {
        let routes = self.routes();
        let url = &routes.stack.last()?.url;
        Some(url.strip_suffix(SCRIPT_SUFFIX).unwrap_or(url).to_string())
    }

    /// Most recent page loaded from `url`.
    pub fn page_id_by_url(&self, url: &str) -> Option<PageId> {
        self.routes()
            .stack
            .iter()
            .rev()
            .find(|info| info.url == url)
            .map(|info| info.page_id)
    }

    pub fn page(&self, page_id: PageId) -> Option<Arc<Page>> {
        self.routes().pages.get(&page_id).cloned()
    }

    pub fn state(&self) -> Option<PageState> {
        let (index, url) = {
            let routes = self.routes();
            let top = routes.stack.last()?;
            (routes.stack.len(), top.url.clone())
        };

        let url = url.strip_suffix(SCRIPT_SUFFIX).unwrap_or(&url);
        let (path, name) = match url.rfind('/') {
            Some(pos) => (url[..=pos].to_string(), url[pos + 1..].to_string()),
            None => (String::new(), url.to_string()),
        };
        Some(PageState { index, name, path })
    }

    pub fn is_staging(&self) -> bool {
        self.staging.is_staging()
    }

    // ****************************************
    // ** Page updates and queue access

    /// Applies the commands a page script buffered since the last update.
    pub fn trigger_page_update(&self, page_id: PageId, direct_execute: bool) -> Result<(), RouterError> {
        let Some(page) = self.page(page_id) else {
            log::error!("cannot update {}, no such page", page_id);
            self.reporter
                .page_router_exception(PageRouterExceptionKind::UpdatePage, &page_id.to_string());
            return Err(RouterError::PageNotFound);
        };
        let commands = page.pop_all_commands();

        self.post_ui(move |_, ctx| {
            ctx.add_page_update_task(
                Box::new(move |ctx| {
                    page.execute_commands(commands, ctx);
                    if let Some(accessibility) = ctx.accessibility_manager() {
                        accessibility.handle_component_post_binding();
                    }
                    for node in page.pop_all_dirty_nodes() {
                        ctx.schedule_update(&node.to_string());
                    }
                }),
                direct_execute,
            );
        })
    }

    /// Runs `task` on the UI queue and waits for it, once a pipeline context is attached.
    pub fn post_sync_task_to_page(&self, task: Task) -> Result<(), RouterError> {
        if self.holder.get(self.config.attach_timeout).is_none() {
            return Err(RouterError::PipelineUnavailable);
        }
        if self.executor.post_sync_task(task, TaskType::Ui) {
            Ok(())
        } else {
            Err(RouterError::Dispatch(TaskType::Ui))
        }
    }

    /// Global rect of the element built for `node_id`. Returns an empty rect when the node
    /// is unknown or the context is busy.
    pub fn bounding_rect(&self, node_id: NodeId) -> Rect {
        let Some(pipeline) = self.holder.try_get() else {
            return Rect::default();
        };
        let rect = Arc::new(Mutex::new(Rect::default()));
        let slot = rect.clone();
        let task: Task = Box::new(move || {
            if let Ok(ctx) = pipeline.try_lock() {
                if let Some(found) = ctx.composed_element_rect(&node_id.to_string()) {
                    *slot.lock().unwrap_or_else(|e| e.into_inner()) = found;
                }
            }
        });
        if let Err(e) = self.post_sync_task_to_page(task) {
            log::warn!("bounding rect of node {} unavailable: {}", node_id, e);
        }
        let result = *rect.lock().unwrap_or_else(|e| e.into_inner());
        result
    }

    pub fn rebuild_all_pages(&self) {
        let pages: Vec<Weak<Page>> = self.routes().pages.values().map(Arc::downgrade).collect();
        for page in pages {
            let posted = self.post_ui(move |router, ctx| {
                if let Some(page) = page.upgrade() {
                    router.bridge.rebuild_page(&page, ctx);
                }
            });
            if let Err(e) = posted {
                log::warn!("cannot rebuild pages: {}", e);
                return;
            }
        }
    }

    pub fn add_task_observer(&self, observer: TaskObserver) {
        self.executor.add_task_observer(observer);
    }

    pub fn remove_task_observer(&self) {
        self.executor.remove_task_observer();
    }

    /// Sends an event to the script engine. `param` is followed by the callback and dom
    /// change slots, then by `json_args` when present.
    pub fn fire_async_event(&self, event_id: &str, param: &str, json_args: &str) {
        let mut args = format!("{},null,null", param);
        if !json_args.is_empty() {
            args.push(',');
            args.push_str(json_args);
        }
        let event_id = event_id.to_string();
        self.post_js(move |router| router.bridge.fire_async_event(&event_id, &args));
    }

    pub fn on_page_show(&self) {
        self.fire_async_event(ROOT_EVENT_ID, VIEW_APPEAR_PARAM, "");
    }

    pub fn on_page_hide(&self) {
        self.fire_async_event(ROOT_EVENT_ID, VIEW_DISAPPEAR_PARAM, "");
    }

    fn post_js<F>(&self, task: F) -> bool
    where
        F: FnOnce(&PageRouter) + Send + 'static,
    {
        let weak = self.weak_self.clone();
        self.executor.post_task(
            Box::new(move || {
                if let Some(router) = weak.upgrade() {
                    task(&router);
                }
            }),
            TaskType::Js,
        )
    }

    /// Posts `task` to the UI queue, where it runs with the locked pipeline context.
    fn post_ui<F>(&self, task: F) -> Result<(), RouterError>
    where
        F: FnOnce(&PageRouter, &mut PipelineContext) + Send + 'static,
    {
        let Some(pipeline) = self.holder.get(self.config.attach_timeout) else {
            log::error!("no pipeline context attached");
            return Err(RouterError::PipelineUnavailable);
        };
        let weak = self.weak_self.clone();
        let posted = self.executor.post_task(
            Box::new(move || {
                if let Some(router) = weak.upgrade() {
                    task(&router, &mut *lock(&pipeline));
                }
            }),
            TaskType::Ui,
        );
        if posted {
            Ok(())
        } else {
            Err(RouterError::Dispatch(TaskType::Ui))
        }
    }

    // ****************************************
    // ** Staging

    fn load_page(&self, url: String, params: &str, mode: LoadMode) -> Result<PageId, RouterError> {
        let Some(page_id) = self.page_ids.generate_next_page_id() else {
            log::error!("cannot load '{}', no page id left", url);
            self.reporter.page_router_exception(mode.exception_kind(), &url);
            return Err(RouterError::PageIdExhausted);
        };

        if !self.staging.acquire(self.config.staging_timeout) {
            log::error!("cannot load '{}', still waiting for the current page to finish loading", url);
            self.page_ids.recycle_page_id(page_id);
            self.reporter.page_router_exception(mode.exception_kind(), &url);
            return Err(RouterError::StagingBusy);
        }

        log::debug!("loading {} as {}", url, page_id);
        let page = Arc::new(Page::new(page_id, url, params));
        let posted = self.post_js(move |router| {
            router.bridge.load_js(page.url(), &page, mode == LoadMode::Main);
            router.on_page_ready(page, mode);
        });

        if !posted {
            self.staging.release();
            self.page_ids.recycle_page_id(page_id);
            return Err(RouterError::Dispatch(TaskType::Js));
        }
        Ok(page_id)
    }

    /// Called on the JS queue once the page script ran.
    fn on_page_ready(&self, page: Arc<Page>, mode: LoadMode) {
        let page_id = page.id();
        let commands = page.pop_all_commands();

        let attached = self.post_ui(move |router, ctx| router.attach_staged_page(ctx, page, commands, mode));
        if let Err(e) = attached {
            log::error!("dropping staged {}: {}", page_id, e);
            self.on_page_destroy(page_id);
            self.reset_staging_page();
            self.staging.release();
        }
    }

    fn attach_staged_page(&self, ctx: &mut PipelineContext, page: Arc<Page>, commands: Vec<PageCommand>, mode: LoadMode) {
        page.execute_commands(commands, ctx);
        page.clear_dirty_nodes();
        if let Some(accessibility) = ctx.accessibility_manager() {
            accessibility.handle_component_post_binding();
        }

        match mode {
            LoadMode::Main | LoadMode::Push if ctx.can_push_page() => {
                if mode != LoadMode::Main {
                    self.on_page_hide();
                }
                ctx.push_page(page.clone());
                self.on_push_page_success(&page);
                self.set_current_page(page.id());
            }
            LoadMode::Replace if ctx.can_replace_page() => {
                self.on_page_hide();
                if let Some(running) = self.running_page_id() {
                    self.on_page_destroy(running);
                }
                ctx.replace_page(page.clone());
                self.on_replace_page_success(&page);
                self.set_current_page(page.id());
            }
            _ => {
                log::warn!("stage refused {}, destroying it", page.id());
                self.on_page_destroy(page.id());
                self.reset_staging_page();
            }
        }
        self.staging.release();
    }

    fn on_push_page_success(&self, page: &Arc<Page>) {
        let mut routes = self.routes();
        routes.pages.insert(page.id(), page.clone());
        routes.stack.push(PageInfo { page_id: page.id(), url: page.url().to_string() });

        if routes.stack.len() >= self.config.max_router_stack && !routes.is_stack_full {
            routes.is_stack_full = true;
            self.reporter
                .page_router_exception(PageRouterExceptionKind::StackOverflow, page.url());
        }
        drop(routes);

        self.reporter.emit(FrameworkEvent::PagePushed { page_id: page.id(), url: page.url().to_string() });
    }

    fn on_replace_page_success(&self, page: &Arc<Page>) {
        let mut routes = self.routes();
        if let Some(old) = routes.stack.pop() {
            routes.pages.remove(&old.page_id);
        }
        routes.pages.insert(page.id(), page.clone());
        routes.stack.push(PageInfo { page_id: page.id(), url: page.url().to_string() });
        routes.is_stack_full = false;
        drop(routes);

        self.reporter
            .emit(FrameworkEvent::PageReplaced { page_id: page.id(), url: page.url().to_string() });
    }

    // ****************************************
    // ** Popping

    fn pop_page_on_ui(&self, ctx: &mut PipelineContext) {
        if self.stack_size() == 1 {
            self.on_page_hide();
            if let Some(running) = self.running_page_id() {
                self.on_page_destroy(running);
            }
            self.on_pop_page_success();
            ctx.finish();
            return;
        }

        if !ctx.can_pop_page() {
            self.reset_staging_page();
            return;
        }
        let Some(destroy_id) = self.running_page_id() else {
            log::warn!("nothing to pop");
            return;
        };

        self.on_page_hide();
        let weak = self.weak_self.clone();
        self.listen_pop_end(
            ctx,
            Box::new(move |_| {
                let Some(router) = weak.upgrade() else {
                    return;
                };
                router.on_page_destroy(destroy_id);
                if let Some(top) = router.on_pop_page_success() {
                    router.set_current_page(top);
                }
                router.on_page_show();
            }),
        );
        ctx.pop_page();
    }

    fn pop_to_page_on_ui(&self, ctx: &mut PipelineContext, url: String) {
        let Some(page_id) = self.page_id_by_url(&url) else {
            log::warn!("no page loaded from '{}' on the route stack", url);
            return;
        };
        if !ctx.can_pop_page() {
            self.reset_staging_page();
            return;
        }

        self.on_page_hide();
        let weak = self.weak_self.clone();
        self.listen_pop_end(
            ctx,
            Box::new(move |_| {
                let Some(router) = weak.upgrade() else {
                    return;
                };
                if let Some(top) = router.on_pop_to_page_success(&url) {
                    router.set_current_page(top);
                }
                router.on_page_show();
            }),
        );
        ctx.pop_to_page(page_id);
    }

    /// Replaces the pending pop listener, if any, with `callback`.
    fn listen_pop_end(&self, ctx: &mut PipelineContext, callback: TransitionCallback) {
        let mut listener = self.pop_listener.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = listener.take() {
            ctx.remove_page_transition_listener(previous);
        }
        *listener = ctx.add_page_transition_listener(TransitionEvent::PopEnd, callback);
    }

    fn on_pop_page_success(&self) -> Option<PageId> {
        let top = {
            let mut routes = self.routes();
            if let Some(popped) = routes.stack.pop() {
                routes.pages.remove(&popped.page_id);
            }
            routes.is_stack_full = false;
            routes.stack.last().map(|info| info.page_id)
        };
        self.reporter.emit(FrameworkEvent::PagesPopped { top });
        top
    }

    fn on_pop_to_page_success(&self, url: &str) -> Option<PageId> {
        let (destroyed, top) = {
            let mut routes = self.routes();
            let mut destroyed = Vec::new();
            while routes.stack.last().is_some_and(|info| info.url != url) {
                if let Some(info) = routes.stack.pop() {
                    routes.pages.remove(&info.page_id);
                    destroyed.push(info.page_id);
                }
            }
            routes.is_stack_full = false;
            (destroyed, routes.stack.last().map(|info| info.page_id))
        };

        for page_id in destroyed {
            self.on_page_destroy(page_id);
        }
        self.reporter.emit(FrameworkEvent::PagesPopped { top });
        top
    }

    fn on_clear_invisible_pages_success(&self) {
        let (destroyed, top) = {
            let mut routes = self.routes();
            let Some(top) = routes.stack.pop() else {
                return;
            };
            let destroyed = std::mem::take(&mut routes.stack);
            for info in &destroyed {
                routes.pages.remove(&info.page_id);
            }
            let top_id = top.page_id;
            routes.stack.push(top);
            routes.is_stack_full = false;
            (destroyed, top_id)
        };

        for info in destroyed {
            self.on_page_destroy(info.page_id);
        }
        self.set_current_page(top);
    }

    // ****************************************
    // ** Script engine notifications

    fn set_current_page(&self, page_id: PageId) {
        match self.page(page_id) {
            Some(page) => {
                self.post_js(move |router| router.bridge.update_page(&page));
            }
            None => log::warn!("cannot make {} current, no such page", page_id),
        }
    }

    /// Destroys the page's script instance and gives its id back to the pool.
    fn on_page_destroy(&self, page_id: PageId) {
        log::debug!("destroying {}", page_id);
        self.post_js(move |router| {
            router.bridge.destroy_page(page_id);
            router.page_ids.recycle_page_id(page_id);
        });
        self.reporter.emit(FrameworkEvent::PageDestroyed { page_id });
    }

    fn reset_staging_page(&self) {
        self.post_js(|router| router.bridge.reset_staging_page());
    }
}
