//! Script side page.
//!
//! A [`Page`] is created by the router for every load. While the page script runs on the
//! JS queue it buffers commands that mutate the element tree; those are executed later on
//! the UI queue, where the pipeline context is available.

use std::sync::{Mutex, MutexGuard};

use crate::pipeline::PipelineContext;
use crate::router::PageId;

/// Node identifier inside a page document.
pub type NodeId = i32;

/// Buffered tree mutation, executed on the UI queue.
pub type PageCommand = Box<dyn FnOnce(&Page, &mut PipelineContext) + Send>;

pub struct Page {
    id: PageId,
    url: String,
    params: String,
    commands: Mutex<Vec<PageCommand>>,
    dirty_nodes: Mutex<Vec<NodeId>>,
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("id", &self.id)
            .field("url", &self.url)
            .field("commands", &lock(&self.commands).len())
            .field("dirty_nodes", &*lock(&self.dirty_nodes))
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl Page {
    pub fn new(id: PageId, url: impl Into<String>, params: impl Into<String>) -> Self {
        Self {
            id,
            url: url.into(),
            params: params.into(),
            commands: Mutex::new(Vec::new()),
            dirty_nodes: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> PageId {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn params(&self) -> &str {
        &self.params
    }

    pub fn push_command(&self, command: PageCommand) {
        lock(&self.commands).push(command);
    }

    pub fn pop_all_commands(&self) -> Vec<PageCommand> {
        std::mem::take(&mut *lock(&self.commands))
    }

    pub fn pending_commands(&self) -> usize {
        lock(&self.commands).len()
    }

    /// Runs buffered commands in the order they were pushed.
    pub fn execute_commands(&self, commands: Vec<PageCommand>, ctx: &mut PipelineContext) {
        for command in commands {
            command(self, ctx);
        }
    }

    pub fn push_dirty_node(&self, node: NodeId) {
        let mut nodes = lock(&self.dirty_nodes);
        if !nodes.contains(&node) {
            nodes.push(node);
        }
    }

    pub fn pop_all_dirty_nodes(&self) -> Vec<NodeId> {
        std::mem::take(&mut *lock(&self.dirty_nodes))
    }

    pub fn clear_dirty_nodes(&self) {
        lock(&self.dirty_nodes).clear();
    }
}
