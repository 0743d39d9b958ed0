use std::collections::BTreeMap;

use super::PipelineContext;
use crate::events::TransitionEvent;

/// One-shot callback run when the awaited transition event fires.
pub type TransitionCallback = Box<dyn FnOnce(&mut PipelineContext) + Send>;

/// Identifier returned when registering a transition listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// Listeners waiting for page transition events.
///
/// Each listener is bound to one event and is removed when that event fires.
#[derive(Default)]
pub struct TransitionListeners {
    next_id: u64,
    listeners: BTreeMap<ListenerId, (TransitionEvent, TransitionCallback)>,
}

impl TransitionListeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, event: TransitionEvent, callback: TransitionCallback) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.listeners.insert(id, (event, callback));
        id
    }

    pub fn remove(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(&id).is_some()
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Removes and returns the callbacks waiting for `event`, oldest first.
    pub fn take_matching(&mut self, event: TransitionEvent) -> Vec<TransitionCallback> {
        let ids: Vec<ListenerId> = self
            .listeners
            .iter()
            .filter(|(_, (e, _))| *e == event)
            .map(|(id, _)| *id)
            .collect();

        ids.into_iter()
            .filter_map(|id| self.listeners.remove(&id))
            .map(|(_, callback)| callback)
            .collect()
    }
}
