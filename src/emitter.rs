//! A typed, synchronous event bus.
//!
//! Listeners are keyed by event name and invoked in registration order on the
//! emitting thread. Cloning an `Emitter` yields a handle to the same listener
//! table, which is how entities share the page-update bus without owning it.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// An event that can travel over an [`Emitter`].
pub trait Event {
    /// The name listeners subscribe to.
    fn name(&self) -> &str;
}

/// Handle returned by [`Emitter::on`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;
type ListenerTable<E> = HashMap<String, Vec<(ListenerId, Listener<E>)>>;

pub struct Emitter<E> {
    listeners: Arc<RwLock<ListenerTable<E>>>,
    next_id: Arc<AtomicU64>,
}

impl<E: Event> Emitter<E> {
    pub fn new() -> Self {
        Emitter {
            listeners: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn on<F>(&self, event: &str, listener: F) -> ListenerId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(event.to_string())
            .or_default()
            .push((id, Arc::new(listener)));
        id
    }

    /// Removes a listener. Unknown ids are ignored.
    pub fn off(&self, id: ListenerId) {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        for event_listeners in listeners.values_mut() {
            event_listeners.retain(|(listener_id, _)| *listener_id != id);
        }
        listeners.retain(|_, event_listeners| !event_listeners.is_empty());
    }

    /// Invokes every listener of `event.name()`.
    ///
    /// The table lock is released before listeners run, so a listener may
    /// subscribe, unsubscribe or emit again.
    pub fn emit(&self, event: &E) {
        let snapshot: Vec<Listener<E>> = {
            let listeners = self.listeners.read().unwrap_or_else(PoisonError::into_inner);
            match listeners.get(event.name()) {
                Some(event_listeners) => event_listeners
                    .iter()
                    .map(|(_, listener)| Arc::clone(listener))
                    .collect(),
                None => return,
            }
        };

        for listener in snapshot {
            listener(event);
        }
    }

    pub fn clear_listeners(&self) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(event)
            .map_or(0, Vec::len)
    }
}

impl<E: Event> Default for Emitter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for Emitter<E> {
    fn clone(&self) -> Self {
        Emitter {
            listeners: Arc::clone(&self.listeners),
            next_id: Arc::clone(&self.next_id),
        }
    }
}

impl<E> fmt::Debug for Emitter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let listeners = self.listeners.read().unwrap_or_else(PoisonError::into_inner);
        let mut events: Vec<&str> = listeners.keys().map(String::as_str).collect();
        events.sort_unstable();
        f.debug_struct("Emitter").field("events", &events).finish()
    }
}
