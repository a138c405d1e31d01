use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use super::{
    HostSubscription, HostWindow, MessageEvent, MessageListener, ReadyState, ReadyStateListener,
    SpaHandle,
};

/// An in-memory window that records what the SPA does to it.
#[derive(Default)]
pub(crate) struct FakeWindow {
    next_id: AtomicU64,
    posted: Mutex<Vec<(Value, String)>>,
    messages: Mutex<Vec<(HostSubscription, MessageListener)>>,
    state: Mutex<Option<ReadyState>>,
    state_listeners: Mutex<Vec<(HostSubscription, ReadyStateListener)>>,
    scripts: Mutex<Vec<String>>,
    broken_scripts: Mutex<Vec<String>>,
    spa: Mutex<Option<Arc<dyn SpaHandle>>>,
}

impl FakeWindow {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(FakeWindow::default())
    }

    pub(crate) fn loading() -> Arc<Self> {
        let window = FakeWindow::default();
        *window.state.lock().unwrap() = Some(ReadyState::Loading);
        Arc::new(window)
    }

    fn id(&self) -> HostSubscription {
        HostSubscription(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    pub(crate) fn deliver(&self, origin: &str, data: Value) {
        self.dispatch(MessageEvent {
            origin: origin.to_string(),
            data: Some(data),
        });
    }

    pub(crate) fn deliver_empty(&self, origin: &str) {
        self.dispatch(MessageEvent {
            origin: origin.to_string(),
            data: None,
        });
    }

    fn dispatch(&self, event: MessageEvent) {
        let listeners: Vec<MessageListener> = self
            .messages
            .lock()
            .unwrap()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(&event);
        }
    }

    pub(crate) fn set_ready_state(&self, state: ReadyState) {
        *self.state.lock().unwrap() = Some(state);
        let listeners: Vec<ReadyStateListener> = self
            .state_listeners
            .lock()
            .unwrap()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(state);
        }
    }

    pub(crate) fn posted(&self) -> Vec<(Value, String)> {
        self.posted.lock().unwrap().clone()
    }

    pub(crate) fn listener_count(&self) -> usize {
        self.messages.lock().unwrap().len()
    }

    pub(crate) fn state_listener_count(&self) -> usize {
        self.state_listeners.lock().unwrap().len()
    }

    pub(crate) fn scripts(&self) -> Vec<String> {
        self.scripts.lock().unwrap().clone()
    }

    pub(crate) fn break_script(&self, src: &str) {
        self.broken_scripts.lock().unwrap().push(src.to_string());
    }

    pub(crate) fn spa(&self) -> Option<Arc<dyn SpaHandle>> {
        self.spa.lock().unwrap().clone()
    }
}

#[async_trait]
impl HostWindow for FakeWindow {
    fn post_message(&self, message: Value, target_origin: &str) {
        self.posted
            .lock()
            .unwrap()
            .push((message, target_origin.to_string()));
    }

    fn add_message_listener(&self, listener: MessageListener) -> HostSubscription {
        let id = self.id();
        self.messages.lock().unwrap().push((id, listener));
        id
    }

    fn remove_message_listener(&self, id: HostSubscription) {
        self.messages.lock().unwrap().retain(|(other, _)| *other != id);
    }

    fn ready_state(&self) -> ReadyState {
        self.state.lock().unwrap().unwrap_or(ReadyState::Complete)
    }

    fn add_ready_state_listener(&self, listener: ReadyStateListener) -> HostSubscription {
        let id = self.id();
        self.state_listeners.lock().unwrap().push((id, listener));
        id
    }

    fn remove_ready_state_listener(&self, id: HostSubscription) {
        self.state_listeners
            .lock()
            .unwrap()
            .retain(|(other, _)| *other != id);
    }

    async fn inject_script(&self, src: &str) -> Result<(), String> {
        if self.broken_scripts.lock().unwrap().iter().any(|broken| broken == src) {
            return Err(format!("{} failed to load", src));
        }
        self.scripts.lock().unwrap().push(src.to_string());
        Ok(())
    }

    fn has_spa(&self) -> bool {
        self.spa.lock().unwrap().is_some()
    }

    fn install_spa(&self, spa: Arc<dyn SpaHandle>) {
        *self.spa.lock().unwrap() = Some(spa);
    }
}
