//! Bridges to the Experience Manager hosting the SPA in preview.
//!
//! [`Cms`] talks the RPC protocol over `postMessage`; [`Cms14`] implements
//! the older handshake where the host calls into a global `SPA` object. Both
//! translate host instructions into [`CmsEvent`]s and the page's `sync` into
//! a host call. The browser itself is abstracted as a [`HostWindow`].

mod bridge;
mod legacy;
#[cfg(test)]
pub(crate) mod testing;

pub use bridge::Cms;
pub use legacy::Cms14;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::emitter::Event;

#[derive(Debug, Clone, PartialEq)]
pub enum CmsEvent {
    /// The page finished rendering and may be synchronised with the host.
    PageReady,
    /// The host asks for a component to be rendered with new properties.
    Update {
        id: String,
        properties: Map<String, Value>,
    },
}

impl Event for CmsEvent {
    fn name(&self) -> &str {
        match self {
            CmsEvent::PageReady => "page.ready",
            CmsEvent::Update { .. } => "cms.update",
        }
    }
}

impl CmsEvent {
    /// Reads an update instruction `{ id, properties }`.
    pub fn update_from_value(value: &Value) -> Option<Self> {
        Some(CmsEvent::Update {
            id: value.get("id")?.as_str()?.to_string(),
            properties: value
                .get("properties")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
        })
    }
}

/// Handle of a listener registered on a [`HostWindow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostSubscription(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Loading,
    Interactive,
    Complete,
}

/// An inbound `message` event.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageEvent {
    pub origin: String,
    /// `None` for messages without data.
    pub data: Option<Value>,
}

pub type MessageListener = Arc<dyn Fn(&MessageEvent) + Send + Sync>;
pub type ReadyStateListener = Arc<dyn Fn(ReadyState) + Send + Sync>;

/// The calls the host makes into the SPA during the legacy handshake.
pub trait SpaHandle: Send + Sync {
    fn init(&self, api: Arc<dyn CmsApi>);
    fn render_component(&self, id: &str, properties: Map<String, Value>);
}

/// The host API handed over by the legacy handshake.
pub trait CmsApi: Send + Sync {
    fn sync(&self);
}

/// The browser window the SPA runs in.
///
/// Listeners may be removed from within their own invocation, so
/// implementations should not hold locks while dispatching.
#[async_trait]
pub trait HostWindow: Send + Sync {
    /// Posts `message` to the parent frame.
    fn post_message(&self, message: Value, target_origin: &str);

    fn add_message_listener(&self, listener: MessageListener) -> HostSubscription;

    fn remove_message_listener(&self, id: HostSubscription);

    fn ready_state(&self) -> ReadyState;

    fn add_ready_state_listener(&self, listener: ReadyStateListener) -> HostSubscription;

    fn remove_ready_state_listener(&self, id: HostSubscription);

    /// Appends a script to the document; resolves once it loaded.
    async fn inject_script(&self, src: &str) -> Result<(), String>;

    /// Whether a global `SPA` object is already installed.
    fn has_spa(&self) -> bool;

    fn install_spa(&self, spa: Arc<dyn SpaHandle>);
}

/// A bridge to the host, selected by the deployment setup.
pub trait CmsBridge: Send + Sync {
    fn initialize(&self, window: Arc<dyn HostWindow>);
}
