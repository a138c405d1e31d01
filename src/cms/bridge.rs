use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use serde_json::Value;
use tracing::debug;

use super::{CmsBridge, CmsEvent, HostSubscription, HostWindow, ReadyState};
use crate::emitter::{Emitter, ListenerId};
use crate::rpc::Rpc;

type WindowSlot = Arc<RwLock<Option<Arc<dyn HostWindow>>>>;

/// The RPC bridge: announces readiness, serves `inject`, forwards `update`
/// events to the CMS bus and asks the host to `sync` once the page is ready.
pub struct Cms {
    rpc: Arc<Rpc>,
    window: WindowSlot,
    bus: Option<Emitter<CmsEvent>>,
    page_ready: Option<ListenerId>,
    update: ListenerId,
    state_listener: Arc<Mutex<Option<HostSubscription>>>,
}

impl Cms {
    pub fn new(rpc: Arc<Rpc>, bus: Option<Emitter<CmsEvent>>) -> Arc<Self> {
        let window: WindowSlot = Arc::new(RwLock::new(None));

        let page_ready = bus.as_ref().map(|bus| {
            let rpc = Arc::downgrade(&rpc);
            bus.on("page.ready", move |_: &CmsEvent| {
                if let Some(rpc) = rpc.upgrade() {
                    debug!("Synchronizing the page.");
                    drop(rpc.call("sync", Vec::new()));
                }
            })
        });

        let forward = bus.clone();
        let update = rpc.on("update", move |event| {
            debug!(event = %event.payload, "Received update event.");
            let Some(bus) = &forward else {
                return;
            };
            if let Some(update) = CmsEvent::update_from_value(&event.payload) {
                bus.emit(&update);
            }
        });

        let slot = Arc::clone(&window);
        rpc.register("inject", move |payload: Vec<Value>| {
            let window = slot.read().unwrap_or_else(PoisonError::into_inner).clone();
            async move { inject(window, payload).await }
        });

        Arc::new(Cms {
            rpc,
            window,
            bus,
            page_ready,
            update,
            state_listener: Arc::new(Mutex::new(None)),
        })
    }
}

async fn inject(window: Option<Arc<dyn HostWindow>>, payload: Vec<Value>) -> Result<Value, Value> {
    let Some(window) = window else {
        return Err(Value::from("SPA document is not ready."));
    };
    let resource = payload
        .first()
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    debug!(resource = %resource, "Received request to inject a resource.");

    window
        .inject_script(&resource)
        .await
        .map(|()| Value::Null)
        .map_err(|_| Value::from(format!("Failed to load resource '{}'.", resource)))
}

fn announce(rpc: &Rpc) {
    debug!("The page is ready to accept incoming messages.");
    rpc.trigger("ready", Value::Null);
}

impl CmsBridge for Cms {
    /// Binds the bridge to `window`. Binding the same window twice does
    /// nothing; readiness is announced once the document stops loading.
    fn initialize(&self, window: Arc<dyn HostWindow>) {
        {
            let mut current = self.window.write().unwrap_or_else(PoisonError::into_inner);
            if current.as_ref().is_some_and(|current| Arc::ptr_eq(current, &window)) {
                return;
            }
            *current = Some(Arc::clone(&window));
        }

        if window.ready_state() != ReadyState::Loading {
            announce(&self.rpc);
            return;
        }

        let rpc = Arc::downgrade(&self.rpc);
        let host: Weak<dyn HostWindow> = Arc::downgrade(&window);
        let registration = Arc::clone(&self.state_listener);
        let id = window.add_ready_state_listener(Arc::new(move |state| {
            if state == ReadyState::Loading {
                return;
            }
            if let Some(rpc) = rpc.upgrade() {
                announce(&rpc);
            }
            let id = registration.lock().unwrap_or_else(PoisonError::into_inner).take();
            if let (Some(id), Some(host)) = (id, host.upgrade()) {
                host.remove_ready_state_listener(id);
            }
        }));
        *self.state_listener.lock().unwrap_or_else(PoisonError::into_inner) = Some(id);
    }
}

impl Drop for Cms {
    fn drop(&mut self) {
        if let (Some(bus), Some(id)) = (&self.bus, self.page_ready) {
            bus.off(id);
        }
        self.rpc.off(self.update);
    }
}

impl fmt::Debug for Cms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cms")
            .field("rpc", &self.rpc)
            .field(
                "bound",
                &self.window.read().unwrap_or_else(PoisonError::into_inner).is_some(),
            )
            .finish()
    }
}
