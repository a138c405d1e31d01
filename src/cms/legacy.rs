use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use serde_json::{Map, Value};
use tracing::debug;

use super::{CmsApi, CmsBridge, CmsEvent, HostWindow, SpaHandle};
use crate::emitter::{Emitter, ListenerId};

type Task = Box<dyn FnOnce(&dyn CmsApi) + Send>;

#[derive(Default)]
struct Handshake {
    api: Option<Arc<dyn CmsApi>>,
    postponed: Vec<Task>,
    page_ready: Option<ListenerId>,
}

/// The legacy handshake: installs a global `SPA` object the host calls into.
///
/// Synchronisation requests made before the host calls `init` are queued and
/// replayed in order afterwards.
pub struct Cms14 {
    this: Weak<Cms14>,
    bus: Option<Emitter<CmsEvent>>,
    state: Mutex<Handshake>,
}

impl Cms14 {
    pub fn new(bus: Option<Emitter<CmsEvent>>) -> Arc<Self> {
        Arc::new_cyclic(|this| Cms14 {
            this: this.clone(),
            bus,
            state: Mutex::new(Handshake::default()),
        })
    }

    fn state(&self) -> std::sync::MutexGuard<'_, Handshake> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `task` against the host API, or queues it until the handshake
    /// completes.
    fn postpone(&self, task: Task) {
        let api = {
            let mut state = self.state();
            match &state.api {
                Some(api) => Arc::clone(api),
                None => {
                    state.postponed.push(task);
                    return;
                }
            }
        };
        task(api.as_ref());
    }

    fn sync(&self) {
        self.postpone(Box::new(|api: &dyn CmsApi| {
            debug!("Synchronizing the page.");
            api.sync();
        }));
    }
}

fn flush(api: &Arc<dyn CmsApi>, tasks: Vec<Task>) {
    for task in tasks {
        task(api.as_ref());
    }
}

impl SpaHandle for Cms14 {
    fn init(&self, api: Arc<dyn CmsApi>) {
        debug!("Completed the handshake with the Experience Manager.");
        let tasks = {
            let mut state = self.state();
            state.api = Some(Arc::clone(&api));
            std::mem::take(&mut state.postponed)
        };
        flush(&api, tasks);
    }

    fn render_component(&self, id: &str, properties: Map<String, Value>) {
        let payload = Value::Object(properties.clone());
        debug!(component = id, properties = %payload, "Received component rendering request.");
        if let Some(bus) = &self.bus {
            bus.emit(&CmsEvent::Update {
                id: id.to_string(),
                properties,
            });
        }
    }
}

impl CmsBridge for Cms14 {
    fn initialize(&self, window: Arc<dyn HostWindow>) {
        if self.state().api.is_some() || window.has_spa() {
            return;
        }
        let Some(this) = self.this.upgrade() else {
            return;
        };
        debug!("Initiating a handshake with the Experience Manager.");

        if let Some(bus) = &self.bus {
            let handle = self.this.clone();
            let id = bus.on("page.ready", move |_: &CmsEvent| {
                if let Some(cms) = handle.upgrade() {
                    cms.sync();
                }
            });
            if let Some(previous) = self.state().page_ready.replace(id) {
                bus.off(previous);
            }
        }
        window.install_spa(this);
    }
}

impl Drop for Cms14 {
    fn drop(&mut self) {
        let id = self.state().page_ready.take();
        if let (Some(bus), Some(id)) = (&self.bus, id) {
            bus.off(id);
        }
    }
}

impl fmt::Debug for Cms14 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("Cms14")
            .field("connected", &state.api.is_some())
            .field("postponed", &state.postponed.len())
            .finish()
    }
}
