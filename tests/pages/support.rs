//! Test doubles for the HTTP client and the browser window, plus page models.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use spa_sdk::cms::{
    HostSubscription, HostWindow, MessageEvent, MessageListener, ReadyState, ReadyStateListener,
    SpaHandle,
};
use spa_sdk::{HttpClient, HttpError, HttpRequest, HttpResponse};

/// Answers by URL prefix and records every request.
#[derive(Default)]
pub struct RecordingClient {
    routes: Mutex<Vec<(String, Value)>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl RecordingClient {
    pub fn new() -> Arc<Self> {
        Arc::new(RecordingClient::default())
    }

    pub fn route(&self, prefix: &str, data: Value) {
        self.routes.lock().unwrap().push((prefix.to_string(), data));
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpClient for RecordingClient {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let data = self
            .routes
            .lock()
            .unwrap()
            .iter()
            .find(|(prefix, _)| request.url.starts_with(prefix.as_str()))
            .map(|(_, data)| data.clone());
        self.requests.lock().unwrap().push(request);
        data.map(|data| HttpResponse { data })
            .ok_or_else(|| HttpError::new("no route").with_status(404))
    }
}

/// A window whose traffic the test drives by hand.
#[derive(Default)]
pub struct TestWindow {
    next_id: AtomicU64,
    posted: Mutex<Vec<Value>>,
    listeners: Mutex<Vec<(HostSubscription, MessageListener)>>,
    spa: Mutex<Option<Arc<dyn SpaHandle>>>,
}

impl TestWindow {
    pub fn new() -> Arc<Self> {
        Arc::new(TestWindow::default())
    }

    pub fn deliver(&self, origin: &str, data: Value) {
        let listeners: Vec<MessageListener> = self
            .listeners
            .lock()
            .unwrap()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        let event = MessageEvent {
            origin: origin.to_string(),
            data: Some(data),
        };
        for listener in listeners {
            listener(&event);
        }
    }

    pub fn posted(&self) -> Vec<Value> {
        self.posted.lock().unwrap().clone()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }

    pub fn spa(&self) -> Option<Arc<dyn SpaHandle>> {
        self.spa.lock().unwrap().clone()
    }
}

#[async_trait]
impl HostWindow for TestWindow {
    fn post_message(&self, message: Value, _target_origin: &str) {
        self.posted.lock().unwrap().push(message);
    }

    fn add_message_listener(&self, listener: MessageListener) -> HostSubscription {
        let id = HostSubscription(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.listeners.lock().unwrap().push((id, listener));
        id
    }

    fn remove_message_listener(&self, id: HostSubscription) {
        self.listeners.lock().unwrap().retain(|(other, _)| *other != id);
    }

    fn ready_state(&self) -> ReadyState {
        ReadyState::Complete
    }

    fn add_ready_state_listener(&self, _listener: ReadyStateListener) -> HostSubscription {
        HostSubscription(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn remove_ready_state_listener(&self, _id: HostSubscription) {}

    async fn inject_script(&self, _src: &str) -> Result<(), String> {
        Ok(())
    }

    fn has_spa(&self) -> bool {
        self.spa.lock().unwrap().is_some()
    }

    fn install_spa(&self, spa: Arc<dyn SpaHandle>) {
        *self.spa.lock().unwrap() = Some(spa);
    }
}

/// Lets spawned update tasks run to completion.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

pub fn v1_model(preview: bool) -> Value {
    json!({
        "root": { "$ref": "/page/root" },
        "document": { "$ref": "/page/doc" },
        "links": { "site": { "href": "/news", "type": "internal" } },
        "meta": { "version": "1.0", "preview": preview, "locale": "nl_NL" },
        "page": {
            "root": {
                "id": "root", "type": "component", "name": "root",
                "meta": { "pageTitle": "News", "params": { "layout": "wide" } },
                "children": [{ "$ref": "/page/main" }]
            },
            "main": {
                "id": "main", "type": "container", "name": "main", "xtype": "HST.vBox",
                "children": [{ "$ref": "/page/banner" }]
            },
            "banner": {
                "id": "banner", "type": "container-item", "name": "banner", "label": "Banner",
                "links": { "self": { "href": "http://cms.org/pages/news?_hn:ref=banner", "type": "external" } },
                "content": { "$ref": "/page/banner-content" }
            },
            "banner-content": { "type": "componentcontent", "data": { "title": "Hello" } },
            "doc": { "type": "document", "data": { "id": "d1", "name": "news", "locale": "nl_NL" } }
        }
    })
}

pub fn banner_update(label: &str) -> Value {
    json!({
        "root": { "$ref": "/page/banner" },
        "page": {
            "banner": {
                "id": "banner", "type": "container-item", "name": "banner", "label": label,
                "links": { "self": { "href": "http://cms.org/pages/news?_hn:ref=banner", "type": "external" } }
            }
        }
    })
}

pub fn v09_model(preview: bool) -> Value {
    json!({
        "_links": { "site": { "href": "/site/news" } },
        "_meta": { "version": "0.9", "preview": preview },
        "page": {
            "id": "r", "type": "COMPONENT", "name": "root",
            "_meta": { "pageTitle": "Legacy" },
            "components": [{
                "id": "m", "type": "CONTAINER_COMPONENT", "name": "main",
                "components": [{
                    "id": "r1_r2", "type": "CONTAINER_ITEM_COMPONENT", "name": "banner", "label": "Banner",
                    "_links": { "componentRendering": { "href": "/site/resourceapi/news?_hn:ref=r1_r2" } }
                }]
            }]
        },
        "content": {
            "u1": { "id": "u1", "name": "article", "localeString": "en", "_links": { "site": { "href": "/site/article" } } }
        }
    })
}
