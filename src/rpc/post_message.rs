use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde_json::Value;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use super::{Rpc, RpcMessage, Transport};
use crate::cms::{HostSubscription, HostWindow, MessageEvent};
use crate::url::is_matched;

/// Where outbound messages go: the parent frame of `window`, restricted to
/// `origin`. Nothing is sent until both are known.
#[derive(Default)]
struct Target {
    window: Option<Arc<dyn HostWindow>>,
    origin: Option<String>,
}

#[derive(Default)]
struct Outbound {
    target: RwLock<Target>,
}

impl Transport for Outbound {
    fn send(&self, message: &RpcMessage) {
        let target = self.target.read().unwrap_or_else(PoisonError::into_inner);
        let (Some(window), Some(origin)) = (&target.window, &target.origin) else {
            return;
        };
        let Ok(data) = serde_json::to_value(message) else {
            return;
        };
        debug!(origin = %origin, message = %data, "[OUTGOING]");
        window.post_message(data, origin);
    }
}

/// RPC over the host window's `postMessage`.
pub struct PostMessage {
    rpc: Arc<Rpc>,
    outbound: Arc<Outbound>,
    subscription: Mutex<Option<HostSubscription>>,
}

impl PostMessage {
    pub fn new() -> Arc<Self> {
        let outbound = Arc::new(Outbound::default());
        Arc::new(PostMessage {
            rpc: Arc::new(Rpc::new(outbound.clone())),
            outbound,
            subscription: Mutex::new(None),
        })
    }

    /// The RPC endpoint that rides on this channel.
    pub fn rpc(&self) -> &Arc<Rpc> {
        &self.rpc
    }

    /// Points the channel at `window`, accepting messages from `origin`
    /// (`*` accepts any). Re-initialising moves the inbound listener.
    ///
    /// Inbound requests run on the tokio runtime current at this call; without
    /// one they are dropped.
    pub fn initialize(&self, origin: &str, window: Arc<dyn HostWindow>) {
        let mut subscription = self.subscription.lock().unwrap_or_else(PoisonError::into_inner);
        if let (Some(id), Some(previous)) = (
            subscription.take(),
            self.outbound
                .target
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .window
                .clone(),
        ) {
            previous.remove_message_listener(id);
        }

        *self.outbound.target.write().unwrap_or_else(PoisonError::into_inner) = Target {
            window: Some(Arc::clone(&window)),
            origin: Some(origin.to_string()),
        };

        let rpc = Arc::clone(&self.rpc);
        let accepted = if origin == "*" { String::new() } else { origin.to_string() };
        let runtime = Handle::try_current().ok();
        *subscription = Some(window.add_message_listener(Arc::new(move |event: &MessageEvent| {
            receive(&rpc, &accepted, runtime.as_ref(), event);
        })));
    }

    /// Stops listening to the window.
    pub fn close(&self) {
        let id = self.subscription.lock().unwrap_or_else(PoisonError::into_inner).take();
        let window = self
            .outbound
            .target
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .window
            .clone();
        if let (Some(id), Some(window)) = (id, window) {
            window.remove_message_listener(id);
        }
    }
}

fn receive(rpc: &Arc<Rpc>, accepted: &str, runtime: Option<&Handle>, event: &MessageEvent) {
    let Some(data) = &event.data else {
        return;
    };
    if !is_matched(&event.origin, accepted) {
        return;
    }
    if data.get("type").is_some_and(|kind| !kind.is_null()) {
        debug!(origin = %event.origin, message = %data, "[INCOMING]");
    }
    let Ok(message) = serde_json::from_value::<RpcMessage>(Value::clone(data)) else {
        return;
    };

    match message {
        request @ RpcMessage::Request { .. } => match runtime {
            Some(runtime) => {
                let rpc = Arc::clone(rpc);
                runtime.spawn(async move { rpc.process(request).await });
            }
            None => warn!("Dropping an incoming request: no async runtime is available."),
        },
        other => rpc.process_notification(other),
    }
}

impl fmt::Debug for PostMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let target = self.outbound.target.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("PostMessage")
            .field("origin", &target.origin)
            .field("rpc", &self.rpc)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cms::testing::FakeWindow;
    use serde_json::json;

    #[tokio::test]
    async fn serves_requests_from_the_accepted_origin() {
        let window = FakeWindow::new();
        let channel = PostMessage::new();
        channel
            .rpc()
            .register("ping", |_: Vec<Value>| async { Ok::<_, Value>(json!("pong")) });
        channel.initialize("http://cms.org", window.clone());

        window.deliver(
            "http://evil.org",
            json!({ "type": "brxm:request", "id": "0", "command": "ping", "payload": [] }),
        );
        window.deliver("http://cms.org", json!({ "type": "brxm:request", "id": "1", "command": "ping", "payload": [] }));
        window.deliver("http://cms.org", json!({ "type": "brxm:request", "id": "2", "command": "nope", "payload": [] }));
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        assert_eq!(
            window.posted(),
            vec![(
                json!({ "type": "brxm:response", "id": "1", "state": "fulfilled", "result": "pong" }),
                "http://cms.org".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn wildcard_origin_accepts_everything() {
        let window = FakeWindow::new();
        let channel = PostMessage::new();
        let seen = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&seen);
        channel.rpc().on("update", move |_| *counter.lock().unwrap() += 1);
        channel.initialize("*", window.clone());

        window.deliver("http://a.org", json!({ "type": "brxm:event", "event": "update", "payload": {} }));
        window.deliver("http://b.org", json!({ "type": "brxm:event", "event": "update", "payload": {} }));
        window.deliver_empty("http://b.org");

        assert_eq!(*seen.lock().unwrap(), 2);
    }

    #[test]
    fn nothing_is_sent_before_initialisation() {
        let window = FakeWindow::new();
        let channel = PostMessage::new();
        channel.rpc().trigger("ready", Value::Null);
        assert!(window.posted().is_empty());

        channel.initialize("http://cms.org", window.clone());
        channel.rpc().trigger("ready", Value::Null);
        assert_eq!(window.posted().len(), 1);

        channel.close();
        assert_eq!(window.listener_count(), 0);
    }
}
