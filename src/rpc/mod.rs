//! Request/response/event RPC between the SPA and the authoring frame.
//!
//! The channel is symmetric: either side may call commands registered on the
//! other and trigger fire-and-forget events. Only the pairing of a response
//! with its request (by id) is guaranteed; pending calls may complete in any
//! order.

mod post_message;

pub use post_message::PostMessage;

use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::task::{Context, Poll};

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::debug;

use crate::emitter::{Emitter, Event, ListenerId};

pub const TYPE_EVENT: &str = "brxm:event";
pub const TYPE_RESPONSE: &str = "brxm:response";
pub const TYPE_REQUEST: &str = "brxm:request";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseState {
    Fulfilled,
    Rejected,
}

/// A message on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RpcMessage {
    #[serde(rename = "brxm:request")]
    Request {
        id: String,
        command: String,
        #[serde(default)]
        payload: Vec<Value>,
    },
    #[serde(rename = "brxm:response")]
    Response {
        id: String,
        state: ResponseState,
        #[serde(default)]
        result: Value,
    },
    #[serde(rename = "brxm:event")]
    Event {
        event: String,
        #[serde(default)]
        payload: Value,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum RpcError {
    /// The remote handler failed; carries whatever it rejected with.
    Rejected(Value),
    /// The call was abandoned before a response arrived.
    Dropped,
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RpcError::Rejected(reason) => write!(f, "call rejected: {}", reason),
            RpcError::Dropped => write!(f, "call dropped without a response"),
        }
    }
}

impl Error for RpcError {}

/// An event received from the remote side.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteEvent {
    pub event: String,
    pub payload: Value,
}

impl Event for RemoteEvent {
    fn name(&self) -> &str {
        &self.event
    }
}

/// Carries outbound messages to the remote side.
pub trait Transport: Send + Sync {
    fn send(&self, message: &RpcMessage);
}

/// Serves one command. An `Err` becomes a rejected response.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, payload: Vec<Value>) -> Result<Value, Value>;
}

#[async_trait]
impl<F, Fut> Handler for F
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, Value>> + Send + 'static,
{
    async fn handle(&self, payload: Vec<Value>) -> Result<Value, Value> {
        self(payload).await
    }
}

type PendingCalls = HashMap<String, oneshot::Sender<Result<Value, RpcError>>>;

pub struct Rpc {
    transport: Arc<dyn Transport>,
    calls: Mutex<PendingCalls>,
    handlers: RwLock<HashMap<String, Arc<dyn Handler>>>,
    events: Emitter<RemoteEvent>,
}

impl Rpc {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Rpc {
            transport,
            calls: Mutex::new(HashMap::new()),
            handlers: RwLock::new(HashMap::new()),
            events: Emitter::new(),
        }
    }

    fn pending(&self) -> std::sync::MutexGuard<'_, PendingCalls> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sends a request right away; the returned call resolves with the
    /// response. Dropping it without awaiting is fine.
    pub fn call(&self, command: &str, payload: Vec<Value>) -> PendingCall {
        let (sender, receiver) = oneshot::channel();
        let id = {
            let mut calls = self.pending();
            let mut rng = rand::thread_rng();
            let id = loop {
                let id = rng.gen::<u64>().to_string();
                if !calls.contains_key(&id) {
                    break id;
                }
            };
            calls.insert(id.clone(), sender);
            id
        };

        self.transport.send(&RpcMessage::Request {
            id,
            command: command.to_string(),
            payload,
        });
        PendingCall { receiver }
    }

    /// Registers the handler of `command`, replacing any previous one.
    pub fn register<H>(&self, command: &str, handler: H)
    where
        H: Handler + 'static,
    {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(command.to_string(), Arc::new(handler));
    }

    pub fn trigger(&self, event: &str, payload: Value) {
        self.transport.send(&RpcMessage::Event {
            event: event.to_string(),
            payload,
        });
    }

    /// Subscribes to events from the remote side.
    pub fn on<F>(&self, event: &str, listener: F) -> ListenerId
    where
        F: Fn(&RemoteEvent) + Send + Sync + 'static,
    {
        self.events.on(event, listener)
    }

    pub fn off(&self, id: ListenerId) {
        self.events.off(id);
    }

    /// Handles an inbound message.
    pub async fn process(&self, message: RpcMessage) {
        match message {
            RpcMessage::Request {
                id,
                command,
                payload,
            } => self.process_request(id, command, payload).await,
            other => self.process_notification(other),
        }
    }

    /// Handles events and responses, which never wait on anything.
    pub(crate) fn process_notification(&self, message: RpcMessage) {
        match message {
            RpcMessage::Event { event, payload } => {
                self.events.emit(&RemoteEvent { event, payload });
            }
            RpcMessage::Response { id, state, result } => {
                let Some(sender) = self.pending().remove(&id) else {
                    debug!(id = %id, "Dropping response to an unknown call.");
                    return;
                };
                let outcome = match state {
                    ResponseState::Fulfilled => Ok(result),
                    ResponseState::Rejected => Err(RpcError::Rejected(result)),
                };
                let _ = sender.send(outcome);
            }
            RpcMessage::Request { .. } => {}
        }
    }

    async fn process_request(&self, id: String, command: String, payload: Vec<Value>) {
        let handler = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&command)
            .cloned();
        let Some(handler) = handler else {
            return;
        };

        let (state, result) = match handler.handle(payload).await {
            Ok(result) => (ResponseState::Fulfilled, result),
            Err(reason) => (ResponseState::Rejected, reason),
        };
        self.transport
            .send(&RpcMessage::Response { id, state, result });
    }
}

impl fmt::Debug for Rpc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rpc")
            .field("pending", &self.pending().len())
            .field("events", &self.events)
            .finish()
    }
}

/// An outstanding call made with [`Rpc::call`].
#[derive(Debug)]
pub struct PendingCall {
    receiver: oneshot::Receiver<Result<Value, RpcError>>,
}

impl Future for PendingCall {
    type Output = Result<Value, RpcError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|outcome| outcome.unwrap_or(Err(RpcError::Dropped)))
    }
}
