//! Page components: plain components, containers and container items.
//!
//! One entity type covers all three kinds and both page model versions. The
//! kind and the version are fixed at construction; accessors read the raw
//! model through the version's field names (`meta` vs `_meta`, ...).

mod factory;

pub use factory::{ComponentContext, ComponentFactory};

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, Weak};

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::emitter::{Emitter, Event, ListenerId};
use crate::error::SpaError;
use crate::link::Link;
use crate::meta::MetaCollection;
use crate::page::{Page, PageEvent};
use crate::reference::{resolve, Reference};

pub const TYPE_COMPONENT: &str = "component";
pub const TYPE_COMPONENT_CONTAINER: &str = "container";
pub const TYPE_COMPONENT_CONTAINER_ITEM: &str = "container-item";

pub const TYPE_COMPONENT_09: &str = "COMPONENT";
pub const TYPE_COMPONENT_CONTAINER_09: &str = "CONTAINER_COMPONENT";
pub const TYPE_COMPONENT_CONTAINER_ITEM_09: &str = "CONTAINER_ITEM_COMPONENT";

/// Content type of the data a container item renders.
pub const TYPE_COMPONENT_CONTAINER_ITEM_CONTENT: &str = "componentcontent";

pub const TYPE_CONTAINER_BOX: &str = "hst.vbox";
pub const TYPE_CONTAINER_UNORDERED_LIST: &str = "hst.unorderedlist";
pub const TYPE_CONTAINER_ORDERED_LIST: &str = "hst.orderedlist";
pub const TYPE_CONTAINER_INLINE: &str = "hst.span";
pub const TYPE_CONTAINER_NO_MARKUP: &str = "hst.nomarkup";

/// The Page Model API version a model was delivered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelVersion {
    /// Flat, reference-based models.
    V10,
    /// Nested models.
    V09,
}

impl ModelVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelVersion::V10 => "1.0",
            ModelVersion::V09 => "0.9",
        }
    }

    pub(crate) fn meta_key(&self) -> &'static str {
        match self {
            ModelVersion::V10 => "meta",
            ModelVersion::V09 => "_meta",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Component,
    Container,
    ContainerItem,
}

/// Notification sent by a container item after its model was replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentEvent {
    Update,
}

impl Event for ComponentEvent {
    fn name(&self) -> &str {
        "update"
    }
}

struct ComponentState {
    model: Value,
    meta: Arc<MetaCollection>,
}

pub struct Component {
    kind: ComponentKind,
    state: RwLock<ComponentState>,
    children: Vec<Arc<Component>>,
    context: Arc<ComponentContext>,
    events: Emitter<ComponentEvent>,
    subscription: Option<ListenerId>,
}

impl Component {
    /// Builds a component of `kind`. Container items ignore `children`.
    pub fn new(
        kind: ComponentKind,
        model: Value,
        children: Vec<Arc<Component>>,
        context: &Arc<ComponentContext>,
    ) -> Result<Arc<Self>, SpaError> {
        let meta = Arc::new(
            context
                .meta
                .create_collection_from_value(model.get(context.version.meta_key()))?,
        );
        let state = RwLock::new(ComponentState { model, meta });

        if kind != ComponentKind::ContainerItem {
            return Ok(Arc::new(Component {
                kind,
                state,
                children,
                context: Arc::clone(context),
                events: Emitter::new(),
                subscription: None,
            }));
        }

        Ok(Arc::new_cyclic(|item: &Weak<Component>| {
            let subscription = context.bus.as_ref().map(|bus| {
                let item = item.clone();
                bus.on("page.update", move |event: &PageEvent| {
                    if let (Some(item), PageEvent::Update { page }) = (item.upgrade(), event) {
                        item.on_page_update(page);
                    }
                })
            });

            Component {
                kind,
                state,
                children: Vec::new(),
                context: Arc::clone(context),
                events: Emitter::new(),
                subscription,
            }
        }))
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, ComponentState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn field<T>(&self, read: impl FnOnce(&Value) -> Option<T>) -> Option<T> {
        read(&self.read().model)
    }

    fn meta_field(&self, key: &str) -> Option<Value> {
        let meta_key = self.context.version.meta_key();
        self.field(|model| model.get(meta_key)?.get(key).cloned())
    }

    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    pub fn version(&self) -> ModelVersion {
        self.context.version
    }

    pub fn is_container(&self) -> bool {
        self.kind == ComponentKind::Container
    }

    pub fn is_container_item(&self) -> bool {
        self.kind == ComponentKind::ContainerItem
    }

    pub fn id(&self) -> String {
        self.field(|model| model.get("id")?.as_str().map(str::to_string))
            .unwrap_or_default()
    }

    pub fn name(&self) -> String {
        self.field(|model| model.get("name")?.as_str().map(str::to_string))
            .unwrap_or_default()
    }

    pub fn meta(&self) -> Arc<MetaCollection> {
        Arc::clone(&self.read().meta)
    }

    /// A snapshot of the backing model.
    pub fn model(&self) -> Value {
        self.read().model.clone()
    }

    pub fn models(&self) -> Map<String, Value> {
        self.field(|model| model.get("models")?.as_object().cloned())
            .unwrap_or_default()
    }

    /// The URL used to re-render this component.
    pub fn url(&self) -> Result<Option<String>, SpaError> {
        match self.context.version {
            ModelVersion::V10 => Ok(self
                .field(|model| model.pointer("/links/self").and_then(Link::from_value))
                .and_then(|link| self.context.links.create(&link))),
            ModelVersion::V09 => {
                match self.field(|model| {
                    model
                        .pointer("/_links/componentRendering/href")?
                        .as_str()
                        .map(str::to_string)
                }) {
                    Some(href) => self.context.url_builder.get_api_url(&href).map(Some),
                    None => Ok(None),
                }
            }
        }
    }

    /// Component parameters; container items expose `paramsInfo`.
    pub fn parameters(&self) -> Map<String, Value> {
        let key = match self.kind {
            ComponentKind::ContainerItem => "paramsInfo",
            _ => "params",
        };
        self.meta_field(key)
            .and_then(|params| params.as_object().cloned())
            .unwrap_or_default()
    }

    pub fn properties(&self) -> Map<String, Value> {
        self.parameters()
    }

    pub fn children(&self) -> &[Arc<Component>] {
        &self.children
    }

    /// Walks down by child names; no names yields this component.
    pub fn get_component(self: &Arc<Self>, names: &[&str]) -> Option<Arc<Component>> {
        names.iter().try_fold(Arc::clone(self), |component, name| {
            component
                .children()
                .iter()
                .find(|child| child.name() == *name)
                .cloned()
        })
    }

    /// Breadth-first search by id.
    pub fn get_component_by_id(self: &Arc<Self>, id: &str) -> Option<Arc<Component>> {
        let mut queue = VecDeque::from([Arc::clone(self)]);
        while let Some(component) = queue.pop_front() {
            if component.id() == id {
                return Some(component);
            }
            queue.extend(component.children().iter().cloned());
        }
        None
    }

    /// Lower-cased `xtype` of a container.
    pub fn container_type(&self) -> Option<String> {
        if !self.is_container() {
            return None;
        }
        self.field(|model| model.get("xtype")?.as_str().map(str::to_lowercase))
    }

    pub fn label(&self) -> Option<String> {
        self.field(|model| model.get("label")?.as_str().map(str::to_string))
    }

    /// The item's `ctype`, falling back to its label.
    pub fn item_type(&self) -> Option<String> {
        self.field(|model| model.get("ctype")?.as_str().map(str::to_string))
            .or_else(|| self.label())
    }

    pub fn is_hidden(&self) -> bool {
        self.meta_field("hidden").is_some_and(|hidden| truthy(&hidden))
    }

    /// Reference to the content a container item renders.
    pub fn content_reference(&self) -> Option<Reference> {
        if self.context.version == ModelVersion::V09 {
            warn!(
                "The method \"getContentReference\" is not supported in PMA 0.9 and always returns \"undefined\"."
            );
            return None;
        }
        self.field(|model| model.get("content").and_then(Reference::from_value))
    }

    /// The data of the `componentcontent` this item references, if any.
    pub fn content(&self, page: &Page) -> Option<Value> {
        if self.context.version == ModelVersion::V09 {
            warn!("The method \"getContent\" is not supported in PMA 0.9 and always returns \"null\".");
            return None;
        }
        crate::page::get_container_item_content(self, page)
    }

    pub fn on_update<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&ComponentEvent) + Send + Sync + 'static,
    {
        self.events.on("update", listener)
    }

    pub fn off_update(&self, id: ListenerId) {
        self.events.off(id);
    }

    fn on_page_update(&self, page: &Value) {
        let model = match self.context.version {
            ModelVersion::V10 => page
                .get("root")
                .and_then(Reference::from_value)
                .and_then(|root| resolve(page, &root)),
            ModelVersion::V09 => page.get("page"),
        };
        let Some(model) = model else {
            return;
        };
        if model.get("id").and_then(Value::as_str) != Some(self.id().as_str()) {
            return;
        }

        debug!(id = %self.id(), "Received container item update event.");
        let meta = match self
            .context
            .meta
            .create_collection_from_value(model.get(self.context.version.meta_key()))
        {
            Ok(meta) => Arc::new(meta),
            Err(err) => {
                warn!(error = %err, "Ignoring container item update.");
                return;
            }
        };

        {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            state.model = model.clone();
            state.meta = meta;
        }
        self.events.emit(&ComponentEvent::Update);
    }
}

pub(crate) fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

impl Drop for Component {
    fn drop(&mut self) {
        if let (Some(bus), Some(id)) = (&self.context.bus, self.subscription) {
            bus.off(id);
        }
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("kind", &self.kind)
            .field("version", &self.context.version)
            .field("id", &self.id())
            .field("name", &self.name())
            .field("children", &self.children.len())
            .finish()
    }
}
