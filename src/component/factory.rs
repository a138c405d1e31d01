use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::{
    Component, ComponentKind, ModelVersion, TYPE_COMPONENT, TYPE_COMPONENT_09,
    TYPE_COMPONENT_CONTAINER, TYPE_COMPONENT_CONTAINER_09, TYPE_COMPONENT_CONTAINER_ITEM,
    TYPE_COMPONENT_CONTAINER_ITEM_09,
};
use crate::emitter::Emitter;
use crate::error::SpaError;
use crate::factory::SimpleFactory;
use crate::link::LinkFactory;
use crate::meta::MetaFactory;
use crate::page::PageEvent;
use crate::tree;
use crate::url::UrlBuilder;

/// Everything a component needs besides its model.
pub struct ComponentContext {
    pub version: ModelVersion,
    pub links: Arc<LinkFactory>,
    pub meta: Arc<MetaFactory>,
    pub url_builder: Arc<dyn UrlBuilder>,
    /// The page-update bus; absent when nothing drives live updates.
    pub bus: Option<Emitter<PageEvent>>,
}

impl fmt::Debug for ComponentContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentContext")
            .field("version", &self.version)
            .field("bus", &self.bus.is_some())
            .finish()
    }
}

type ComponentResult = Result<Arc<Component>, SpaError>;

type ComponentBuilder =
    dyn Fn(Value, Vec<Arc<Component>>, &Arc<ComponentContext>) -> ComponentResult + Send + Sync;

/// Builds components by their `type` and assembles them into trees.
pub struct ComponentFactory {
    factory: SimpleFactory<ComponentBuilder>,
    context: Arc<ComponentContext>,
}

impl ComponentFactory {
    pub fn new(context: ComponentContext) -> Self {
        ComponentFactory {
            factory: SimpleFactory::new("component"),
            context: Arc::new(context),
        }
    }

    /// A factory with the three component kinds registered under the type
    /// tags of the context's model version.
    pub fn for_version(context: ComponentContext) -> Self {
        let (component, container, item) = match context.version {
            ModelVersion::V10 => (
                TYPE_COMPONENT,
                TYPE_COMPONENT_CONTAINER,
                TYPE_COMPONENT_CONTAINER_ITEM,
            ),
            ModelVersion::V09 => (
                TYPE_COMPONENT_09,
                TYPE_COMPONENT_CONTAINER_09,
                TYPE_COMPONENT_CONTAINER_ITEM_09,
            ),
        };

        Self::new(context)
            .register(component, |model, children, context| {
                Component::new(ComponentKind::Component, model, children, context)
            })
            .register(container, |model, children, context| {
                Component::new(ComponentKind::Container, model, children, context)
            })
            .register(item, |model, _, context| {
                Component::new(ComponentKind::ContainerItem, model, Vec::new(), context)
            })
    }

    pub fn register<F>(mut self, component_type: &str, builder: F) -> Self
    where
        F: Fn(Value, Vec<Arc<Component>>, &Arc<ComponentContext>) -> ComponentResult
            + Send
            + Sync
            + 'static,
    {
        self.factory = self.factory.register(component_type, Box::new(builder));
        self
    }

    /// Builds a single component from its model and already built children.
    pub fn build(
        &self,
        model: Value,
        children: Vec<Arc<Component>>,
    ) -> Result<Arc<Component>, SpaError> {
        let component_type = model
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let builder = self.factory.get(component_type)?;
        builder(model, children, &self.context)
    }

    /// Builds the component tree of a whole page model document.
    ///
    /// Returns `None` when a 1.0 root reference does not resolve.
    pub fn create(&self, document: &Value) -> Result<Option<Arc<Component>>, SpaError> {
        match self.context.version {
            ModelVersion::V10 => tree::build_referenced(self, document),
            ModelVersion::V09 => match document.get("page") {
                Some(root) => tree::build_nested(self, root).map(Some),
                None => Ok(None),
            },
        }
    }

    pub fn context(&self) -> &Arc<ComponentContext> {
        &self.context
    }
}

impl fmt::Debug for ComponentFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentFactory")
            .field("factory", &self.factory)
            .field("context", &self.context)
            .finish()
    }
}

#[cfg(test)]
impl ComponentContext {
    pub(crate) fn for_tests(version: ModelVersion, bus: Option<Emitter<PageEvent>>) -> Self {
        use crate::link::LinkType;
        use crate::url::{BasePathUrlBuilder, BasePathUrlOptions};

        ComponentContext {
            version,
            links: Arc::new(
                LinkFactory::new().register(LinkType::Internal, |href| format!("/spa{}", href)),
            ),
            meta: Arc::new(MetaFactory::new()),
            url_builder: Arc::new(BasePathUrlBuilder::new(&BasePathUrlOptions {
                cms_base_url: Some("http://cms/site".into()),
                ..Default::default()
            })),
            bus,
        }
    }
}
