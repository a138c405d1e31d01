//! Content entities referenced from components and pages.

mod document;
mod image;
mod menu;
mod pagination;

pub use document::Document;
pub use image::{Image, ImageSet};
pub use menu::{Menu, MenuItem};
pub use pagination::{Pagination, PaginationItem};

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::SpaError;
use crate::factory::SimpleFactory;
use crate::link::{Link, LinkFactory};
use crate::meta::{MetaCollection, MetaFactory};

pub const TYPE_DOCUMENT: &str = "document";
pub const TYPE_IMAGE_SET: &str = "imageset";
pub const TYPE_MENU: &str = "menu";
pub const TYPE_PAGINATION: &str = "pagination";

/// Dependencies handed to every content builder.
#[derive(Clone, Copy)]
pub struct ContentContext<'a> {
    pub links: &'a LinkFactory,
    pub meta: &'a MetaFactory,
}

impl ContentContext<'_> {
    pub(crate) fn url(&self, model: &Value, pointer: &str) -> Option<String> {
        model
            .pointer(pointer)
            .and_then(Link::from_value)
            .and_then(|link| self.links.create(&link))
    }

    pub(crate) fn meta(&self, model: Option<&Value>) -> Result<Arc<MetaCollection>, SpaError> {
        Ok(Arc::new(self.meta.create_collection_from_value(model)?))
    }
}

pub(crate) fn text<'v>(model: &'v Value, pointer: &str) -> Option<&'v str> {
    model.pointer(pointer).and_then(Value::as_str)
}

/// A hydrated content item.
#[derive(Debug)]
pub enum Content {
    Document(Document),
    ImageSet(ImageSet),
    Menu(Menu),
    Pagination(Pagination),
    /// Page Model API 0.9 content, whatever its type.
    Generic(GenericContent),
    /// A Page Model API 1.0 item of a type without a dedicated entity.
    Raw(Value),
}

impl Content {
    pub fn id(&self) -> Option<&str> {
        match self {
            Content::Document(document) => document.id(),
            Content::ImageSet(image_set) => image_set.id(),
            Content::Generic(content) => content.id(),
            Content::Raw(model) => text(model, "/id"),
            Content::Menu(_) | Content::Pagination(_) => None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Content::Document(document) => document.name(),
            Content::ImageSet(image_set) => image_set.name(),
            Content::Menu(menu) => menu.name(),
            Content::Generic(content) => content.name(),
            Content::Raw(model) => text(model, "/name"),
            Content::Pagination(_) => None,
        }
    }

    pub fn locale(&self) -> Option<&str> {
        match self {
            Content::Document(document) => document.locale(),
            Content::ImageSet(image_set) => image_set.locale(),
            Content::Generic(content) => content.locale(),
            _ => None,
        }
    }

    pub fn meta(&self) -> Option<&Arc<MetaCollection>> {
        match self {
            Content::Document(document) => Some(document.meta()),
            Content::Menu(menu) => Some(menu.meta()),
            Content::Generic(content) => Some(content.meta()),
            _ => None,
        }
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            Content::Document(document) => document.url(),
            Content::Generic(content) => content.url(),
            _ => None,
        }
    }

    /// The entity's data: `data` for 1.0 items, the whole model for the rest.
    pub fn data(&self) -> Option<&Value> {
        match self {
            Content::Document(document) => Some(document.data()),
            Content::Generic(content) => Some(content.data()),
            Content::Raw(model) => Some(model),
            _ => None,
        }
    }

    pub fn is_document(&self) -> bool {
        matches!(self, Content::Document(_))
    }

    pub fn is_image_set(&self) -> bool {
        matches!(self, Content::ImageSet(_))
    }

    pub fn is_menu(&self) -> bool {
        matches!(self, Content::Menu(_))
    }

    pub fn is_pagination(&self) -> bool {
        matches!(self, Content::Pagination(_))
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Content::Document(document) => Some(document),
            _ => None,
        }
    }

    pub fn as_image_set(&self) -> Option<&ImageSet> {
        match self {
            Content::ImageSet(image_set) => Some(image_set),
            _ => None,
        }
    }

    pub fn as_menu(&self) -> Option<&Menu> {
        match self {
            Content::Menu(menu) => Some(menu),
            _ => None,
        }
    }

    pub fn as_pagination(&self) -> Option<&Pagination> {
        match self {
            Content::Pagination(pagination) => Some(pagination),
            _ => None,
        }
    }
}

/// Content of the Page Model API 0.9: `_meta`, `_links.site`, `localeString`.
#[derive(Debug)]
pub struct GenericContent {
    model: Value,
    meta: Arc<MetaCollection>,
    url: Option<String>,
}

impl GenericContent {
    pub fn new(model: &Value, context: &ContentContext<'_>) -> Result<Self, SpaError> {
        Ok(GenericContent {
            meta: context.meta(model.get("_meta"))?,
            url: context.url(model, "/_links/site"),
            model: model.clone(),
        })
    }

    pub fn id(&self) -> Option<&str> {
        text(&self.model, "/id")
    }

    pub fn name(&self) -> Option<&str> {
        text(&self.model, "/name")
    }

    pub fn locale(&self) -> Option<&str> {
        text(&self.model, "/localeString")
    }

    pub fn data(&self) -> &Value {
        &self.model
    }

    pub fn meta(&self) -> &Arc<MetaCollection> {
        &self.meta
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }
}

type ContentBuilder =
    dyn Fn(&Value, &ContentContext<'_>) -> Result<Content, SpaError> + Send + Sync;

/// Builds [`Content`] by the model's `type`.
pub struct ContentFactory {
    factory: SimpleFactory<ContentBuilder>,
    fallback: Option<Box<ContentBuilder>>,
    links: Arc<LinkFactory>,
    meta: Arc<MetaFactory>,
}

impl ContentFactory {
    /// A factory without registrations; every type is rejected.
    pub fn new(links: Arc<LinkFactory>, meta: Arc<MetaFactory>) -> Self {
        ContentFactory {
            factory: SimpleFactory::new("content"),
            fallback: None,
            links,
            meta,
        }
    }

    /// The Page Model API 1.0 registry. Unknown types are kept as raw data.
    pub fn v1(links: Arc<LinkFactory>, meta: Arc<MetaFactory>) -> Self {
        Self::new(links, meta)
            .register(TYPE_DOCUMENT, |model, context| {
                Ok(Content::Document(Document::new(model, context)?))
            })
            .register(TYPE_IMAGE_SET, |model, context| {
                Ok(Content::ImageSet(ImageSet::new(model, context)))
            })
            .register(TYPE_MENU, |model, context| {
                Ok(Content::Menu(Menu::new(model, context)?))
            })
            .register(TYPE_PAGINATION, |model, context| {
                Ok(Content::Pagination(Pagination::new(model, context)))
            })
            .fallback(|model, _| Ok(Content::Raw(model.clone())))
    }

    /// The Page Model API 0.9 factory: a single generic entity.
    pub fn v09(links: Arc<LinkFactory>, meta: Arc<MetaFactory>) -> Self {
        Self::new(links, meta).fallback(|model, context| {
            Ok(Content::Generic(GenericContent::new(model, context)?))
        })
    }

    pub fn register<F>(mut self, content_type: &str, builder: F) -> Self
    where
        F: Fn(&Value, &ContentContext<'_>) -> Result<Content, SpaError> + Send + Sync + 'static,
    {
        self.factory = self.factory.register(content_type, Box::new(builder));
        self
    }

    /// Builder used for types nothing was registered for.
    pub fn fallback<F>(mut self, builder: F) -> Self
    where
        F: Fn(&Value, &ContentContext<'_>) -> Result<Content, SpaError> + Send + Sync + 'static,
    {
        self.fallback = Some(Box::new(builder));
        self
    }

    pub fn create(&self, model: &Value) -> Result<Content, SpaError> {
        let content_type = text(model, "/type").unwrap_or_default();
        let context = ContentContext {
            links: &self.links,
            meta: &self.meta,
        };

        match (self.factory.get(content_type), &self.fallback) {
            (Ok(builder), _) => builder(model, &context),
            (Err(_), Some(fallback)) => fallback(model, &context),
            (Err(err), None) => Err(err),
        }
    }

    pub fn links(&self) -> &Arc<LinkFactory> {
        &self.links
    }
}

impl fmt::Debug for ContentFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentFactory")
            .field("factory", &self.factory)
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}
