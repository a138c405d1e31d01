//! The page aggregate: the hydrated root of a page model.
//!
//! A page owns its component tree and its content entities. The model shape
//! (flat 1.0 or nested 0.9) is decided once when the page is built; every
//! accessor then dispatches on that variant instead of probing the JSON.

mod factory;

pub use factory::PageFactory;

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::button::{ButtonFactory, ButtonParams};
use crate::cms::CmsEvent;
use crate::component::{truthy, Component, ModelVersion, TYPE_COMPONENT_CONTAINER_ITEM_CONTENT};
use crate::content::{Content, ContentFactory};
use crate::emitter::{Emitter, Event, ListenerId};
use crate::error::SpaError;
use crate::link::{Link, LinkFactory, LinkType};
use crate::meta::{MetaCollection, MetaFactory};
use crate::reference::{resolve, Reference};
use crate::rewriter::{LinkRewriter, CONTENT_TYPE_HTML};
use crate::url::{is_absolute_url, resolve_url};

const DEFAULT_LOCALE: &str = "en_US";

/// Notification carrying a freshly rendered part of the page model.
#[derive(Debug, Clone, PartialEq)]
pub enum PageEvent {
    Update { page: Value },
}

impl Event for PageEvent {
    fn name(&self) -> &str {
        "page.update"
    }
}

/// The current visitor as reported by the relevance module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visitor {
    pub id: String,
    /// Request header the visitor id travels in.
    pub header: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub new: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visit {
    pub id: String,
    #[serde(default)]
    pub new: bool,
}

/// What [`Page::get_content`] looks content up by.
#[derive(Debug, Clone, Copy)]
pub enum ContentLookup<'a> {
    Reference(&'a Reference),
    /// An id (1.0) or an alias (0.9).
    Key(&'a str),
}

impl<'a> From<&'a Reference> for ContentLookup<'a> {
    fn from(reference: &'a Reference) -> Self {
        ContentLookup::Reference(reference)
    }
}

impl<'a> From<&'a str> for ContentLookup<'a> {
    fn from(key: &'a str) -> Self {
        ContentLookup::Key(key)
    }
}

/// What [`Page::get_url`] maps.
#[derive(Debug, Clone, Copy)]
pub enum UrlTarget<'a> {
    Link(&'a Link),
    Path(&'a str),
}

impl<'a> From<&'a Link> for UrlTarget<'a> {
    fn from(link: &'a Link) -> Self {
        UrlTarget::Link(link)
    }
}

impl<'a> From<&'a str> for UrlTarget<'a> {
    fn from(path: &'a str) -> Self {
        UrlTarget::Path(path)
    }
}

/// Content entities, per model shape.
enum PageContent {
    /// Built on first lookup, one entity per referenced model.
    Referenced(Mutex<HashMap<String, Arc<Content>>>),
    /// Built up front from the `content` map, keyed by alias.
    Aliased(Mutex<HashMap<String, Arc<Content>>>),
}

impl PageContent {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<Content>>> {
        match self {
            PageContent::Referenced(entities) | PageContent::Aliased(entities) => {
                entities.lock().unwrap_or_else(PoisonError::into_inner)
            }
        }
    }
}

pub struct Page {
    version: ModelVersion,
    model: RwLock<Value>,
    root: Option<Arc<Component>>,
    content: PageContent,
    content_factory: ContentFactory,
    buttons: ButtonFactory,
    links: Arc<LinkFactory>,
    meta: Arc<MetaFactory>,
    rewriter: LinkRewriter,
    cms_bus: Option<Emitter<CmsEvent>>,
    page_bus: Option<Emitter<PageEvent>>,
    subscription: Option<ListenerId>,
    destroyed: AtomicBool,
    /// Whatever keeps this page wired to the CMS; released with the page.
    scope: Mutex<Option<Box<dyn Any + Send + Sync>>>,
}

impl Page {
    fn read(&self) -> RwLockReadGuard<'_, Value> {
        self.model.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// The `meta` (1.0) or `_meta` (0.9) field named `key`.
    fn meta_field(&self, key: &str) -> Option<Value> {
        self.read()
            .get(self.version.meta_key())?
            .get(key)
            .cloned()
    }

    pub fn version(&self) -> ModelVersion {
        self.version
    }

    /// Walks the component tree by child names; no names yields the root.
    pub fn get_component(&self, names: &[&str]) -> Option<Arc<Component>> {
        self.root.as_ref()?.get_component(names)
    }

    /// Content by reference or by key.
    ///
    /// Lookups that land on the same model return the same entity, until an
    /// update replaces that model. Unresolved lookups yield `None`.
    pub fn get_content<'a>(
        &self,
        lookup: impl Into<ContentLookup<'a>>,
    ) -> Result<Option<Arc<Content>>, SpaError> {
        let lookup = lookup.into();
        match &self.content {
            PageContent::Referenced(_) => {
                let reference = match lookup {
                    ContentLookup::Reference(reference) => reference.clone(),
                    ContentLookup::Key(id) => Reference::new(format!("/page/{}", id)),
                };
                let key = reference.key();
                if let Some(content) = self.content.lock().get(&key) {
                    return Ok(Some(Arc::clone(content)));
                }

                let Some(model) = resolve(&self.read(), &reference).cloned() else {
                    return Ok(None);
                };
                let content = Arc::new(self.content_factory.create(&model)?);
                Ok(Some(Arc::clone(
                    self.content.lock().entry(key).or_insert(content),
                )))
            }
            PageContent::Aliased(_) => {
                let alias = match lookup {
                    ContentLookup::Reference(reference) => reference
                        .reference
                        .splitn(3, '/')
                        .nth(2)
                        .unwrap_or_default()
                        .to_string(),
                    ContentLookup::Key(alias) => alias.to_string(),
                };
                Ok(self.content.lock().get(&alias).cloned())
            }
        }
    }

    /// The page's main document (1.0 only).
    pub fn get_document(&self) -> Result<Option<Arc<Content>>, SpaError> {
        if self.version == ModelVersion::V09 {
            return Err(self.unsupported("getDocument"));
        }
        let document = self.read().get("document").and_then(Reference::from_value);
        match document {
            Some(reference) => self.get_content(&reference),
            None => Ok(None),
        }
    }

    pub fn get_button(
        &self,
        button_type: &str,
        params: &ButtonParams,
    ) -> Result<Arc<MetaCollection>, SpaError> {
        self.buttons.create(button_type, params)
    }

    /// `channel.info.props`, empty when the model has none.
    pub fn get_channel_parameters(&self) -> Map<String, Value> {
        self.read()
            .pointer("/channel/info/props")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default()
    }

    /// Page locale, `en_US` when the model has none (1.0 only).
    pub fn get_locale(&self) -> Result<String, SpaError> {
        if self.version == ModelVersion::V09 {
            return Err(self.unsupported("getLocale"));
        }
        Ok(self
            .meta_field("locale")
            .and_then(|locale| locale.as_str().map(str::to_string))
            .filter(|locale| !locale.is_empty())
            .unwrap_or_else(|| DEFAULT_LOCALE.to_string()))
    }

    /// Builds a meta-data collection out of a raw `meta` / `_meta` object.
    pub fn get_meta(&self, model: &Value) -> Result<MetaCollection, SpaError> {
        self.meta.create_collection_from_value(Some(model))
    }

    pub fn get_title(&self) -> Option<String> {
        let model = self.read();
        let title = match self.version {
            ModelVersion::V10 => {
                let root = model.get("root").and_then(Reference::from_value)?;
                resolve(&model, &root)?.pointer("/meta/pageTitle")
            }
            ModelVersion::V09 => model.pointer("/page/_meta/pageTitle"),
        };
        title.and_then(Value::as_str).map(str::to_string)
    }

    /// Maps a link or a path to an SPA URL.
    ///
    /// Without a target this is the page's own URL. On 1.0 a relative path
    /// is resolved against the page's site URL.
    pub fn get_url(&self, target: Option<UrlTarget<'_>>) -> Option<String> {
        match (self.version, target) {
            (_, Some(UrlTarget::Link(link))) => self.links.create(link),
            (ModelVersion::V10, Some(UrlTarget::Path(path))) if !is_absolute_url(path) => {
                let base = self.site_link().and_then(|site| self.links.create(&site));
                Some(resolve_url(path, base.as_deref().unwrap_or_default()))
            }
            (_, Some(UrlTarget::Path(path))) => self.links.create_path(path),
            (ModelVersion::V10, None) => match self.site_link() {
                Some(site) => self.links.create(&site),
                None => self.links.create_path(""),
            },
            (ModelVersion::V09, None) => {
                let mut site = self.site_link().unwrap_or_default();
                site.link_type = Some(LinkType::Internal);
                self.links.create(&site)
            }
        }
    }

    fn site_link(&self) -> Option<Link> {
        let pointer = match self.version {
            ModelVersion::V10 => "/links/site",
            ModelVersion::V09 => "/_links/site",
        };
        self.read().pointer(pointer).and_then(Link::from_value)
    }

    pub fn get_version(&self) -> Option<String> {
        self.meta_field("version")
            .and_then(|version| version.as_str().map(str::to_string))
    }

    pub fn get_visitor(&self) -> Option<Visitor> {
        self.meta_field("visitor")
            .and_then(|visitor| serde_json::from_value(visitor).ok())
    }

    pub fn get_visit(&self) -> Option<Visit> {
        self.meta_field("visit")
            .and_then(|visit| serde_json::from_value(visit).ok())
    }

    pub fn is_preview(&self) -> bool {
        self.meta_field("preview").is_some_and(|preview| truthy(&preview))
    }

    /// Rewrites links in rich text; `content_type` defaults to HTML.
    pub fn rewrite_links(&self, content: &str, content_type: Option<&str>) -> String {
        self.rewriter
            .rewrite(content, content_type.unwrap_or(CONTENT_TYPE_HTML))
    }

    /// Tells the authoring environment the page has rendered.
    pub fn sync(&self) -> Result<(), SpaError> {
        if self.is_destroyed() {
            return Err(SpaError::Destroyed);
        }
        if let Some(bus) = &self.cms_bus {
            bus.emit(&CmsEvent::PageReady);
        }
        Ok(())
    }

    /// The current backing model.
    pub fn to_json(&self) -> Value {
        self.read().clone()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Stops applying updates. Accessors keep answering from the last model.
    pub(crate) fn attach_scope(&self, scope: impl Any + Send + Sync) {
        *self.scope.lock().unwrap_or_else(PoisonError::into_inner) = Some(Box::new(scope));
    }

    /// Takes the attached scope out, if any.
    pub(crate) fn detach_scope(&self) -> Option<Box<dyn Any + Send + Sync>> {
        self.scope.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    pub(crate) fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.unsubscribe();
    }

    fn unsubscribe(&self) {
        if let (Some(bus), Some(id)) = (&self.page_bus, self.subscription) {
            bus.off(id);
        }
    }

    fn unsupported(&self, method: &'static str) -> SpaError {
        SpaError::UnsupportedOperation {
            method,
            version: self.version.as_str(),
        }
    }

    fn on_page_update(&self, update: &Value) {
        if self.is_destroyed() {
            return;
        }

        match &self.content {
            PageContent::Referenced(_) => {
                let Some(components) = update.get("page").and_then(Value::as_object) else {
                    return;
                };
                debug!(models = components.len(), "Merging page update.");
                {
                    let mut model = self.model.write().unwrap_or_else(PoisonError::into_inner);
                    if let Some(document) = model.as_object_mut() {
                        let page = document
                            .entry("page")
                            .or_insert_with(|| Value::Object(Map::new()));
                        if let Some(page) = page.as_object_mut() {
                            page.extend(
                                components
                                    .iter()
                                    .map(|(id, model)| (id.clone(), model.clone())),
                            );
                        }
                    }
                }
                let mut entities = self.content.lock();
                for id in components.keys() {
                    entities.remove(&Reference::new(format!("/page/{}", id)).key());
                }
            }
            PageContent::Aliased(_) => {
                let Some(content) = update.get("content").and_then(Value::as_object) else {
                    return;
                };
                for (alias, model) in content {
                    match self.content_factory.create(model) {
                        Ok(entity) => {
                            self.content.lock().insert(alias.clone(), Arc::new(entity));
                        }
                        Err(err) => warn!(alias = %alias, error = %err, "Skipping content update."),
                    }
                }
            }
        }
    }
}

impl Drop for Page {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("version", &self.version)
            .field("root", &self.root.as_ref().map(|root| root.id()))
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

/// The data a container item renders, when it references `componentcontent`.
pub fn get_container_item_content(component: &Component, page: &Page) -> Option<Value> {
    let reference = component.content_reference()?;
    let content = match page.get_content(&reference) {
        Ok(content) => content?,
        Err(err) => {
            warn!(id = %component.id(), error = %err, "Could not build container item content.");
            return None;
        }
    };
    match content.as_ref() {
        Content::Raw(model)
            if model.get("type").and_then(Value::as_str)
                == Some(TYPE_COMPONENT_CONTAINER_ITEM_CONTENT) =>
        {
            model.get("data").cloned()
        }
        _ => None,
    }
}
