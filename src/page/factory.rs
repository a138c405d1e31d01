use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, OnceLock, RwLock, Weak};

use serde_json::Value;
use tracing::debug;

use super::{Page, PageContent, PageEvent};
use crate::button::ButtonFactory;
use crate::cms::CmsEvent;
use crate::component::{Component, ComponentContext, ComponentFactory, ModelVersion};
use crate::content::ContentFactory;
use crate::emitter::Emitter;
use crate::error::SpaError;
use crate::link::LinkFactory;
use crate::meta::MetaFactory;
use crate::rewriter::LinkRewriter;
use crate::url::UrlBuilder;

/// Wires the entity factories of one page model version and hydrates pages.
///
/// The registries are open: applications may add component or content types
/// through [`PageFactory::components`] and [`PageFactory::content`] before
/// calling [`PageFactory::create`].
pub struct PageFactory {
    version: ModelVersion,
    links: Arc<LinkFactory>,
    meta: Arc<MetaFactory>,
    buttons: ButtonFactory,
    content: ContentFactory,
    components: ComponentFactory,
    page_bus: Option<Emitter<PageEvent>>,
    cms_bus: Option<Emitter<CmsEvent>>,
}

impl PageFactory {
    pub fn new(
        version: ModelVersion,
        url_builder: Arc<dyn UrlBuilder>,
        page_bus: Option<Emitter<PageEvent>>,
        cms_bus: Option<Emitter<CmsEvent>>,
    ) -> Self {
        let links = Arc::new(LinkFactory::for_url_builder(Arc::clone(&url_builder)));
        let meta = Arc::new(MetaFactory::new());
        let content = match version {
            ModelVersion::V10 => ContentFactory::v1(Arc::clone(&links), Arc::clone(&meta)),
            ModelVersion::V09 => ContentFactory::v09(Arc::clone(&links), Arc::clone(&meta)),
        };
        let components = ComponentFactory::for_version(ComponentContext {
            version,
            links: Arc::clone(&links),
            meta: Arc::clone(&meta),
            url_builder,
            bus: page_bus.clone(),
        });

        PageFactory {
            version,
            buttons: ButtonFactory::with_defaults(Arc::clone(&meta)),
            links,
            meta,
            content,
            components,
            page_bus,
            cms_bus,
        }
    }

    /// Adjusts the component registry.
    pub fn components(
        mut self,
        configure: impl FnOnce(ComponentFactory) -> ComponentFactory,
    ) -> Self {
        self.components = configure(self.components);
        self
    }

    /// Adjusts the content registry.
    pub fn content(mut self, configure: impl FnOnce(ContentFactory) -> ContentFactory) -> Self {
        self.content = configure(self.content);
        self
    }

    pub fn version(&self) -> ModelVersion {
        self.version
    }

    /// Hydrates `model` into a page.
    ///
    /// The page joins the update bus before its container items do, so an
    /// update reaches the page model first.
    pub fn create(self, model: Value) -> Result<Arc<Page>, SpaError> {
        debug!(version = self.version.as_str(), "Hydrating.");

        let handle: Arc<OnceLock<Weak<Page>>> = Arc::new(OnceLock::new());
        let subscription = self.page_bus.as_ref().map(|bus| {
            let handle = Arc::clone(&handle);
            bus.on("page.update", move |event: &PageEvent| {
                let PageEvent::Update { page: update } = event;
                if let Some(page) = handle.get().and_then(Weak::upgrade) {
                    page.on_page_update(update);
                }
            })
        });

        let hydrated = self.hydrate(&model);
        let (root, content) = match hydrated {
            Ok(parts) => parts,
            Err(err) => {
                if let (Some(bus), Some(id)) = (&self.page_bus, subscription) {
                    bus.off(id);
                }
                return Err(err);
            }
        };

        let page = Arc::new(Page {
            version: self.version,
            model: RwLock::new(model),
            root,
            content,
            content_factory: self.content,
            buttons: self.buttons,
            rewriter: LinkRewriter::new(Arc::clone(&self.links)),
            links: self.links,
            meta: self.meta,
            cms_bus: self.cms_bus,
            page_bus: self.page_bus,
            subscription,
            destroyed: AtomicBool::new(false),
            scope: Mutex::new(None),
        });
        let _ = handle.set(Arc::downgrade(&page));

        Ok(page)
    }

    fn hydrate(
        &self,
        model: &Value,
    ) -> Result<(Option<Arc<Component>>, PageContent), SpaError> {
        let root = self.components.create(model)?;
        let content = match self.version {
            ModelVersion::V10 => PageContent::Referenced(Mutex::new(HashMap::new())),
            ModelVersion::V09 => {
                let mut entities = HashMap::new();
                if let Some(aliases) = model.get("content").and_then(Value::as_object) {
                    for (alias, content) in aliases {
                        entities.insert(alias.clone(), Arc::new(self.content.create(content)?));
                    }
                }
                PageContent::Aliased(Mutex::new(entities))
            }
        };
        Ok((root, content))
    }
}

impl fmt::Debug for PageFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageFactory")
            .field("version", &self.version)
            .field("components", &self.components)
            .field("content", &self.content)
            .finish()
    }
}
