//! Drives one page: fetches or accepts its model, hydrates it and, in
//! preview, turns CMS render requests into page updates.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use serde_json::Value;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::api::Api;
use crate::cms::CmsEvent;
use crate::emitter::{Emitter, ListenerId};
use crate::error::SpaError;
use crate::page::{Page, PageEvent, PageFactory};

/// Where a page comes from.
#[derive(Debug, Clone)]
pub enum PageSource {
    /// An SPA path to fetch the model for.
    Path(String),
    /// A model fetched earlier, e.g. during a server-side render.
    Model(Value),
    /// A page that is already hydrated.
    Page(Arc<Page>),
}

impl From<&str> for PageSource {
    fn from(path: &str) -> Self {
        PageSource::Path(path.to_string())
    }
}

impl From<Value> for PageSource {
    fn from(model: Value) -> Self {
        PageSource::Model(model)
    }
}

impl From<Arc<Page>> for PageSource {
    fn from(page: Arc<Page>) -> Self {
        PageSource::Page(page)
    }
}

pub struct Spa {
    api: Option<Arc<Api>>,
    cms_bus: Option<Emitter<CmsEvent>>,
    page_bus: Emitter<PageEvent>,
    /// The caller owns the page; the driver only follows it.
    page: RwLock<Weak<Page>>,
    subscription: Mutex<Option<ListenerId>>,
}

impl Spa {
    /// `api` may be absent when pages only come from prefetched models; CMS
    /// updates are then ignored.
    pub fn new(
        api: Option<Arc<Api>>,
        page_bus: Emitter<PageEvent>,
        cms_bus: Option<Emitter<CmsEvent>>,
    ) -> Arc<Self> {
        Arc::new(Spa {
            api,
            cms_bus,
            page_bus,
            page: RwLock::new(Weak::new()),
            subscription: Mutex::new(None),
        })
    }

    pub fn page(&self) -> Option<Arc<Page>> {
        self.page.read().unwrap_or_else(PoisonError::into_inner).upgrade()
    }

    pub async fn initialize(
        self: &Arc<Self>,
        factory: PageFactory,
        source: PageSource,
    ) -> Result<Arc<Page>, SpaError> {
        let model = match source {
            PageSource::Page(page) => return Ok(page),
            PageSource::Path(path) => {
                debug!(path = %path, "Trying to request the page model.");
                let api = self.api.as_ref().ok_or_else(|| {
                    SpaError::Configuration(
                        "An HTTP client is required to fetch the page model.".to_string(),
                    )
                })?;
                api.get_page(&path).await?
            }
            PageSource::Model(model) => {
                debug!("Received dehydrated model.");
                model
            }
        };
        self.hydrate(factory, model)
    }

    fn hydrate(
        self: &Arc<Self>,
        factory: PageFactory,
        model: Value,
    ) -> Result<Arc<Page>, SpaError> {
        if !model.is_object() {
            return Err(SpaError::Decode("the page model is not a JSON object".to_string()));
        }
        debug!(model = %model, "Model");
        let page = factory.create(model)?;
        *self.page.write().unwrap_or_else(PoisonError::into_inner) = Arc::downgrade(&page);

        if page.is_preview() {
            self.subscribe();
        }
        Ok(page)
    }

    fn subscribe(self: &Arc<Self>) {
        let Some(bus) = &self.cms_bus else {
            return;
        };
        let mut subscription = self.subscription.lock().unwrap_or_else(PoisonError::into_inner);
        if subscription.is_some() {
            return;
        }

        let spa = Arc::downgrade(self);
        let runtime = Handle::try_current().ok();
        *subscription = Some(bus.on("cms.update", move |event: &CmsEvent| {
            let Some(spa) = spa.upgrade() else {
                return;
            };
            let Some(runtime) = &runtime else {
                warn!("Dropping a CMS update: no async runtime is available.");
                return;
            };
            let event = event.clone();
            runtime.spawn(async move {
                if let Err(err) = spa.on_cms_update(&event).await {
                    warn!(error = %err, "Failed to apply the CMS update.");
                }
            });
        }));
    }

    /// Re-fetches the component named by an update and broadcasts its model.
    pub async fn on_cms_update(&self, event: &CmsEvent) -> Result<(), SpaError> {
        let CmsEvent::Update { id, properties } = event else {
            return Ok(());
        };
        debug!(id = %id, "Received CMS update event.");

        let url = self
            .page()
            .and_then(|page| page.get_component(&[]))
            .and_then(|root| root.get_component_by_id(id))
            .map(|component| component.url())
            .transpose()?
            .flatten();
        let (Some(url), Some(api)) = (url, &self.api) else {
            debug!("Skipping the update event.");
            return Ok(());
        };

        debug!(url = %url, "Trying to request the component model.");
        let model = api.get_component(&url, properties).await?;
        debug!(model = %model, "Model");
        self.page_bus.emit(&PageEvent::Update { page: model });
        Ok(())
    }

    /// Detaches the page from every bus. Safe to call more than once.
    pub fn destroy(&self) {
        let subscription = self.subscription.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let (Some(bus), Some(id)) = (&self.cms_bus, subscription) {
            bus.off(id);
        }
        self.page_bus.clear_listeners();
        let page = std::mem::take(&mut *self.page.write().unwrap_or_else(PoisonError::into_inner));
        if let Some(page) = page.upgrade() {
            page.destroy();
        }
        debug!("Destroyed page.");
    }
}

impl fmt::Debug for Spa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Spa")
            .field("page", &self.page())
            .field("api", &self.api)
            .finish()
    }
}
