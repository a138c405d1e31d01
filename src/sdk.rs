//! Entry point: selects the deployment setup, hydrates pages and tears them
//! down again.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::{debug, info, warn};

use crate::api::{standard_headers, Api, HttpClient};
use crate::cms::{Cms, Cms14, CmsBridge, CmsEvent};
use crate::component::ModelVersion;
use crate::config::{Configuration, Setup};
use crate::emitter::Emitter;
use crate::error::SpaError;
use crate::page::{Page, PageFactory};
use crate::relevance::{campaign_variant_id, parse_cookies, segment_ids};
use crate::rpc::PostMessage;
use crate::spa::{PageSource, Spa};
use crate::telemetry;
use crate::url::{
    append_search_params, extract_search_params, is_matched, parse_url, BasePathUrlBuilder,
    BasePathUrlOptions, EndpointUrlBuilder, EndpointUrlOptions, SearchParams, UrlBuilder,
};

const BTM_CAMPAIGN_PARAMETER: &str = "btm_campaign_id";
const BTM_SEGMENT_PARAMETER: &str = "btm_segment";
const BTM_TTL_PARAMETER: &str = "btm_ttl";
const CAMPAIGN_VARIANT_PARAMETER: &str = "__br__campaignVariant";
const SEGMENT_IDS_PARAMETER: &str = "__br__segmentIds";

/// Everything wired up for one page. The page holds it, so the wiring lives
/// exactly as long as the page does or until [`Sdk::destroy`].
struct Scope {
    spa: Arc<Spa>,
    channel: Option<Arc<PostMessage>>,
    _bridge: Option<Arc<dyn CmsBridge>>,
}

impl Drop for Scope {
    fn drop(&mut self) {
        self.spa.destroy();
        if let Some(channel) = &self.channel {
            channel.close();
        }
    }
}

/// The URL mapping and request identity a setup resolved to.
struct Resolved {
    version: ModelVersion,
    url_builder: Arc<dyn UrlBuilder>,
    authorization_token: Option<String>,
    server_id: Option<String>,
    path: String,
    origin: String,
    /// Preview wiring is allowed once the page reports preview mode.
    preview: bool,
}

/// Initialises pages and tears them down again.
///
/// Each page carries its own CMS wiring, so dropping the `Sdk` leaves live
/// pages untouched; it only stops tracking them.
#[derive(Default)]
pub struct Sdk {
    pages: Mutex<HashMap<usize, Weak<Page>>>,
}

impl Sdk {
    pub fn new() -> Self {
        Sdk::default()
    }

    fn pages(&self) -> MutexGuard<'_, HashMap<usize, Weak<Page>>> {
        self.pages.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hydrates the page for `config`, fetching its model unless `source`
    /// provides one. An already hydrated page is returned unchanged.
    pub async fn initialize(
        &self,
        config: &Configuration,
        source: Option<PageSource>,
    ) -> Result<Arc<Page>, SpaError> {
        if let Some(PageSource::Page(page)) = source {
            return Ok(page);
        }
        telemetry::init(config.debug);
        debug!(configuration = ?config, "Configuration");

        let setup = Setup::detect(config);
        let resolved = match setup {
            Setup::Proxy => resolve_proxy(config),
            Setup::Jwt09 => resolve_jwt09(config),
            Setup::Jwt10 => resolve_jwt10(config),
        };

        let cms_bus = Emitter::<CmsEvent>::new();
        let page_bus = Emitter::new();
        let api = http_client(config).map(|client| {
            Arc::new(Api::new(
                Arc::clone(&resolved.url_builder),
                client,
                standard_headers(
                    config,
                    resolved.authorization_token.as_deref(),
                    resolved.server_id.as_deref(),
                ),
            ))
        });
        let spa = Spa::new(api, page_bus.clone(), Some(cms_bus.clone()));

        let mut bridge: Option<Arc<dyn CmsBridge>> = None;
        if setup == Setup::Proxy {
            let legacy = Cms14::new(Some(cms_bus.clone()));
            if let Some(window) = &config.window {
                legacy.initialize(Arc::clone(window));
            }
            bridge = Some(legacy);
        }

        let factory = PageFactory::new(
            resolved.version,
            Arc::clone(&resolved.url_builder),
            Some(page_bus),
            Some(cms_bus.clone()),
        );
        let source = source.unwrap_or_else(|| PageSource::Path(resolved.path.clone()));
        let page = spa.initialize(factory, source).await?;

        let mut channel = None;
        if setup != Setup::Proxy {
            if page.is_preview() && resolved.preview {
                info!("Running in preview mode.");
                if let Some(window) = &config.window {
                    let post_message = PostMessage::new();
                    post_message.initialize(&resolved.origin, Arc::clone(window));
                    let cms = Cms::new(Arc::clone(post_message.rpc()), Some(cms_bus));
                    cms.initialize(Arc::clone(window));
                    channel = Some(post_message);
                    bridge = Some(cms);
                } else {
                    debug!("No host window is attached; the preview channel stays closed.");
                }
            } else {
                info!("Running in live mode.");
            }
        }

        page.attach_scope(Scope {
            spa,
            channel,
            _bridge: bridge,
        });
        self.pages().insert(key(&page), Arc::downgrade(&page));
        if let Some(hook) = config
            .request
            .as_ref()
            .and_then(|request| request.on_initialized.as_ref())
        {
            hook(&page);
        }
        Ok(page)
    }

    /// Releases everything wired up for `page`. Pages without wiring, or
    /// already destroyed ones, are ignored.
    pub fn destroy(&self, page: &Arc<Page>) {
        self.pages().remove(&key(page));
        drop(page.detach_scope());
    }

    /// Number of pages initialised here that are still alive and not yet
    /// destroyed.
    pub fn len(&self) -> usize {
        let mut pages = self.pages();
        pages.retain(|_, page| page.strong_count() > 0);
        pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for Sdk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sdk").field("pages", &self.len()).finish()
    }
}

fn key(page: &Arc<Page>) -> usize {
    Arc::as_ptr(page) as usize
}

#[cfg(feature = "http")]
fn http_client(config: &Configuration) -> Option<Arc<dyn HttpClient>> {
    Some(
        config
            .http_client
            .clone()
            .unwrap_or_else(|| Arc::new(crate::api::ReqwestClient::default())),
    )
}

#[cfg(not(feature = "http"))]
fn http_client(config: &Configuration) -> Option<Arc<dyn HttpClient>> {
    config.http_client.clone()
}

fn resolve_proxy(config: &Configuration) -> Resolved {
    info!("Enabled reverse-proxy based setup.");
    warn!("This setup is deprecated and will not work in the next major release.");

    let path = config.current_path();
    let default_options = BasePathUrlOptions::default();
    let (live, preview) = config
        .proxy_options()
        .unwrap_or((&default_options, &default_options));
    let preview_base = preview.spa_base_url.as_deref().unwrap_or_default();
    debug!(path = %path, base_url = %preview_base, "Proxy");

    let in_preview = is_matched(&path, preview_base);
    info!("Using {} configuration.", if in_preview { "preview" } else { "live" });
    let options = if in_preview { preview } else { live };

    Resolved {
        version: ModelVersion::V09,
        url_builder: Arc::new(BasePathUrlBuilder::new(options)),
        authorization_token: None,
        server_id: None,
        path,
        origin: config.origin.clone().unwrap_or_default(),
        preview: false,
    }
}

fn resolve_jwt09(config: &Configuration) -> Resolved {
    info!("Enabled token-based setup.");
    info!("Using Page Model API 0.9.");
    warn!("This version of the Page Model API is deprecated and will be removed in the next major release.");

    let authorization = config.authorization_parameter();
    let server = config.server_id_parameter();
    let extracted = extract_search_params(&config.current_path(), &[authorization, server]);
    let authorization_token = extracted.search_params.get(authorization).map(str::to_string);
    let server_id = extracted.search_params.get(server).map(str::to_string);

    let origin = config.origin.clone().unwrap_or_else(|| {
        parse_url(
            config
                .api_base_url
                .as_deref()
                .or(config.cms_base_url.as_deref())
                .unwrap_or_default(),
        )
        .origin
    });
    let spa_base_url = append_search_params(
        config.spa_base_url.as_deref().unwrap_or_default(),
        &extracted.search_params,
    );
    log_identity(authorization_token.as_deref(), server_id.as_deref());
    debug!(origin = %origin, path = %extracted.url, base_url = %spa_base_url, "Resolved");

    let options = BasePathUrlOptions {
        api_base_url: config.api_base_url.clone(),
        cms_base_url: config.cms_base_url.clone(),
        spa_base_url: Some(spa_base_url),
    };
    Resolved {
        version: ModelVersion::V09,
        url_builder: Arc::new(BasePathUrlBuilder::new(&options)),
        authorization_token,
        server_id,
        path: extracted.url,
        origin,
        preview: config.cms_base_url.is_some(),
    }
}

fn resolve_jwt10(config: &Configuration) -> Resolved {
    info!("Enabled token-based setup.");
    info!("Using Page Model API 1.0.");

    let authorization = config.authorization_parameter();
    let server = config.server_id_parameter();
    let extracted = extract_search_params(
        &config.current_path(),
        &[
            authorization,
            server,
            BTM_CAMPAIGN_PARAMETER,
            BTM_SEGMENT_PARAMETER,
            BTM_TTL_PARAMETER,
        ],
    );
    let params = &extracted.search_params;
    let authorization_token = params.get(authorization).map(str::to_string);
    let server_id = params.get(server).map(str::to_string);
    let campaign_id = params.get(BTM_CAMPAIGN_PARAMETER);
    let segment_id = params.get(BTM_SEGMENT_PARAMETER);
    let ttl = params.get(BTM_TTL_PARAMETER);

    let cookies = config
        .request
        .as_ref()
        .and_then(|request| request.header("cookie"))
        .map(parse_cookies)
        .unwrap_or_default();
    let campaign_variant = campaign_variant_id(campaign_id, segment_id, ttl, &cookies);
    let segments = segment_ids(&cookies);

    let mut api_params = SearchParams::new();
    if let Some(variant) = &campaign_variant {
        api_params.append(CAMPAIGN_VARIANT_PARAMETER, variant);
    }
    if let Some(segments) = &segments {
        api_params.append(SEGMENT_IDS_PARAMETER, segments);
    }
    let endpoint = append_search_params(
        config.endpoint.as_deref().unwrap_or_default(),
        &api_params,
    );
    let base_url = append_search_params(config.base_url.as_deref().unwrap_or_default(), params);
    let origin = config
        .origin
        .clone()
        .unwrap_or_else(|| parse_url(config.endpoint.as_deref().unwrap_or_default()).origin);

    log_identity(authorization_token.as_deref(), server_id.as_deref());
    debug!(
        campaign = ?campaign_id,
        segment = ?segment_id,
        ttl = ?ttl,
        campaign_variant = ?campaign_variant,
        "Campaign"
    );
    debug!(
        endpoint = %endpoint,
        origin = %origin,
        path = %extracted.url,
        base_url = %base_url,
        "Resolved"
    );

    let options = EndpointUrlOptions {
        endpoint: Some(endpoint.clone()),
        base_url: Some(base_url),
    };
    Resolved {
        version: ModelVersion::V10,
        url_builder: Arc::new(EndpointUrlBuilder::new(&options)),
        authorization_token,
        server_id,
        path: extracted.url.clone(),
        origin,
        preview: !endpoint.is_empty(),
    }
}

fn log_identity(token: Option<&str>, server_id: Option<&str>) {
    if let Some(token) = token {
        debug!(token = %token, "Token");
    }
    if let Some(server_id) = server_id {
        debug!(server_id = %server_id, "Server Id");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn model() -> serde_json::Value {
        json!({
            "root": { "$ref": "/page/root" },
            "meta": { "preview": false },
            "page": { "root": { "id": "root", "type": "component" } }
        })
    }

    #[tokio::test]
    async fn hydrated_pages_short_circuit() {
        let sdk = Sdk::new();
        let config = Configuration::default();
        let page = sdk.initialize(&config, Some(model().into())).await.unwrap();
        let again = sdk
            .initialize(&config, Some(PageSource::Page(Arc::clone(&page))))
            .await
            .unwrap();

        assert!(Arc::ptr_eq(&page, &again));
        assert_eq!(sdk.len(), 1);
    }

    #[tokio::test]
    async fn destroy_is_idempotent() {
        let sdk = Sdk::new();
        let page = sdk
            .initialize(&Configuration::default(), Some(model().into()))
            .await
            .unwrap();

        sdk.destroy(&page);
        sdk.destroy(&page);

        assert!(page.is_destroyed());
        assert!(sdk.is_empty());
    }

    #[tokio::test]
    async fn dropped_pages_are_no_longer_counted() {
        let sdk = Sdk::new();
        let page = sdk
            .initialize(&Configuration::default(), Some(model().into()))
            .await
            .unwrap();
        assert_eq!(sdk.len(), 1);

        drop(page);
        assert!(sdk.is_empty());
    }

    #[test]
    fn jwt10_moves_campaign_parameters_to_the_endpoint() {
        let config = Configuration {
            endpoint: Some("http://cms.org/pages".into()),
            base_url: Some("/app".into()),
            path: Some("/app/news?token=t1&btm_campaign_id=c1&btm_segment=s1&q=2".into()),
            ..Configuration::default()
        };
        let resolved = resolve_jwt10(&config);

        assert_eq!(resolved.path, "/app/news?q=2");
        assert_eq!(resolved.authorization_token.as_deref(), Some("t1"));
        assert_eq!(resolved.origin, "http://cms.org");
        assert_eq!(
            resolved.url_builder.get_api_url("/app/news").unwrap(),
            "http://cms.org/pages/news?__br__campaignVariant=c1%3As1"
        );
        assert_eq!(
            resolved.url_builder.get_spa_url("/about"),
            "/app/about?token=t1&btm_campaign_id=c1&btm_segment=s1"
        );
    }

    #[test]
    fn jwt09_keeps_the_token_on_spa_links() {
        let config = Configuration {
            cms_base_url: Some("http://cms.org/site".into()),
            spa_base_url: Some("/spa".into()),
            path: Some("/spa/news?token=t1&server-id=s9".into()),
            ..Configuration::default()
        };
        let resolved = resolve_jwt09(&config);

        assert_eq!(resolved.path, "/spa/news");
        assert_eq!(resolved.server_id.as_deref(), Some("s9"));
        assert_eq!(resolved.origin, "http://cms.org");
        assert!(resolved.preview);
        assert_eq!(
            resolved.url_builder.get_api_url("/spa/news").unwrap(),
            "http://cms.org/site/resourceapi/news"
        );
    }

    #[test]
    fn proxy_picks_preview_options_by_path() {
        let config: Configuration = serde_json::from_value(json!({
            "path": "/preview/news",
            "options": {
                "live": { "cmsBaseUrl": "http://cms.org/site", "spaBaseUrl": "" },
                "preview": { "cmsBaseUrl": "http://cms.org/site/_cmsinternal", "spaBaseUrl": "/preview" }
            }
        }))
        .unwrap();
        let resolved = resolve_proxy(&config);

        assert_eq!(
            resolved.url_builder.get_api_url("/preview/news").unwrap(),
            "http://cms.org/site/_cmsinternal/resourceapi/news"
        );
    }
}
