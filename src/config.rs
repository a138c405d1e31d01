//! Deployment configuration accepted by [`crate::Sdk::initialize`].
//!
//! JSON keys follow the camelCase names integrators already use, so a
//! configuration can be deserialised straight from a settings file. Runtime
//! collaborators (the HTTP client, the browser window) are attached with the
//! `with_*` builders.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::api::HttpClient;
use crate::cms::HostWindow;
use crate::page::{Page, Visitor};
use crate::url::BasePathUrlOptions;

pub const DEFAULT_AUTHORIZATION_PARAMETER: &str = "token";
pub const DEFAULT_SERVER_ID_PARAMETER: &str = "server-id";

/// Called with every page the orchestrator finishes initialising.
pub type InitializedHook = Arc<dyn Fn(&Arc<Page>) + Send + Sync>;

/// The incoming request a server-side render runs for.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    #[serde(default)]
    pub path: Option<String>,
    /// Header names are matched case-insensitively.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub remote_address: Option<String>,
    /// The visitor read from the relevance cookie.
    #[serde(default)]
    pub visitor: Option<Visitor>,
    #[serde(skip)]
    pub on_initialized: Option<InitializedHook>,
}

impl RequestContext {
    pub fn new(path: impl Into<String>) -> Self {
        RequestContext {
            path: Some(path.into()),
            ..RequestContext::default()
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_remote_address(mut self, address: impl Into<String>) -> Self {
        self.remote_address = Some(address.into());
        self
    }

    pub fn with_visitor(mut self, visitor: Visitor) -> Self {
        self.visitor = Some(visitor);
        self
    }

    pub fn on_initialized<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Arc<Page>) + Send + Sync + 'static,
    {
        self.on_initialized = Some(Arc::new(hook));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("path", &self.path)
            .field("headers", &self.headers)
            .field("remote_address", &self.remote_address)
            .field("visitor", &self.visitor)
            .field("on_initialized", &self.on_initialized.is_some())
            .finish()
    }
}

/// Live and preview URL options of the reverse-proxy setup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyOptions {
    #[serde(default)]
    pub live: Option<BasePathUrlOptions>,
    #[serde(default)]
    pub preview: Option<BasePathUrlOptions>,
}

#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    /// Page Model API 1.0 endpoint.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_base_url: Option<String>,
    /// Selects the Page Model API 0.9 setup when present.
    #[serde(default)]
    pub cms_base_url: Option<String>,
    #[serde(default)]
    pub spa_base_url: Option<String>,
    /// Origin accepted for preview messages.
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub request: Option<RequestContext>,
    #[serde(default)]
    pub options: Option<ProxyOptions>,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub authorization_query_parameter: Option<String>,
    #[serde(default)]
    pub server_id_query_parameter: Option<String>,
    #[serde(default)]
    pub api_version: Option<String>,
    #[serde(default)]
    pub api_version_header: Option<String>,
    #[serde(default)]
    pub authorization_header: Option<String>,
    #[serde(default)]
    pub authorization_token: Option<String>,
    #[serde(default)]
    pub server_id_header: Option<String>,
    #[serde(default)]
    pub server_id: Option<String>,
    #[serde(default)]
    pub visitor: Option<Visitor>,
    #[serde(default, rename = "NBRMode")]
    pub nbr_mode: bool,
    #[serde(skip)]
    pub http_client: Option<Arc<dyn HttpClient>>,
    #[serde(skip)]
    pub window: Option<Arc<dyn HostWindow>>,
}

impl Configuration {
    pub fn with_http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn with_window(mut self, window: Arc<dyn HostWindow>) -> Self {
        self.window = Some(window);
        self
    }

    pub fn with_request(mut self, request: RequestContext) -> Self {
        self.request = Some(request);
        self
    }

    /// The SPA path being rendered: `path`, else the request path, else `/`.
    pub fn current_path(&self) -> String {
        self.path
            .clone()
            .or_else(|| self.request.as_ref().and_then(|request| request.path.clone()))
            .unwrap_or_else(|| "/".to_string())
    }

    pub fn authorization_parameter(&self) -> &str {
        self.authorization_query_parameter
            .as_deref()
            .unwrap_or(DEFAULT_AUTHORIZATION_PARAMETER)
    }

    pub fn server_id_parameter(&self) -> &str {
        self.server_id_query_parameter
            .as_deref()
            .unwrap_or(DEFAULT_SERVER_ID_PARAMETER)
    }

    /// The proxy options, when both live and preview are configured.
    pub fn proxy_options(&self) -> Option<(&BasePathUrlOptions, &BasePathUrlOptions)> {
        let options = self.options.as_ref()?;
        Some((options.live.as_ref()?, options.preview.as_ref()?))
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("endpoint", &self.endpoint)
            .field("base_url", &self.base_url)
            .field("api_base_url", &self.api_base_url)
            .field("cms_base_url", &self.cms_base_url)
            .field("spa_base_url", &self.spa_base_url)
            .field("origin", &self.origin)
            .field("path", &self.path)
            .field("request", &self.request)
            .field("options", &self.options)
            .field("debug", &self.debug)
            .field("api_version", &self.api_version)
            .field("server_id", &self.server_id)
            .field("visitor", &self.visitor)
            .field("nbr_mode", &self.nbr_mode)
            .field("http_client", &self.http_client.is_some())
            .field("window", &self.window.is_some())
            .finish_non_exhaustive()
    }
}

/// How the SPA reaches the Page Model API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setup {
    /// Reverse proxy in front of the CMS, Page Model API 0.9.
    Proxy,
    /// Token-based, Page Model API 0.9.
    Jwt09,
    /// Token-based, Page Model API 1.0.
    Jwt10,
}

impl Setup {
    pub fn detect(configuration: &Configuration) -> Self {
        if configuration.proxy_options().is_some() {
            Setup::Proxy
        } else if configuration.cms_base_url.is_some() {
            Setup::Jwt09
        } else {
            Setup::Jwt10
        }
    }
}
