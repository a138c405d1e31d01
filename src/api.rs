//! The Page Model API client.
//!
//! Transport is injected through [`HttpClient`]; this module only decides
//! which URL to hit and which headers to send.

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::{Configuration, Setup};
use crate::error::SpaError;
use crate::url::{SearchParams, UrlBuilder};

pub const DEFAULT_API_VERSION_HEADER: &str = "Accept-Version";
pub const DEFAULT_AUTHORIZATION_HEADER: &str = "Authorization";
pub const DEFAULT_SERVER_ID_HEADER: &str = "Server-Id";
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub data: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
    pub message: String,
    pub status: Option<u16>,
}

impl HttpError {
    pub fn new(message: impl Into<String>) -> Self {
        HttpError {
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} (status {})", self.message, status),
            None => write!(f, "{}", self.message),
        }
    }
}

impl Error for HttpError {}

/// Sends requests on behalf of the SDK. Implementations must not retry or
/// time out on their own; callers wrap the client for that.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;
}

/// The headers every Page Model API request carries.
pub fn standard_headers(
    config: &Configuration,
    authorization_token: Option<&str>,
    server_id: Option<&str>,
) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();
    let request = config.request.as_ref();
    let header = |name: &str| request.and_then(|request| request.header(name)).map(str::to_string);

    if let Some(ip) = header("x-forwarded-for")
        .or_else(|| request.and_then(|request| request.remote_address.clone()))
    {
        headers.insert("X-Forwarded-For".to_string(), ip);
    }
    if let Some(version) = &config.api_version {
        let name = config
            .api_version_header
            .as_deref()
            .unwrap_or(DEFAULT_API_VERSION_HEADER);
        headers.insert(name.to_string(), version.clone());
    }
    if let Some(token) = authorization_token.or(config.authorization_token.as_deref()) {
        let name = config
            .authorization_header
            .as_deref()
            .unwrap_or(DEFAULT_AUTHORIZATION_HEADER);
        headers.insert(name.to_string(), format!("Bearer {}", token));
    }
    if Setup::detect(config) == Setup::Proxy {
        if let Some(cookie) = header("cookie") {
            headers.insert("Cookie".to_string(), cookie);
        }
    }
    if let Some(referer) = header("referer") {
        headers.insert("Referer".to_string(), referer);
    }
    if let Some(id) = server_id.or(config.server_id.as_deref()) {
        let name = config
            .server_id_header
            .as_deref()
            .unwrap_or(DEFAULT_SERVER_ID_HEADER);
        headers.insert(name.to_string(), id.to_string());
    }
    if let Some(agent) = header("user-agent") {
        headers.insert("User-Agent".to_string(), agent);
    }
    if let Some(visitor) = config
        .visitor
        .as_ref()
        .or_else(|| request.and_then(|request| request.visitor.as_ref()))
    {
        headers.insert(visitor.header.clone(), visitor.id.clone());
    }
    headers
}

/// Fetches page and component models.
pub struct Api {
    url_builder: Arc<dyn UrlBuilder>,
    client: Arc<dyn HttpClient>,
    headers: BTreeMap<String, String>,
}

impl Api {
    pub fn new(
        url_builder: Arc<dyn UrlBuilder>,
        client: Arc<dyn HttpClient>,
        headers: BTreeMap<String, String>,
    ) -> Self {
        Api {
            url_builder,
            client,
            headers,
        }
    }

    pub fn url_builder(&self) -> &Arc<dyn UrlBuilder> {
        &self.url_builder
    }

    /// Fetches the page model of an SPA path.
    pub async fn get_page(&self, path: &str) -> Result<Value, SpaError> {
        let url = self.url_builder.get_api_url(path)?;
        self.send(HttpMethod::Get, url, BTreeMap::new(), None).await
    }

    /// Fetches a component model, posting `payload` when it is not empty.
    pub async fn get_component(
        &self,
        url: &str,
        payload: &Map<String, Value>,
    ) -> Result<Value, SpaError> {
        let data: SearchParams = payload
            .iter()
            .map(|(key, value)| {
                let value = match value {
                    Value::String(value) => value.clone(),
                    other => other.to_string(),
                };
                (key.clone(), value)
            })
            .collect();
        let method = if payload.is_empty() {
            HttpMethod::Get
        } else {
            HttpMethod::Post
        };
        let headers = BTreeMap::from([("Content-Type".to_string(), FORM_CONTENT_TYPE.to_string())]);

        self.send(method, url.to_string(), headers, Some(data.to_string()))
            .await
    }

    async fn send(
        &self,
        method: HttpMethod,
        url: String,
        extra: BTreeMap<String, String>,
        data: Option<String>,
    ) -> Result<Value, SpaError> {
        let mut headers = self.headers.clone();
        headers.extend(extra);
        let data = data.filter(|data| !data.is_empty());

        debug!(method = method.as_str(), url = %url, "Request");
        debug!(headers = ?headers, "Headers");
        if let Some(body) = &data {
            debug!(body = %body, "Body");
        }

        let response = self
            .client
            .send(HttpRequest {
                method,
                url,
                headers,
                data,
            })
            .await?;
        Ok(response.data)
    }
}

impl fmt::Debug for Api {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Api").field("headers", &self.headers).finish()
    }
}

/// An [`HttpClient`] backed by `reqwest`.
#[cfg(feature = "http")]
#[derive(Debug, Clone, Default)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

#[cfg(feature = "http")]
impl ReqwestClient {
    pub fn new(client: reqwest::Client) -> Self {
        ReqwestClient { client }
    }
}

#[cfg(feature = "http")]
#[async_trait]
impl HttpClient for ReqwestClient {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(data) = request.data {
            builder = builder.body(data);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| HttpError::new(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| HttpError::new(e.to_string()).with_status(status.as_u16()))?;
        if !status.is_success() {
            return Err(
                HttpError::new(format!("request failed: {}", body)).with_status(status.as_u16())
            );
        }
        let data = serde_json::from_str(&body)
            .map_err(|e| HttpError::new(e.to_string()).with_status(status.as_u16()))?;
        Ok(HttpResponse { data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RequestContext;
    use crate::page::Visitor;
    use crate::url::{EndpointUrlBuilder, EndpointUrlOptions};
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        requests: Mutex<Vec<HttpRequest>>,
    }

    #[async_trait]
    impl HttpClient for Recorder {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
            self.requests.lock().unwrap().push(request);
            Ok(HttpResponse { data: json!({ "ok": true }) })
        }
    }

    fn api(client: Arc<Recorder>) -> Api {
        let builder = EndpointUrlBuilder::new(&EndpointUrlOptions {
            endpoint: Some("http://cms.org/pages".into()),
            base_url: Some("/app".into()),
        });
        Api::new(Arc::new(builder), client, BTreeMap::from([("X-Test".into(), "1".into())]))
    }

    #[test]
    fn standard_headers_follow_the_configuration() {
        let config = Configuration {
            api_version: Some("1.0".into()),
            server_id_header: Some("X-Server".into()),
            visitor: Some(Visitor { id: "v1".into(), header: "X-Visitor".into(), new: false }),
            ..Configuration::default()
        }
        .with_request(
            RequestContext::new("/")
                .with_header("User-Agent", "agent")
                .with_header("Cookie", "a=b")
                .with_header("Referer", "http://ref")
                .with_remote_address("10.0.0.1"),
        );

        let headers = standard_headers(&config, Some("tkn"), Some("srv"));
        assert_eq!(headers["X-Forwarded-For"], "10.0.0.1");
        assert_eq!(headers["Accept-Version"], "1.0");
        assert_eq!(headers["Authorization"], "Bearer tkn");
        assert_eq!(headers["X-Server"], "srv");
        assert_eq!(headers["User-Agent"], "agent");
        assert_eq!(headers["Referer"], "http://ref");
        assert_eq!(headers["X-Visitor"], "v1");
        assert!(!headers.contains_key("Cookie"));
    }

    #[test]
    fn forwarded_for_header_wins_over_the_remote_address() {
        let config = Configuration::default().with_request(
            RequestContext::new("/")
                .with_header("X-Forwarded-For", "1.2.3.4")
                .with_remote_address("10.0.0.1"),
        );
        assert_eq!(standard_headers(&config, None, None)["X-Forwarded-For"], "1.2.3.4");
    }

    #[tokio::test]
    async fn get_page_maps_the_path() {
        let client = Arc::new(Recorder::default());
        let data = api(client.clone()).get_page("/app/news?q=1").await.unwrap();

        assert_eq!(data, json!({ "ok": true }));
        let request = client.requests.lock().unwrap().remove(0);
        assert_eq!(request.method, HttpMethod::Get);
        assert_eq!(request.url, "http://cms.org/pages/news?q=1");
        assert_eq!(request.headers["X-Test"], "1");
        assert_eq!(request.data, None);
    }

    #[tokio::test]
    async fn get_page_rejects_foreign_paths() {
        let client = Arc::new(Recorder::default());
        let err = api(client.clone()).get_page("/other").await.unwrap_err();

        assert!(matches!(err, SpaError::Configuration(_)));
        assert!(client.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn get_component_posts_a_form_when_there_is_a_payload() {
        let client = Arc::new(Recorder::default());
        let api = api(client.clone());
        let payload = json!({ "title": "Hello world", "count": 2 });

        api.get_component("http://cms.org/c1", payload.as_object().unwrap()).await.unwrap();
        api.get_component("http://cms.org/c2", &Map::new()).await.unwrap();

        let requests = client.requests.lock().unwrap();
        assert_eq!(requests[0].method, HttpMethod::Post);
        assert_eq!(requests[0].headers["Content-Type"], FORM_CONTENT_TYPE);
        assert_eq!(requests[0].data.as_deref(), Some("title=Hello+world&count=2"));
        assert_eq!(requests[1].method, HttpMethod::Get);
        assert_eq!(requests[1].data, None);
    }
}
