//! Mapping between the SPA address space and the Page Model API.

use serde::{Deserialize, Serialize};

use super::{build_url, merge_search_params, parse_url, ParsedUrl, UrlParts};
use crate::error::SpaError;

const DEFAULT_API_BASE_URL: &str = "/resourceapi";
const DEFAULT_SPA_BASE_URL: &str = "";

/// Maps links between the API and the SPA.
pub trait UrlBuilder: Send + Sync {
    /// The Page Model API URL for an SPA path.
    fn get_api_url(&self, link: &str) -> Result<String, SpaError>;

    /// The SPA URL for a CMS link.
    fn get_spa_url(&self, link: &str) -> String;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointUrlOptions {
    /// Page Model API endpoint, e.g. `http://cms/delivery/site/v1/channels/x/pages`.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Base URL of the SPA, e.g. `http://spa.org/app`.
    #[serde(default)]
    pub base_url: Option<String>,
}

/// Builder for the endpoint-based setup (Page Model API 1.0).
#[derive(Debug, Clone)]
pub struct EndpointUrlBuilder {
    endpoint: ParsedUrl,
    base_url: ParsedUrl,
}

impl EndpointUrlBuilder {
    pub fn new(options: &EndpointUrlOptions) -> Self {
        Self {
            endpoint: parse_url(options.endpoint.as_deref().unwrap_or_default()),
            base_url: parse_url(options.base_url.as_deref().unwrap_or_default()),
        }
    }
}

impl UrlBuilder for EndpointUrlBuilder {
    fn get_api_url(&self, link: &str) -> Result<String, SpaError> {
        let ParsedUrl {
            pathname,
            search_params,
            ..
        } = parse_url(link);

        let route = pathname
            .strip_prefix(self.base_url.pathname.as_str())
            .ok_or_else(|| base_path_mismatch(&pathname, &self.base_url.pathname))?;

        Ok(build_url(UrlParts {
            origin: Some(self.endpoint.origin.clone()),
            pathname: Some(format!("{}{}", self.endpoint.pathname, route)),
            search_params: Some(merge_search_params(
                &search_params,
                &[&self.endpoint.search_params],
            )),
            ..UrlParts::default()
        }))
    }

    fn get_spa_url(&self, link: &str) -> String {
        let ParsedUrl {
            hash,
            pathname,
            search_params,
            ..
        } = parse_url(link);

        let route = if !pathname.starts_with('/') && self.base_url.pathname.is_empty() {
            format!("/{}", pathname)
        } else {
            pathname
        };

        build_url(UrlParts {
            origin: Some(self.base_url.origin.clone()),
            pathname: Some(format!("{}{}", self.base_url.pathname, route)),
            search_params: Some(merge_search_params(
                &search_params,
                &[&self.base_url.search_params],
            )),
            hash: Some(if hash.is_empty() {
                self.base_url.hash.clone()
            } else {
                hash
            }),
            ..UrlParts::default()
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasePathUrlOptions {
    /// Base URL of the Page Model API; defaults to `cmsBaseUrl + "/resourceapi"`.
    #[serde(default)]
    pub api_base_url: Option<String>,
    /// Base URL of the CMS site.
    #[serde(default)]
    pub cms_base_url: Option<String>,
    /// Base URL of the SPA.
    #[serde(default)]
    pub spa_base_url: Option<String>,
}

/// Builder for the base-path setups (reverse proxy and Page Model API 0.9).
#[derive(Debug, Clone)]
pub struct BasePathUrlBuilder {
    api_base_url: ParsedUrl,
    cms_base_url: ParsedUrl,
    spa_base_url: ParsedUrl,
}

impl BasePathUrlBuilder {
    pub fn new(options: &BasePathUrlOptions) -> Self {
        let api_base_url = match &options.api_base_url {
            Some(url) => url.clone(),
            None => format!(
                "{}{}",
                options.cms_base_url.as_deref().unwrap_or_default(),
                DEFAULT_API_BASE_URL
            ),
        };

        Self {
            api_base_url: parse_url(&api_base_url),
            cms_base_url: parse_url(options.cms_base_url.as_deref().unwrap_or_default()),
            spa_base_url: parse_url(
                options
                    .spa_base_url
                    .as_deref()
                    .unwrap_or(DEFAULT_SPA_BASE_URL),
            ),
        }
    }
}

impl UrlBuilder for BasePathUrlBuilder {
    fn get_api_url(&self, link: &str) -> Result<String, SpaError> {
        let ParsedUrl {
            pathname,
            search_params,
            ..
        } = parse_url(link);

        if !self.api_base_url.pathname.is_empty()
            && pathname.starts_with(self.api_base_url.pathname.as_str())
        {
            return Ok(build_url(UrlParts {
                origin: Some(self.api_base_url.origin.clone()),
                pathname: Some(pathname),
                search_params: Some(merge_search_params(
                    &self.api_base_url.search_params,
                    &[&search_params],
                )),
                ..UrlParts::default()
            }));
        }

        let route = pathname
            .strip_prefix(self.spa_base_url.pathname.as_str())
            .ok_or_else(|| base_path_mismatch(&pathname, &self.spa_base_url.pathname))?;

        Ok(build_url(UrlParts {
            origin: Some(self.api_base_url.origin.clone()),
            pathname: Some(format!("{}{}", self.api_base_url.pathname, route)),
            search_params: Some(merge_search_params(
                &search_params,
                &[&self.api_base_url.search_params],
            )),
            ..UrlParts::default()
        }))
    }

    fn get_spa_url(&self, link: &str) -> String {
        let ParsedUrl {
            hash,
            pathname,
            search_params,
            ..
        } = parse_url(link);

        let mut route = pathname
            .strip_prefix(self.cms_base_url.pathname.as_str())
            .unwrap_or(&pathname)
            .to_string();
        if !route.starts_with('/') && self.spa_base_url.pathname.is_empty() {
            route.insert(0, '/');
        }

        build_url(UrlParts {
            origin: Some(self.spa_base_url.origin.clone()),
            pathname: Some(format!("{}{}", self.spa_base_url.pathname, route)),
            search_params: Some(merge_search_params(
                &search_params,
                &[&self.spa_base_url.search_params],
            )),
            hash: Some(if hash.is_empty() {
                self.spa_base_url.hash.clone()
            } else {
                hash
            }),
            ..UrlParts::default()
        })
    }
}

fn base_path_mismatch(pathname: &str, base_path: &str) -> SpaError {
    SpaError::Configuration(format!(
        "The path \"{}\" does not start with the base path \"{}\".",
        pathname, base_path
    ))
}
