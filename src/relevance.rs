//! Visitor, campaign and segment cookies.
//!
//! The relevance cookie carries the visitor the Page Model API assigned on a
//! previous request, so the next request is attributed to the same visitor.
//! With the `http` feature, [`visitor_middleware`] wires that round trip into
//! an axum router.

use std::collections::HashMap;

use cookie::time::Duration;
use cookie::Cookie;

use crate::page::Visitor;

pub const DEFAULT_COOKIE_NAME: &str = "_v";
pub const DEFAULT_COOKIE_MAX_AGE: i64 = 365 * 24 * 60 * 60;

pub const CAMPAIGN_COOKIE: &str = "__br__campaign_id";
pub const SEGMENT_COOKIE: &str = "__br__segment";
pub const SEGMENT_IDS_COOKIE: &str = "__br__segment_ids";
pub const DEFAULT_TTL_DAYS: f64 = 7.0;
pub const MAX_TTL_DAYS: i64 = 28;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelevanceOptions {
    pub name: String,
    pub http_only: bool,
    /// Seconds.
    pub max_age: i64,
}

impl Default for RelevanceOptions {
    fn default() -> Self {
        RelevanceOptions {
            name: DEFAULT_COOKIE_NAME.to_string(),
            http_only: true,
            max_age: DEFAULT_COOKIE_MAX_AGE,
        }
    }
}

/// Parses a `Cookie` request header. Malformed pairs are skipped and the
/// first occurrence of a name wins.
pub fn parse_cookies(header: &str) -> HashMap<String, String> {
    let mut cookies = HashMap::new();
    for cookie in Cookie::split_parse_encoded(header).flatten() {
        cookies
            .entry(cookie.name().to_string())
            .or_insert_with(|| cookie.value().to_string());
    }
    cookies
}

/// The visitor stored in the relevance cookie, if it holds valid JSON.
pub fn read_visitor(header: &str, options: &RelevanceOptions) -> Option<Visitor> {
    let cookies = parse_cookies(header);
    serde_json::from_str(cookies.get(&options.name)?).ok()
}

/// A `Set-Cookie` value persisting `visitor`. The `new` flag is not stored.
pub fn visitor_cookie(visitor: &Visitor, options: &RelevanceOptions) -> String {
    let stored = Visitor {
        new: false,
        ..visitor.clone()
    };
    let value = serde_json::to_string(&stored).unwrap_or_default();
    Cookie::build((options.name.clone(), value))
        .http_only(options.http_only)
        .max_age(Duration::seconds(options.max_age))
        .build()
        .encoded()
        .to_string()
}

/// A `Set-Cookie` value for campaign data; the lifetime is capped at 28 days.
pub fn campaign_cookie(name: &str, value: &str, ttl_days: i64) -> String {
    let days = ttl_days.min(MAX_TTL_DAYS);
    Cookie::build((name.to_string(), value.to_string()))
        .max_age(Duration::days(days))
        .build()
        .encoded()
        .to_string()
}

/// Campaign TTL in days: absent or non-numeric means the default.
pub fn cookie_ttl(ttl: Option<&str>) -> f64 {
    let Some(ttl) = ttl else {
        return DEFAULT_TTL_DAYS;
    };
    let ttl = ttl.trim();
    if ttl.is_empty() {
        return 0.0;
    }
    ttl.parse::<f64>()
        .ok()
        .filter(|ttl| !ttl.is_nan())
        .unwrap_or(DEFAULT_TTL_DAYS)
}

/// `"<campaign>:<segment>"` from the query parameters, else from the
/// cookies. A TTL of zero disables campaigns.
pub fn campaign_variant_id(
    campaign_id: Option<&str>,
    segment_id: Option<&str>,
    ttl: Option<&str>,
    cookies: &HashMap<String, String>,
) -> Option<String> {
    if cookie_ttl(ttl) == 0.0 {
        return None;
    }
    if let (Some(campaign), Some(segment)) = (present(campaign_id), present(segment_id)) {
        return Some(format!("{}:{}", campaign, segment));
    }

    let campaign = present(cookies.get(CAMPAIGN_COOKIE).map(String::as_str))?;
    let segment = present(cookies.get(SEGMENT_COOKIE).map(String::as_str))?;
    Some(format!("{}:{}", campaign, segment))
}

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.is_empty())
}

pub fn segment_ids(cookies: &HashMap<String, String>) -> Option<String> {
    cookies
        .get(SEGMENT_IDS_COOKIE)
        .filter(|ids| !ids.is_empty())
        .cloned()
}

/// Reads the visitor into the request extensions and, when the handler puts
/// a [`Visitor`] into the response extensions, persists it.
///
/// ```ignore
/// let app = Router::new()
///     .route("/", get(render))
///     .layer(middleware::from_fn_with_state(RelevanceOptions::default(), visitor_middleware));
/// ```
#[cfg(feature = "http")]
pub async fn visitor_middleware(
    axum::extract::State(options): axum::extract::State<RelevanceOptions>,
    mut request: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    use axum::http::{header, HeaderValue};

    let visitor = request
        .headers()
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(|cookies| read_visitor(cookies, &options));
    if let Some(visitor) = visitor {
        request.extensions_mut().insert(visitor);
    }

    let mut response = next.run(request).await;
    let assigned = response.extensions().get::<Visitor>().cloned();
    if let Some(visitor) = assigned {
        if let Ok(value) = HeaderValue::from_str(&visitor_cookie(&visitor, &options)) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
    response
}
