//! URL parsing, composition and matching.
//!
//! URLs handled here are frequently relative (`/news?page=2`, `about`), so
//! parsing happens against a dummy authority that is stripped again from the
//! result. An input without a real authority reports an empty origin.

mod builder;
mod search_params;

pub use builder::{
    BasePathUrlBuilder, BasePathUrlOptions, EndpointUrlBuilder, EndpointUrlOptions, UrlBuilder,
};
pub use search_params::SearchParams;

use url::Url;

const DUMMY_BASE_URL: &str = "http://example.com";

/// The components of a parsed URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedUrl {
    pub origin: String,
    pub pathname: String,
    pub search: String,
    pub search_params: SearchParams,
    pub hash: String,
    /// `pathname + search + hash`
    pub path: String,
}

/// Parts used to compose a URL with [`build_url`].
///
/// `path` takes precedence over `pathname`/`search`/`hash`, and `search`
/// over `search_params`.
#[derive(Debug, Clone, Default)]
pub struct UrlParts {
    pub origin: Option<String>,
    pub pathname: Option<String>,
    pub search: Option<String>,
    pub search_params: Option<SearchParams>,
    pub hash: Option<String>,
    pub path: Option<String>,
}

impl From<ParsedUrl> for UrlParts {
    fn from(url: ParsedUrl) -> Self {
        UrlParts {
            origin: Some(url.origin),
            pathname: Some(url.pathname),
            search: Some(url.search),
            search_params: Some(url.search_params),
            hash: Some(url.hash),
            path: Some(url.path),
        }
    }
}

/// Result of [`extract_search_params`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedSearchParams {
    pub url: String,
    pub search_params: SearchParams,
}

pub fn parse_url(url: &str) -> ParsedUrl {
    let parsed = match Url::parse(DUMMY_BASE_URL).and_then(|base| base.join(url)) {
        Ok(parsed) => parsed,
        Err(_) => {
            return ParsedUrl {
                pathname: url.to_string(),
                path: url.to_string(),
                ..ParsedUrl::default()
            }
        }
    };

    let mut origin = parsed.origin().ascii_serialization();
    if origin == DUMMY_BASE_URL {
        origin.clear();
    }
    if url.starts_with("//") {
        origin = origin.replacen(&format!("{}:", parsed.scheme()), "", 1);
    }

    let mut pathname = parsed.path().to_string();
    if let Some(rest) = url.strip_prefix(origin.as_str()) {
        if !rest.starts_with('/') && pathname.starts_with('/') {
            pathname.remove(0);
        }
    }

    let search = match parsed.query() {
        Some(query) if !query.is_empty() => format!("?{}", query),
        _ => String::new(),
    };
    let hash = match parsed.fragment() {
        Some(fragment) if !fragment.is_empty() => format!("#{}", fragment),
        _ => String::new(),
    };
    let search_params = SearchParams::parse(parsed.query().unwrap_or_default());
    let path = format!("{}{}{}", pathname, search, hash);

    ParsedUrl {
        origin,
        pathname,
        search,
        search_params,
        hash,
        path,
    }
}

pub fn build_url(url: UrlParts) -> String {
    let search = url.search.unwrap_or_else(|| {
        let params = url
            .search_params
            .map(|params| params.to_string())
            .unwrap_or_default();
        if params.is_empty() {
            params
        } else {
            format!("?{}", params)
        }
    });
    let path = url.path.unwrap_or_else(|| {
        format!(
            "{}{}{}",
            url.pathname.unwrap_or_default(),
            search,
            url.hash.unwrap_or_default()
        )
    });

    format!("{}{}", url.origin.unwrap_or_default(), path)
}

/// Merges parameter sets; a later set replaces earlier values per key.
pub fn merge_search_params(params: &SearchParams, rest: &[&SearchParams]) -> SearchParams {
    let mut result = params.clone();
    for overrides in rest {
        for (key, value) in overrides.iter() {
            result.set(key, value);
        }
    }
    result
}

pub fn append_search_params(url: &str, params: &SearchParams) -> String {
    let parsed = parse_url(url);
    build_url(UrlParts {
        origin: Some(parsed.origin),
        pathname: Some(parsed.pathname),
        hash: Some(parsed.hash),
        search_params: Some(merge_search_params(&parsed.search_params, &[params])),
        ..UrlParts::default()
    })
}

/// Removes the named query parameters from `url` and returns them separately.
pub fn extract_search_params(url: &str, params: &[&str]) -> ExtractedSearchParams {
    let ParsedUrl {
        origin,
        pathname,
        mut search_params,
        hash,
        ..
    } = parse_url(url);

    let mut extracted = SearchParams::new();
    for param in params {
        if let Some(value) = search_params.get(param).map(str::to_string) {
            extracted.set(param, &value);
            search_params.delete(param);
        }
    }

    ExtractedSearchParams {
        url: build_url(UrlParts {
            origin: Some(origin),
            pathname: Some(pathname),
            hash: Some(hash),
            search_params: Some(search_params),
            ..UrlParts::default()
        }),
        search_params: extracted,
    }
}

pub fn is_absolute_url(url: &str) -> bool {
    let parsed = parse_url(url);
    !parsed.origin.is_empty() || parsed.pathname.starts_with('/')
}

fn is_matched_origin(origin: &str, base_origin: &str) -> bool {
    if base_origin.is_empty() || origin.is_empty() {
        return true;
    }

    let mut parts = origin.splitn(2, "//");
    let schema = parts.next().unwrap_or_default();
    let host = parts.next().unwrap_or_default();
    let mut base_parts = base_origin.splitn(2, "//");
    let base_schema = base_parts.next().unwrap_or_default();
    let base_host = base_parts.next().unwrap_or_default();

    (schema.is_empty() || base_schema.is_empty() || schema == base_schema) && base_host == host
}

fn is_matched_pathname(pathname: &str, base_pathname: &str) -> bool {
    base_pathname.is_empty() || pathname.starts_with(base_pathname)
}

fn is_matched_query(search: &SearchParams, base_search: &SearchParams) -> bool {
    base_search.iter().all(|(key, value)| {
        (value.is_empty() && search.has(key)) || search.get_all(key).any(|v| v == value)
    })
}

/// Checks whether `link` falls under `base`: compatible origins, a pathname
/// prefix, and every base query parameter present with the same value.
pub fn is_matched(link: &str, base: &str) -> bool {
    let link_url = parse_url(link);
    let base_url = parse_url(base);

    is_matched_origin(&link_url.origin, &base_url.origin)
        && is_matched_pathname(&link_url.pathname, &base_url.pathname)
        && is_matched_query(&link_url.search_params, &base_url.search_params)
}

/// Resolves `url` against `base`, merging the query strings.
pub fn resolve_url(url: &str, base: &str) -> String {
    let base_url = parse_url(base);
    let source_url = parse_url(url);

    let pathname = if source_url.pathname.starts_with('/') {
        source_url.pathname.clone()
    } else {
        let separator = if base_url.pathname.ends_with('/') || source_url.pathname.is_empty() {
            ""
        } else {
            "/"
        };
        format!("{}{}{}", base_url.pathname, separator, source_url.pathname)
    };

    build_url(UrlParts {
        pathname: Some(pathname),
        hash: Some(first_non_empty(source_url.hash, base_url.hash)),
        origin: Some(first_non_empty(source_url.origin, base_url.origin)),
        search_params: Some(merge_search_params(
            &base_url.search_params,
            &[&source_url.search_params],
        )),
        ..UrlParts::default()
    })
}

fn first_non_empty(value: String, fallback: String) -> String {
    if value.is_empty() {
        fallback
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_relative_url_has_no_origin() {
        let url = parse_url("/news/item?page=2#top");
        assert_eq!(url.origin, "");
        assert_eq!(url.pathname, "/news/item");
        assert_eq!(url.search, "?page=2");
        assert_eq!(url.hash, "#top");
        assert_eq!(url.search_params.get("page"), Some("2"));
    }

    #[test]
    fn parse_keeps_non_slash_paths() {
        assert_eq!(parse_url("news").pathname, "news");
        assert_eq!(parse_url("").pathname, "");
        assert_eq!(parse_url("http://www.example.org").pathname, "");
    }

    #[test]
    fn parse_protocol_relative_url() {
        let url = parse_url("//cms.example.org/site");
        assert_eq!(url.origin, "//cms.example.org");
        assert_eq!(url.pathname, "/site");
    }

    #[test]
    fn build_round_trips() {
        for url in [
            "/news/item?page=2#top",
            "http://www.example.org/site?a=1",
            "//cms.example.org/site",
            "news",
            "https://host:8080",
        ] {
            assert_eq!(build_url(parse_url(url).into()), url);
        }
    }

    #[test]
    fn merge_replaces_by_key() {
        let base = SearchParams::parse("a=1");
        let overrides = SearchParams::parse("a=2&b=3");
        assert_eq!(merge_search_params(&base, &[&overrides]).to_string(), "a=2&b=3");
    }

    #[test]
    fn extract_removes_named_params() {
        let extracted = extract_search_params("/x?a=1&b=2", &["a"]);
        assert_eq!(extracted.url, "/x?b=2");
        assert_eq!(extracted.search_params.get("a"), Some("1"));
        assert!(!extracted.search_params.has("b"));
    }

    #[test]
    fn extract_keeps_url_without_matches() {
        let extracted = extract_search_params("/x?b=2#h", &["token"]);
        assert_eq!(extracted.url, "/x?b=2#h");
        assert!(extracted.search_params.is_empty());
    }

    #[test]
    fn append_merges_into_query() {
        let params = SearchParams::parse("token=abc");
        assert_eq!(
            append_search_params("http://spa.org/app?x=1", &params),
            "http://spa.org/app?x=1&token=abc"
        );
    }

    #[test]
    fn matched_by_path_and_query() {
        assert!(is_matched("http://h/app/x?seg=1", "http://h/app?seg=1"));
        assert!(!is_matched("http://h/app/x?seg=2", "http://h/app?seg=1"));
        assert!(!is_matched("http://h/other", "http://h/app"));
        assert!(is_matched("http://h/anything?x=1", ""));
    }

    #[test]
    fn matched_with_empty_base_value_requires_key() {
        assert!(is_matched("/app?preview=on", "/app?preview="));
        assert!(!is_matched("/app", "/app?preview="));
    }

    #[test]
    fn matched_origin_ignores_missing_scheme() {
        assert!(is_matched("//h/app", "https://h"));
        assert!(!is_matched("http://h/app", "https://h"));
        assert!(!is_matched("http://other/app", "http://h"));
    }

    #[test]
    fn absolute_urls() {
        assert!(is_absolute_url("/path"));
        assert!(is_absolute_url("http://h/path"));
        assert!(!is_absolute_url("path"));
    }

    #[test]
    fn resolve_joins_with_single_slash() {
        assert_eq!(resolve_url("news", "http://spa.org/site"), "http://spa.org/site/news");
        assert_eq!(resolve_url("news", "http://spa.org/site/"), "http://spa.org/site/news");
        assert_eq!(resolve_url("/abs", "http://spa.org/site"), "http://spa.org/abs");
    }

    #[test]
    fn resolve_merges_queries() {
        assert_eq!(
            resolve_url("news?page=2", "/site?token=t&page=1"),
            "/site/news?token=t&page=2"
        );
    }
}
