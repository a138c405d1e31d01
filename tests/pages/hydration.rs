use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::json;
use spa_sdk::{Configuration, PageSource, Reference, RequestContext, Sdk, SpaError};

use crate::support::{v09_model, v1_model, RecordingClient};

fn jwt10(client: Arc<RecordingClient>, path: &str) -> Configuration {
    Configuration {
        endpoint: Some("http://cms.org/pages".to_string()),
        path: Some(path.to_string()),
        ..Configuration::default()
    }
    .with_http_client(client)
}

#[tokio::test]
async fn fetches_and_hydrates_a_v1_page() {
    let client = RecordingClient::new();
    client.route("http://cms.org/pages/news", v1_model(false));
    let sdk = Sdk::new();

    let page = sdk.initialize(&jwt10(client.clone(), "/news"), None).await.unwrap();

    assert_eq!(page.get_title().as_deref(), Some("News"));
    assert_eq!(page.get_locale().unwrap(), "nl_NL");
    assert!(!page.is_preview());

    let banner = page.get_component(&["main", "banner"]).unwrap();
    assert_eq!(banner.label().as_deref(), Some("Banner"));
    assert_eq!(page.get_document().unwrap().unwrap().name(), Some("news"));

    let requests = client.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url, "http://cms.org/pages/news");
    assert_eq!(sdk.len(), 1);
}

#[tokio::test]
async fn references_resolve_to_the_same_instance() {
    let sdk = Sdk::new();
    let page = sdk
        .initialize(&Configuration::default(), Some(PageSource::Model(v1_model(false))))
        .await
        .unwrap();

    let reference = Reference::new("/page/doc");
    let first = page.get_content(&reference).unwrap().unwrap();
    let second = page.get_document().unwrap().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[tokio::test]
async fn hydrates_a_legacy_model() {
    let config = Configuration {
        cms_base_url: Some("http://cms.org/site".to_string()),
        spa_base_url: Some("/".to_string()),
        path: Some("/news".to_string()),
        ..Configuration::default()
    };
    let sdk = Sdk::new();
    let page = sdk
        .initialize(&config, Some(PageSource::Model(v09_model(false))))
        .await
        .unwrap();

    assert_eq!(page.get_title().as_deref(), Some("Legacy"));
    let banner = page.get_component(&["main", "banner"]).unwrap();
    assert_eq!(banner.id(), "r1_r2");
    assert!(page.get_content("u1").unwrap().is_some());
}

#[tokio::test]
async fn unsupported_component_types_are_named() {
    let mut model = v1_model(false);
    model["page"]["main"]["type"] = json!("carousel");

    let err = Sdk::new()
        .initialize(&Configuration::default(), Some(PageSource::Model(model)))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("carousel"), "{}", err);
}

#[tokio::test]
async fn non_object_models_are_rejected() {
    let err = Sdk::new()
        .initialize(&Configuration::default(), Some(PageSource::Model(json!([1, 2]))))
        .await
        .unwrap_err();
    assert!(matches!(err, SpaError::Decode(_)));
}

#[tokio::test]
async fn hydrated_pages_short_circuit() {
    let sdk = Sdk::new();
    let page = sdk
        .initialize(&Configuration::default(), Some(PageSource::Model(v1_model(false))))
        .await
        .unwrap();

    let again = sdk
        .initialize(&Configuration::default(), Some(PageSource::Page(Arc::clone(&page))))
        .await
        .unwrap();
    assert!(Arc::ptr_eq(&page, &again));
    assert_eq!(sdk.len(), 1);
}

#[tokio::test]
async fn the_request_hook_sees_the_page() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let config = Configuration::default().with_request(
        RequestContext::new("/news").on_initialized(move |page| {
            assert_eq!(page.get_title().as_deref(), Some("News"));
            seen.fetch_add(1, Ordering::SeqCst);
        }),
    );

    Sdk::new()
        .initialize(&config, Some(PageSource::Model(v1_model(false))))
        .await
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn destroy_is_idempotent() {
    let sdk = Sdk::new();
    let page = sdk
        .initialize(&Configuration::default(), Some(PageSource::Model(v1_model(false))))
        .await
        .unwrap();

    sdk.destroy(&page);
    sdk.destroy(&page);

    assert!(sdk.is_empty());
    assert!(page.is_destroyed());
    assert!(matches!(page.sync(), Err(SpaError::Destroyed)));
}
