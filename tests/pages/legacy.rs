use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::json;
use spa_sdk::cms::CmsApi;
use spa_sdk::config::ProxyOptions;
use spa_sdk::url::BasePathUrlOptions;
use spa_sdk::{Configuration, HttpMethod, Sdk};

use crate::support::{settle, v09_model, RecordingClient, TestWindow};

const PREVIEW_API: &str = "http://cms.org/site/_cmsinternal/resourceapi";

#[derive(Default)]
struct CountingApi {
    syncs: AtomicUsize,
}

impl CmsApi for CountingApi {
    fn sync(&self) {
        self.syncs.fetch_add(1, Ordering::SeqCst);
    }
}

fn proxy_config(client: Arc<RecordingClient>, window: Arc<TestWindow>, path: &str) -> Configuration {
    Configuration {
        path: Some(path.to_string()),
        options: Some(ProxyOptions {
            live: Some(BasePathUrlOptions {
                cms_base_url: Some("http://cms.org/site".to_string()),
                ..BasePathUrlOptions::default()
            }),
            preview: Some(BasePathUrlOptions {
                cms_base_url: Some("http://cms.org/site/_cmsinternal".to_string()),
                spa_base_url: Some("/preview".to_string()),
                ..BasePathUrlOptions::default()
            }),
        }),
        ..Configuration::default()
    }
    .with_http_client(client)
    .with_window(window)
}

fn preview_model() -> serde_json::Value {
    let mut model = v09_model(true);
    model["page"]["components"][0]["components"][0]["_links"]["componentRendering"]["href"] =
        json!("/site/_cmsinternal/resourceapi/news?_hn:ref=r1_r2");
    model
}

#[tokio::test]
async fn picks_the_live_configuration_outside_the_preview_base() {
    let client = RecordingClient::new();
    client.route("http://cms.org/site/resourceapi/news", v09_model(false));

    Sdk::new()
        .initialize(&proxy_config(client.clone(), TestWindow::new(), "/news"), None)
        .await
        .unwrap();
    assert_eq!(client.requests()[0].url, "http://cms.org/site/resourceapi/news");
}

#[tokio::test]
async fn sync_waits_for_the_handshake() {
    let client = RecordingClient::new();
    client.route(PREVIEW_API, preview_model());
    let window = TestWindow::new();

    let page = Sdk::new()
        .initialize(&proxy_config(client.clone(), window.clone(), "/preview/news"), None)
        .await
        .unwrap();
    assert_eq!(client.requests()[0].url, format!("{}/news", PREVIEW_API));

    page.sync().unwrap();
    let api = Arc::new(CountingApi::default());
    let spa = window.spa().expect("the bridge installs itself on the window");
    assert_eq!(api.syncs.load(Ordering::SeqCst), 0);

    spa.init(api.clone());
    assert_eq!(api.syncs.load(Ordering::SeqCst), 1);

    page.sync().unwrap();
    assert_eq!(api.syncs.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn rendered_components_replace_their_content() {
    let client = RecordingClient::new();
    client.route(
        &format!("{}/news?", PREVIEW_API),
        json!({
            "content": {
                "u1": { "id": "u1", "name": "updated", "_links": { "site": { "href": "/site/article" } } }
            }
        }),
    );
    client.route(PREVIEW_API, preview_model());
    let window = TestWindow::new();
    let page = Sdk::new()
        .initialize(&proxy_config(client.clone(), window.clone(), "/preview/news"), None)
        .await
        .unwrap();

    let properties = json!({ "title": "Fresh" }).as_object().cloned().unwrap();
    window.spa().unwrap().render_component("r1_r2", properties);
    settle().await;

    let requests = client.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].method, HttpMethod::Post);
    assert_eq!(requests[1].data.as_deref(), Some("title=Fresh"));
    assert_eq!(page.get_content("u1").unwrap().unwrap().name(), Some("updated"));
}
