use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::json;
use spa_sdk::{Configuration, HttpMethod, Sdk};

use crate::support::{banner_update, settle, v1_model, RecordingClient, TestWindow};

const CMS_ORIGIN: &str = "http://cms.org";

fn preview_config(client: Arc<RecordingClient>, window: Arc<TestWindow>) -> Configuration {
    Configuration {
        endpoint: Some("http://cms.org/pages".to_string()),
        path: Some("/news?token=t1&server-id=s1".to_string()),
        ..Configuration::default()
    }
    .with_http_client(client)
    .with_window(window)
}

fn preview_client() -> Arc<RecordingClient> {
    let client = RecordingClient::new();
    client.route("http://cms.org/pages/news?_hn:ref=banner", banner_update("Updated"));
    client.route("http://cms.org/pages/news", v1_model(true));
    client
}

#[tokio::test]
async fn announces_itself_and_syncs_on_demand() {
    let client = preview_client();
    let window = TestWindow::new();
    let sdk = Sdk::new();

    let page = sdk
        .initialize(&preview_config(client.clone(), window.clone()), None)
        .await
        .unwrap();
    assert!(page.is_preview());

    let request = &client.requests()[0];
    assert_eq!(request.headers.get("Authorization").map(String::as_str), Some("Bearer t1"));
    assert_eq!(request.headers.get("Server-Id").map(String::as_str), Some("s1"));

    let posted = window.posted();
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0]["type"], "brxm:event");
    assert_eq!(posted[0]["event"], "ready");

    page.sync().unwrap();
    let posted = window.posted();
    assert_eq!(posted.len(), 2);
    assert_eq!(posted[1]["type"], "brxm:request");
    assert_eq!(posted[1]["command"], "sync");
}

#[tokio::test]
async fn cms_updates_refresh_the_component() {
    let client = preview_client();
    let window = TestWindow::new();
    let sdk = Sdk::new();
    let page = sdk
        .initialize(&preview_config(client.clone(), window.clone()), None)
        .await
        .unwrap();
    let banner = page.get_component(&["main", "banner"]).unwrap();
    let updates = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&updates);
    banner.on_update(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    window.deliver(
        CMS_ORIGIN,
        json!({
            "type": "brxm:event",
            "event": "update",
            "payload": { "id": "banner", "properties": {} }
        }),
    );
    settle().await;

    let requests = client.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].url, "http://cms.org/pages/news?_hn:ref=banner");
    assert_eq!(requests[1].method, HttpMethod::Get);

    assert_eq!(banner.label().as_deref(), Some("Updated"));
    assert_eq!(updates.load(Ordering::SeqCst), 1);
    assert_eq!(page.to_json()["page"]["banner"]["label"], "Updated");
}

#[tokio::test]
async fn pages_keep_their_wiring_after_the_sdk_is_gone() {
    let client = preview_client();
    let window = TestWindow::new();
    let page = Sdk::new()
        .initialize(&preview_config(client.clone(), window.clone()), None)
        .await
        .unwrap();

    window.deliver(
        CMS_ORIGIN,
        json!({ "type": "brxm:event", "event": "update", "payload": { "id": "banner" } }),
    );
    settle().await;

    assert_eq!(client.requests().len(), 2);
    let banner = page.get_component(&["main", "banner"]).unwrap();
    assert_eq!(banner.label().as_deref(), Some("Updated"));
}

#[tokio::test]
async fn dropping_the_page_closes_the_channel() {
    let window = TestWindow::new();
    let page = Sdk::new()
        .initialize(&preview_config(preview_client(), window.clone()), None)
        .await
        .unwrap();
    assert_eq!(window.listener_count(), 1);

    drop(page);
    assert_eq!(window.listener_count(), 0);
}

#[tokio::test]
async fn updates_from_foreign_origins_are_ignored() {
    let client = preview_client();
    let window = TestWindow::new();
    let sdk = Sdk::new();
    let page = sdk
        .initialize(&preview_config(client.clone(), window.clone()), None)
        .await
        .unwrap();

    window.deliver(
        "http://evil.org",
        json!({ "type": "brxm:event", "event": "update", "payload": { "id": "banner" } }),
    );
    settle().await;

    assert_eq!(client.requests().len(), 1);
    let banner = page.get_component(&["main", "banner"]).unwrap();
    assert_eq!(banner.label().as_deref(), Some("Banner"));
}

#[tokio::test]
async fn destroy_closes_the_channel() {
    let window = TestWindow::new();
    let sdk = Sdk::new();
    let page = sdk
        .initialize(&preview_config(preview_client(), window.clone()), None)
        .await
        .unwrap();
    assert_eq!(window.listener_count(), 1);

    sdk.destroy(&page);
    assert_eq!(window.listener_count(), 0);
    assert!(page.is_destroyed());
}

#[tokio::test]
async fn live_pages_stay_off_the_channel() {
    let client = RecordingClient::new();
    client.route("http://cms.org/pages/news", v1_model(false));
    let window = TestWindow::new();

    Sdk::new()
        .initialize(&preview_config(client, window.clone()), None)
        .await
        .unwrap();

    assert!(window.posted().is_empty());
    assert_eq!(window.listener_count(), 0);
}
