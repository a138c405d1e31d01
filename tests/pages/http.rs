use std::net::SocketAddr;

use axum::extract::Extension;
use axum::http::{header, HeaderMap};
use axum::routing::get;
use axum::{middleware, Json, Router};
use serde_json::{json, Value};
use spa_sdk::page::Visitor;
use spa_sdk::relevance::{visitor_middleware, RelevanceOptions};
use spa_sdk::{Configuration, Sdk, SpaError};

use crate::support::v1_model;

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn news(headers: HeaderMap) -> Json<Value> {
    let mut model = v1_model(false);
    if let Some(token) = headers.get(header::AUTHORIZATION) {
        model["meta"]["authorization"] = json!(token.to_str().unwrap());
    }
    Json(model)
}

fn endpoint(addr: SocketAddr, path: &str) -> Configuration {
    Configuration {
        endpoint: Some(format!("http://{}/pages", addr)),
        path: Some(path.to_string()),
        ..Configuration::default()
    }
}

#[tokio::test]
async fn fetches_the_model_over_http() {
    let addr = serve(Router::new().route("/pages/news", get(news))).await;

    let page = Sdk::new()
        .initialize(&endpoint(addr, "/news?token=abc"), None)
        .await
        .unwrap();

    assert_eq!(page.get_title().as_deref(), Some("News"));
    assert_eq!(page.to_json()["meta"]["authorization"], "Bearer abc");
}

#[tokio::test]
async fn error_statuses_surface_as_http_errors() {
    let addr = serve(Router::new().route("/pages/news", get(news))).await;

    let err = Sdk::new()
        .initialize(&endpoint(addr, "/missing"), None)
        .await
        .unwrap_err();
    match err {
        SpaError::Http(err) => assert_eq!(err.status, Some(404)),
        other => panic!("unexpected error: {}", other),
    }
}

async fn assign(visitor: Option<Extension<Visitor>>) -> (Extension<Visitor>, String) {
    let known = visitor.map(|Extension(visitor)| visitor.id);
    let visitor = Visitor {
        id: "v42".to_string(),
        header: "X-Visitor".to_string(),
        new: true,
    };
    (Extension(visitor), known.unwrap_or_default())
}

#[tokio::test]
async fn the_visitor_cookie_round_trips() {
    let app = Router::new()
        .route("/", get(assign))
        .layer(middleware::from_fn_with_state(RelevanceOptions::default(), visitor_middleware));
    let addr = serve(app).await;
    let client = reqwest::Client::new();

    let first = client.get(format!("http://{}/", addr)).send().await.unwrap();
    let cookie = first
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("_v="));
    assert!(cookie.contains("HttpOnly"));
    assert_eq!(first.text().await.unwrap(), "");

    let pair = cookie.split(';').next().unwrap();
    let second = client
        .get(format!("http://{}/", addr))
        .header(header::COOKIE, pair)
        .send()
        .await
        .unwrap();
    assert_eq!(second.text().await.unwrap(), "v42");
}
