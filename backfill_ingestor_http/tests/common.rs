#![allow(dead_code)]

use std::sync::Arc;

use axum::{Router, body::Body};
use backfill_control_plane::{
    event_store::InMemoryEventStore,
    gate::{ConcurrencyGate, ConcurrencyGateOptions},
    import_metadata::InMemoryImportMetadata,
    quota::{QuotaCache, WindowQuotaTrackerFactory},
    sites::{InMemorySiteDirectory, SiteDirectory},
};
use backfill_ingestor_core::{AllowAllAuthorizer, ImportService};
use backfill_ingestor_http::{CALLER_HEADER, HttpIngestor};
use backfill_resources::{OrganizationName, SiteName};
use chrono::{Duration, Utc};
use http::{Request, Response, StatusCode};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tower::ServiceExt;

pub const CALLER: &str = "alice";

pub async fn new_router() -> Router {
    new_ingestor().await.into_router()
}

pub async fn new_ingestor() -> HttpIngestor {
    let sites = Arc::new(InMemorySiteDirectory::new());
    let organization = OrganizationName::new_unchecked("acme");

    sites
        .create_organization(organization.clone())
        .await
        .expect("create_organization");
    sites
        .create_site(SiteName::new_unchecked("blog"), organization)
        .await
        .expect("create_site");

    let quota_cache = QuotaCache::new(Arc::new(WindowQuotaTrackerFactory::default()));
    let gate = ConcurrencyGate::new(ConcurrencyGateOptions::default());

    let service = ImportService::new(
        sites,
        Arc::new(InMemoryImportMetadata::new()),
        Arc::new(InMemoryEventStore::new()),
        Arc::new(AllowAllAuthorizer),
        quota_cache,
        gate,
    );

    HttpIngestor::new(service)
}

pub async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
    router
        .clone()
        .oneshot(request)
        .await
        .expect("router is infallible")
}

pub fn request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(CALLER_HEADER, CALLER);

    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    }
}

pub async fn read_json<T: DeserializeOwned>(response: Response<Body>) -> T {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("collect body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}

pub async fn expect_status<T: DeserializeOwned>(
    router: &Router,
    request: Request<Body>,
    status: StatusCode,
) -> T {
    let response = send(router, request).await;
    assert_eq!(response.status(), status);
    read_json(response).await
}

/// A Umami page view `hours_ago` hours before now.
pub fn recent_umami_event(hours_ago: i64) -> Value {
    let created_at = Utc::now() - Duration::hours(hours_ago);
    json!({
        "session_id": "6f9b2c",
        "url_path": "/pricing",
        "created_at": created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        "event_type": 1,
        "hostname": "example.com",
    })
}

/// A Umami page view from well before the default history window.
pub fn ancient_umami_event() -> Value {
    json!({
        "session_id": "6f9b2c",
        "url_path": "/pricing",
        "created_at": "2001-01-01 00:00:00",
        "event_type": 1,
        "hostname": "example.com",
    })
}

/// A Umami export row with every column of the export, `minutes_ago`
/// minutes before now.
pub fn full_umami_row(index: usize, minutes_ago: i64) -> Value {
    let created_at = Utc::now() - Duration::minutes(minutes_ago);
    json!({
        "website_id": "3f0c52d4-8a1e-4f5b-9a7d-2c6e0b1d9f43",
        "session_id": format!("1c2d3e4f-5a6b-4c7d-8e9f-{index:012}"),
        "visit_id": format!("9e8d7c6b-5a4f-4e3d-2c1b-{index:012}"),
        "event_id": format!("0a1b2c3d-4e5f-4a6b-8c7d-{index:012}"),
        "hostname": "example.com",
        "browser": "chrome",
        "os": "Mac OS",
        "device": "laptop",
        "screen": "1920x1080",
        "language": "en-US",
        "country": "DE",
        "subdivision1": "DE-BE",
        "city": "Berlin",
        "url_path": format!("/blog/posts/{index}"),
        "url_query": "utm_source=newsletter&utm_medium=email",
        "referrer_path": "/search",
        "referrer_query": "q=historical+analytics+imports",
        "referrer_domain": "www.google.com",
        "page_title": "Importing historical analytics data",
        "event_type": 1,
        "event_name": null,
        "tag": null,
        "created_at": created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
    })
}
