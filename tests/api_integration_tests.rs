//! Integration Tests for API Endpoints
//!
//! Tests full request/response cycle for each endpoint against the default
//! pipeline reading CSV files from a temporary directory.

use std::sync::Arc;
use std::time::{Duration, Instant};

use analysis_jobs::{
    api::create_router, cache::CacheStore, dataset::CsvDirectoryResolver, jobs::JobPolicy,
    pipeline::default_pipeline, AppState,
};
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

// == Helper Functions ==

const SALES_CSV: &str = "region,units,price\n\
north,10,2.5\n\
\"south, coastal\",,3.5\n\
east,30,4.5\n\
north,10,2.5\n";

fn create_test_app() -> (Router, TempDir) {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("sales.csv"), SALES_CSV).unwrap();
    std::fs::write(dir.path().join("empty.csv"), "").unwrap();

    let state = AppState::new(
        Arc::new(CacheStore::local_only()),
        default_pipeline().unwrap(),
        Arc::new(CsvDirectoryResolver::new(dir.path())),
        JobPolicy::default(),
    );
    (create_router(state), dir)
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    (status, body_to_json(response.into_body()).await)
}

async fn submit(app: &Router, body: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/jobs")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    (status, body_to_json(response.into_body()).await)
}

async fn wait_for_terminal(app: &Router, polling_endpoint: &str) -> Value {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let (status, json) = get(app, polling_endpoint).await;
        assert_eq!(status, StatusCode::OK);
        if json["status"] == "completed" || json["status"] == "failed" {
            return json;
        }
        assert!(Instant::now() < deadline, "job never finished: {}", json);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// == Submit Endpoint Tests ==

#[tokio::test]
async fn test_submit_endpoint_accepted() {
    let (app, _dir) = create_test_app();

    let (status, json) = submit(&app, r#"{"dataset_ref":"sales"}"#).await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(json["status"], "queued");
    assert_eq!(json["dataset_ref"], "sales");
    let job_id = json["job_id"].as_str().unwrap();
    assert_eq!(json["polling_endpoint"], format!("/jobs/{}", job_id));
}

#[tokio::test]
async fn test_submit_empty_ref_is_bad_request() {
    let (app, _dir) = create_test_app();

    let (status, json) = submit(&app, r#"{"dataset_ref":""}"#).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("empty"));
}

#[tokio::test]
async fn test_submit_overlong_ref_is_bad_request() {
    let (app, _dir) = create_test_app();
    let body = format!(r#"{{"dataset_ref":"{}"}}"#, "x".repeat(300));

    let (status, _json) = submit(&app, &body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// == Job Lifecycle Tests ==

#[tokio::test]
async fn test_job_completes_and_views_are_served() {
    let (app, _dir) = create_test_app();

    let (_, submitted) = submit(&app, r#"{"dataset_ref":"sales"}"#).await;
    let endpoint = submitted["polling_endpoint"].as_str().unwrap().to_string();

    let job = wait_for_terminal(&app, &endpoint).await;
    assert_eq!(job["status"], "completed");
    assert_eq!(job["progress"], 100);
    assert!(job["current_phase"].is_null());
    assert!(job.get("error").is_none());

    let (status, profile) = get(&app, "/datasets/sales/views/profile").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["rows"], 4);
    assert_eq!(profile["columns"], 3);
    assert_eq!(profile["duplicates"], 1);

    let (status, missing) = get(&app, "/datasets/sales/views/missing").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(missing["total"], 1);
    assert_eq!(missing["by_column"]["units"], 1);

    let (status, stats) = get(&app, "/datasets/sales/views/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["columns"]["price"]["max"], 4.5);

    let (status, correlations) = get(&app, "/datasets/sales/views/correlations").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(correlations["pairs"][0]["column1"], "units");
    assert_eq!(correlations["pairs"][0]["column2"], "price");
    assert_eq!(correlations["pairs"][0]["correlation"], 1.0);

    let (status, outliers) = get(&app, "/datasets/sales/views/outliers").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outliers["method"], "iqr");
}

#[tokio::test]
async fn test_job_for_missing_dataset_fails() {
    let (app, _dir) = create_test_app();

    let (_, submitted) = submit(&app, r#"{"dataset_ref":"nope"}"#).await;
    let endpoint = submitted["polling_endpoint"].as_str().unwrap().to_string();

    let job = wait_for_terminal(&app, &endpoint).await;
    assert_eq!(job["status"], "failed");
    assert!(job["error"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn test_job_for_empty_dataset_fails_in_profile() {
    let (app, _dir) = create_test_app();

    let (_, submitted) = submit(&app, r#"{"dataset_ref":"empty"}"#).await;
    let endpoint = submitted["polling_endpoint"].as_str().unwrap().to_string();

    let job = wait_for_terminal(&app, &endpoint).await;
    assert_eq!(job["status"], "failed");
    assert_eq!(job["current_phase"], "profile");

    let (status, _) = get(&app, "/datasets/empty/views/profile").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// == Not Found Tests ==

#[tokio::test]
async fn test_unknown_job_is_not_found() {
    let (app, _dir) = create_test_app();

    let (status, json) = get(&app, "/jobs/6f1c0c8e-3f4b-4b8e-9a51-2d8c1f7e0a11").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json.get("error").is_some());
}

#[tokio::test]
async fn test_malformed_job_id_is_not_found() {
    let (app, _dir) = create_test_app();

    let (status, _json) = get(&app, "/jobs/not-a-uuid").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_view_before_any_job_is_not_found() {
    let (app, _dir) = create_test_app();

    let (status, _json) = get(&app, "/datasets/sales/views/profile").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

// == Health & Stats Tests ==

#[tokio::test]
async fn test_health_reports_local_fallback() {
    let (app, _dir) = create_test_app();

    let (status, json) = get(&app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["cache"], "degraded");
    assert_eq!(json["cache_backend"], "local-fallback");
}

#[tokio::test]
async fn test_stats_count_lookups() {
    let (app, _dir) = create_test_app();

    get(&app, "/datasets/sales/views/profile").await;
    let (status, json) = get(&app, "/stats").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["misses"], 1);
    assert!(json.get("hit_rate").is_some());
}
