use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::get;
use axum::{Extension, Router};
use axum_prometheus::PrometheusMetricLayer;
use httpmock::prelude::*;
use serde_json::Value;
use tower::ServiceExt; // for `oneshot`

use keyrotor::backend_api::BackendApiClient;
use keyrotor::identity::TokenProvider;
use keyrotor::management::{ApimEndpoint, KeyManagementClient};
use keyrotor::rotation::RotationCoordinator;
use keyrotor::routes::api_routes;

async fn root() -> &'static str {
    "Subscription Key Rotation API"
}

/// App with a coordinator pointed at an unreachable address; the tests
/// here never get past validation or the function-key guard.
fn test_app() -> Router {
    std::env::set_var("FUNCTION_KEY", "fn-secret");
    std::env::set_var("BACKEND_SUBSCRIPTION_KEY", "gate-secret");
    let tokens = TokenProvider::new(
        "http://127.0.0.1:9",
        "tenant-1",
        "client-1".into(),
        "secret-1".into(),
    )
    .unwrap();
    let management =
        KeyManagementClient::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
    let endpoint = ApimEndpoint {
        subscription_id: "sub-1".into(),
        resource_group: "rg-1".into(),
        service_name: "apim-1".into(),
        apim_subscription_id: "1234".into(),
    };
    let coordinator = Arc::new(RotationCoordinator::new(
        tokens,
        management,
        endpoint,
        "http://127.0.0.1:9/.default".into(),
    ));
    Router::new()
        .route("/", get(root))
        .merge(api_routes())
        .layer(Extension(coordinator))
}

#[tokio::test]
async fn banner_responds_ok() {
    let response = test_app()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
    assert_eq!(body, "Subscription Key Rotation API".as_bytes());
}

#[tokio::test]
async fn data_endpoint_authorizes_matching_key() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .uri("/api/data")
                .header("SUBSCRIPTION-KEY", "gate-secret")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let parsed: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed["status"], "Authorized to query data");
    assert_eq!(parsed["data"], "Bears, beets, battlestar galactica!");
}

#[tokio::test]
async fn data_endpoint_rejects_wrong_key() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .uri("/api/data")
                .header("SUBSCRIPTION-KEY", "wrong")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let parsed: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed["status"], "Not authorized to query data");
    assert!(parsed.get("data").is_none());
}

#[tokio::test]
async fn data_endpoint_rejects_missing_header() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .uri("/api/data")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let parsed: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed["status"], "Not authorized to query data");
    assert!(parsed.get("data").is_none());
}

#[tokio::test]
async fn rotation_triggers_require_function_key() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/keys/regenerate")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
    assert_eq!(body, "Missing or invalid function key".as_bytes());
}

#[tokio::test]
async fn set_keys_rejects_incomplete_payload() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .method("PATCH")
                .uri("/api/keys")
                .header("x-functions-key", "fn-secret")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"primaryKey":"","secondaryKey":"x"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
    assert_eq!(
        body,
        "PrimaryKey and/or SecondaryKey must not be NULL".as_bytes()
    );
}

#[tokio::test]
async fn set_keys_tolerates_missing_fields_as_empty() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .method("PATCH")
                .uri("/api/keys")
                .header("x-functions-key", "fn-secret")
                .header("content-type", "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn metrics_returns_ok() {
    let (layer, handle) = PrometheusMetricLayer::pair();
    let app = Router::new()
        .route("/metrics", get(move || async move { handle.render() }))
        .layer(layer);
    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn proxy_without_configuration_is_an_error() {
    std::env::remove_var("BACKEND_API_URI");
    let response = test_app()
        .oneshot(
            Request::builder()
                .uri("/api/backend")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
    assert_eq!(body, "Backend API not configured".as_bytes());
}

#[tokio::test]
async fn backend_client_attaches_subscription_key() {
    let server = MockServer::start_async().await;
    let data_mock = server.mock(|when, then| {
        when.method(GET)
            .path("/data")
            .header("SUBSCRIPTION-KEY", "gate-secret");
        then.status(200)
            .body(r#"{ "status": "Authorized to query data" }"#);
    });

    let client = BackendApiClient::new(server.url("/data"), "gate-secret");
    let body = client.call().await.unwrap();
    assert_eq!(body, r#"{ "status": "Authorized to query data" }"#);
    data_mock.assert();
}
