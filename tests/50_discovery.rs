mod common;

use axum::http::StatusCode;
use serde_json::json;
use uuid::Uuid;

use common::{req, send};
use mizan_api::testing::TestGatewayBuilder;

const KEY: &str = "mzn_live_t1";

fn gateway() -> mizan_api::testing::TestGateway {
    TestGatewayBuilder::new().api_key(KEY, Uuid::new_v4()).build()
}

#[tokio::test]
async fn unknown_resource_returns_the_discovery_document() {
    let gateway = gateway();

    let (status, body) = send(
        &gateway.router,
        req("GET", "/v1/unknown-resource").api_key(KEY).build(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let resources = body["data"]["resources"].as_array().unwrap();
    assert_eq!(resources.len(), 11);
    assert!(resources.iter().any(|r| r == "customers"));
    assert!(resources.iter().any(|r| r == "fiscal-years"));
    assert!(body["data"]["documentation"].is_string());
}

#[tokio::test]
async fn bare_version_prefix_is_also_discovery() {
    let gateway = gateway();

    let (status, body) = send(&gateway.router, req("GET", "/v1").api_key(KEY).build()).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["resources"].is_array());
}

#[tokio::test]
async fn discovery_applies_to_record_paths_too() {
    let gateway = gateway();

    let (status, body) = send(
        &gateway.router,
        req("GET", &format!("/v1/payroll/{}", Uuid::new_v4()))
            .api_key(KEY)
            .build(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["resources"].is_array());
}

#[tokio::test]
async fn writes_to_unknown_resources_do_not_error() {
    let gateway = gateway();

    let (status, body) = send(
        &gateway.router,
        req("POST", "/v1/unknown-resource")
            .api_key(KEY)
            .json(json!({"name": "x"}))
            .build(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["resources"].is_array());
}

#[tokio::test]
async fn unsupported_version_is_400() {
    let gateway = gateway();

    let (status, body) = send(
        &gateway.router,
        req("GET", "/v2/customers").api_key(KEY).build(),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "unsupported API version: v2");
    assert_eq!(body["status"], 400);
}

#[tokio::test]
async fn discovery_still_requires_authentication() {
    let gateway = gateway();

    let (status, _) = send(&gateway.router, req("GET", "/v1/unknown-resource").build()).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn root_and_health_are_public() {
    let gateway = gateway();

    let (status, body) = send(&gateway.router, req("GET", "/").build()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Mizan API");

    let (status, body) = send(&gateway.router, req("GET", "/health").build()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ok");
}
