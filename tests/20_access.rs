mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use uuid::Uuid;

use common::{req, send};
use mizan_api::testing::{FailingIpPolicy, RecordingIpPolicy, StaticIpPolicy, TestGatewayBuilder};

#[tokio::test]
async fn policy_deny_is_403_with_the_policy_reason() {
    let tenant = Uuid::new_v4();
    let gateway = TestGatewayBuilder::new()
        .api_key("mzn_live_1", tenant)
        .policy(Arc::new(StaticIpPolicy::deny("ip 203.0.113.9 not in allow list")))
        .build();

    let (status, body) = send(
        &gateway.router,
        req("GET", "/v1/customers").api_key("mzn_live_1").build(),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "ip 203.0.113.9 not in allow list");
    assert_eq!(body["status"], 403);
}

#[tokio::test]
async fn policy_failure_fails_open_by_default() {
    let tenant = Uuid::new_v4();
    let gateway = TestGatewayBuilder::new()
        .api_key("mzn_live_1", tenant)
        .policy(Arc::new(FailingIpPolicy))
        .build();

    let (status, _) = send(
        &gateway.router,
        req("GET", "/v1/customers").api_key("mzn_live_1").build(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn policy_failure_fails_closed_when_configured() {
    let tenant = Uuid::new_v4();
    let gateway = TestGatewayBuilder::new()
        .api_key("mzn_live_1", tenant)
        .policy(Arc::new(FailingIpPolicy))
        .fail_open(false)
        .build();

    let (status, body) = send(
        &gateway.router,
        req("GET", "/v1/customers").api_key("mzn_live_1").build(),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "access policy unavailable");
}

#[tokio::test]
async fn missing_decision_follows_the_same_switch() {
    let tenant = Uuid::new_v4();

    let open = TestGatewayBuilder::new()
        .api_key("mzn_live_1", tenant)
        .policy(Arc::new(StaticIpPolicy::silent()))
        .build();
    let (status, _) = send(
        &open.router,
        req("GET", "/v1/customers").api_key("mzn_live_1").build(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let closed = TestGatewayBuilder::new()
        .api_key("mzn_live_1", tenant)
        .policy(Arc::new(StaticIpPolicy::silent()))
        .fail_open(false)
        .build();
    let (status, _) = send(
        &closed.router,
        req("GET", "/v1/customers").api_key("mzn_live_1").build(),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn policy_sees_first_forwarded_for_entry() {
    let tenant = Uuid::new_v4();
    let recording = Arc::new(RecordingIpPolicy::default());
    let gateway = TestGatewayBuilder::new()
        .api_key("mzn_live_1", tenant)
        .policy(recording.clone())
        .build();

    let (status, _) = send(
        &gateway.router,
        req("GET", "/v1/customers")
            .api_key("mzn_live_1")
            .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
            .header("x-real-ip", "192.0.2.1")
            .build(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let seen = recording.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    let (seen_tenant, ip, path, method) = &seen[0];
    assert_eq!(*seen_tenant, tenant);
    assert_eq!(ip, "203.0.113.9");
    assert_eq!(path, "/v1/customers");
    assert_eq!(method, "GET");
}

#[tokio::test]
async fn policy_sees_unknown_without_ip_headers() {
    let tenant = Uuid::new_v4();
    let recording = Arc::new(RecordingIpPolicy::default());
    let gateway = TestGatewayBuilder::new()
        .api_key("mzn_live_1", tenant)
        .policy(recording.clone())
        .build();

    let (status, _) = send(
        &gateway.router,
        req("GET", "/v1/customers").api_key("mzn_live_1").build(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(recording.seen.lock().unwrap()[0].1, "unknown");
}

#[tokio::test]
async fn options_short_circuits_before_auth_and_policy() {
    let recording = Arc::new(RecordingIpPolicy::default());
    let gateway = TestGatewayBuilder::new().policy(recording.clone()).build();

    // No credentials at all; a denying auth path would 401 here.
    let response = {
        use tower::ServiceExt;
        gateway
            .router
            .clone()
            .oneshot(req("OPTIONS", "/v1/customers").build())
            .await
            .unwrap()
    };

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let headers = response.headers();
    assert_eq!(headers["access-control-allow-origin"], "*");
    assert!(headers["access-control-allow-methods"]
        .to_str()
        .unwrap()
        .contains("PATCH"));
    assert!(headers["access-control-allow-headers"]
        .to_str()
        .unwrap()
        .contains("x-api-key"));

    // Neither the resolver nor the policy ran
    assert!(recording.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn error_responses_carry_cors_headers() {
    let gateway = TestGatewayBuilder::new().build();

    let response = {
        use tower::ServiceExt;
        gateway
            .router
            .clone()
            .oneshot(req("GET", "/v1/customers").build())
            .await
            .unwrap()
    };

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
}
