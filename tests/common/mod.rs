#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

/// Drive one request through the router and collect status + JSON body.
pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("router call failed");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body collect failed")
        .to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

pub struct RequestBuilder {
    method: Method,
    uri: String,
    api_key: Option<String>,
    bearer: Option<String>,
    headers: Vec<(String, String)>,
    body: Option<Value>,
}

pub fn req(method: &str, uri: &str) -> RequestBuilder {
    RequestBuilder {
        method: method.parse().expect("bad method"),
        uri: uri.to_string(),
        api_key: None,
        bearer: None,
        headers: Vec::new(),
        body: None,
    }
}

impl RequestBuilder {
    pub fn api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.to_string());
        self
    }

    pub fn bearer(mut self, token: &str) -> Self {
        self.bearer = Some(token.to_string());
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn build(self) -> Request<Body> {
        let mut builder = Request::builder().method(self.method).uri(self.uri);
        if let Some(key) = &self.api_key {
            builder = builder.header("x-api-key", key);
        }
        if let Some(token) = &self.bearer {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        match self.body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .expect("request build failed"),
            None => builder.body(Body::empty()).expect("request build failed"),
        }
    }
}
