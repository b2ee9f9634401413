use async_trait::async_trait;
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::error::ApiError;

/// Answer from the external IP-policy collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessDecision {
    pub allowed: bool,
    pub reason: Option<String>,
}

/// What the policy function sees about the request.
#[derive(Debug)]
pub struct PolicyRequest<'a> {
    pub tenant_id: Uuid,
    pub client_ip: &'a str,
    pub path: &'a str,
    pub method: &'a str,
    pub user_agent: Option<&'a str>,
}

#[derive(Debug, Error)]
#[error("ip policy error: {0}")]
pub struct PolicyError(pub String);

/// External IP-policy decision function. `Ok(None)` means the policy had no
/// decision for this request.
#[async_trait]
pub trait IpPolicy: Send + Sync {
    async fn check(&self, request: &PolicyRequest<'_>) -> Result<Option<AccessDecision>, PolicyError>;
}

/// Resolve the client IP: first entry of `x-forwarded-for`, then provider
/// real-IP headers, else the literal `"unknown"`.
pub fn client_ip(headers: &HeaderMap) -> String {
    if let Some(forwarded) = header_str(headers, "x-forwarded-for") {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    if let Some(ip) = header_str(headers, "cf-connecting-ip") {
        return ip.trim().to_string();
    }
    if let Some(ip) = header_str(headers, "x-real-ip") {
        return ip.trim().to_string();
    }
    "unknown".to_string()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.trim().is_empty())
}

/// Enforce the policy's answer. An explicit deny is a 403 carrying the
/// policy's reason. A policy failure or missing decision is governed by the
/// `fail_open` configuration switch.
pub async fn enforce(
    policy: &dyn IpPolicy,
    fail_open: bool,
    request: PolicyRequest<'_>,
) -> Result<(), ApiError> {
    match policy.check(&request).await {
        Ok(Some(decision)) => {
            if decision.allowed {
                Ok(())
            } else {
                let reason = decision
                    .reason
                    .unwrap_or_else(|| "access denied by IP policy".to_string());
                Err(ApiError::authorization(reason))
            }
        }
        Ok(None) => {
            tracing::warn!(
                tenant_id = %request.tenant_id,
                client_ip = request.client_ip,
                "ip policy returned no decision"
            );
            if fail_open {
                Ok(())
            } else {
                Err(ApiError::authorization("access policy unavailable"))
            }
        }
        Err(e) => {
            tracing::warn!(
                tenant_id = %request.tenant_id,
                client_ip = request.client_ip,
                "ip policy check failed: {}",
                e
            );
            if fail_open {
                Ok(())
            } else {
                Err(ApiError::authorization("access policy unavailable"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(
                axum::http::header::HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    #[test]
    fn forwarded_for_takes_first_entry() {
        let h = headers(&[("x-forwarded-for", "203.0.113.9, 10.0.0.1, 10.0.0.2")]);
        assert_eq!(client_ip(&h), "203.0.113.9");
    }

    #[test]
    fn forwarded_for_wins_over_real_ip() {
        let h = headers(&[
            ("x-forwarded-for", "203.0.113.9"),
            ("cf-connecting-ip", "198.51.100.4"),
            ("x-real-ip", "192.0.2.1"),
        ]);
        assert_eq!(client_ip(&h), "203.0.113.9");
    }

    #[test]
    fn falls_through_provider_headers() {
        let h = headers(&[("cf-connecting-ip", "198.51.100.4")]);
        assert_eq!(client_ip(&h), "198.51.100.4");

        let h = headers(&[("x-real-ip", "192.0.2.1")]);
        assert_eq!(client_ip(&h), "192.0.2.1");
    }

    #[test]
    fn missing_headers_resolve_to_unknown() {
        assert_eq!(client_ip(&HeaderMap::new()), "unknown");
    }

    struct FixedPolicy(Result<Option<AccessDecision>, String>);

    #[async_trait]
    impl IpPolicy for FixedPolicy {
        async fn check(
            &self,
            _request: &PolicyRequest<'_>,
        ) -> Result<Option<AccessDecision>, PolicyError> {
            match &self.0 {
                Ok(d) => Ok(d.clone()),
                Err(e) => Err(PolicyError(e.clone())),
            }
        }
    }

    fn request(tenant_id: Uuid) -> PolicyRequest<'static> {
        PolicyRequest {
            tenant_id,
            client_ip: "203.0.113.9",
            path: "/v1/customers",
            method: "GET",
            user_agent: None,
        }
    }

    #[tokio::test]
    async fn explicit_deny_carries_reason() {
        let policy = FixedPolicy(Ok(Some(AccessDecision {
            allowed: false,
            reason: Some("ip blocked by tenant rule".to_string()),
        })));
        let err = enforce(&policy, true, request(Uuid::new_v4())).await.unwrap_err();
        assert_eq!(err.message(), "ip blocked by tenant rule");
    }

    #[tokio::test]
    async fn allow_passes() {
        let policy = FixedPolicy(Ok(Some(AccessDecision { allowed: true, reason: None })));
        assert!(enforce(&policy, false, request(Uuid::new_v4())).await.is_ok());
    }

    #[tokio::test]
    async fn policy_failure_respects_fail_open_switch() {
        let failing = FixedPolicy(Err("timeout".to_string()));
        assert!(enforce(&failing, true, request(Uuid::new_v4())).await.is_ok());

        let failing = FixedPolicy(Err("timeout".to_string()));
        assert!(enforce(&failing, false, request(Uuid::new_v4())).await.is_err());
    }

    #[tokio::test]
    async fn no_decision_respects_fail_open_switch() {
        let silent = FixedPolicy(Ok(None));
        assert!(enforce(&silent, true, request(Uuid::new_v4())).await.is_ok());

        let silent = FixedPolicy(Ok(None));
        assert!(enforce(&silent, false, request(Uuid::new_v4())).await.is_err());
    }
}
