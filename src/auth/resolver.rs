use axum::http::HeaderMap;

use crate::auth::{hash_api_key, AuthContext, AuthMethod};
use crate::error::ApiError;
use crate::state::AppState;
use crate::usage;

/// Turn raw request credentials into an `AuthContext`.
///
/// An API key takes precedence over a bearer token when both are present.
/// Each successful API key call schedules a detached usage increment; the
/// request does not wait for it.
pub async fn resolve(state: &AppState, headers: &HeaderMap) -> Result<AuthContext, ApiError> {
    if let Some(raw_key) = header_value(headers, "x-api-key") {
        return resolve_api_key(state, raw_key).await;
    }

    if let Some(token) = bearer_token(headers) {
        return resolve_bearer(state, token).await;
    }

    Err(ApiError::authentication("authentication required"))
}

async fn resolve_api_key(state: &AppState, raw_key: &str) -> Result<AuthContext, ApiError> {
    let key_hash = hash_api_key(raw_key);

    let record = state
        .keys
        .find_active(&key_hash)
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?
        .ok_or_else(|| ApiError::authentication("invalid or inactive API key"))?;

    usage::record_usage(state.keys.clone(), key_hash);

    Ok(record.to_context())
}

async fn resolve_bearer(state: &AppState, token: &str) -> Result<AuthContext, ApiError> {
    let user_id = state
        .identity
        .verify(token)
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?
        .ok_or_else(|| ApiError::authentication("invalid bearer token"))?;

    let tenant_id = state
        .directory
        .tenant_for_user(user_id)
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?
        .ok_or_else(|| ApiError::authorization("no tenant associated with this account"))?;

    Ok(AuthContext {
        tenant_id,
        user_id: Some(user_id),
        method: AuthMethod::Bearer,
        permissions: Vec::new(),
        rate_limit: None,
    })
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    header_value(headers, "authorization")
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
