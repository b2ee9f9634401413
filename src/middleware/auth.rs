use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use crate::access::{self, PolicyRequest};
use crate::auth::resolver;
use crate::error::ApiError;
use crate::state::AppState;

/// Authentication and IP access gate for the versioned data surface.
///
/// Resolves credentials into an `AuthContext`, asks the IP policy
/// collaborator whether the resolved tenant may call from this address, and
/// injects the context into request extensions for the handlers. Runs after
/// the CORS layer (so preflights never reach it) and before routing.
pub async fn gateway_auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let context = resolver::resolve(&state, &headers).await?;

    let client_ip = access::client_ip(&headers);
    let user_agent = headers.get("user-agent").and_then(|v| v.to_str().ok());

    access::enforce(
        state.policy.as_ref(),
        state.config.access.fail_open,
        PolicyRequest {
            tenant_id: context.tenant_id,
            client_ip: &client_ip,
            path: request.uri().path(),
            method: request.method().as_str(),
            user_agent,
        },
    )
    .await?;

    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}
