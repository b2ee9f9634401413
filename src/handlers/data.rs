use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::auth::AuthContext;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, Pagination};
use crate::query::{ListParams, ListQuery};
use crate::resources::{discovery_document, Resource};
use crate::state::AppState;

const SUPPORTED_VERSION: &str = "v1";

/// Fields the public update path may never touch. Stripped from the payload
/// in addition to the tenant predicate on the update itself.
const IMMUTABLE_FIELDS: [&str; 3] = ["id", "company_id", "created_at"];

/// GET /:version - discovery document for the bare version prefix
pub async fn discovery_root(
    State(state): State<AppState>,
    Path(version): Path<String>,
    Extension(_auth): Extension<AuthContext>,
) -> ApiResult<Value> {
    check_version(&version)?;
    Ok(discovery(&state))
}

/// GET /:version/:resource - list records for the caller's tenant
pub async fn list(
    State(state): State<AppState>,
    Path((version, resource)): Path<(String, String)>,
    Query(query): Query<ListQuery>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Value> {
    check_version(&version)?;
    let Some(resource) = Resource::from_path(&resource) else {
        return Ok(discovery(&state));
    };
    let descriptor = resource.descriptor();

    let params = ListParams::resolve(&query, &descriptor, &state.config.query);
    let (rows, total) = state.store.list(&descriptor, auth.tenant_id, &params).await?;

    Ok(ApiResponse::paginated(
        Value::Array(rows),
        Pagination {
            page: params.page,
            limit: params.limit,
            total,
            total_pages: params.total_pages(total),
        },
    ))
}

/// GET /:version/:resource/:id - fetch a single record by id and tenant
pub async fn get_one(
    State(state): State<AppState>,
    Path((version, resource, id)): Path<(String, String, String)>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Value> {
    check_version(&version)?;
    let Some(resource) = Resource::from_path(&resource) else {
        return Ok(discovery(&state));
    };
    let descriptor = resource.descriptor();

    // A malformed id behaves like an id the tenant does not own.
    let Some(id) = parse_id(&id) else {
        return Err(ApiError::not_found("record not found"));
    };

    match state.store.get(&descriptor, auth.tenant_id, id).await? {
        Some(row) => Ok(ApiResponse::success(row)),
        None => Err(ApiError::not_found("record not found")),
    }
}

/// POST /:version/:resource - create a record under the caller's tenant
pub async fn create(
    State(state): State<AppState>,
    Path((version, resource)): Path<(String, String)>,
    Extension(auth): Extension<AuthContext>,
    body: Option<Json<Value>>,
) -> ApiResult<Value> {
    check_version(&version)?;
    let Some(resource) = Resource::from_path(&resource) else {
        return Ok(discovery(&state));
    };
    let descriptor = resource.descriptor();

    let payload = require_object(body)?;
    let row = state.store.insert(&descriptor, auth.tenant_id, payload).await?;

    Ok(ApiResponse::created(row))
}

/// PUT/PATCH /:version/:resource/:id - update a record, immutable fields
/// stripped and the tenant predicate still applied
pub async fn update(
    State(state): State<AppState>,
    Path((version, resource, id)): Path<(String, String, String)>,
    Extension(auth): Extension<AuthContext>,
    body: Option<Json<Value>>,
) -> ApiResult<Value> {
    check_version(&version)?;
    let Some(resource) = Resource::from_path(&resource) else {
        return Ok(discovery(&state));
    };
    let descriptor = resource.descriptor();

    let mut payload = require_object(body)?;
    for field in IMMUTABLE_FIELDS {
        payload.remove(field);
    }

    // No matching row is a successful no-op, same as the store reports it.
    let Some(id) = parse_id(&id) else {
        return Ok(ApiResponse::success(Value::Null));
    };

    match state.store.update(&descriptor, auth.tenant_id, id, payload).await? {
        Some(row) => Ok(ApiResponse::success(row)),
        None => Ok(ApiResponse::success(Value::Null)),
    }
}

/// DELETE /:version/:resource/:id - idempotent delete by id and tenant
pub async fn delete(
    State(state): State<AppState>,
    Path((version, resource, id)): Path<(String, String, String)>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Value> {
    check_version(&version)?;
    let Some(resource) = Resource::from_path(&resource) else {
        return Ok(discovery(&state));
    };
    let descriptor = resource.descriptor();

    // Unknown, foreign, and malformed ids all report the same success
    // envelope as a real delete.
    if let Some(id) = parse_id(&id) {
        state.store.delete(&descriptor, auth.tenant_id, id).await?;
    }

    Ok(ApiResponse::success(Value::Null))
}

/// Fallback for unsupported methods on the data routes.
pub async fn method_not_allowed() -> ApiError {
    ApiError::method_not_allowed("method not allowed")
}

fn check_version(version: &str) -> Result<(), ApiError> {
    if version == SUPPORTED_VERSION {
        Ok(())
    } else {
        Err(ApiError::validation(format!(
            "unsupported API version: {}",
            version
        )))
    }
}

fn discovery(state: &AppState) -> ApiResponse<Value> {
    ApiResponse::success(discovery_document(&state.config.security.docs_url))
}

fn parse_id(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw).ok()
}

fn require_object(body: Option<Json<Value>>) -> Result<Map<String, Value>, ApiError> {
    let Some(Json(value)) = body else {
        return Err(ApiError::validation("request body is required"));
    };
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(ApiError::validation("request body must be a JSON object")),
    }
}
