// HTTP API error types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

/// Gateway error taxonomy with appropriate status codes and client-safe messages.
///
/// Every component fails fast with one of these; the `IntoResponse` impl is
/// the single place errors become wire responses.
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request (malformed version, missing required body)
    Validation(String),

    // 401 Unauthorized (missing or invalid credential)
    Authentication(String),

    // 403 Forbidden (no tenant association, or IP policy denial)
    Authorization(String),

    // 404 Not Found (unknown id within the tenant)
    NotFound(String),

    // 405 Method Not Allowed
    MethodNotAllowed(String),

    // 422 Unprocessable Entity (store-level write rejection, message verbatim)
    Unprocessable(String),

    // 500 Internal Server Error (logged server-side, generic message out)
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Authentication(_) => StatusCode::UNAUTHORIZED,
            ApiError::Authorization(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-visible message. Internal errors are logged with their real
    /// cause and replaced with a generic message; `Unprocessable` carries the
    /// store's message through verbatim.
    pub fn message(&self) -> &str {
        match self {
            ApiError::Validation(msg)
            | ApiError::Authentication(msg)
            | ApiError::Authorization(msg)
            | ApiError::NotFound(msg)
            | ApiError::MethodNotAllowed(msg)
            | ApiError::Unprocessable(msg) => msg,
            ApiError::Internal(_) => "internal server error",
        }
    }

    pub fn to_json(&self) -> Value {
        json!({
            "error": self.message(),
            "status": self.status_code().as_u16(),
        })
    }
}

// Static constructors
impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into())
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        ApiError::Authentication(message.into())
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        ApiError::Authorization(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn method_not_allowed(message: impl Into<String>) -> Self {
        ApiError::MethodNotAllowed(message.into())
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        ApiError::Unprocessable(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::Internal(message.into())
    }
}

impl From<crate::store::StoreError> for ApiError {
    fn from(err: crate::store::StoreError) -> Self {
        match err {
            crate::store::StoreError::NotFound(msg) => ApiError::not_found(msg),
            // Constraint violations and other write rejections go to the
            // caller verbatim; known tradeoff, not hardened here.
            crate::store::StoreError::Rejected(msg) => ApiError::unprocessable(msg),
            crate::store::StoreError::Query(msg) => {
                tracing::error!("store query error: {}", msg);
                ApiError::internal(msg)
            }
            crate::store::StoreError::Unavailable(msg) => {
                tracing::error!("store unavailable: {}", msg);
                ApiError::internal(msg)
            }
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        if let ApiError::Internal(ref msg) = self {
            tracing::error!("unhandled error: {}", msg);
        }
        (self.status_code(), Json(self.to_json())).into_response()
    }
}
