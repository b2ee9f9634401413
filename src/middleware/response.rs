use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::json;

/// Pagination block attached to list responses.
#[derive(Debug, Clone, Serialize)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

/// Wrapper for API responses that applies the `{data, pagination?}` success
/// envelope.
#[derive(Debug)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub pagination: Option<Pagination>,
    pub status_code: Option<StatusCode>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Successful response with default 200 status.
    pub fn success(data: T) -> Self {
        Self {
            data,
            pagination: None,
            status_code: None,
        }
    }

    /// 201 Created response.
    pub fn created(data: T) -> Self {
        Self {
            data,
            pagination: None,
            status_code: Some(StatusCode::CREATED),
        }
    }

    /// List response with a pagination block.
    pub fn paginated(data: T, pagination: Pagination) -> Self {
        Self {
            data,
            pagination: Some(pagination),
            status_code: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = self.status_code.unwrap_or(StatusCode::OK);

        let data = match serde_json::to_value(&self.data) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!("failed to serialize response data: {}", e);
                return crate::error::ApiError::internal("response serialization failed")
                    .into_response();
            }
        };

        let envelope = match self.pagination {
            Some(pagination) => json!({ "data": data, "pagination": pagination }),
            None => json!({ "data": data }),
        };

        (status, Json(envelope)).into_response()
    }
}

pub type ApiResult<T> = Result<ApiResponse<T>, crate::error::ApiError>;
