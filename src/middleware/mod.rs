pub mod auth;
pub mod cors;
pub mod response;

pub use auth::gateway_auth_middleware;
pub use cors::cors_middleware;
pub use response::{ApiResponse, ApiResult, Pagination};
