use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::auth::ApiKeyRecord;
use crate::query::ListParams;
use crate::resources::ResourceDescriptor;

pub mod postgres;

/// Errors from the data-access collaborators.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    NotFound(String),

    /// Write rejected by the store (constraint violation etc). The message
    /// is forwarded to the caller verbatim as a 422.
    #[error("{0}")]
    Rejected(String),

    #[error("query error: {0}")]
    Query(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Generic CRUD over the whitelisted tables. Every method takes the resolved
/// tenant id and must apply it to its predicate; no operation may omit it.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Page of rows plus the total row count under the same predicate.
    async fn list(
        &self,
        descriptor: &ResourceDescriptor,
        tenant_id: Uuid,
        params: &ListParams,
    ) -> Result<(Vec<Value>, i64), StoreError>;

    async fn get(
        &self,
        descriptor: &ResourceDescriptor,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Value>, StoreError>;

    async fn insert(
        &self,
        descriptor: &ResourceDescriptor,
        tenant_id: Uuid,
        body: Map<String, Value>,
    ) -> Result<Value, StoreError>;

    /// Returns the updated row, or `None` when no row matched the id/tenant
    /// predicate (a successful no-op for the caller).
    async fn update(
        &self,
        descriptor: &ResourceDescriptor,
        tenant_id: Uuid,
        id: Uuid,
        body: Map<String, Value>,
    ) -> Result<Option<Value>, StoreError>;

    /// Zero affected rows is not distinguished from one; both are Ok.
    async fn delete(
        &self,
        descriptor: &ResourceDescriptor,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<(), StoreError>;

    /// Liveness probe for the health endpoint.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// API key credential store, keyed by the one-way hash of the raw key.
#[async_trait]
pub trait ApiKeyStore: Send + Sync {
    async fn find_active(&self, key_hash: &str) -> Result<Option<ApiKeyRecord>, StoreError>;

    /// Best-effort usage increment. Intentionally a read-modify-write, not
    /// an atomic counter; concurrent calls on the same key may lose counts.
    async fn record_usage(&self, key_hash: &str) -> Result<(), StoreError>;
}

/// User-profile lookup resolving an authenticated user to their tenant.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    async fn tenant_for_user(&self, user_id: Uuid) -> Result<Option<Uuid>, StoreError>;
}
