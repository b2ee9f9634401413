//! In-memory collaborator implementations and a gateway harness for tests.
//! Mirrors the Postgres collaborators' contracts (tenant predicate applied
//! inside the store, tenant merge on insert, idempotent delete) without a
//! database.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use chrono::Utc;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::access::{AccessDecision, IpPolicy, PolicyError, PolicyRequest};
use crate::app;
use crate::auth::{hash_api_key, ApiKeyRecord, IdentityError, IdentityProvider};
use crate::config::AppConfig;
use crate::query::{ListParams, SortDirection};
use crate::resources::ResourceDescriptor;
use crate::state::AppState;
use crate::store::{ApiKeyStore, DataStore, StoreError, TenantDirectory};

const TENANT_COLUMN: &str = "company_id";

#[derive(Default)]
pub struct MemoryDataStore {
    tables: Mutex<HashMap<String, Vec<Map<String, Value>>>>,
}

impl MemoryDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw dump of one table, bypassing tenant scoping. Assertion use only.
    pub fn rows(&self, table: &str) -> Vec<Map<String, Value>> {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .unwrap_or_default()
    }
}

fn row_matches(row: &Map<String, Value>, tenant_id: Uuid, id: Uuid) -> bool {
    row.get("id").and_then(Value::as_str) == Some(id.to_string().as_str())
        && row.get(TENANT_COLUMN).and_then(Value::as_str)
            == Some(tenant_id.to_string().as_str())
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

#[async_trait]
impl DataStore for MemoryDataStore {
    async fn list(
        &self,
        descriptor: &ResourceDescriptor,
        tenant_id: Uuid,
        params: &ListParams,
    ) -> Result<(Vec<Value>, i64), StoreError> {
        let tables = self.tables.lock().unwrap();
        let rows = tables.get(descriptor.table).cloned().unwrap_or_default();
        drop(tables);

        let tenant = tenant_id.to_string();
        let needle = params.search.as_ref().map(|s| s.to_lowercase());

        let mut matched: Vec<Map<String, Value>> = rows
            .into_iter()
            .filter(|row| row.get(TENANT_COLUMN).and_then(Value::as_str) == Some(tenant.as_str()))
            .filter(|row| match &needle {
                Some(needle) => row
                    .get(descriptor.search_column)
                    .and_then(Value::as_str)
                    .map(|text| text.to_lowercase().contains(needle))
                    .unwrap_or(false),
                None => true,
            })
            .collect();

        matched.sort_by(|a, b| {
            let ordering = compare_values(
                a.get(params.order_column).unwrap_or(&Value::Null),
                b.get(params.order_column).unwrap_or(&Value::Null),
            );
            match params.order_dir {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        });

        let total = matched.len() as i64;
        let page: Vec<Value> = matched
            .into_iter()
            .skip(params.offset.max(0) as usize)
            .take(params.limit.max(0) as usize)
            .map(Value::Object)
            .collect();

        Ok((page, total))
    }

    async fn get(
        &self,
        descriptor: &ResourceDescriptor,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Value>, StoreError> {
        let tables = self.tables.lock().unwrap();
        let row = tables
            .get(descriptor.table)
            .and_then(|rows| rows.iter().find(|row| row_matches(row, tenant_id, id)))
            .cloned();
        Ok(row.map(Value::Object))
    }

    async fn insert(
        &self,
        descriptor: &ResourceDescriptor,
        tenant_id: Uuid,
        mut body: Map<String, Value>,
    ) -> Result<Value, StoreError> {
        // Same contract as the SQL store: the resolved tenant always wins.
        body.insert(TENANT_COLUMN.to_string(), Value::String(tenant_id.to_string()));
        body.entry("id".to_string())
            .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
        let now = Value::String(Utc::now().to_rfc3339());
        body.entry("created_at".to_string()).or_insert_with(|| now.clone());
        body.insert("updated_at".to_string(), now);

        let mut tables = self.tables.lock().unwrap();
        tables
            .entry(descriptor.table.to_string())
            .or_default()
            .push(body.clone());

        Ok(Value::Object(body))
    }

    async fn update(
        &self,
        descriptor: &ResourceDescriptor,
        tenant_id: Uuid,
        id: Uuid,
        body: Map<String, Value>,
    ) -> Result<Option<Value>, StoreError> {
        let mut tables = self.tables.lock().unwrap();
        let Some(rows) = tables.get_mut(descriptor.table) else {
            return Ok(None);
        };
        let Some(row) = rows.iter_mut().find(|row| row_matches(row, tenant_id, id)) else {
            return Ok(None);
        };

        for (key, value) in body {
            row.insert(key, value);
        }
        row.insert(
            "updated_at".to_string(),
            Value::String(Utc::now().to_rfc3339()),
        );

        Ok(Some(Value::Object(row.clone())))
    }

    async fn delete(
        &self,
        descriptor: &ResourceDescriptor,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().unwrap();
        if let Some(rows) = tables.get_mut(descriptor.table) {
            rows.retain(|row| !row_matches(row, tenant_id, id));
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryApiKeyStore {
    keys: Mutex<HashMap<String, ApiKeyRecord>>,
}

impl MemoryApiKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, record: ApiKeyRecord) {
        self.keys.lock().unwrap().insert(record.key_hash.clone(), record);
    }

    pub fn get(&self, key_hash: &str) -> Option<ApiKeyRecord> {
        self.keys.lock().unwrap().get(key_hash).cloned()
    }
}

/// Active key record for a raw key, for test setup.
pub fn api_key_record(raw_key: &str, tenant_id: Uuid) -> ApiKeyRecord {
    ApiKeyRecord {
        key_hash: hash_api_key(raw_key),
        tenant_id,
        user_id: None,
        is_active: true,
        permissions: vec!["read".to_string(), "write".to_string()],
        rate_limit: None,
        request_count: 0,
        last_used_at: None,
    }
}

#[async_trait]
impl ApiKeyStore for MemoryApiKeyStore {
    async fn find_active(&self, key_hash: &str) -> Result<Option<ApiKeyRecord>, StoreError> {
        let keys = self.keys.lock().unwrap();
        Ok(keys.get(key_hash).filter(|r| r.is_active).cloned())
    }

    async fn record_usage(&self, key_hash: &str) -> Result<(), StoreError> {
        let mut keys = self.keys.lock().unwrap();
        if let Some(record) = keys.get_mut(key_hash) {
            record.request_count += 1;
            record.last_used_at = Some(Utc::now());
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct StaticIdentityProvider {
    tokens: Mutex<HashMap<String, Uuid>>,
}

impl StaticIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_token(&self, token: &str, user_id: Uuid) {
        self.tokens.lock().unwrap().insert(token.to_string(), user_id);
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn verify(&self, token: &str) -> Result<Option<Uuid>, IdentityError> {
        Ok(self.tokens.lock().unwrap().get(token).copied())
    }
}

#[derive(Default)]
pub struct MemoryTenantDirectory {
    users: Mutex<HashMap<Uuid, Uuid>>,
}

impl MemoryTenantDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, user_id: Uuid, tenant_id: Uuid) {
        self.users.lock().unwrap().insert(user_id, tenant_id);
    }
}

#[async_trait]
impl TenantDirectory for MemoryTenantDirectory {
    async fn tenant_for_user(&self, user_id: Uuid) -> Result<Option<Uuid>, StoreError> {
        Ok(self.users.lock().unwrap().get(&user_id).copied())
    }
}

/// Policy that always answers with the same decision.
pub struct StaticIpPolicy(pub Option<AccessDecision>);

impl StaticIpPolicy {
    pub fn allow_all() -> Self {
        Self(Some(AccessDecision { allowed: true, reason: None }))
    }

    pub fn deny(reason: &str) -> Self {
        Self(Some(AccessDecision {
            allowed: false,
            reason: Some(reason.to_string()),
        }))
    }

    /// Policy with no decision for any request.
    pub fn silent() -> Self {
        Self(None)
    }
}

#[async_trait]
impl IpPolicy for StaticIpPolicy {
    async fn check(
        &self,
        _request: &PolicyRequest<'_>,
    ) -> Result<Option<AccessDecision>, PolicyError> {
        Ok(self.0.clone())
    }
}

/// Policy whose check always fails, for fail-open/fail-closed coverage.
pub struct FailingIpPolicy;

#[async_trait]
impl IpPolicy for FailingIpPolicy {
    async fn check(
        &self,
        _request: &PolicyRequest<'_>,
    ) -> Result<Option<AccessDecision>, PolicyError> {
        Err(PolicyError("policy backend unreachable".to_string()))
    }
}

/// Recording policy, for asserting what the gate passes through.
#[derive(Default)]
pub struct RecordingIpPolicy {
    pub seen: Mutex<Vec<(Uuid, String, String, String)>>,
}

#[async_trait]
impl IpPolicy for RecordingIpPolicy {
    async fn check(
        &self,
        request: &PolicyRequest<'_>,
    ) -> Result<Option<AccessDecision>, PolicyError> {
        self.seen.lock().unwrap().push((
            request.tenant_id,
            request.client_ip.to_string(),
            request.path.to_string(),
            request.method.to_string(),
        ));
        Ok(Some(AccessDecision { allowed: true, reason: None }))
    }
}

/// Fully wired gateway over in-memory collaborators.
pub struct TestGateway {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryDataStore>,
    pub keys: Arc<MemoryApiKeyStore>,
    pub identity: Arc<StaticIdentityProvider>,
    pub directory: Arc<MemoryTenantDirectory>,
}

pub struct TestGatewayBuilder {
    config: AppConfig,
    store: Arc<MemoryDataStore>,
    keys: Arc<MemoryApiKeyStore>,
    identity: Arc<StaticIdentityProvider>,
    directory: Arc<MemoryTenantDirectory>,
    policy: Arc<dyn IpPolicy>,
}

impl TestGatewayBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::from_env(),
            store: Arc::new(MemoryDataStore::new()),
            keys: Arc::new(MemoryApiKeyStore::new()),
            identity: Arc::new(StaticIdentityProvider::new()),
            directory: Arc::new(MemoryTenantDirectory::new()),
            policy: Arc::new(StaticIpPolicy::allow_all()),
        }
    }

    pub fn api_key(self, raw_key: &str, tenant_id: Uuid) -> Self {
        self.keys.add(api_key_record(raw_key, tenant_id));
        self
    }

    pub fn inactive_api_key(self, raw_key: &str, tenant_id: Uuid) -> Self {
        let mut record = api_key_record(raw_key, tenant_id);
        record.is_active = false;
        self.keys.add(record);
        self
    }

    pub fn bearer(self, token: &str, user_id: Uuid, tenant_id: Uuid) -> Self {
        self.identity.add_token(token, user_id);
        self.directory.add_user(user_id, tenant_id);
        self
    }

    /// Bearer token whose user has no tenant-linked profile.
    pub fn orphan_bearer(self, token: &str, user_id: Uuid) -> Self {
        self.identity.add_token(token, user_id);
        self
    }

    pub fn policy(mut self, policy: Arc<dyn IpPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn fail_open(mut self, fail_open: bool) -> Self {
        self.config.access.fail_open = fail_open;
        self
    }

    pub fn build(self) -> TestGateway {
        let state = AppState {
            config: Arc::new(self.config),
            store: self.store.clone(),
            keys: self.keys.clone(),
            identity: self.identity.clone(),
            directory: self.directory.clone(),
            policy: self.policy,
        };
        TestGateway {
            router: app::router(state.clone()),
            state,
            store: self.store,
            keys: self.keys,
            identity: self.identity,
            directory: self.directory,
        }
    }
}

impl Default for TestGatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}
