// Postgres-backed collaborators. All SQL here is dynamic over the compiled
// resource whitelist: table and order column names come from `'static`
// descriptor data, every client value is a bound parameter.
use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::{postgres::PgArguments, PgPool, Row};
use uuid::Uuid;

use crate::access::{AccessDecision, IpPolicy, PolicyError, PolicyRequest};
use crate::auth::ApiKeyRecord;
use crate::query::ListParams;
use crate::resources::ResourceDescriptor;
use crate::store::{ApiKeyStore, DataStore, StoreError, TenantDirectory};

/// Tenant scoping column shared by every whitelisted table.
const TENANT_COLUMN: &str = "company_id";

pub struct PgDataStore {
    pool: PgPool,
}

impl PgDataStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DataStore for PgDataStore {
    async fn list(
        &self,
        descriptor: &ResourceDescriptor,
        tenant_id: Uuid,
        params: &ListParams,
    ) -> Result<(Vec<Value>, i64), StoreError> {
        let search_predicate = if params.search.is_some() {
            format!(" AND \"{}\" ILIKE $2", descriptor.search_column)
        } else {
            String::new()
        };
        let pattern = params.search.as_ref().map(|s| format!("%{}%", s));

        let count_sql = format!(
            "SELECT COUNT(*) AS count FROM \"{}\" WHERE {} = $1{}",
            descriptor.table, TENANT_COLUMN, search_predicate
        );
        let mut count_query = sqlx::query(&count_sql).bind(tenant_id);
        if let Some(pattern) = &pattern {
            count_query = count_query.bind(pattern);
        }
        let count_row = count_query.fetch_one(&self.pool).await.map_err(read_error)?;
        let total: i64 = count_row.try_get("count").map_err(read_error)?;

        let (limit_param, offset_param) = if pattern.is_some() { (3, 4) } else { (2, 3) };
        let page_sql = format!(
            "SELECT row_to_json(t.*) AS row FROM (\
             SELECT * FROM \"{}\" WHERE {} = $1{} \
             ORDER BY \"{}\" {} LIMIT ${} OFFSET ${}) t",
            descriptor.table,
            TENANT_COLUMN,
            search_predicate,
            params.order_column,
            params.order_dir.to_sql(),
            limit_param,
            offset_param
        );
        let mut page_query = sqlx::query(&page_sql).bind(tenant_id);
        if let Some(pattern) = &pattern {
            page_query = page_query.bind(pattern);
        }
        let rows = page_query
            .bind(params.limit)
            .bind(params.offset)
            .fetch_all(&self.pool)
            .await
            .map_err(read_error)?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let value: Value = row.try_get("row").map_err(read_error)?;
            records.push(value);
        }

        Ok((records, total))
    }

    async fn get(
        &self,
        descriptor: &ResourceDescriptor,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Value>, StoreError> {
        let sql = format!(
            "SELECT row_to_json(t.*) AS row FROM (\
             SELECT * FROM \"{}\" WHERE id = $1 AND {} = $2) t",
            descriptor.table, TENANT_COLUMN
        );

        let row = sqlx::query(&sql)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(read_error)?;

        match row {
            Some(row) => {
                let value: Value = row.try_get("row").map_err(read_error)?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn insert(
        &self,
        descriptor: &ResourceDescriptor,
        tenant_id: Uuid,
        mut body: Map<String, Value>,
    ) -> Result<Value, StoreError> {
        // The resolved tenant always wins over any client-supplied value.
        // company_id is uuid in every table, so it gets its own trailing
        // placeholder bound with the native type instead of passing through
        // the JSON body as text.
        body.remove(TENANT_COLUMN);
        let sql = insert_statement(descriptor.table, &body)?;

        let mut query = sqlx::query(&sql);
        for value in body.values() {
            query = bind_value(query, value);
        }

        let row = query
            .bind(tenant_id)
            .fetch_one(&self.pool)
            .await
            .map_err(write_error)?;
        let value: Value = row.try_get("row").map_err(read_error)?;
        Ok(value)
    }

    async fn update(
        &self,
        descriptor: &ResourceDescriptor,
        tenant_id: Uuid,
        id: Uuid,
        body: Map<String, Value>,
    ) -> Result<Option<Value>, StoreError> {
        if body.is_empty() {
            // Nothing left after immutable-field stripping; read back instead.
            return self.get(descriptor, tenant_id, id).await;
        }

        let mut set_clauses = Vec::with_capacity(body.len());
        let mut values = Vec::with_capacity(body.len());
        for (i, (key, value)) in body.iter().enumerate() {
            check_identifier(key)?;
            set_clauses.push(format!("\"{}\" = ${}", key, i + 1));
            values.push(value.clone());
        }

        let id_param = values.len() + 1;
        let tenant_param = values.len() + 2;
        let sql = format!(
            "UPDATE \"{}\" SET {}, updated_at = NOW() WHERE id = ${} AND {} = ${} \
             RETURNING row_to_json(\"{}\".*) AS row",
            descriptor.table,
            set_clauses.join(", "),
            id_param,
            TENANT_COLUMN,
            tenant_param,
            descriptor.table
        );

        let mut query = sqlx::query(&sql);
        for value in &values {
            query = bind_value(query, value);
        }
        let row = query
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(write_error)?;

        match row {
            Some(row) => {
                let value: Value = row.try_get("row").map_err(read_error)?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn delete(
        &self,
        descriptor: &ResourceDescriptor,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<(), StoreError> {
        let sql = format!(
            "DELETE FROM \"{}\" WHERE id = $1 AND {} = $2",
            descriptor.table, TENANT_COLUMN
        );

        // Zero or one affected rows both succeed; delete is idempotent.
        sqlx::query(&sql)
            .bind(id)
            .bind(tenant_id)
            .execute(&self.pool)
            .await
            .map_err(write_error)?;

        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(())
    }
}

pub struct PgApiKeyStore {
    pool: PgPool,
}

impl PgApiKeyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApiKeyStore for PgApiKeyStore {
    async fn find_active(&self, key_hash: &str) -> Result<Option<ApiKeyRecord>, StoreError> {
        let record = sqlx::query_as::<_, ApiKeyRecord>(
            "SELECT key_hash, company_id AS tenant_id, user_id, is_active, \
             permissions, rate_limit, request_count, last_used_at \
             FROM api_keys WHERE key_hash = $1 AND is_active",
        )
        .bind(key_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(read_error)?;

        Ok(record)
    }

    async fn record_usage(&self, key_hash: &str) -> Result<(), StoreError> {
        // Read-modify-write: racy across concurrent calls on the same key.
        // Analytics-grade by design; not suitable for hard rate limiting.
        let row = sqlx::query("SELECT request_count FROM api_keys WHERE key_hash = $1")
            .bind(key_hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(read_error)?;

        let Some(row) = row else { return Ok(()) };
        let count: i64 = row.try_get("request_count").map_err(read_error)?;

        sqlx::query("UPDATE api_keys SET request_count = $1, last_used_at = NOW() WHERE key_hash = $2")
            .bind(count + 1)
            .bind(key_hash)
            .execute(&self.pool)
            .await
            .map_err(write_error)?;

        Ok(())
    }
}

pub struct PgTenantDirectory {
    pool: PgPool,
}

impl PgTenantDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantDirectory for PgTenantDirectory {
    async fn tenant_for_user(&self, user_id: Uuid) -> Result<Option<Uuid>, StoreError> {
        let row = sqlx::query("SELECT company_id FROM profiles WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(read_error)?;

        match row {
            Some(row) => {
                let tenant_id: Option<Uuid> = row.try_get("company_id").map_err(read_error)?;
                Ok(tenant_id)
            }
            None => Ok(None),
        }
    }
}

/// IP policy decision backed by the `check_ip_access` database function.
pub struct PgIpPolicy {
    pool: PgPool,
}

impl PgIpPolicy {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IpPolicy for PgIpPolicy {
    async fn check(
        &self,
        request: &PolicyRequest<'_>,
    ) -> Result<Option<AccessDecision>, PolicyError> {
        let row = sqlx::query(
            "SELECT allowed, reason FROM check_ip_access($1, $2, $3, $4, $5)",
        )
        .bind(request.tenant_id)
        .bind(request.client_ip)
        .bind(request.path)
        .bind(request.method)
        .bind(request.user_agent)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PolicyError(e.to_string()))?;

        match row {
            Some(row) => {
                let allowed: bool = row.try_get("allowed").map_err(|e| PolicyError(e.to_string()))?;
                let reason: Option<String> =
                    row.try_get("reason").map_err(|e| PolicyError(e.to_string()))?;
                Ok(Some(AccessDecision { allowed, reason }))
            }
            None => Ok(None),
        }
    }
}

/// INSERT over the body's columns plus the tenant column, which takes the
/// final placeholder so the caller can bind it as uuid.
fn insert_statement(table: &str, body: &Map<String, Value>) -> Result<String, StoreError> {
    let mut columns = Vec::with_capacity(body.len() + 1);
    for key in body.keys() {
        check_identifier(key)?;
        columns.push(format!("\"{}\"", key));
    }
    columns.push(format!("\"{}\"", TENANT_COLUMN));

    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("${}", i)).collect();
    Ok(format!(
        "INSERT INTO \"{}\" ({}) VALUES ({}) RETURNING row_to_json(\"{}\".*) AS row",
        table,
        columns.join(", "),
        placeholders.join(", "),
        table
    ))
}

/// Column names in write payloads must look like plain lowercase SQL
/// identifiers before they are quoted into dynamic SQL.
fn check_identifier(name: &str) -> Result<(), StoreError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {
            name.len() <= 63
                && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(StoreError::Rejected(format!("invalid column name: {}", name)))
    }
}

fn bind_value<'q>(
    q: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
    v: &'q Value,
) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
    match v {
        Value::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => q.bind(s),
        // Arrays and objects bind as JSONB
        Value::Array(_) | Value::Object(_) => q.bind(v.clone()),
    }
}

/// Database-level rejections on writes surface as 422 with the store's
/// message; everything else is an internal query failure.
fn write_error(e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::Database(db) => StoreError::Rejected(db.message().to_string()),
        other @ (sqlx::Error::PoolTimedOut | sqlx::Error::Io(_)) => {
            StoreError::Unavailable(other.to_string())
        }
        other => StoreError::Query(other.to_string()),
    }
}

fn read_error(e: sqlx::Error) -> StoreError {
    match e {
        other @ (sqlx::Error::PoolTimedOut | sqlx::Error::Io(_)) => {
            StoreError::Unavailable(other.to_string())
        }
        other => StoreError::Query(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn insert_reserves_trailing_placeholder_for_the_tenant() {
        let mut body = Map::new();
        body.insert("name".to_string(), json!("Acme"));

        let sql = insert_statement("customers", &body).unwrap();
        assert_eq!(
            sql,
            "INSERT INTO \"customers\" (\"name\", \"company_id\") VALUES ($1, $2) \
             RETURNING row_to_json(\"customers\".*) AS row"
        );
    }

    #[test]
    fn insert_statement_rejects_hostile_column_names() {
        let mut body = Map::new();
        body.insert("name\"; DROP TABLE x; --".to_string(), json!("x"));
        assert!(insert_statement("customers", &body).is_err());
    }

    #[test]
    fn identifier_check_rejects_hostile_keys() {
        assert!(check_identifier("name").is_ok());
        assert!(check_identifier("invoice_number").is_ok());
        assert!(check_identifier("_internal").is_ok());

        assert!(check_identifier("").is_err());
        assert!(check_identifier("Name").is_err());
        assert!(check_identifier("na me").is_err());
        assert!(check_identifier("name\"; DROP TABLE x; --").is_err());
        assert!(check_identifier(&"a".repeat(64)).is_err());
    }
}
