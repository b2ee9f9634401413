use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

pub mod resolver;

/// How the request authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    ApiKey,
    Bearer,
}

/// Resolved request identity. Built exactly once per request by the
/// resolver, threaded through request extensions, never cached and never
/// stored globally.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub tenant_id: Uuid,
    pub user_id: Option<Uuid>,
    pub method: AuthMethod,
    pub permissions: Vec<String>,
    pub rate_limit: Option<i64>,
}

/// Long-lived API key credential, stored only as a one-way hash.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ApiKeyRecord {
    pub key_hash: String,
    pub tenant_id: Uuid,
    pub user_id: Option<Uuid>,
    pub is_active: bool,
    pub permissions: Vec<String>,
    pub rate_limit: Option<i64>,
    pub request_count: i64,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl ApiKeyRecord {
    pub fn to_context(&self) -> AuthContext {
        AuthContext {
            tenant_id: self.tenant_id,
            user_id: self.user_id,
            method: AuthMethod::ApiKey,
            permissions: self.permissions.clone(),
            rate_limit: self.rate_limit,
        }
    }
}

/// SHA-256 hex digest of a presented API key. The raw key never touches
/// storage or logs.
pub fn hash_api_key(raw_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw_key.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Bearer session claims as issued by the identity provider.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: i64,
    pub iat: i64,
}

/// Validates short-lived bearer tokens. `Ok(None)` means the token is
/// invalid or expired; `Err` means the provider itself failed.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Option<Uuid>, IdentityError>;
}

#[derive(Debug, thiserror::Error)]
#[error("identity provider error: {0}")]
pub struct IdentityError(pub String);

/// JWT-backed identity provider used in production.
pub struct JwtIdentityProvider {
    secret: String,
}

impl JwtIdentityProvider {
    pub fn new(secret: impl Into<String>) -> Self {
        Self { secret: secret.into() }
    }
}

#[async_trait]
impl IdentityProvider for JwtIdentityProvider {
    async fn verify(&self, token: &str) -> Result<Option<Uuid>, IdentityError> {
        if self.secret.is_empty() {
            return Err(IdentityError("JWT secret not configured".to_string()));
        }

        let decoding_key = DecodingKey::from_secret(self.secret.as_bytes());
        let validation = Validation::default();

        match decode::<Claims>(token, &decoding_key, &validation) {
            Ok(data) => Ok(Some(data.claims.sub)),
            Err(_) => Ok(None),
        }
    }
}
