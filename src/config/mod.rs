use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub query: QueryConfig,
    pub database: DatabaseConfig,
    pub access: AccessConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Production,
}

/// Pagination and search bounds applied by the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    pub default_limit: i64,
    pub max_limit: i64,
    pub max_search_len: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub max_connections: u32,
    pub connection_timeout_secs: u64,
}

/// IP access policy behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessConfig {
    /// When the policy collaborator errors or returns no decision, `true`
    /// lets the request proceed; `false` denies it. The original gateway
    /// behavior is fail-open, kept as the default.
    pub fail_open: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub cors_origin: String,
    pub docs_url: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            _ => Environment::Development,
        };

        match environment {
            Environment::Production => Self::production(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = env::var("QUERY_DEFAULT_LIMIT") {
            self.query.default_limit = v.parse().unwrap_or(self.query.default_limit);
        }
        if let Ok(v) = env::var("QUERY_MAX_LIMIT") {
            self.query.max_limit = v.parse().unwrap_or(self.query.max_limit);
        }
        if let Ok(v) = env::var("QUERY_MAX_SEARCH_LEN") {
            self.query.max_search_len = v.parse().unwrap_or(self.query.max_search_len);
        }

        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout_secs =
                v.parse().unwrap_or(self.database.connection_timeout_secs);
        }

        if let Ok(v) = env::var("ACCESS_FAIL_OPEN") {
            self.access.fail_open = v.parse().unwrap_or(self.access.fail_open);
        }

        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("CORS_ORIGIN") {
            self.security.cors_origin = v;
        }
        if let Ok(v) = env::var("DOCS_URL") {
            self.security.docs_url = v;
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            query: QueryConfig {
                default_limit: 50,
                max_limit: 100,
                max_search_len: 100,
            },
            database: DatabaseConfig {
                max_connections: 10,
                connection_timeout_secs: 30,
            },
            access: AccessConfig { fail_open: true },
            security: SecurityConfig {
                jwt_secret: String::new(),
                cors_origin: "*".to_string(),
                docs_url: "https://docs.mizan.app/api".to_string(),
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            query: QueryConfig {
                default_limit: 50,
                max_limit: 100,
                max_search_len: 100,
            },
            database: DatabaseConfig {
                max_connections: 50,
                connection_timeout_secs: 5,
            },
            access: AccessConfig { fail_open: true },
            security: SecurityConfig {
                jwt_secret: String::new(),
                cors_origin: "*".to_string(),
                docs_url: "https://docs.mizan.app/api".to_string(),
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn development_defaults() {
        let config = AppConfig::development();
        assert_eq!(config.query.default_limit, 50);
        assert_eq!(config.query.max_limit, 100);
        assert!(config.access.fail_open);
    }

    #[test]
    fn production_keeps_pagination_bounds() {
        let config = AppConfig::production();
        assert_eq!(config.query.max_limit, 100);
        assert_eq!(config.query.max_search_len, 100);
    }
}
