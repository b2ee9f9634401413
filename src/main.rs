use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;

use mizan_api::app;
use mizan_api::auth::JwtIdentityProvider;
use mizan_api::state::AppState;
use mizan_api::store::postgres::{PgApiKeyStore, PgDataStore, PgIpPolicy, PgTenantDirectory};

#[tokio::main]
async fn main() {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mizan_api=info,tower_http=info".into()),
        )
        .init();

    let config = mizan_api::config::config().clone();
    tracing::info!("starting Mizan API in {:?} mode", config.environment);

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(Duration::from_secs(config.database.connection_timeout_secs))
        .connect(&database_url)
        .await
        .expect("failed to connect to database");

    let state = AppState {
        config: Arc::new(config.clone()),
        store: Arc::new(PgDataStore::new(pool.clone())),
        keys: Arc::new(PgApiKeyStore::new(pool.clone())),
        identity: Arc::new(JwtIdentityProvider::new(config.security.jwt_secret.clone())),
        directory: Arc::new(PgTenantDirectory::new(pool.clone())),
        policy: Arc::new(PgIpPolicy::new(pool)),
    };

    let app = app::router(state);

    let port = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(3000);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {}", bind_addr, e));

    tracing::info!("Mizan API listening on http://{}", bind_addr);

    axum::serve(listener, app).await.expect("server");
}
