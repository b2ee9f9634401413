use std::sync::Arc;

use crate::access::IpPolicy;
use crate::auth::IdentityProvider;
use crate::config::AppConfig;
use crate::store::{ApiKeyStore, DataStore, TenantDirectory};

/// Shared, immutable request-handling dependencies. Collaborators are trait
/// objects so the production Postgres implementations and the in-memory test
/// doubles wire in identically.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn DataStore>,
    pub keys: Arc<dyn ApiKeyStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub directory: Arc<dyn TenantDirectory>,
    pub policy: Arc<dyn IpPolicy>,
}
