use std::sync::Arc;

use crate::store::ApiKeyStore;

/// Fire-and-forget usage accounting for API key calls. The request never
/// awaits this task and never observes its outcome; a failed increment is
/// logged and dropped, with no retry.
pub fn record_usage(keys: Arc<dyn ApiKeyStore>, key_hash: String) {
    tokio::spawn(async move {
        if let Err(e) = keys.record_usage(&key_hash).await {
            tracing::warn!("usage counter update failed: {}", e);
        }
    });
}
