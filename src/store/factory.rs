//! Store backend factory

use std::sync::Arc;

use crate::config::StoreConfig;
use crate::redis::RedisPool;

use super::backend::{DocumentStore, StoreError};
use super::memory_backend::MemoryStore;
use super::redis_backend::RedisStore;

/// Create a store backend based on configuration.
///
/// - `"redis"`: a `RedisStore` on `store.redis_url` under `store.key_prefix`
/// - `"memory"` (default): a `MemoryStore`
///
/// An unrecognized backend name falls back to memory with a warning.
pub fn create_store(config: &StoreConfig) -> Result<Arc<dyn DocumentStore>, StoreError> {
    match config.backend.as_str() {
        "redis" => {
            let pool = RedisPool::new(&config.redis_url)?;
            tracing::info!(
                backend = "redis",
                prefix = %config.key_prefix,
                "Creating Redis document store"
            );
            Ok(Arc::new(RedisStore::new(
                Arc::new(pool),
                config.key_prefix.clone(),
            )))
        }
        "memory" => {
            tracing::info!(backend = "memory", "Creating memory document store");
            Ok(Arc::new(MemoryStore::new()))
        }
        other => {
            tracing::warn!(
                backend = %other,
                "Unknown store backend requested, falling back to memory"
            );
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
