//! Document store: per-user sources, notifications, preferences and device
//! tokens, plus the global webhook token index.

mod backend;
mod factory;
mod memory_backend;
mod redis_backend;

pub use backend::{DocumentStore, NotificationQuery, StoreError, DEFAULT_QUERY_LIMIT, MAX_QUERY_LIMIT};
pub use factory::create_store;
pub use memory_backend::MemoryStore;
pub use redis_backend::RedisStore;
