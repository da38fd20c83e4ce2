//! Redis connectivity shared by the Redis store backend.

pub mod pool;

pub use pool::{PoolError, RedisPool};
