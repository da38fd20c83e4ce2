// Shared infrastructure
pub mod auth;
pub mod config;
pub mod error;
pub mod metrics;
pub mod redis;
pub mod serde_util;
pub mod store;
pub mod telemetry;

// Domain
pub mod ingest;
pub mod normalizer;
pub mod notification;
pub mod preferences;
pub mod push;
pub mod source;

// Application layer
pub mod api;
pub mod server;
