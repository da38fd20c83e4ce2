//! Webhook ingestion: token resolution, normalization, persistence and the
//! hand-off to push dispatch.

mod error;
mod gateway;
mod resolver;

pub use error::IngestError;
pub use gateway::{IngestGateway, Ingested};
pub use resolver::{ResolvedToken, TokenResolver};
