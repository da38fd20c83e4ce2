//! User-owned sources and their webhook token mappings.

mod service;
mod types;

pub use service::SourceService;
pub use types::{
    generate_webhook_token, CreateSourceRequest, CreatedSource, DeleteTokenRequest,
    RegisterTokenRequest, Source, SourcePatch, SourcePushConfig, WebhookToken,
};
