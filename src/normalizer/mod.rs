//! Provider payload normalization.
//!
//! Each provider gets one [`Normalizer`] that validates the provider's payload
//! shape, classifies it into a [`Priority`](crate::notification::Priority) and
//! extracts a title, body and deep link. Classification is total: any payload
//! that passes shape validation maps to exactly one priority, `normal` when no
//! specific rule matches.

mod azure_devops;
mod confluence;
mod custom;
mod email;
mod gcp;
mod jira;
mod registry;
mod updown;
mod vercel;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

use crate::notification::{NormalizedNotification, Provider};

pub use azure_devops::AzureDevopsNormalizer;
pub use confluence::ConfluenceNormalizer;
pub use custom::CustomNormalizer;
pub use email::EmailNormalizer;
pub use gcp::GcpNormalizer;
pub use jira::JiraNormalizer;
pub use registry::NormalizerRegistry;
pub use updown::UpdownNormalizer;
pub use vercel::VercelNormalizer;

/// Payload did not match the shape a provider's normalizer expects.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid {provider} payload: {reason}")]
pub struct NormalizeError {
    pub provider: Provider,
    pub reason: String,
}

impl NormalizeError {
    pub fn new(provider: Provider, reason: impl Into<String>) -> Self {
        Self {
            provider,
            reason: reason.into(),
        }
    }
}

/// Maps one provider's raw webhook payload onto the canonical notification.
pub trait Normalizer: Send + Sync {
    fn provider(&self) -> Provider;

    fn normalize(&self, payload: &serde_json::Value)
        -> Result<NormalizedNotification, NormalizeError>;
}

/// Deserialize a payload into a provider's typed shape.
pub(crate) fn parse_payload<T: DeserializeOwned>(
    provider: Provider,
    payload: &serde_json::Value,
) -> Result<T, NormalizeError> {
    T::deserialize(payload).map_err(|e| NormalizeError::new(provider, e.to_string()))
}

/// Treat empty strings like missing ones.
pub(crate) fn present(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|s| !s.is_empty())
}

/// Shape shared by provider objects that only carry an optional display name.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DisplayName {
    pub display_name: Option<String>,
}
