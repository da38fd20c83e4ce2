use serde::Deserialize;

use crate::notification::{NormalizedNotification, Priority, Provider};

use super::{parse_payload, present, NormalizeError, Normalizer};

#[derive(Debug, Deserialize)]
struct CustomPayload {
    title: String,
    body: Option<String>,
    url: Option<String>,
    priority: Option<Priority>,
}

/// Generic webhook for scripts and services without a dedicated provider.
pub struct CustomNormalizer;

impl Normalizer for CustomNormalizer {
    fn provider(&self) -> Provider {
        Provider::Custom
    }

    fn normalize(
        &self,
        payload: &serde_json::Value,
    ) -> Result<NormalizedNotification, NormalizeError> {
        let data: CustomPayload = parse_payload(Provider::Custom, payload)?;
        if data.title.trim().is_empty() {
            return Err(NormalizeError::new(Provider::Custom, "title must not be empty"));
        }

        let url = present(data.url.as_ref()).map(str::to_string);
        Ok(NormalizedNotification::new(
            data.title,
            data.body.unwrap_or_default(),
            url,
            data.priority.unwrap_or_default(),
        ))
    }
}
