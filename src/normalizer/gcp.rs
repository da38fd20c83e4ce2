use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;

use crate::notification::{NormalizedNotification, Priority, Provider};

use super::{parse_payload, present, NormalizeError, Normalizer};

#[derive(Debug, Deserialize)]
struct GcpPayload {
    incident: Option<Incident>,
    message: Option<PubSubMessage>,
}

#[derive(Debug, Deserialize)]
struct Incident {
    state: Option<String>,
    policy_name: Option<String>,
    condition_name: Option<String>,
    url: Option<String>,
    summary: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PubSubMessage {
    data: Option<String>,
}

/// Cloud Monitoring incident notifications, plus raw Pub/Sub push messages.
///
/// Only an open incident is time sensitive; a closed one is `normal` and not.
pub struct GcpNormalizer;

fn classify(state: Option<&str>) -> Priority {
    match state {
        Some("open") => Priority::Critical,
        Some("closed") => Priority::Normal,
        _ => Priority::Normal,
    }
}

/// Pub/Sub pushes carry base64 data; fall back to the raw text if it isn't.
fn decode_message_data(data: &str) -> String {
    STANDARD
        .decode(data)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_else(|| data.to_string())
}

impl Normalizer for GcpNormalizer {
    fn provider(&self) -> Provider {
        Provider::Gcp
    }

    fn normalize(
        &self,
        payload: &serde_json::Value,
    ) -> Result<NormalizedNotification, NormalizeError> {
        let data: GcpPayload = parse_payload(Provider::Gcp, payload)?;

        if let Some(incident) = data.incident {
            let state = present(incident.state.as_ref());
            let priority = classify(state);
            let label = present(incident.policy_name.as_ref())
                .or(present(incident.condition_name.as_ref()))
                .unwrap_or("Incident");
            let state_label = state.unwrap_or("unknown");
            let body = present(incident.summary.as_ref())
                .map(str::to_string)
                .unwrap_or_else(|| format!("Incident state: {}", state_label));

            return Ok(NormalizedNotification::new(
                format!("GCP: {} - {}", label, state_label),
                body,
                present(incident.url.as_ref()).map(str::to_string),
                priority,
            )
            .with_time_sensitive(priority == Priority::Critical));
        }

        let Some(message) = data.message else {
            return Err(NormalizeError::new(
                Provider::Gcp,
                "expected an `incident` or a Pub/Sub `message`",
            ));
        };

        let body = present(message.data.as_ref())
            .map(decode_message_data)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "No message data".to_string());

        Ok(
            NormalizedNotification::new("GCP: Pub/Sub message", body, None, Priority::Normal)
                .with_time_sensitive(false),
        )
    }
}
