use serde::Deserialize;

use crate::notification::{NormalizedNotification, Priority, Provider};

use super::{parse_payload, present, NormalizeError, Normalizer};

#[derive(Debug, Deserialize)]
struct VercelPayload {
    #[serde(rename = "type")]
    kind: String,
    payload: Option<EventPayload>,
}

#[derive(Debug, Deserialize)]
struct EventPayload {
    deployment: Option<Deployment>,
    name: Option<String>,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Deployment {
    name: Option<String>,
    url: Option<String>,
}

/// Vercel deployment webhooks.
///
/// Only error/failure events are time sensitive.
pub struct VercelNormalizer;

fn classify(kind: &str) -> Priority {
    if kind.contains("error") || kind.contains("failed") {
        return Priority::High;
    }
    match kind {
        "deployment" | "deployment.created" => Priority::Normal,
        "deployment.succeeded" | "deployment.ready" => Priority::Low,
        _ => Priority::Normal,
    }
}

/// Vercel sends bare hostnames; make them clickable.
fn absolute_url(url: &str) -> String {
    if url.starts_with("http") {
        url.to_string()
    } else {
        format!("https://{}", url)
    }
}

impl Normalizer for VercelNormalizer {
    fn provider(&self) -> Provider {
        Provider::Vercel
    }

    fn normalize(
        &self,
        payload: &serde_json::Value,
    ) -> Result<NormalizedNotification, NormalizeError> {
        let data: VercelPayload = parse_payload(Provider::Vercel, payload)?;
        let priority = classify(&data.kind);

        let event = data.payload.as_ref();
        let deployment = event.and_then(|p| p.deployment.as_ref());
        let name = deployment
            .and_then(|d| present(d.name.as_ref()))
            .or_else(|| event.and_then(|p| present(p.name.as_ref())))
            .unwrap_or("Unknown project");
        let url = deployment
            .and_then(|d| present(d.url.as_ref()))
            .or_else(|| event.and_then(|p| present(p.url.as_ref())));

        let body = match url {
            Some(url) => format!("Deployment event: {} ({})", data.kind, url),
            None => format!("Deployment event: {}", data.kind),
        };

        Ok(NormalizedNotification::new(
            format!("Vercel: {} - {}", name, data.kind.replace('.', " ")),
            body,
            url.map(absolute_url),
            priority,
        )
        .with_time_sensitive(priority == Priority::High))
    }
}
