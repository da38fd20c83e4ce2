use serde::Deserialize;

use crate::notification::{NormalizedNotification, Priority, Provider};

use super::{parse_payload, present, NormalizeError, Normalizer};

#[derive(Debug, Deserialize)]
struct UpdownPayload {
    event: String,
    check: Check,
    downtime: Option<Downtime>,
}

#[derive(Debug, Deserialize)]
struct Check {
    url: Option<String>,
    alias: Option<String>,
    status: Option<f64>,
    down: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct Downtime {
    duration: Option<f64>,
}

/// updown.io check events (`check.down`, `check.up`, `check.ssl_*`,
/// `check.performance_drop`).
pub struct UpdownNormalizer;

fn classify(event: &str, down: bool) -> Priority {
    // updown prefixes every event with "check."; accept the bare form too
    let kind = event.strip_prefix("check.").unwrap_or(event);

    if down || kind == "down" {
        return Priority::Critical;
    }
    if kind.starts_with("ssl_") {
        return Priority::High;
    }
    match kind {
        "up" => Priority::Normal,
        "performance_drop" => Priority::Low,
        _ => Priority::Normal,
    }
}

impl Normalizer for UpdownNormalizer {
    fn provider(&self) -> Provider {
        Provider::Updown
    }

    fn normalize(
        &self,
        payload: &serde_json::Value,
    ) -> Result<NormalizedNotification, NormalizeError> {
        let data: UpdownPayload = parse_payload(Provider::Updown, payload)?;
        let name = present(data.check.alias.as_ref())
            .or(present(data.check.url.as_ref()))
            .unwrap_or("Unknown check");
        let priority = classify(&data.event, data.check.down.unwrap_or(false));

        let mut body = format!("Event: {}", data.event);
        if let Some(status) = data.check.status.filter(|s| *s != 0.0) {
            body.push_str(&format!(" (HTTP {})", status));
        }
        if let Some(duration) = data
            .downtime
            .and_then(|d| d.duration)
            .filter(|d| *d != 0.0)
        {
            body.push_str(&format!(" - downtime: {}s", duration));
        }

        let event_words = data.event.replace(|c: char| c == '.' || c == '_', " ");
        let title = format!("{}: {}", name, event_words);
        let url = present(data.check.url.as_ref()).map(str::to_string);

        Ok(NormalizedNotification::new(title, body, url, priority))
    }
}
