use serde::Deserialize;

use crate::notification::{NormalizedNotification, Priority, Provider};

use super::{parse_payload, present, NormalizeError, Normalizer};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceHookPayload {
    event_type: String,
    message: Option<Message>,
    detailed_message: Option<Message>,
    resource: Option<Resource>,
}

#[derive(Debug, Deserialize)]
struct Message {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Resource {
    url: Option<String>,
    status: Option<String>,
    result: Option<String>,
}

/// Azure DevOps service hooks (builds, releases, pull requests, work items).
pub struct AzureDevopsNormalizer;

fn classify(event_type: &str, resource: Option<&Resource>) -> Priority {
    let status = resource.and_then(|r| r.status.as_deref());
    let result = resource.and_then(|r| r.result.as_deref());
    let is_build = event_type.contains("build.complete");

    if event_type.contains("release") && status == Some("failed") {
        return Priority::Critical;
    }
    if is_build && result == Some("failed") {
        return Priority::High;
    }
    if event_type.contains("pullrequest") || event_type.contains("workitem") {
        return Priority::Normal;
    }
    if is_build && result == Some("succeeded") {
        return Priority::Low;
    }
    Priority::Normal
}

impl Normalizer for AzureDevopsNormalizer {
    fn provider(&self) -> Provider {
        Provider::AzureDevops
    }

    fn normalize(
        &self,
        payload: &serde_json::Value,
    ) -> Result<NormalizedNotification, NormalizeError> {
        let data: ServiceHookPayload = parse_payload(Provider::AzureDevops, payload)?;
        let priority = classify(&data.event_type, data.resource.as_ref());

        let body = data
            .message
            .as_ref()
            .and_then(|m| present(m.text.as_ref()))
            .or_else(|| {
                data.detailed_message
                    .as_ref()
                    .and_then(|m| present(m.text.as_ref()))
            })
            .unwrap_or(&data.event_type)
            .to_string();

        let url = data
            .resource
            .as_ref()
            .and_then(|r| present(r.url.as_ref()))
            .map(str::to_string);

        Ok(NormalizedNotification::new(
            format!("Azure DevOps: {}", data.event_type.replace('.', " ")),
            body,
            url,
            priority,
        ))
    }
}
