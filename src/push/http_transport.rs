//! FCM-style HTTP push transport.
//!
//! One POST per multicast carrying `registration_ids`. The response lists a
//! result per token, in request order; error classes that mean the token is
//! gone for good are reported as invalid so the dispatcher can drop them.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::transport::{
    DeliveryOutcome, DeliveryReport, PushMessage, PushTransport, TransportError, Urgency,
};
use crate::config::PushConfig;

/// Error classes meaning the registration will never succeed again.
const PERMANENT_ERRORS: [&str; 3] = ["NotRegistered", "InvalidRegistration", "MismatchSenderId"];

#[derive(Debug, Deserialize)]
struct MulticastResponse {
    #[serde(default)]
    results: Vec<MulticastResult>,
}

#[derive(Debug, Deserialize)]
struct MulticastResult {
    message_id: Option<String>,
    error: Option<String>,
}

pub struct HttpPushTransport {
    client: Client,
    endpoint: String,
    server_key: String,
}

impl HttpPushTransport {
    pub fn new(config: &PushConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            server_key: config.server_key.clone(),
        })
    }

    fn request_body(message: &PushMessage, tokens: &[String]) -> Value {
        let data = json!({
            "url": message.data.url,
            "notification_id": message.data.notification_id.to_string(),
            "priority": message.data.priority.as_str(),
        });

        json!({
            "registration_ids": tokens,
            "priority": match message.urgency {
                Urgency::High => "high",
                Urgency::Normal => "normal",
            },
            "notification": {
                "title": message.title,
                "body": message.body,
                "icon": message.icon,
                "tag": message.tag,
            },
            "data": data,
            "webpush": {
                "headers": { "Urgency": message.urgency.as_str() },
                "notification": {
                    "title": message.title,
                    "body": message.body,
                    "icon": message.icon,
                    "badge": message.badge,
                    "tag": message.tag,
                    "requireInteraction": message.require_interaction,
                    "data": data,
                    "actions": [
                        { "action": "open", "title": "Open" },
                        { "action": "archive", "title": "Archive" },
                    ],
                },
                "fcm_options": { "link": message.data.url },
            },
        })
    }
}

fn classify(result: &MulticastResult) -> DeliveryOutcome {
    match &result.error {
        None if result.message_id.is_some() => DeliveryOutcome::Delivered,
        None => DeliveryOutcome::Transient("missing message id".to_string()),
        Some(error) if PERMANENT_ERRORS.contains(&error.as_str()) => {
            DeliveryOutcome::Invalid(error.clone())
        }
        Some(error) => DeliveryOutcome::Transient(error.clone()),
    }
}

#[async_trait]
impl PushTransport for HttpPushTransport {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn send_multicast(
        &self,
        message: &PushMessage,
        tokens: &[String],
    ) -> Result<Vec<DeliveryReport>, TransportError> {
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("key={}", self.server_key))
            .json(&Self::request_body(message, tokens))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout
                } else {
                    TransportError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status(status.as_u16(), body));
        }

        let parsed: MulticastResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Response(e.to_string()))?;

        if parsed.results.len() != tokens.len() {
            return Err(TransportError::Response(format!(
                "expected {} results, got {}",
                tokens.len(),
                parsed.results.len()
            )));
        }

        Ok(tokens
            .iter()
            .zip(parsed.results.iter())
            .map(|(token, result)| DeliveryReport {
                token: token.clone(),
                outcome: classify(result),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::Priority;
    use crate::push::transport::PushData;
    use uuid::Uuid;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport(server: &MockServer) -> HttpPushTransport {
        HttpPushTransport::new(&PushConfig {
            enabled: true,
            endpoint: format!("{}/fcm/send", server.uri()),
            server_key: "server-key".to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    fn message(urgency: Urgency) -> PushMessage {
        PushMessage {
            title: "api is down".to_string(),
            body: "Check failed".to_string(),
            icon: Some("/icon.png".to_string()),
            badge: None,
            tag: "updown-1".to_string(),
            require_interaction: urgency == Urgency::High,
            urgency,
            data: PushData {
                url: "/".to_string(),
                notification_id: Uuid::nil(),
                priority: Priority::Critical,
            },
        }
    }

    fn tokens(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_maps_per_token_results() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/fcm/send"))
            .and(header("Authorization", "key=server-key"))
            .and(body_partial_json(json!({
                "registration_ids": ["a", "b", "c", "d"],
                "webpush": {
                    "headers": {"Urgency": "high"},
                    "notification": {"requireInteraction": true, "tag": "updown-1"}
                },
                "data": {"priority": "critical"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": 1,
                "failure": 3,
                "results": [
                    {"message_id": "m1"},
                    {"error": "NotRegistered"},
                    {"error": "Unavailable"},
                    {"error": "InvalidRegistration"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reports = transport(&server)
            .send_multicast(&message(Urgency::High), &tokens(&["a", "b", "c", "d"]))
            .await
            .unwrap();

        let outcomes: Vec<_> = reports.iter().map(|r| r.outcome.clone()).collect();
        assert_eq!(
            outcomes,
            vec![
                DeliveryOutcome::Delivered,
                DeliveryOutcome::Invalid("NotRegistered".to_string()),
                DeliveryOutcome::Transient("Unavailable".to_string()),
                DeliveryOutcome::Invalid("InvalidRegistration".to_string()),
            ]
        );
        assert_eq!(reports[1].token, "b");
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let result = transport(&server)
            .send_multicast(&message(Urgency::Normal), &tokens(&["a"]))
            .await;
        assert!(matches!(result, Err(TransportError::Status(401, _))));
    }

    #[tokio::test]
    async fn test_result_count_mismatch_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"results": [{"message_id": "m"}]})),
            )
            .mount(&server)
            .await;

        let result = transport(&server)
            .send_multicast(&message(Urgency::Normal), &tokens(&["a", "b"]))
            .await;
        assert!(matches!(result, Err(TransportError::Response(_))));
    }

    #[tokio::test]
    async fn test_no_tokens_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let reports = transport(&server)
            .send_multicast(&message(Urgency::Normal), &[])
            .await
            .unwrap();
        assert!(reports.is_empty());
    }
}
