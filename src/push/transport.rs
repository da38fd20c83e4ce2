use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::notification::Priority;

/// Delivery urgency hint passed to the push service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Normal,
    High,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Normal => "normal",
            Urgency::High => "high",
        }
    }
}

/// Payload the client's notification-click handler reads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushData {
    pub url: String,
    pub notification_id: Uuid,
    pub priority: Priority,
}

/// One message sent to every device of a user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    pub icon: Option<String>,
    pub badge: Option<String>,
    /// Devices collapse messages sharing a tag
    pub tag: String,
    pub require_interaction: bool,
    pub urgency: Urgency,
    pub data: PushData,
}

/// Per-token result of a batched send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// Token will never work again and should be forgotten
    Invalid(String),
    /// Might succeed on a later send
    Transient(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub token: String,
    pub outcome: DeliveryOutcome,
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Push service returned {0}: {1}")]
    Status(u16, String),

    #[error("Unexpected push service response: {0}")]
    Response(String),

    #[error("Push send timed out")]
    Timeout,
}

/// A batched send-to-many-devices channel.
#[async_trait]
pub trait PushTransport: Send + Sync {
    fn name(&self) -> &'static str;

    /// Send `message` to every token in one call. The returned reports line
    /// up one-to-one with `tokens`.
    async fn send_multicast(
        &self,
        message: &PushMessage,
        tokens: &[String],
    ) -> Result<Vec<DeliveryReport>, TransportError>;
}
