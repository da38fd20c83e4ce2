use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::notification::{Context, Priority, Provider};

/// A user-owned inbound channel bound to one provider and one webhook token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub id: String,
    pub provider: Provider,
    pub name: String,
    pub context: Context,
    pub enabled: bool,
    pub push_enabled: bool,
    pub push_priority_override: Option<Priority>,
    pub webhook_token: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Source {
    /// New enabled, push-eligible source with a freshly generated token.
    pub fn new(provider: Provider, name: impl Into<String>, context: Context) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            provider,
            name: name.into(),
            context,
            enabled: true,
            push_enabled: true,
            push_priority_override: None,
            webhook_token: generate_webhook_token(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Path a provider must be configured to call.
    pub fn ingest_path(&self) -> String {
        format!("/ingest/{}?token={}", self.provider, self.webhook_token)
    }

    pub fn push_config(&self) -> SourcePushConfig {
        SourcePushConfig {
            push_enabled: self.push_enabled,
            push_priority_override: self.push_priority_override,
        }
    }

    pub fn token_mapping(&self, user_id: &str) -> WebhookToken {
        WebhookToken {
            token: self.webhook_token.clone(),
            user_id: user_id.to_string(),
            source_id: self.id.clone(),
            provider: self.provider,
            created_at: Utc::now(),
        }
    }
}

/// 256 bits from the thread-local CSPRNG, hex encoded.
pub fn generate_webhook_token() -> String {
    hex::encode(rand::random::<[u8; 32]>())
}

/// Global token -> source lookup record. Created and deleted, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookToken {
    pub token: String,
    pub user_id: String,
    pub source_id: String,
    pub provider: Provider,
    pub created_at: DateTime<Utc>,
}

/// The slice of a source the push policy needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourcePushConfig {
    pub push_enabled: bool,
    pub push_priority_override: Option<Priority>,
}

impl Default for SourcePushConfig {
    fn default() -> Self {
        Self {
            push_enabled: true,
            push_priority_override: None,
        }
    }
}

/// Body of `POST /api/v1/sources`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSourceRequest {
    pub provider: Provider,
    pub name: String,
    #[serde(default)]
    pub context: Context,
}

/// Body of `PATCH /api/v1/sources/{id}`. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourcePatch {
    pub name: Option<String>,
    pub context: Option<Context>,
    pub enabled: Option<bool>,
    pub push_enabled: Option<bool>,
    /// `null` clears the override
    #[serde(default, deserialize_with = "crate::serde_util::double_option")]
    pub push_priority_override: Option<Option<Priority>>,
}

impl SourcePatch {
    pub fn apply(&self, source: &mut Source) {
        if let Some(name) = &self.name {
            source.name = name.clone();
        }
        if let Some(context) = self.context {
            source.context = context;
        }
        if let Some(enabled) = self.enabled {
            source.enabled = enabled;
        }
        if let Some(push_enabled) = self.push_enabled {
            source.push_enabled = push_enabled;
        }
        if let Some(priority) = self.push_priority_override {
            source.push_priority_override = priority;
        }
        source.updated_at = Utc::now();
    }
}

/// Response of source creation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedSource {
    #[serde(flatten)]
    pub source: Source,
    pub ingest_path: String,
}

/// Body of `POST /api/v1/sources/register-token`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterTokenRequest {
    pub token: String,
    pub user_id: String,
    pub source_id: String,
    pub provider: Provider,
}

/// Body of `POST /api/v1/sources/delete-token`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteTokenRequest {
    pub user_id: String,
    pub source_id: String,
}
