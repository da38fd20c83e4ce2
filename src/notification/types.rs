use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Provider;

/// Priority levels for notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Never pushed
    Low,
    /// Normal priority (default)
    #[default]
    Normal,
    /// Pushed unless muted or inside quiet hours
    High,
    /// Always pushed
    Critical,
}

impl Priority {
    /// Get numeric value for priority comparison
    pub fn as_weight(&self) -> u8 {
        match self {
            Priority::Low => 1,
            Priority::Normal => 2,
            Priority::High => 3,
            Priority::Critical => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }

    /// The generic time-sensitivity rule: critical or high.
    pub fn is_time_sensitive(&self) -> bool {
        matches!(self, Priority::Critical | Priority::High)
    }
}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Priority {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_weight().cmp(&other.as_weight())
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Routing context of a source, copied onto every notification it produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Context {
    Work,
    Personal,
    #[default]
    Both,
}

/// Canonical output of a provider normalizer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedNotification {
    pub title: String,
    pub body: String,
    pub url: Option<String>,
    pub priority: Priority,
    pub time_sensitive: bool,
}

impl NormalizedNotification {
    /// Build a notification whose time sensitivity follows the priority.
    pub fn new(
        title: impl Into<String>,
        body: impl Into<String>,
        url: Option<String>,
        priority: Priority,
    ) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            url,
            priority,
            time_sensitive: priority.is_time_sensitive(),
        }
    }

    /// Replace the derived time sensitivity with a provider-specific rule.
    pub fn with_time_sensitive(mut self, time_sensitive: bool) -> Self {
        self.time_sensitive = time_sensitive;
        self
    }
}

/// Notification persisted in a user's inbox.
///
/// Only `read` and `archived` change after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub source_id: String,
    pub provider: Provider,
    pub context: Context,
    pub priority: Priority,
    pub time_sensitive: bool,
    pub title: String,
    pub body: String,
    pub url: Option<String>,
    /// Provider payload as received, kept for audit
    pub raw: serde_json::Value,
    pub read: bool,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
}

/// Everything needed to write a notification except its creation time,
/// which the store assigns.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub id: Uuid,
    pub source_id: String,
    pub provider: Provider,
    pub context: Context,
    pub normalized: NormalizedNotification,
    pub raw: serde_json::Value,
}

impl NewNotification {
    pub fn new(
        source_id: impl Into<String>,
        provider: Provider,
        context: Context,
        normalized: NormalizedNotification,
        raw: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_id: source_id.into(),
            provider,
            context,
            normalized,
            raw,
        }
    }

    /// Materialize the stored form with the given creation time.
    pub fn into_notification(self, created_at: DateTime<Utc>) -> Notification {
        Notification {
            id: self.id,
            source_id: self.source_id,
            provider: self.provider,
            context: self.context,
            priority: self.normalized.priority,
            time_sensitive: self.normalized.time_sensitive,
            title: self.normalized.title,
            body: self.normalized.body,
            url: self.normalized.url,
            raw: self.raw,
            read: false,
            archived: false,
            created_at,
        }
    }
}

/// The only mutation allowed on a stored notification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct FlagUpdate {
    pub read: Option<bool>,
    pub archived: Option<bool>,
}

impl FlagUpdate {
    pub fn read(read: bool) -> Self {
        Self {
            read: Some(read),
            archived: None,
        }
    }

    pub fn archived(archived: bool) -> Self {
        Self {
            read: None,
            archived: Some(archived),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.read.is_none() && self.archived.is_none()
    }

    /// Apply to a notification, returning whether anything changed.
    pub fn apply(&self, notification: &mut Notification) -> bool {
        let mut changed = false;
        if let Some(read) = self.read {
            changed |= notification.read != read;
            notification.read = read;
        }
        if let Some(archived) = self.archived {
            changed |= notification.archived != archived;
            notification.archived = archived;
        }
        changed
    }
}
