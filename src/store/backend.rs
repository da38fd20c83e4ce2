//! Backend trait for the per-user document store.
//!
//! The store holds four per-user collections (sources, notifications,
//! preferences, device tokens) plus one globally keyed collection of webhook
//! token mappings. Implementations must be safe to share across request tasks.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::notification::{Context, FlagUpdate, NewNotification, Notification, Priority, Provider};
use crate::preferences::UserPreferences;
use crate::redis::PoolError;
use crate::source::{Source, WebhookToken};

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Redis operation failed
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Stored document could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend is temporarily unavailable
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<PoolError> for StoreError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Redis(e) => StoreError::Redis(e),
            PoolError::ConnectionUnavailable(msg) => StoreError::Unavailable(msg),
        }
    }
}

/// Default page size of an inbox query.
pub const DEFAULT_QUERY_LIMIT: usize = 25;
/// Largest page an inbox query may request.
pub const MAX_QUERY_LIMIT: usize = 100;

/// Filters for an ordered inbox query. Results are newest first.
///
/// `None` on any filter means "don't filter on this field".
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationQuery {
    pub contexts: Option<Vec<Context>>,
    pub priorities: Option<Vec<Priority>>,
    pub providers: Option<Vec<Provider>>,
    pub read: Option<bool>,
    pub archived: Option<bool>,
    /// Only notifications created strictly before this instant
    pub before: Option<DateTime<Utc>>,
    pub limit: usize,
}

impl Default for NotificationQuery {
    fn default() -> Self {
        Self {
            contexts: None,
            priorities: None,
            providers: None,
            read: None,
            archived: None,
            before: None,
            limit: DEFAULT_QUERY_LIMIT,
        }
    }
}

impl NotificationQuery {
    pub fn effective_limit(&self) -> usize {
        self.limit.clamp(1, MAX_QUERY_LIMIT)
    }

    pub fn matches(&self, n: &Notification) -> bool {
        fn allowed<T: PartialEq>(set: &Option<Vec<T>>, value: &T) -> bool {
            set.as_ref().map_or(true, |s| s.contains(value))
        }

        allowed(&self.contexts, &n.context)
            && allowed(&self.priorities, &n.priority)
            && allowed(&self.providers, &n.provider)
            && self.read.map_or(true, |r| n.read == r)
            && self.archived.map_or(true, |a| n.archived == a)
            && self.before.map_or(true, |b| n.created_at < b)
    }
}

/// Trait for document store backends.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Backend identifier for health reporting.
    fn backend_name(&self) -> &'static str;

    /// Verify the backend is reachable.
    async fn ping(&self) -> Result<(), StoreError>;

    // Sources

    async fn get_source(&self, user_id: &str, source_id: &str)
        -> Result<Option<Source>, StoreError>;

    /// All sources of a user, newest first.
    async fn list_sources(&self, user_id: &str) -> Result<Vec<Source>, StoreError>;

    /// Insert or replace a source.
    async fn put_source(&self, user_id: &str, source: &Source) -> Result<(), StoreError>;

    /// Returns whether the source existed.
    async fn delete_source(&self, user_id: &str, source_id: &str) -> Result<bool, StoreError>;

    // Webhook token mappings

    async fn get_token(&self, token: &str) -> Result<Option<WebhookToken>, StoreError>;

    /// Create-only. Returns `false` and leaves the existing mapping untouched
    /// when the token is already taken.
    async fn create_token(&self, mapping: &WebhookToken) -> Result<bool, StoreError>;

    /// Returns whether the mapping existed.
    async fn delete_token(&self, token: &str) -> Result<bool, StoreError>;

    /// Remove every mapping that routes to the source. Returns how many were removed.
    async fn delete_tokens_for_source(
        &self,
        user_id: &str,
        source_id: &str,
    ) -> Result<usize, StoreError>;

    // Notifications

    /// Persist a new notification. The store assigns `created_at`, strictly
    /// increasing per user.
    async fn insert_notification(
        &self,
        user_id: &str,
        notification: NewNotification,
    ) -> Result<Notification, StoreError>;

    async fn get_notification(
        &self,
        user_id: &str,
        id: Uuid,
    ) -> Result<Option<Notification>, StoreError>;

    async fn query_notifications(
        &self,
        user_id: &str,
        query: &NotificationQuery,
    ) -> Result<Vec<Notification>, StoreError>;

    /// Apply a flag update to each listed notification the user owns.
    /// Returns how many notifications were found.
    async fn update_flags(
        &self,
        user_id: &str,
        ids: &[Uuid],
        update: FlagUpdate,
    ) -> Result<usize, StoreError>;

    // Preferences

    async fn get_preferences(&self, user_id: &str)
        -> Result<Option<UserPreferences>, StoreError>;

    async fn put_preferences(
        &self,
        user_id: &str,
        preferences: &UserPreferences,
    ) -> Result<(), StoreError>;

    // Push device tokens

    async fn list_device_tokens(&self, user_id: &str) -> Result<Vec<String>, StoreError>;

    /// Returns whether the token was newly added.
    async fn add_device_token(&self, user_id: &str, token: &str) -> Result<bool, StoreError>;

    /// Atomic remove-if-present. Returns whether the token was there.
    async fn remove_device_token(&self, user_id: &str, token: &str) -> Result<bool, StoreError>;
}

/// Next creation timestamp in microseconds: the wall clock, or one past the
/// previous value when the clock has not advanced.
pub(crate) fn next_timestamp_micros(now_micros: i64, last_micros: i64) -> i64 {
    if now_micros > last_micros {
        now_micros
    } else {
        last_micros + 1
    }
}

pub(crate) fn timestamp_from_micros(micros: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| StoreError::Unavailable(format!("timestamp out of range: {}", micros)))
}
