//! Redis-backed document store.
//!
//! Key layout (all under `{prefix}`):
//!
//! | Key | Type | Content |
//! |-----|------|---------|
//! | `{prefix}:sources:{user}` | hash | source id -> Source JSON |
//! | `{prefix}:tokens` | hash | webhook token -> mapping JSON |
//! | `{prefix}:source_tokens:{user}:{source}` | set | tokens routing to a source |
//! | `{prefix}:notifications:{user}` | hash | notification id -> Notification JSON |
//! | `{prefix}:flags:{user}` | hash | `{id}:read` / `{id}:archived` -> `0` or `1` |
//! | `{prefix}:inbox:{user}` | sorted set | notification id scored by creation micros |
//! | `{prefix}:clock:{user}` | string | last assigned creation micros |
//! | `{prefix}:preferences:{user}` | string | UserPreferences JSON |
//! | `{prefix}:devices:{user}` | set | push device tokens |
//!
//! Notification documents are written once. Read and archived state lives in
//! the flags hash and is laid over the document on load, so flag changes are
//! single-field writes that never race with each other.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use redis::{AsyncCommands, Script};
use uuid::Uuid;

use crate::notification::{FlagUpdate, NewNotification, Notification};
use crate::preferences::UserPreferences;
use crate::redis::RedisPool;
use crate::source::{Source, WebhookToken};

use super::backend::{timestamp_from_micros, DocumentStore, NotificationQuery, StoreError};

/// Assigns the next creation timestamp for a user: the caller's clock, or one
/// microsecond past the previous value when the clock has not advanced.
const NEXT_TIMESTAMP_LUA: &str = r#"
local now = tonumber(ARGV[1])
local last = tonumber(redis.call('GET', KEYS[1]) or '0')
if now <= last then
    now = last + 1
end
redis.call('SET', KEYS[1], now)
return now
"#;

/// Writes a token mapping only if the token is unused, indexing it under its
/// source in the same step. Returns 1 when created, 0 when the token is taken.
const CREATE_TOKEN_LUA: &str = r#"
if redis.call('HSETNX', KEYS[1], ARGV[1], ARGV[2]) == 0 then
    return 0
end
redis.call('SADD', KEYS[2], ARGV[1])
return 1
"#;

/// Sets read/archived flags on the listed notifications that exist.
/// ARGV[1] and ARGV[2] are the new read and archived values ('' leaves the
/// flag alone); the remaining ARGV are notification ids. Returns how many
/// ids were found.
const UPDATE_FLAGS_LUA: &str = r#"
local found = 0
for i = 3, #ARGV do
    local id = ARGV[i]
    if redis.call('HEXISTS', KEYS[1], id) == 1 then
        found = found + 1
        if ARGV[1] ~= '' then
            redis.call('HSET', KEYS[2], id .. ':read', ARGV[1])
        end
        if ARGV[2] ~= '' then
            redis.call('HSET', KEYS[2], id .. ':archived', ARGV[2])
        end
    end
end
return found
"#;

/// How many inbox ids to pull per round trip while filtering a query.
const QUERY_SCAN_BATCH: usize = 200;

pub struct RedisStore {
    pool: Arc<RedisPool>,
    prefix: String,
    next_timestamp: Script,
    create_token: Script,
    update_flags: Script,
}

impl RedisStore {
    pub fn new(pool: Arc<RedisPool>, prefix: impl Into<String>) -> Self {
        Self {
            pool,
            prefix: prefix.into(),
            next_timestamp: Script::new(NEXT_TIMESTAMP_LUA),
            create_token: Script::new(CREATE_TOKEN_LUA),
            update_flags: Script::new(UPDATE_FLAGS_LUA),
        }
    }

    fn sources_key(&self, user_id: &str) -> String {
        format!("{}:sources:{}", self.prefix, user_id)
    }

    fn tokens_key(&self) -> String {
        format!("{}:tokens", self.prefix)
    }

    fn source_tokens_key(&self, user_id: &str, source_id: &str) -> String {
        format!("{}:source_tokens:{}:{}", self.prefix, user_id, source_id)
    }

    fn notifications_key(&self, user_id: &str) -> String {
        format!("{}:notifications:{}", self.prefix, user_id)
    }

    fn flags_key(&self, user_id: &str) -> String {
        format!("{}:flags:{}", self.prefix, user_id)
    }

    fn inbox_key(&self, user_id: &str) -> String {
        format!("{}:inbox:{}", self.prefix, user_id)
    }

    fn clock_key(&self, user_id: &str) -> String {
        format!("{}:clock:{}", self.prefix, user_id)
    }

    fn preferences_key(&self, user_id: &str) -> String {
        format!("{}:preferences:{}", self.prefix, user_id)
    }

    fn devices_key(&self, user_id: &str) -> String {
        format!("{}:devices:{}", self.prefix, user_id)
    }

    /// Load the given notification ids with their current flags, skipping
    /// missing or unreadable entries.
    async fn load_notifications(
        &self,
        user_id: &str,
        ids: &[String],
    ) -> Result<Vec<Notification>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let flag_fields: Vec<String> = ids
            .iter()
            .flat_map(|id| [format!("{}:read", id), format!("{}:archived", id)])
            .collect();

        let mut pipe = redis::pipe();
        pipe.atomic()
            .cmd("HMGET")
            .arg(self.notifications_key(user_id))
            .arg(ids)
            .cmd("HMGET")
            .arg(self.flags_key(user_id))
            .arg(&flag_fields);

        let mut conn = self.pool.get_connection().await?;
        let (docs, flags): (Vec<Option<String>>, Vec<Option<String>>) =
            self.pool.checked(pipe.query_async(&mut conn).await).await?;

        let mut notifications = Vec::with_capacity(docs.len());
        for (json, flags) in docs.into_iter().zip(flags.chunks(2)) {
            let Some(json) = json else { continue };
            match serde_json::from_str::<Notification>(&json) {
                Ok(mut n) => {
                    overlay_flags(
                        &mut n,
                        flags.first().and_then(|f| f.as_deref()),
                        flags.get(1).and_then(|f| f.as_deref()),
                    );
                    notifications.push(n);
                }
                Err(e) => {
                    tracing::warn!(user_id = %user_id, error = %e, "Skipping unreadable notification");
                }
            }
        }
        Ok(notifications)
    }
}

/// Apply stored flag values over a notification document.
fn overlay_flags(n: &mut Notification, read: Option<&str>, archived: Option<&str>) {
    if let Some(read) = read {
        n.read = read == "1";
    }
    if let Some(archived) = archived {
        n.archived = archived == "1";
    }
}

fn flag_arg(value: Option<bool>) -> &'static str {
    match value {
        Some(true) => "1",
        Some(false) => "0",
        None => "",
    }
}

#[async_trait]
impl DocumentStore for RedisStore {
    fn backend_name(&self) -> &'static str {
        "redis"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(self.pool.ping().await?)
    }

    async fn get_source(
        &self,
        user_id: &str,
        source_id: &str,
    ) -> Result<Option<Source>, StoreError> {
        let mut conn = self.pool.get_connection().await?;
        let raw: Option<String> = self
            .pool
            .checked(conn.hget(self.sources_key(user_id), source_id).await)
            .await?;
        Ok(raw.map(|json| serde_json::from_str(&json)).transpose()?)
    }

    async fn list_sources(&self, user_id: &str) -> Result<Vec<Source>, StoreError> {
        let mut conn = self.pool.get_connection().await?;
        let raw: Vec<String> = self
            .pool
            .checked(conn.hvals(self.sources_key(user_id)).await)
            .await?;

        let mut sources = raw
            .iter()
            .map(|json| serde_json::from_str::<Source>(json))
            .collect::<Result<Vec<_>, _>>()?;
        sources.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sources)
    }

    async fn put_source(&self, user_id: &str, source: &Source) -> Result<(), StoreError> {
        let json = serde_json::to_string(source)?;
        let mut conn = self.pool.get_connection().await?;
        let _: () = self
            .pool
            .checked(conn.hset(self.sources_key(user_id), &source.id, json).await)
            .await?;
        Ok(())
    }

    async fn delete_source(&self, user_id: &str, source_id: &str) -> Result<bool, StoreError> {
        let mut conn = self.pool.get_connection().await?;
        let removed: i64 = self
            .pool
            .checked(conn.hdel(self.sources_key(user_id), source_id).await)
            .await?;
        Ok(removed > 0)
    }

    async fn get_token(&self, token: &str) -> Result<Option<WebhookToken>, StoreError> {
        let mut conn = self.pool.get_connection().await?;
        let raw: Option<String> = self
            .pool
            .checked(conn.hget(self.tokens_key(), token).await)
            .await?;
        Ok(raw.map(|json| serde_json::from_str(&json)).transpose()?)
    }

    async fn create_token(&self, mapping: &WebhookToken) -> Result<bool, StoreError> {
        let json = serde_json::to_string(mapping)?;
        let mut conn = self.pool.get_connection().await?;
        let created: i64 = self
            .pool
            .checked(
                self.create_token
                    .key(self.tokens_key())
                    .key(self.source_tokens_key(&mapping.user_id, &mapping.source_id))
                    .arg(&mapping.token)
                    .arg(json)
                    .invoke_async(&mut conn)
                    .await,
            )
            .await?;
        Ok(created == 1)
    }

    async fn delete_token(&self, token: &str) -> Result<bool, StoreError> {
        let Some(mapping) = self.get_token(token).await? else {
            return Ok(false);
        };

        let mut pipe = redis::pipe();
        pipe.atomic()
            .hdel(self.tokens_key(), token)
            .srem(
                self.source_tokens_key(&mapping.user_id, &mapping.source_id),
                token,
            )
            .ignore();

        let mut conn = self.pool.get_connection().await?;
        let (removed,): (i64,) = self.pool.checked(pipe.query_async(&mut conn).await).await?;
        Ok(removed > 0)
    }

    async fn delete_tokens_for_source(
        &self,
        user_id: &str,
        source_id: &str,
    ) -> Result<usize, StoreError> {
        let index_key = self.source_tokens_key(user_id, source_id);
        let mut conn = self.pool.get_connection().await?;
        let tokens: Vec<String> = self
            .pool
            .checked(conn.smembers(&index_key).await)
            .await?;

        if tokens.is_empty() {
            return Ok(0);
        }

        let mut pipe = redis::pipe();
        pipe.atomic()
            .hdel(self.tokens_key(), &tokens)
            .del(&index_key)
            .ignore();
        let (removed,): (i64,) = self.pool.checked(pipe.query_async(&mut conn).await).await?;
        Ok(removed.max(0) as usize)
    }

    async fn insert_notification(
        &self,
        user_id: &str,
        notification: NewNotification,
    ) -> Result<Notification, StoreError> {
        let mut conn = self.pool.get_connection().await?;
        let micros: i64 = self
            .pool
            .checked(
                self.next_timestamp
                    .key(self.clock_key(user_id))
                    .arg(Utc::now().timestamp_micros())
                    .invoke_async(&mut conn)
                    .await,
            )
            .await?;

        let stored = notification.into_notification(timestamp_from_micros(micros)?);
        let id = stored.id.to_string();
        let json = serde_json::to_string(&stored)?;

        let mut pipe = redis::pipe();
        pipe.atomic()
            .hset(self.notifications_key(user_id), &id, json)
            .ignore()
            .zadd(self.inbox_key(user_id), &id, micros)
            .ignore();
        let _: () = self.pool.checked(pipe.query_async(&mut conn).await).await?;

        Ok(stored)
    }

    async fn get_notification(
        &self,
        user_id: &str,
        id: Uuid,
    ) -> Result<Option<Notification>, StoreError> {
        Ok(self
            .load_notifications(user_id, &[id.to_string()])
            .await?
            .pop())
    }

    async fn query_notifications(
        &self,
        user_id: &str,
        query: &NotificationQuery,
    ) -> Result<Vec<Notification>, StoreError> {
        let limit = query.effective_limit();
        let max = match query.before {
            Some(before) => format!("({}", before.timestamp_micros()),
            None => "+inf".to_string(),
        };

        let mut results = Vec::with_capacity(limit);
        let mut offset = 0;
        loop {
            let mut conn = self.pool.get_connection().await?;
            let ids: Vec<String> = self
                .pool
                .checked(
                    redis::cmd("ZREVRANGEBYSCORE")
                        .arg(self.inbox_key(user_id))
                        .arg(&max)
                        .arg("-inf")
                        .arg("LIMIT")
                        .arg(offset)
                        .arg(QUERY_SCAN_BATCH)
                        .query_async(&mut conn)
                        .await,
                )
                .await?;
            let exhausted = ids.len() < QUERY_SCAN_BATCH;
            offset += ids.len();

            for n in self.load_notifications(user_id, &ids).await? {
                if query.matches(&n) {
                    results.push(n);
                    if results.len() == limit {
                        return Ok(results);
                    }
                }
            }

            if exhausted {
                return Ok(results);
            }
        }
    }

    async fn update_flags(
        &self,
        user_id: &str,
        ids: &[Uuid],
        update: FlagUpdate,
    ) -> Result<usize, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let ids: Vec<String> = ids.iter().map(Uuid::to_string).collect();
        let mut conn = self.pool.get_connection().await?;
        let found: i64 = self
            .pool
            .checked(
                self.update_flags
                    .key(self.notifications_key(user_id))
                    .key(self.flags_key(user_id))
                    .arg(flag_arg(update.read))
                    .arg(flag_arg(update.archived))
                    .arg(&ids)
                    .invoke_async(&mut conn)
                    .await,
            )
            .await?;
        Ok(found.max(0) as usize)
    }

    async fn get_preferences(
        &self,
        user_id: &str,
    ) -> Result<Option<UserPreferences>, StoreError> {
        let mut conn = self.pool.get_connection().await?;
        let raw: Option<String> = self
            .pool
            .checked(conn.get(self.preferences_key(user_id)).await)
            .await?;
        Ok(raw.map(|json| serde_json::from_str(&json)).transpose()?)
    }

    async fn put_preferences(
        &self,
        user_id: &str,
        preferences: &UserPreferences,
    ) -> Result<(), StoreError> {
        let json = serde_json::to_string(preferences)?;
        let mut conn = self.pool.get_connection().await?;
        let _: () = self
            .pool
            .checked(conn.set(self.preferences_key(user_id), json).await)
            .await?;
        Ok(())
    }

    async fn list_device_tokens(&self, user_id: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.pool.get_connection().await?;
        let mut tokens: Vec<String> = self
            .pool
            .checked(conn.smembers(self.devices_key(user_id)).await)
            .await?;
        tokens.sort();
        Ok(tokens)
    }

    async fn add_device_token(&self, user_id: &str, token: &str) -> Result<bool, StoreError> {
        let mut conn = self.pool.get_connection().await?;
        let added: i64 = self
            .pool
            .checked(conn.sadd(self.devices_key(user_id), token).await)
            .await?;
        Ok(added > 0)
    }

    async fn remove_device_token(&self, user_id: &str, token: &str) -> Result<bool, StoreError> {
        let mut conn = self.pool.get_connection().await?;
        let removed: i64 = self
            .pool
            .checked(conn.srem(self.devices_key(user_id), token).await)
            .await?;
        Ok(removed > 0)
    }
}
