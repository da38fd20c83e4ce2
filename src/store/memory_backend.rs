//! In-memory document store.
//!
//! Data lives only as long as the process. Used for development, single
//! instance deployments and tests.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use crate::notification::{FlagUpdate, NewNotification, Notification};
use crate::preferences::UserPreferences;
use crate::source::{Source, WebhookToken};

use super::backend::{
    next_timestamp_micros, timestamp_from_micros, DocumentStore, NotificationQuery, StoreError,
};

/// A user's notifications in creation order.
#[derive(Default)]
struct Inbox {
    items: Vec<Notification>,
    last_created_micros: i64,
}

/// In-memory store backed by `DashMap`s keyed by user.
///
/// Each per-user collection sits behind its own shard lock, so operations on
/// different users never contend.
#[derive(Default)]
pub struct MemoryStore {
    sources: DashMap<String, HashMap<String, Source>>,
    tokens: DashMap<String, WebhookToken>,
    inboxes: DashMap<String, Inbox>,
    preferences: DashMap<String, UserPreferences>,
    devices: DashMap<String, BTreeSet<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn get_source(
        &self,
        user_id: &str,
        source_id: &str,
    ) -> Result<Option<Source>, StoreError> {
        Ok(self
            .sources
            .get(user_id)
            .and_then(|sources| sources.get(source_id).cloned()))
    }

    async fn list_sources(&self, user_id: &str) -> Result<Vec<Source>, StoreError> {
        let mut sources: Vec<Source> = self
            .sources
            .get(user_id)
            .map(|s| s.values().cloned().collect())
            .unwrap_or_default();
        sources.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sources)
    }

    async fn put_source(&self, user_id: &str, source: &Source) -> Result<(), StoreError> {
        self.sources
            .entry(user_id.to_string())
            .or_default()
            .insert(source.id.clone(), source.clone());
        Ok(())
    }

    async fn delete_source(&self, user_id: &str, source_id: &str) -> Result<bool, StoreError> {
        Ok(self
            .sources
            .get_mut(user_id)
            .map(|mut sources| sources.remove(source_id).is_some())
            .unwrap_or(false))
    }

    async fn get_token(&self, token: &str) -> Result<Option<WebhookToken>, StoreError> {
        Ok(self.tokens.get(token).map(|m| m.value().clone()))
    }

    async fn create_token(&self, mapping: &WebhookToken) -> Result<bool, StoreError> {
        match self.tokens.entry(mapping.token.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(mapping.clone());
                Ok(true)
            }
        }
    }

    async fn delete_token(&self, token: &str) -> Result<bool, StoreError> {
        Ok(self.tokens.remove(token).is_some())
    }

    async fn delete_tokens_for_source(
        &self,
        user_id: &str,
        source_id: &str,
    ) -> Result<usize, StoreError> {
        let mut removed = 0;
        self.tokens.retain(|_, m| {
            let routes_here = m.user_id == user_id && m.source_id == source_id;
            if routes_here {
                removed += 1;
            }
            !routes_here
        });
        Ok(removed)
    }

    async fn insert_notification(
        &self,
        user_id: &str,
        notification: NewNotification,
    ) -> Result<Notification, StoreError> {
        let mut inbox = self.inboxes.entry(user_id.to_string()).or_default();

        let micros = next_timestamp_micros(Utc::now().timestamp_micros(), inbox.last_created_micros);
        let stored = notification.into_notification(timestamp_from_micros(micros)?);
        inbox.last_created_micros = micros;
        inbox.items.push(stored.clone());

        Ok(stored)
    }

    async fn get_notification(
        &self,
        user_id: &str,
        id: Uuid,
    ) -> Result<Option<Notification>, StoreError> {
        Ok(self
            .inboxes
            .get(user_id)
            .and_then(|inbox| inbox.items.iter().find(|n| n.id == id).cloned()))
    }

    async fn query_notifications(
        &self,
        user_id: &str,
        query: &NotificationQuery,
    ) -> Result<Vec<Notification>, StoreError> {
        let Some(inbox) = self.inboxes.get(user_id) else {
            return Ok(Vec::new());
        };

        Ok(inbox
            .items
            .iter()
            .rev()
            .filter(|n| query.matches(n))
            .take(query.effective_limit())
            .cloned()
            .collect())
    }

    async fn update_flags(
        &self,
        user_id: &str,
        ids: &[Uuid],
        update: FlagUpdate,
    ) -> Result<usize, StoreError> {
        let Some(mut inbox) = self.inboxes.get_mut(user_id) else {
            return Ok(0);
        };

        let mut found = 0;
        for n in inbox.items.iter_mut().filter(|n| ids.contains(&n.id)) {
            update.apply(n);
            found += 1;
        }
        Ok(found)
    }

    async fn get_preferences(
        &self,
        user_id: &str,
    ) -> Result<Option<UserPreferences>, StoreError> {
        Ok(self.preferences.get(user_id).map(|p| p.value().clone()))
    }

    async fn put_preferences(
        &self,
        user_id: &str,
        preferences: &UserPreferences,
    ) -> Result<(), StoreError> {
        self.preferences
            .insert(user_id.to_string(), preferences.clone());
        Ok(())
    }

    async fn list_device_tokens(&self, user_id: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .devices
            .get(user_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn add_device_token(&self, user_id: &str, token: &str) -> Result<bool, StoreError> {
        Ok(self
            .devices
            .entry(user_id.to_string())
            .or_default()
            .insert(token.to_string()))
    }

    async fn remove_device_token(&self, user_id: &str, token: &str) -> Result<bool, StoreError> {
        Ok(self
            .devices
            .get_mut(user_id)
            .map(|mut set| set.remove(token))
            .unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::{Context, NormalizedNotification, Priority, Provider};

    fn new_notification(title: &str, priority: Priority) -> NewNotification {
        NewNotification::new(
            "src-1",
            Provider::Custom,
            Context::Work,
            NormalizedNotification::new(title, "", None, priority),
            serde_json::json!({"title": title}),
        )
    }

    #[tokio::test]
    async fn test_insert_assigns_increasing_timestamps() {
        let store = MemoryStore::new();
        let mut last = None;
        for i in 0..50 {
            let n = store
                .insert_notification("u1", new_notification(&format!("n{}", i), Priority::Normal))
                .await
                .unwrap();
            assert!(!n.read);
            assert!(!n.archived);
            if let Some(prev) = last {
                assert!(n.created_at > prev);
            }
            last = Some(n.created_at);
        }
    }

    #[tokio::test]
    async fn test_query_is_newest_first_with_cursor() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store
                .insert_notification("u1", new_notification(&format!("n{}", i), Priority::Normal))
                .await
                .unwrap();
        }

        let page = store
            .query_notifications(
                "u1",
                &NotificationQuery {
                    limit: 2,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(
            page.iter().map(|n| n.title.as_str()).collect::<Vec<_>>(),
            vec!["n4", "n3"]
        );

        let next = store
            .query_notifications(
                "u1",
                &NotificationQuery {
                    before: Some(page[1].created_at),
                    limit: 2,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(
            next.iter().map(|n| n.title.as_str()).collect::<Vec<_>>(),
            vec!["n2", "n1"]
        );
    }

    #[tokio::test]
    async fn test_users_are_isolated() {
        let store = MemoryStore::new();
        let n = store
            .insert_notification("u1", new_notification("mine", Priority::High))
            .await
            .unwrap();

        assert!(store.get_notification("u2", n.id).await.unwrap().is_none());
        assert_eq!(store.update_flags("u2", &[n.id], FlagUpdate::read(true)).await.unwrap(), 0);
        assert!(!store.get_notification("u1", n.id).await.unwrap().unwrap().read);
    }

    #[tokio::test]
    async fn test_batched_flag_update() {
        let store = MemoryStore::new();
        let a = store
            .insert_notification("u1", new_notification("a", Priority::Normal))
            .await
            .unwrap();
        let b = store
            .insert_notification("u1", new_notification("b", Priority::Normal))
            .await
            .unwrap();

        let updated = store
            .update_flags("u1", &[a.id, b.id, Uuid::new_v4()], FlagUpdate::archived(true))
            .await
            .unwrap();
        assert_eq!(updated, 2);

        let archived = store
            .query_notifications(
                "u1",
                &NotificationQuery {
                    archived: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(archived.len(), 2);
        assert!(archived.iter().all(|n| !n.read));
    }

    #[tokio::test]
    async fn test_token_mappings_by_source() {
        let store = MemoryStore::new();
        let source = Source::new(Provider::Vercel, "Deploys", Context::Work);
        let other = Source::new(Provider::Vercel, "Other", Context::Work);
        assert!(store.create_token(&source.token_mapping("u1")).await.unwrap());
        assert!(store.create_token(&other.token_mapping("u1")).await.unwrap());

        assert_eq!(store.delete_tokens_for_source("u1", &source.id).await.unwrap(), 1);
        assert!(store.get_token(&source.webhook_token).await.unwrap().is_none());
        assert!(store.get_token(&other.webhook_token).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_token_mapping_is_never_overwritten() {
        let store = MemoryStore::new();
        let source = Source::new(Provider::Custom, "Mine", Context::Work);
        assert!(store.create_token(&source.token_mapping("u1")).await.unwrap());

        let mut hijack = source.token_mapping("u2");
        hijack.source_id = "elsewhere".to_string();
        assert!(!store.create_token(&hijack).await.unwrap());

        let mapping = store.get_token(&source.webhook_token).await.unwrap().unwrap();
        assert_eq!(mapping.user_id, "u1");
        assert_eq!(mapping.source_id, source.id);
        assert_eq!(store.delete_tokens_for_source("u2", "elsewhere").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_device_tokens_set_semantics() {
        let store = MemoryStore::new();
        assert!(store.add_device_token("u1", "d1").await.unwrap());
        assert!(!store.add_device_token("u1", "d1").await.unwrap());
        assert!(store.add_device_token("u1", "d2").await.unwrap());
        assert_eq!(store.list_device_tokens("u1").await.unwrap(), vec!["d1", "d2"]);

        assert!(store.remove_device_token("u1", "d1").await.unwrap());
        assert!(!store.remove_device_token("u1", "d1").await.unwrap());
        assert!(!store.remove_device_token("nobody", "d1").await.unwrap());
        assert_eq!(store.list_device_tokens("u1").await.unwrap(), vec!["d2"]);
    }

    #[tokio::test]
    async fn test_source_crud() {
        let store = MemoryStore::new();
        let source = Source::new(Provider::Gcp, "Alerts", Context::Work);
        store.put_source("u1", &source).await.unwrap();

        assert_eq!(store.get_source("u1", &source.id).await.unwrap(), Some(source.clone()));
        assert_eq!(store.list_sources("u1").await.unwrap().len(), 1);
        assert!(store.get_source("u2", &source.id).await.unwrap().is_none());

        assert!(store.delete_source("u1", &source.id).await.unwrap());
        assert!(!store.delete_source("u1", &source.id).await.unwrap());
        assert!(store.list_sources("u1").await.unwrap().is_empty());
    }
}
