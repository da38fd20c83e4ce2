use std::sync::Arc;

use crate::notification::Provider;
use crate::store::{DocumentStore, StoreError};

/// Identity a webhook token routes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedToken {
    pub user_id: String,
    pub source_id: String,
    pub provider: Provider,
}

/// Point lookup of webhook tokens. Never generates tokens.
pub struct TokenResolver {
    store: Arc<dyn DocumentStore>,
}

impl TokenResolver {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn resolve(&self, token: &str) -> Result<Option<ResolvedToken>, StoreError> {
        Ok(self.store.get_token(token).await?.map(|mapping| ResolvedToken {
            user_id: mapping.user_id,
            source_id: mapping.source_id,
            provider: mapping.provider,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::WebhookToken;
    use crate::store::MemoryStore;
    use chrono::Utc;

    #[tokio::test]
    async fn test_resolve() {
        let store = Arc::new(MemoryStore::new());
        store
            .create_token(&WebhookToken {
                token: "t1".to_string(),
                user_id: "u1".to_string(),
                source_id: "s1".to_string(),
                provider: Provider::Gcp,
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        let resolver = TokenResolver::new(store);
        assert_eq!(
            resolver.resolve("t1").await.unwrap(),
            Some(ResolvedToken {
                user_id: "u1".to_string(),
                source_id: "s1".to_string(),
                provider: Provider::Gcp,
            })
        );
        assert_eq!(resolver.resolve("t2").await.unwrap(), None);
    }
}
