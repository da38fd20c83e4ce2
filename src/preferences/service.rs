use std::sync::Arc;

use crate::error::Result;
use crate::store::DocumentStore;

use super::{PreferencesPatch, UserPreferences};

pub struct PreferencesService {
    store: Arc<dyn DocumentStore>,
}

impl PreferencesService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Current preferences, writing the defaults on first read.
    #[tracing::instrument(name = "preferences.get", skip(self))]
    pub async fn get(&self, user_id: &str) -> Result<UserPreferences> {
        if let Some(prefs) = self.store.get_preferences(user_id).await? {
            return Ok(prefs);
        }

        let prefs = UserPreferences::default();
        self.store.put_preferences(user_id, &prefs).await?;
        tracing::debug!(user_id = %user_id, "Created default preferences");
        Ok(prefs)
    }

    #[tracing::instrument(name = "preferences.update", skip(self, patch))]
    pub async fn update(&self, user_id: &str, patch: &PreferencesPatch) -> Result<UserPreferences> {
        let current = self.get(user_id).await?;
        let merged = patch.merge(&current)?;
        self.store.put_preferences(user_id, &merged).await?;
        Ok(merged)
    }
}
