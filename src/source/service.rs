use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::store::DocumentStore;

use super::{
    CreateSourceRequest, CreatedSource, DeleteTokenRequest, RegisterTokenRequest, Source,
    SourcePatch, WebhookToken,
};

/// Source lifecycle for the owning user, keeping token mappings in step.
pub struct SourceService {
    store: Arc<dyn DocumentStore>,
}

fn ensure_caller(caller: &str, user_id: &str) -> Result<()> {
    if caller != user_id {
        return Err(AppError::Forbidden(
            "Caller may only manage their own sources".to_string(),
        ));
    }
    Ok(())
}

impl SourceService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self, user_id: &str) -> Result<Vec<Source>> {
        Ok(self.store.list_sources(user_id).await?)
    }

    pub async fn get(&self, user_id: &str, source_id: &str) -> Result<Source> {
        self.store
            .get_source(user_id, source_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Source {} not found", source_id)))
    }

    /// Create a source and register its webhook token. The source is removed
    /// again if the mapping cannot be written, so no source exists without a
    /// routable token.
    #[tracing::instrument(
        name = "sources.create",
        skip(self, request),
        fields(provider = %request.provider)
    )]
    pub async fn create(&self, user_id: &str, request: CreateSourceRequest) -> Result<CreatedSource> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("Source name must not be empty".to_string()));
        }

        let source = Source::new(request.provider, name, request.context);
        self.store.put_source(user_id, &source).await?;

        let registered = match self.store.create_token(&source.token_mapping(user_id)).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(AppError::Internal(
                "Generated webhook token is already registered".to_string(),
            )),
            Err(e) => Err(e.into()),
        };
        if let Err(e) = registered {
            tracing::error!(
                user_id = %user_id,
                source_id = %source.id,
                error = %e,
                "Token registration failed, rolling back source"
            );
            if let Err(rollback) = self.store.delete_source(user_id, &source.id).await {
                tracing::error!(source_id = %source.id, error = %rollback, "Rollback failed");
            }
            return Err(e);
        }

        tracing::info!(user_id = %user_id, source_id = %source.id, "Source created");
        Ok(CreatedSource {
            ingest_path: source.ingest_path(),
            source,
        })
    }

    #[tracing::instrument(name = "sources.update", skip(self, patch))]
    pub async fn update(&self, user_id: &str, source_id: &str, patch: &SourcePatch) -> Result<Source> {
        if matches!(&patch.name, Some(name) if name.trim().is_empty()) {
            return Err(AppError::Validation("Source name must not be empty".to_string()));
        }

        let mut source = self.get(user_id, source_id).await?;
        patch.apply(&mut source);
        self.store.put_source(user_id, &source).await?;
        Ok(source)
    }

    /// Delete a source. Token mappings go first so the old token stops
    /// routing before the source disappears.
    #[tracing::instrument(name = "sources.delete", skip(self))]
    pub async fn delete(&self, user_id: &str, source_id: &str) -> Result<()> {
        // Confirms ownership before touching the global token index
        self.get(user_id, source_id).await?;

        let removed = self.store.delete_tokens_for_source(user_id, source_id).await?;
        self.store.delete_source(user_id, source_id).await?;

        tracing::info!(
            user_id = %user_id,
            source_id = %source_id,
            tokens_removed = removed,
            "Source deleted"
        );
        Ok(())
    }

    /// Register the mapping for a source's own webhook token, e.g. after
    /// `delete_token`. Only the token stored on the source is accepted, so a
    /// source never has more than one live token. Registering an existing
    /// mapping again is a no-op; a token routed elsewhere is a conflict.
    #[tracing::instrument(name = "sources.register_token", skip(self, request))]
    pub async fn register_token(&self, caller: &str, request: RegisterTokenRequest) -> Result<WebhookToken> {
        ensure_caller(caller, &request.user_id)?;
        if request.token.trim().is_empty() {
            return Err(AppError::Validation("Token must not be empty".to_string()));
        }

        let source = self.get(&request.user_id, &request.source_id).await?;
        if source.provider != request.provider {
            return Err(AppError::Validation(format!(
                "Source {} is a {} source, not {}",
                source.id, source.provider, request.provider
            )));
        }
        if source.webhook_token != request.token {
            return Err(AppError::Validation(format!(
                "Token is not the webhook token of source {}",
                source.id
            )));
        }

        let mapping = source.token_mapping(&request.user_id);
        if self.store.create_token(&mapping).await? {
            return Ok(mapping);
        }

        match self.store.get_token(&mapping.token).await? {
            Some(existing)
                if existing.user_id == mapping.user_id && existing.source_id == mapping.source_id =>
            {
                Ok(existing)
            }
            _ => Err(AppError::Conflict(
                "Token is already registered to another source".to_string(),
            )),
        }
    }

    /// Remove every mapping for a source. Returns how many were removed.
    #[tracing::instrument(name = "sources.delete_token", skip(self, request))]
    pub async fn delete_token(&self, caller: &str, request: DeleteTokenRequest) -> Result<usize> {
        ensure_caller(caller, &request.user_id)?;
        Ok(self
            .store
            .delete_tokens_for_source(&request.user_id, &request.source_id)
            .await?)
    }
}
