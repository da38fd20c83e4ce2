use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::Instrument;
use uuid::Uuid;

use super::{IngestError, TokenResolver};
use crate::metrics::IngestMetrics;
use crate::normalizer::NormalizerRegistry;
use crate::notification::{NewNotification, Provider};
use crate::push::PushDispatcher;
use crate::store::DocumentStore;

/// Longest prefix of a rejected body kept in the debug log.
const REJECTED_BODY_LOG_CHARS: usize = 2048;

/// An accepted webhook call.
pub struct Ingested {
    pub notification_id: Uuid,
    /// Detached push dispatch. Dropping the handle does not cancel it.
    pub dispatch: JoinHandle<()>,
}

/// Turns one webhook call into one stored notification plus a push attempt.
pub struct IngestGateway {
    store: Arc<dyn DocumentStore>,
    resolver: TokenResolver,
    registry: Arc<NormalizerRegistry>,
    dispatcher: Arc<PushDispatcher>,
}

impl IngestGateway {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        registry: Arc<NormalizerRegistry>,
        dispatcher: Arc<PushDispatcher>,
    ) -> Self {
        Self {
            resolver: TokenResolver::new(store.clone()),
            store,
            registry,
            dispatcher,
        }
    }

    /// Run the ingestion pipeline. Stages run in a fixed order and the
    /// first failure is terminal. Push dispatch is spawned only after the
    /// notification is persisted and cannot affect the result.
    #[tracing::instrument(
        name = "ingest",
        skip(self, token, body),
        fields(
            user_id = tracing::field::Empty,
            source_id = tracing::field::Empty,
            notification_id = tracing::field::Empty
        )
    )]
    pub async fn ingest(
        &self,
        provider: &str,
        token: Option<&str>,
        body: &[u8],
    ) -> Result<Ingested, IngestError> {
        let result = self.run(provider, token, body).await;
        match &result {
            Ok(_) => IngestMetrics::record_request(provider, "created"),
            Err(e) => IngestMetrics::record_request(provider, e.outcome()),
        }
        result
    }

    async fn run(
        &self,
        provider: &str,
        token: Option<&str>,
        body: &[u8],
    ) -> Result<Ingested, IngestError> {
        let provider: Provider = provider
            .parse()
            .map_err(|_| IngestError::UnknownProvider(provider.to_string()))?;

        let token = token
            .filter(|t| !t.is_empty())
            .ok_or(IngestError::MissingToken)?;

        let resolved = self
            .resolver
            .resolve(token)
            .await?
            .ok_or(IngestError::InvalidToken)?;
        if resolved.provider != provider {
            tracing::debug!(
                token_provider = %resolved.provider,
                "Token registered for a different provider"
            );
            return Err(IngestError::InvalidToken);
        }

        let span = tracing::Span::current();
        span.record("user_id", resolved.user_id.as_str());
        span.record("source_id", resolved.source_id.as_str());

        let source = self
            .store
            .get_source(&resolved.user_id, &resolved.source_id)
            .await?
            .filter(|s| s.enabled)
            .ok_or(IngestError::SourceUnavailable)?;

        let payload: serde_json::Value = serde_json::from_slice(body)
            .map_err(|e| IngestError::MalformedBody(e.to_string()))?;

        let normalized = match self.registry.normalize(provider, &payload) {
            Ok(normalized) => normalized,
            Err(e) => {
                let raw: String = String::from_utf8_lossy(body)
                    .chars()
                    .take(REJECTED_BODY_LOG_CHARS)
                    .collect();
                tracing::debug!(reason = %e.reason, raw = %raw, "Payload rejected");
                return Err(e.into());
            }
        };

        let notification = self
            .store
            .insert_notification(
                &resolved.user_id,
                NewNotification::new(&source.id, provider, source.context, normalized, payload),
            )
            .await?;

        span.record("notification_id", notification.id.to_string().as_str());
        IngestMetrics::record_created(provider, notification.priority);
        tracing::info!(priority = %notification.priority, "Notification created");

        let notification_id = notification.id;
        let dispatcher = self.dispatcher.clone();
        let user_id = resolved.user_id;
        let push_config = source.push_config();
        let dispatch = tokio::spawn(
            async move {
                dispatcher
                    .dispatch(&user_id, &notification, &push_config)
                    .await;
            }
            .instrument(span),
        );

        Ok(Ingested {
            notification_id,
            dispatch,
        })
    }
}
