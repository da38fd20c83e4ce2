use std::sync::Arc;
use std::time::Instant;

use crate::auth::JwtValidator;
use crate::config::Settings;
use crate::ingest::IngestGateway;
use crate::normalizer::NormalizerRegistry;
use crate::preferences::PreferencesService;
use crate::push::{HttpPushTransport, PushDispatcher, PushTransport, TransportError};
use crate::source::SourceService;
use crate::store::{create_store, DocumentStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Push transport: {0}")]
    Transport(#[from] TransportError),
}

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub jwt_validator: Arc<JwtValidator>,
    pub store: Arc<dyn DocumentStore>,
    pub gateway: Arc<IngestGateway>,
    pub sources: Arc<SourceService>,
    pub preferences: Arc<PreferencesService>,
    pub start_time: Instant,
}

impl AppState {
    /// Build the state from configuration: store backend from `store`, and an
    /// HTTP push transport when `push.enabled` is set.
    pub fn new(settings: Settings) -> Result<Self, StartupError> {
        let store = create_store(&settings.store)?;
        let transport: Option<Arc<dyn PushTransport>> = if settings.push.enabled {
            Some(Arc::new(HttpPushTransport::new(&settings.push)?))
        } else {
            tracing::info!("Push delivery disabled");
            None
        };
        Ok(Self::from_parts(settings, store, transport))
    }

    /// Build the state around an existing store and transport.
    pub fn from_parts(
        settings: Settings,
        store: Arc<dyn DocumentStore>,
        transport: Option<Arc<dyn PushTransport>>,
    ) -> Self {
        let dispatcher = Arc::new(PushDispatcher::new(store.clone(), transport, &settings.push));
        Self::with_dispatcher(settings, store, dispatcher)
    }

    /// Build the state around a preconfigured dispatcher.
    pub fn with_dispatcher(
        settings: Settings,
        store: Arc<dyn DocumentStore>,
        dispatcher: Arc<PushDispatcher>,
    ) -> Self {
        let jwt_validator = Arc::new(JwtValidator::new(&settings.jwt));
        let gateway = Arc::new(IngestGateway::new(
            store.clone(),
            Arc::new(NormalizerRegistry::new()),
            dispatcher,
        ));

        Self {
            settings: Arc::new(settings),
            jwt_validator,
            sources: Arc::new(SourceService::new(store.clone())),
            preferences: Arc::new(PreferencesService::new(store.clone())),
            store,
            gateway,
            start_time: Instant::now(),
        }
    }
}
