//! Shared harness for integration tests: in-memory store, recording push
//! transport and helpers for driving the router.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tower::ServiceExt;

use funnel_service::config::{
    JwtConfig, LogConfig, OtelConfig, PushConfig, ServerConfig, Settings, StoreConfig,
};
use funnel_service::push::{
    DeliveryOutcome, DeliveryReport, PushDispatcher, PushMessage, PushTransport, TransportError,
};
use funnel_service::server::{create_app, AppState};
use funnel_service::store::{DocumentStore, MemoryStore};

pub const JWT_SECRET: &str = "integration-test-secret";

/// Records every multicast; tokens listed in `invalid` are reported as
/// unregistered.
#[derive(Default)]
pub struct RecordingTransport {
    pub sent: Mutex<Vec<(PushMessage, Vec<String>)>>,
    pub invalid: HashSet<String>,
}

impl RecordingTransport {
    pub fn with_invalid(tokens: &[&str]) -> Self {
        Self {
            invalid: tokens.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<(PushMessage, Vec<String>)> {
        self.sent.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl PushTransport for RecordingTransport {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn send_multicast(
        &self,
        message: &PushMessage,
        tokens: &[String],
    ) -> Result<Vec<DeliveryReport>, TransportError> {
        self.sent
            .lock()
            .unwrap()
            .push((message.clone(), tokens.to_vec()));
        Ok(tokens
            .iter()
            .map(|t| DeliveryReport {
                token: t.clone(),
                outcome: if self.invalid.contains(t) {
                    DeliveryOutcome::Invalid("NotRegistered".to_string())
                } else {
                    DeliveryOutcome::Delivered
                },
            })
            .collect())
    }
}

pub fn settings() -> Settings {
    Settings {
        server: ServerConfig::default(),
        jwt: JwtConfig {
            secret: JWT_SECRET.to_string(),
            issuer: None,
            audience: None,
        },
        store: StoreConfig::default(),
        push: PushConfig {
            enabled: true,
            timeout_ms: 1000,
            ..Default::default()
        },
        otel: OtelConfig::default(),
        log: LogConfig::default(),
    }
}

/// 23:00 UTC, inside a 22:00-07:00 quiet window.
pub fn night() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 23, 0, 0).unwrap()
}

/// 12:00 UTC, outside a 22:00-07:00 quiet window.
pub fn noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    pub store: Arc<dyn DocumentStore>,
    pub transport: Arc<RecordingTransport>,
}

pub fn spawn_app() -> TestApp {
    spawn_app_with(RecordingTransport::default(), noon)
}

pub fn spawn_app_with(transport: RecordingTransport, clock: fn() -> DateTime<Utc>) -> TestApp {
    let settings = settings();
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
    let transport = Arc::new(transport);
    let dyn_transport: Arc<dyn PushTransport> = transport.clone();
    let dispatcher = Arc::new(
        PushDispatcher::new(store.clone(), Some(dyn_transport), &settings.push).with_clock(clock),
    );
    let state = AppState::with_dispatcher(settings, store.clone(), dispatcher);

    TestApp {
        router: create_app(state.clone()),
        state,
        store,
        transport,
    }
}

pub fn bearer(user_id: &str) -> String {
    let exp = Utc::now().timestamp() + 3600;
    let token = encode(
        &Header::default(),
        &json!({"sub": user_id, "exp": exp}),
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap();
    format!("Bearer {}", token)
}

impl TestApp {
    /// Send a request and decode the JSON body (Null when empty).
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        user: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(header::AUTHORIZATION, bearer(user));
        }
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(serde_json::to_vec(&value).unwrap())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    /// POST a raw webhook body.
    pub async fn post_webhook(&self, uri: &str, body: &str) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    /// Create a source through the API; returns (source id, webhook token).
    pub async fn create_source(&self, user: &str, provider: &str) -> (String, String) {
        let (status, body) = self
            .request(
                "POST",
                "/api/v1/sources",
                Some(user),
                Some(json!({"provider": provider, "name": "Prod", "context": "work"})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        (
            body["id"].as_str().unwrap().to_string(),
            body["webhookToken"].as_str().unwrap().to_string(),
        )
    }

    /// Wait until the transport has seen `n` sends, or give up after a second.
    pub async fn wait_for_sends(&self, n: usize) -> bool {
        for _ in 0..100 {
            if self.transport.calls() >= n {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }
}
