use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use super::quiet_hours::is_quiet_at;
use super::transport::{
    DeliveryOutcome, DeliveryReport, PushData, PushMessage, PushTransport, TransportError, Urgency,
};
use crate::config::PushConfig;
use crate::metrics::PushMetrics;
use crate::notification::{Notification, Priority};
use crate::preferences::UserPreferences;
use crate::source::SourcePushConfig;
use crate::store::DocumentStore;

/// Why a push was not sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    LowPriority,
    Muted,
    SourcePushDisabled,
    QuietHours,
}

impl SuppressReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuppressReason::LowPriority => "low_priority",
            SuppressReason::Muted => "muted",
            SuppressReason::SourcePushDisabled => "source_push_disabled",
            SuppressReason::QuietHours => "quiet_hours",
        }
    }
}

/// Result of one dispatch, for logging, metrics and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchDecision {
    NoDevices,
    Suppressed(SuppressReason),
    /// Policy allowed the push but no transport is configured
    Disabled,
    Sent {
        delivered: usize,
        invalid_removed: usize,
        transient: usize,
    },
    Failed(String),
}

impl DispatchDecision {
    pub fn label(&self) -> &'static str {
        match self {
            DispatchDecision::NoDevices => "no_devices",
            DispatchDecision::Suppressed(reason) => reason.as_str(),
            DispatchDecision::Disabled => "disabled",
            DispatchDecision::Sent { .. } => "sent",
            DispatchDecision::Failed(_) => "failed",
        }
    }
}

/// Decide whether a push for `priority` must be held back.
///
/// Rules apply in order and the first match wins. Low never pushes; critical
/// bypasses everything else.
pub fn suppression(
    priority: Priority,
    prefs: &UserPreferences,
    source: &SourcePushConfig,
    now: DateTime<Utc>,
) -> Option<SuppressReason> {
    if priority == Priority::Low {
        return Some(SuppressReason::LowPriority);
    }
    if priority == Priority::Critical {
        return None;
    }
    if prefs.push_muted {
        return Some(SuppressReason::Muted);
    }
    if !source.push_enabled {
        return Some(SuppressReason::SourcePushDisabled);
    }
    if is_quiet_at(prefs, now) {
        return Some(SuppressReason::QuietHours);
    }
    None
}

/// Best-effort push delivery for freshly ingested notifications.
///
/// Never returns an error: every failure is logged and reported as a
/// [`DispatchDecision`].
pub struct PushDispatcher {
    store: Arc<dyn DocumentStore>,
    transport: Option<Arc<dyn PushTransport>>,
    icon: Option<String>,
    badge: Option<String>,
    default_url: String,
    timeout: Duration,
    clock: fn() -> DateTime<Utc>,
}

impl PushDispatcher {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        transport: Option<Arc<dyn PushTransport>>,
        config: &PushConfig,
    ) -> Self {
        Self {
            store,
            transport,
            icon: config.icon.clone(),
            badge: config.badge.clone(),
            default_url: config.default_url.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
            clock: Utc::now,
        }
    }

    /// Replace the wall clock used for quiet hours.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    #[tracing::instrument(
        name = "push.dispatch",
        skip(self, user_id, notification, source),
        fields(
            user_id = %user_id,
            notification_id = %notification.id,
            provider = %notification.provider,
            decision = tracing::field::Empty
        )
    )]
    pub async fn dispatch(
        &self,
        user_id: &str,
        notification: &Notification,
        source: &SourcePushConfig,
    ) -> DispatchDecision {
        let decision = self.decide_and_send(user_id, notification, source).await;

        tracing::Span::current().record("decision", decision.label());
        PushMetrics::record_decision(decision.label());
        match &decision {
            DispatchDecision::Failed(reason) => {
                tracing::warn!(reason = %reason, "Push dispatch failed")
            }
            DispatchDecision::Sent {
                delivered,
                invalid_removed,
                transient,
            } => tracing::info!(
                delivered = delivered,
                invalid_removed = invalid_removed,
                transient = transient,
                "Push sent"
            ),
            other => tracing::debug!(decision = other.label(), "Push not sent"),
        }
        decision
    }

    async fn decide_and_send(
        &self,
        user_id: &str,
        notification: &Notification,
        source: &SourcePushConfig,
    ) -> DispatchDecision {
        let tokens = match self.store.list_device_tokens(user_id).await {
            Ok(tokens) if tokens.is_empty() => return DispatchDecision::NoDevices,
            Ok(tokens) => tokens,
            Err(e) => return DispatchDecision::Failed(format!("loading devices: {}", e)),
        };

        let prefs = match self.store.get_preferences(user_id).await {
            Ok(prefs) => prefs.unwrap_or_default(),
            Err(e) => return DispatchDecision::Failed(format!("loading preferences: {}", e)),
        };

        let priority = source
            .push_priority_override
            .unwrap_or(notification.priority);
        if let Some(reason) = suppression(priority, &prefs, source, (self.clock)()) {
            return DispatchDecision::Suppressed(reason);
        }

        let Some(transport) = &self.transport else {
            return DispatchDecision::Disabled;
        };

        let message = self.build_message(notification, priority);
        let started = Instant::now();
        let sent = tokio::time::timeout(self.timeout, transport.send_multicast(&message, &tokens))
            .await
            .unwrap_or(Err(TransportError::Timeout));
        PushMetrics::observe_send_latency(started.elapsed().as_secs_f64());

        match sent {
            Ok(reports) => self.reconcile(user_id, &reports).await,
            Err(e) => DispatchDecision::Failed(format!("{} transport: {}", transport.name(), e)),
        }
    }

    fn build_message(&self, notification: &Notification, priority: Priority) -> PushMessage {
        let critical = priority == Priority::Critical;
        PushMessage {
            title: notification.title.clone(),
            body: notification.body.clone(),
            icon: self.icon.clone(),
            badge: self.badge.clone(),
            tag: format!("{}-{}", notification.provider, notification.id),
            require_interaction: critical,
            urgency: if critical { Urgency::High } else { Urgency::Normal },
            data: PushData {
                url: notification
                    .url
                    .clone()
                    .unwrap_or_else(|| self.default_url.clone()),
                notification_id: notification.id,
                priority,
            },
        }
    }

    /// Drop permanently invalid tokens. Transient failures are left alone;
    /// the next notification retries them naturally.
    async fn reconcile(&self, user_id: &str, reports: &[DeliveryReport]) -> DispatchDecision {
        let mut delivered = 0;
        let mut invalid = 0;
        let mut invalid_removed = 0;
        let mut transient = 0;

        for report in reports {
            match &report.outcome {
                DeliveryOutcome::Delivered => delivered += 1,
                DeliveryOutcome::Transient(reason) => {
                    transient += 1;
                    tracing::debug!(reason = %reason, "Transient push failure");
                }
                DeliveryOutcome::Invalid(reason) => {
                    invalid += 1;
                    match self.store.remove_device_token(user_id, &report.token).await {
                        Ok(true) => {
                            invalid_removed += 1;
                            tracing::info!(reason = %reason, "Removed stale device token");
                        }
                        // A concurrent dispatch got there first
                        Ok(false) => {}
                        Err(e) => tracing::warn!(error = %e, "Failed to remove stale device token"),
                    }
                }
            }
        }

        PushMetrics::record_deliveries(delivered as u64, invalid as u64, transient as u64);
        PushMetrics::record_stale_removed(invalid_removed as u64);

        DispatchDecision::Sent {
            delivered,
            invalid_removed,
            transient,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::{Context, NewNotification, NormalizedNotification, Provider};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<(PushMessage, Vec<String>)>>,
        outcomes: HashMap<String, DeliveryOutcome>,
        delay: Option<Duration>,
    }

    impl RecordingTransport {
        fn calls(&self) -> usize {
            self.sent.lock().unwrap().len()
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
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.sent
                .lock()
                .unwrap()
                .push((message.clone(), tokens.to_vec()));
            Ok(tokens
                .iter()
                .map(|t| DeliveryReport {
                    token: t.clone(),
                    outcome: self
                        .outcomes
                        .get(t)
                        .cloned()
                        .unwrap_or(DeliveryOutcome::Delivered),
                })
                .collect())
        }
    }

    fn night() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 23, 0, 0).unwrap()
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
    }

    fn quiet_prefs() -> UserPreferences {
        UserPreferences {
            quiet_hours_start: Some("22:00".to_string()),
            quiet_hours_end: Some("07:00".to_string()),
            ..Default::default()
        }
    }

    fn notification(priority: Priority, url: Option<&str>) -> Notification {
        NewNotification::new(
            "src-1",
            Provider::Updown,
            Context::Work,
            NormalizedNotification::new("api is down", "Check failed", url.map(String::from), priority),
            serde_json::json!({}),
        )
        .into_notification(noon())
    }

    async fn setup(
        transport: RecordingTransport,
        devices: &[&str],
        prefs: Option<UserPreferences>,
    ) -> (Arc<MemoryStore>, Arc<RecordingTransport>, PushDispatcher) {
        let store = Arc::new(MemoryStore::new());
        for device in devices {
            store.add_device_token("u1", device).await.unwrap();
        }
        if let Some(prefs) = prefs {
            store.put_preferences("u1", &prefs).await.unwrap();
        }
        let transport = Arc::new(transport);
        let dyn_transport: Arc<dyn PushTransport> = transport.clone();
        let dispatcher = PushDispatcher::new(
            store.clone(),
            Some(dyn_transport),
            &PushConfig {
                timeout_ms: 100,
                ..Default::default()
            },
        );
        (store, transport, dispatcher)
    }

    #[test]
    fn test_low_priority_always_suppressed() {
        let prefs = UserPreferences::default();
        let source = SourcePushConfig::default();
        assert_eq!(
            suppression(Priority::Low, &prefs, &source, noon()),
            Some(SuppressReason::LowPriority)
        );
    }

    #[test]
    fn test_critical_bypasses_everything() {
        let prefs = UserPreferences {
            push_muted: true,
            ..quiet_prefs()
        };
        let source = SourcePushConfig {
            push_enabled: false,
            push_priority_override: None,
        };
        assert_eq!(suppression(Priority::Critical, &prefs, &source, night()), None);
    }

    #[test]
    fn test_rules_apply_in_order() {
        let muted_quiet = UserPreferences {
            push_muted: true,
            ..quiet_prefs()
        };
        let disabled = SourcePushConfig {
            push_enabled: false,
            push_priority_override: None,
        };
        assert_eq!(
            suppression(Priority::High, &muted_quiet, &disabled, night()),
            Some(SuppressReason::Muted)
        );
        assert_eq!(
            suppression(Priority::High, &quiet_prefs(), &disabled, night()),
            Some(SuppressReason::SourcePushDisabled)
        );
        assert_eq!(
            suppression(Priority::Normal, &quiet_prefs(), &SourcePushConfig::default(), night()),
            Some(SuppressReason::QuietHours)
        );
        assert_eq!(
            suppression(Priority::High, &quiet_prefs(), &SourcePushConfig::default(), noon()),
            None
        );
    }

    #[tokio::test]
    async fn test_no_devices_stops_early() {
        let (_, transport, dispatcher) = setup(RecordingTransport::default(), &[], None).await;
        let decision = dispatcher
            .dispatch("u1", &notification(Priority::Critical, None), &SourcePushConfig::default())
            .await;
        assert_eq!(decision, DispatchDecision::NoDevices);
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_critical_message_shape() {
        let (_, transport, dispatcher) =
            setup(RecordingTransport::default(), &["d1", "d2"], Some(quiet_prefs())).await;
        let dispatcher = dispatcher.with_clock(night);
        let n = notification(Priority::Critical, None);

        let decision = dispatcher.dispatch("u1", &n, &SourcePushConfig::default()).await;
        assert_eq!(
            decision,
            DispatchDecision::Sent {
                delivered: 2,
                invalid_removed: 0,
                transient: 0
            }
        );

        let sent = transport.sent.lock().unwrap();
        let (message, tokens) = &sent[0];
        assert_eq!(tokens.len(), 2);
        assert!(message.require_interaction);
        assert_eq!(message.urgency, Urgency::High);
        assert_eq!(message.tag, format!("updown-{}", n.id));
        assert_eq!(message.data.url, "/");
        assert_eq!(message.data.notification_id, n.id);
    }

    #[tokio::test]
    async fn test_override_changes_effective_priority() {
        let (_, transport, dispatcher) =
            setup(RecordingTransport::default(), &["d1"], None).await;
        let source = SourcePushConfig {
            push_enabled: true,
            push_priority_override: Some(Priority::Low),
        };
        let decision = dispatcher
            .dispatch("u1", &notification(Priority::Critical, None), &source)
            .await;
        assert_eq!(decision, DispatchDecision::Suppressed(SuppressReason::LowPriority));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_normal_uses_notification_url_and_normal_urgency() {
        let (_, transport, dispatcher) =
            setup(RecordingTransport::default(), &["d1"], None).await;
        dispatcher
            .dispatch(
                "u1",
                &notification(Priority::Normal, Some("https://example.com/x")),
                &SourcePushConfig::default(),
            )
            .await;

        let sent = transport.sent.lock().unwrap();
        assert!(!sent[0].0.require_interaction);
        assert_eq!(sent[0].0.urgency, Urgency::Normal);
        assert_eq!(sent[0].0.data.url, "https://example.com/x");
    }

    #[tokio::test]
    async fn test_invalid_tokens_removed_transient_kept() {
        let transport = RecordingTransport {
            outcomes: HashMap::from([
                ("gone".to_string(), DeliveryOutcome::Invalid("NotRegistered".to_string())),
                ("flaky".to_string(), DeliveryOutcome::Transient("Unavailable".to_string())),
            ]),
            ..Default::default()
        };
        let (store, _, dispatcher) = setup(transport, &["ok", "gone", "flaky"], None).await;

        let decision = dispatcher
            .dispatch("u1", &notification(Priority::High, None), &SourcePushConfig::default())
            .await;
        assert_eq!(
            decision,
            DispatchDecision::Sent {
                delivered: 1,
                invalid_removed: 1,
                transient: 1
            }
        );

        let mut remaining = store.list_device_tokens("u1").await.unwrap();
        remaining.sort();
        assert_eq!(remaining, vec!["flaky".to_string(), "ok".to_string()]);
    }

    #[tokio::test]
    async fn test_timeout_is_a_failure() {
        let transport = RecordingTransport {
            delay: Some(Duration::from_secs(5)),
            ..Default::default()
        };
        let (store, _, dispatcher) = setup(transport, &["d1"], None).await;

        let decision = dispatcher
            .dispatch("u1", &notification(Priority::Critical, None), &SourcePushConfig::default())
            .await;
        assert!(matches!(decision, DispatchDecision::Failed(_)));
        assert_eq!(store.list_device_tokens("u1").await.unwrap(), vec!["d1".to_string()]);
    }

    #[tokio::test]
    async fn test_without_transport_policy_still_runs() {
        let store = Arc::new(MemoryStore::new());
        store.add_device_token("u1", "d1").await.unwrap();
        let dispatcher = PushDispatcher::new(store, None, &PushConfig::default());

        assert_eq!(
            dispatcher
                .dispatch("u1", &notification(Priority::Low, None), &SourcePushConfig::default())
                .await,
            DispatchDecision::Suppressed(SuppressReason::LowPriority)
        );
        assert_eq!(
            dispatcher
                .dispatch("u1", &notification(Priority::High, None), &SourcePushConfig::default())
                .await,
            DispatchDecision::Disabled
        );
    }
}
