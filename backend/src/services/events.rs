//! Domain event publishing
//!
//! Services call [`EventPublisher::publish`] after a transaction commits.
//! Publishing never blocks the caller and never fails it: webhook delivery
//! runs on a spawned task and failures are only logged.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;

use crate::config::{EventSinkKind, EventsConfig};
use crate::error::{AppError, AppResult};

pub const SIGNATURE_HEADER: &str = "X-Milk-Signature";

/// Kinds of committed mutations
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    LotGraded,
    LotsAdmitted,
    VerdictApplied,
    TransferCreated,
    TransferDispatched,
    TransferCompleted,
    TransferCancelled,
    SiloAssigned,
    SiloReconciled,
    ContainerOpened,
    BillAggregated,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::LotGraded => "lot_graded",
            EventKind::LotsAdmitted => "lots_admitted",
            EventKind::VerdictApplied => "verdict_applied",
            EventKind::TransferCreated => "transfer_created",
            EventKind::TransferDispatched => "transfer_dispatched",
            EventKind::TransferCompleted => "transfer_completed",
            EventKind::TransferCancelled => "transfer_cancelled",
            EventKind::SiloAssigned => "silo_assigned",
            EventKind::SiloReconciled => "silo_reconciled",
            EventKind::ContainerOpened => "container_opened",
            EventKind::BillAggregated => "bill_aggregated",
        }
    }
}

/// Envelope sent to sinks
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub kind: EventKind,
    pub occurred_at: DateTime<Utc>,
    pub payload: serde_json::Value,
}

/// HTTP sink posting signed JSON envelopes
#[derive(Clone)]
pub struct WebhookSink {
    url: String,
    secret: Option<String>,
    http_client: reqwest::Client,
}

impl WebhookSink {
    pub fn new(url: String, secret: Option<String>) -> Self {
        Self {
            url,
            secret,
            http_client: reqwest::Client::new(),
        }
    }

    /// POST one event
    pub async fn send(&self, event: &Event) -> Result<(), String> {
        let body = serde_json::to_vec(event).map_err(|e| format!("Failed to encode event: {}", e))?;

        let mut request = self
            .http_client
            .post(&self.url)
            .header("Content-Type", "application/json");
        if let Some(secret) = &self.secret {
            request = request.header(SIGNATURE_HEADER, sign_payload(secret, &body)?);
        }

        let response = request
            .body(body)
            .send()
            .await
            .map_err(|e| format!("Failed to deliver event: {}", e))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(format!("Webhook responded with {}", response.status()))
        }
    }
}

/// Base64 HMAC-SHA256 of a request body
pub fn sign_payload(secret: &str, body: &[u8]) -> Result<String, String> {
    type HmacSha256 = Hmac<Sha256>;
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| "Failed to create HMAC")?;
    mac.update(body);
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

#[derive(Clone)]
enum Sink {
    Log,
    Webhook(WebhookSink),
}

/// Fire-and-forget event sink shared through `AppState`
#[derive(Clone)]
pub struct EventPublisher {
    sink: Sink,
}

impl EventPublisher {
    /// Publisher that only writes events to the trace log
    pub fn log_only() -> Self {
        Self { sink: Sink::Log }
    }

    pub fn from_config(config: &EventsConfig) -> AppResult<Self> {
        let sink = match config.sink {
            EventSinkKind::Log => Sink::Log,
            EventSinkKind::Webhook => {
                let url = config.webhook_url.clone().ok_or_else(|| {
                    AppError::Configuration("events.webhook_url is not set".to_string())
                })?;
                Sink::Webhook(WebhookSink::new(url, config.webhook_secret.clone()))
            }
        };
        Ok(Self { sink })
    }

    /// Publish one event. Never blocks and never fails the caller.
    pub fn publish<P: Serialize>(&self, kind: EventKind, payload: P) {
        let payload = match serde_json::to_value(payload) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(event = kind.as_str(), "Dropping event with bad payload: {}", e);
                return;
            }
        };
        let event = Event {
            kind,
            occurred_at: Utc::now(),
            payload,
        };

        match &self.sink {
            Sink::Log => {
                tracing::info!(event = kind.as_str(), payload = %event.payload, "Domain event");
            }
            Sink::Webhook(webhook) => {
                let Ok(runtime) = tokio::runtime::Handle::try_current() else {
                    tracing::warn!(event = kind.as_str(), "No runtime to deliver event");
                    return;
                };
                let webhook = webhook.clone();
                runtime.spawn(async move {
                    if let Err(e) = webhook.send(&event).await {
                        tracing::warn!(event = event.kind.as_str(), "Event delivery failed: {}", e);
                    }
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_matches_known_vector() {
        let signature =
            sign_payload("key", b"The quick brown fox jumps over the lazy dog").unwrap();
        assert_eq!(signature, "97yD9DBThCSxMpjmqm+xQ+9NWaFJRhdZl0edvC0aPNg=");
    }

    #[test]
    fn event_kind_serializes_snake_case() {
        let event = Event {
            kind: EventKind::VerdictApplied,
            occurred_at: Utc::now(),
            payload: serde_json::json!({ "affected_lots": 3 }),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "verdict_applied");
        assert_eq!(json["payload"]["affected_lots"], 3);
    }

    #[test]
    fn webhook_config_requires_url() {
        let config = EventsConfig {
            sink: EventSinkKind::Webhook,
            webhook_url: None,
            webhook_secret: None,
        };
        assert!(EventPublisher::from_config(&config).is_err());
    }

    #[test]
    fn publish_outside_runtime_is_harmless() {
        let publisher = EventPublisher::from_config(&EventsConfig {
            sink: EventSinkKind::Webhook,
            webhook_url: Some("http://127.0.0.1:9/hooks".to_string()),
            webhook_secret: Some("secret".to_string()),
        })
        .unwrap();
        publisher.publish(EventKind::SiloReconciled, serde_json::json!({ "silo_id": "x" }));
        EventPublisher::log_only().publish(EventKind::LotGraded, ());
    }
}
