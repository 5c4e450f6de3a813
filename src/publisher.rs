//! Outbound alarm publishing
//!
//! Best-effort, at-most-once from the caller's point of view: a publish that
//! is not acknowledged by the broker within the configured timeout is logged
//! and reported, never retried.

use {
    crate::transport::{MqttSession, PublishAcks},
    async_trait::async_trait,
    rumqttc::AsyncClient,
    serde::Serialize,
    std::{sync::Arc, time::Duration},
};

#[derive(Debug)]
pub enum PublishError {
    Timeout(Duration),
    Transport(String),
    Encode(serde_json::Error),
}

impl std::fmt::Display for PublishError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PublishError::Timeout(timeout) => {
                write!(f, "Timeout exceeded during publishing ({}ms)", timeout.as_millis())
            }
            PublishError::Transport(msg) => write!(f, "Transport error: {}", msg),
            PublishError::Encode(e) => write!(f, "Encoding error: {}", e),
        }
    }
}

impl std::error::Error for PublishError {}

impl From<serde_json::Error> for PublishError {
    fn from(err: serde_json::Error) -> Self {
        PublishError::Encode(err)
    }
}

/// A sink for outbound payloads
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Resolves once the payload has been acknowledged as delivered
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), PublishError>;
}

/// Publishes through a connected `rumqttc` client at QoS 1, not retained
///
/// Completes on the broker's PUBACK, so the session's event loop must be
/// running (see `transport::run_event_loop`).
pub struct MqttPublisher {
    client: AsyncClient,
    acks: Arc<PublishAcks>,
}

impl MqttPublisher {
    pub fn new(client: AsyncClient, acks: Arc<PublishAcks>) -> Self {
        Self { client, acks }
    }

    pub fn for_session(session: &MqttSession) -> Self {
        Self::new(session.client.clone(), session.acks.clone())
    }
}

#[async_trait]
impl EventPublisher for MqttPublisher {
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), PublishError> {
        let ack = self
            .acks
            .submit(&self.client, topic, payload)
            .map_err(|e| PublishError::Transport(e.to_string()))?;

        ack.await
            .map_err(|_| PublishError::Transport("connection lost before PUBACK".to_string()))
    }
}

/// Start-up connectivity probe
#[derive(Debug, Serialize)]
pub struct ProbeMessage {
    pub message: String,
    pub client_id: String,
    pub tm: String,
}

impl ProbeMessage {
    pub fn new(client_id: &str) -> Self {
        Self {
            message: "alarm-monitor test message".to_string(),
            client_id: client_id.to_string(),
            tm: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        }
    }
}

/// Timeout-bounded publisher
#[derive(Clone)]
pub struct Publisher {
    inner: Arc<dyn EventPublisher>,
    timeout: Duration,
}

impl Publisher {
    pub fn new(inner: Arc<dyn EventPublisher>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), PublishError> {
        let result = match tokio::time::timeout(self.timeout, self.inner.publish(topic, payload)).await {
            Ok(result) => result,
            Err(_) => Err(PublishError::Timeout(self.timeout)),
        };

        match &result {
            Ok(()) => log::debug!("Published {} bytes on {}", payload.len(), topic),
            Err(e) => log::error!(
                "❌ Publish on {} failed: {} (event: {})",
                topic,
                e,
                String::from_utf8_lossy(payload)
            ),
        }

        result
    }

    pub async fn publish_probe(&self, topic: &str, client_id: &str) -> Result<(), PublishError> {
        let payload = serde_json::to_vec(&ProbeMessage::new(client_id))?;
        self.publish(topic, &payload).await?;
        log::info!("Probe message sent on topic {}", topic);
        Ok(())
    }
}
