//! Broker transport
//!
//! MQTT plumbing around `rumqttc`: connection set-up, the delivery loop that
//! hands payloads to a `MessageSink` and completes PUBACK waiters, reconnect
//! backoff and orderly disconnect on cancellation.

pub mod acks;
pub mod backoff;
pub mod mqtt;

pub use acks::PublishAcks;
pub use backoff::{ExponentialBackoff, MaxRetriesExceeded};
pub use mqtt::{connect, disconnect, run_event_loop, MqttSession};

/// Receiver of raw inbound payloads
///
/// Called synchronously on the transport's delivery task, once per message.
pub trait MessageSink: Send + Sync {
    fn on_message(&self, payload: &[u8]);
}

#[derive(Debug)]
pub enum TransportError {
    Connect(String),
    Refused(String),
    Timeout,
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Connect(msg) => write!(f, "Error connecting to mqtt broker: {}", msg),
            TransportError::Refused(code) => write!(f, "Mqtt broker refused connection: {}", code),
            TransportError::Timeout => write!(f, "Timed out waiting for mqtt broker"),
        }
    }
}

impl std::error::Error for TransportError {}
