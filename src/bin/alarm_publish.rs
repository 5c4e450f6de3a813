//! Publish one raw alarm payload to the alarm topic
//!
//! Usage:
//!   alarm_publish [payload.json]      (reads stdin when no file is given)
//!
//! Uses the same MQTT_* environment variables as the monitor. The payload is
//! sent as-is; it is checked to be JSON first so typos fail locally.

use alarm_monitor::{
    transport::{self, ExponentialBackoff, MessageSink},
    MqttPublisher, Publisher, RuntimeConfig,
};
use std::{io::Read, sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;

/// Nothing is subscribed; inbound payloads are not expected
struct Discard;

impl MessageSink for Discard {
    fn on_message(&self, payload: &[u8]) {
        log::debug!("Ignoring {} byte inbound message", payload.len());
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    let config = RuntimeConfig::from_env()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.rust_log))
        .target(env_logger::Target::Stderr)
        .init();

    let payload = match std::env::args().nth(1) {
        Some(path) => std::fs::read(&path)?,
        None => {
            let mut buffer = Vec::new();
            std::io::stdin().read_to_end(&mut buffer)?;
            buffer
        }
    };

    serde_json::from_slice::<serde_json::Value>(&payload)?;

    let session = transport::connect(&config).await?;
    let publisher = Publisher::new(
        Arc::new(MqttPublisher::for_session(&session)),
        config.publish_timeout,
    );

    let cancel = CancellationToken::new();
    let transport_handle = tokio::spawn(transport::run_event_loop(
        session,
        config.topic.clone(),
        Arc::new(Discard),
        cancel.clone(),
        ExponentialBackoff::new(Duration::from_millis(100), Duration::from_secs(1), 0),
    ));

    let result = publisher.publish(&config.topic, &payload).await;

    // Disconnects on the way out
    cancel.cancel();
    transport_handle.await?;

    result?;
    log::info!("✅ Published {} bytes on {}", payload.len(), config.topic);
    Ok(())
}
