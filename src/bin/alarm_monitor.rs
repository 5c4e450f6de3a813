//! Alarm Monitor - live terminal dashboard
//!
//! Subscribes to the alarm topic, aggregates per-equipment counts and renders
//! them until Esc / Ctrl+C (or SIGINT / SIGTERM).
//!
//! Environment variables (see `RuntimeConfig::from_env` for the full list):
//!   MQTT_HOST - broker host (required)
//!   MQTT_PORT - broker port (default: 8883)
//!   MQTT_TOPIC - alarm topic (default: UAS)
//!   ALARM_LOG_PATH - log file (default: alarm-monitor.log)

use alarm_monitor::{
    logging,
    shutdown,
    transport::{self, ExponentialBackoff, MessageSink},
    ui::{self, Presenter, TerminalSurface},
    Aggregator, IngestionAdapter, MqttPublisher, Publisher, RuntimeConfig,
};
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// How long shutdown waits for the transport task to disconnect
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    let config = RuntimeConfig::from_env()?;

    // stdout belongs to the dashboard, so logs go to a file
    logging::init_file_logger(&config.log_path, &config.rust_log)?;

    log::info!("🚀 Starting Alarm Monitor...");
    log::info!("📊 Configuration:");
    log::info!("   Broker: {}:{} (tls: {})", config.mqtt_host, config.mqtt_port, config.mqtt_tls);
    log::info!("   Topic: {}", config.topic);
    log::info!("   Refresh: {}ms", config.refresh_interval.as_millis());
    log::info!("   Snapshot inbox: {}", config.snapshot_inbox);

    let cancel = CancellationToken::new();

    let aggregator = Arc::new(Aggregator::new());
    let (snapshot_tx, snapshot_rx) = mpsc::channel(config.snapshot_inbox);
    let (key_tx, key_rx) = mpsc::channel(config.key_inbox);
    let adapter: Arc<dyn MessageSink> = Arc::new(IngestionAdapter::new(aggregator, snapshot_tx));

    let session = match transport::connect(&config).await {
        Ok(session) => session,
        Err(e) => {
            log::error!("❌ {}", e);
            logging::flush();
            return Err(e.into());
        }
    };
    session.subscribe(&config.topic).await?;

    let publisher = Publisher::new(
        Arc::new(MqttPublisher::for_session(&session)),
        config.publish_timeout,
    );
    let client_id = session.client_id.clone();

    // PUBACKs arrive through the event loop; it must be running before the probe
    let backoff = ExponentialBackoff::new(
        Duration::from_millis(500),
        Duration::from_secs(30),
        config.max_reconnects,
    );
    let transport_handle = tokio::spawn(transport::run_event_loop(
        session,
        config.topic.clone(),
        adapter,
        cancel.clone(),
        backoff,
    ));

    if let Some(probe_topic) = &config.probe_topic {
        // Best effort: a failed probe is already logged by the publisher
        let _ = publisher.publish_probe(probe_topic, &client_id).await;
    }

    let surface = match TerminalSurface::init() {
        Ok(surface) => surface,
        Err(e) => {
            log::error!("❌ Error initializing terminal: {}", e);
            cancel.cancel();
            let _ = tokio::time::timeout(SHUTDOWN_GRACE, transport_handle).await;
            logging::flush();
            return Err(e.into());
        }
    };

    tokio::spawn(shutdown::watch_signals(cancel.clone()));

    let listener = ui::spawn_key_listener(key_tx, cancel.clone())?;

    let presenter = Presenter::new(
        surface,
        snapshot_rx,
        key_rx,
        config.refresh_interval,
        config.quiescence,
    );
    let result = presenter.run(cancel.clone()).await;

    // Whatever ended the render loop ends everything else too
    cancel.cancel();

    if tokio::time::timeout(SHUTDOWN_GRACE, transport_handle).await.is_err() {
        log::warn!("Transport did not stop within {}s", SHUTDOWN_GRACE.as_secs());
    }
    match tokio::task::spawn_blocking(move || listener.join()).await {
        Ok(Ok(())) => {}
        Ok(Err(_)) => log::error!("Key listener panicked"),
        Err(e) => log::error!("Failed to join key listener: {}", e),
    }

    log::info!("✅ Alarm Monitor stopped");
    logging::flush();

    result?;
    println!("Exiting...");
    Ok(())
}
