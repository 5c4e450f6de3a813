use {
    super::{ExponentialBackoff, MessageSink, PublishAcks, TransportError},
    crate::config::RuntimeConfig,
    rumqttc::{
        AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, MqttOptions, Outgoing,
        Packet, QoS, Transport,
    },
    std::{sync::Arc, time::Duration},
    tokio_util::sync::CancellationToken,
};

/// Bounded request queue between `AsyncClient` and the event loop
const REQUEST_CAPACITY: usize = 16;

/// Time allowed for the DISCONNECT packet to leave on shutdown
const DISCONNECT_GRACE: Duration = Duration::from_millis(250);

pub struct MqttSession {
    pub client: AsyncClient,
    pub eventloop: EventLoop,
    pub client_id: String,
    /// Shared with `MqttPublisher`; fed by the event loop
    pub acks: Arc<PublishAcks>,
}

impl MqttSession {
    pub async fn subscribe(&self, topic: &str) -> Result<(), TransportError> {
        self.client
            .subscribe(topic, QoS::AtMostOnce)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        log::info!("📡 Subscribed to topic {}", topic);
        Ok(())
    }
}

/// `<prefix>-<16 random hex chars>`
pub fn client_id(prefix: &str) -> String {
    format!("{}-{}", prefix, hex::encode(rand::random::<[u8; 8]>()))
}

pub fn mqtt_options(config: &RuntimeConfig, client_id: &str) -> MqttOptions {
    let mut options = MqttOptions::new(client_id, config.mqtt_host.clone(), config.mqtt_port);
    options
        .set_keep_alive(config.keep_alive)
        .set_clean_session(true)
        .set_max_packet_size(config.max_packet_bytes, config.max_packet_bytes);

    if let Some(credentials) = &config.credentials {
        options.set_credentials(credentials.username.clone(), credentials.password.clone());
    }
    if config.mqtt_tls {
        options.set_transport(Transport::tls_with_default_config());
    }

    options
}

/// Connect and wait for the broker's CONNACK
///
/// Failing here is fatal for the caller: the monitor cannot run without a broker.
pub async fn connect(config: &RuntimeConfig) -> Result<MqttSession, TransportError> {
    let client_id = client_id(&config.client_prefix);
    let options = mqtt_options(config, &client_id);
    let (client, mut eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);

    log::info!(
        "🔌 Connecting to mqtt broker {}:{} (tls: {}, client: {})",
        config.mqtt_host,
        config.mqtt_port,
        config.mqtt_tls,
        client_id
    );

    tokio::time::timeout(config.connect_timeout, wait_for_connack(&mut eventloop))
        .await
        .map_err(|_| TransportError::Timeout)??;

    log::info!("✅ Connected to mqtt broker");

    Ok(MqttSession {
        client,
        eventloop,
        client_id,
        acks: Arc::new(PublishAcks::new()),
    })
}

async fn wait_for_connack(eventloop: &mut EventLoop) -> Result<(), TransportError> {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                return match ack.code {
                    ConnectReturnCode::Success => Ok(()),
                    code => Err(TransportError::Refused(format!("{:?}", code))),
                };
            }
            Ok(_) => continue,
            Err(ConnectionError::ConnectionRefused(code)) => {
                return Err(TransportError::Refused(format!("{:?}", code)))
            }
            Err(e) => return Err(TransportError::Connect(e.to_string())),
        }
    }
}

/// What a single event-loop event meant for the monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// A payload was handed to the sink
    Message,
    /// The broker (re)accepted the connection
    Connected,
    Other,
}

pub fn dispatch(event: Event, sink: &dyn MessageSink, acks: &PublishAcks) -> Delivery {
    match event {
        Event::Incoming(Packet::Publish(publish)) => {
            sink.on_message(&publish.payload);
            Delivery::Message
        }
        Event::Incoming(Packet::ConnAck(_)) => Delivery::Connected,
        Event::Incoming(Packet::PubAck(ack)) => {
            acks.on_puback(ack.pkid);
            Delivery::Other
        }
        Event::Outgoing(Outgoing::Publish(pkid)) => {
            acks.on_outgoing(pkid);
            Delivery::Other
        }
        _ => Delivery::Other,
    }
}

/// Delivery loop and connection lifecycle watcher
///
/// Runs until `cancel` fires or reconnects are exhausted (which cancels the
/// whole process). `rumqttc` reconnects on the next `poll` after an error;
/// the clean session means the subscription is renewed on every CONNACK.
pub async fn run_event_loop(
    session: MqttSession,
    topic: String,
    sink: Arc<dyn MessageSink>,
    cancel: CancellationToken,
    mut backoff: ExponentialBackoff,
) {
    let MqttSession {
        client,
        mut eventloop,
        acks,
        ..
    } = session;

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            event = eventloop.poll() => match event {
                Ok(event) => {
                    if dispatch(event, sink.as_ref(), &acks) == Delivery::Connected {
                        log::info!("✅ Reconnected to mqtt broker");
                        backoff.reset();
                        if let Err(e) = client.try_subscribe(topic.as_str(), QoS::AtMostOnce) {
                            log::error!("Failed to renew subscription to {}: {}", topic, e);
                        }
                    }
                }
                Err(e) => {
                    log::warn!("⚠️  Connection lost: {}", e);
                    acks.on_connection_lost();
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        retry = backoff.sleep() => {
                            if let Err(e) = retry {
                                log::error!("❌ Giving up on mqtt broker: {}", e);
                                cancel.cancel();
                                break;
                            }
                        }
                    }
                }
            }
        }
    }

    disconnect(&client, &mut eventloop).await;
}

/// Send DISCONNECT and give it a short grace period to leave
pub async fn disconnect(client: &AsyncClient, eventloop: &mut EventLoop) {
    if let Err(e) = client.try_disconnect() {
        log::debug!("Disconnect request not queued: {}", e);
        return;
    }

    let drained = tokio::time::timeout(DISCONNECT_GRACE, async {
        loop {
            match eventloop.poll().await {
                Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                Ok(_) => {}
            }
        }
    })
    .await;

    if drained.is_err() {
        log::debug!("Disconnect not confirmed within {}ms", DISCONNECT_GRACE.as_millis());
    }
    log::warn!("Mqtt disconnect");
}
