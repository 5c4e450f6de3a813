//! Runtime configuration loaded from environment variables
//!
//! Call `dotenv::dotenv().ok()` before `RuntimeConfig::from_env()` so a local
//! `.env` file can supply the broker settings.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Broker credentials (username + password)
#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_tls: bool,
    pub credentials: Option<Credentials>,
    /// Topic alarms are consumed from and published to
    pub topic: String,
    /// Topic for the start-up probe message (None disables the probe)
    pub probe_topic: Option<String>,
    pub client_prefix: String,
    pub keep_alive: Duration,
    pub max_packet_bytes: usize,
    pub connect_timeout: Duration,
    /// Consecutive reconnect failures tolerated before giving up
    pub max_reconnects: u32,
    pub publish_timeout: Duration,
    pub refresh_interval: Duration,
    /// How long the presenter waits for a snapshot before logging a notice
    pub quiescence: Duration,
    pub snapshot_inbox: usize,
    pub key_inbox: usize,
    pub log_path: String,
    pub rust_log: String,
}

#[derive(Debug)]
pub enum ConfigError {
    MissingVariable(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingVariable(var) => write!(f, "Missing environment variable: {}", var),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl RuntimeConfig {
    /// Load configuration from environment variables
    ///
    /// Only `MQTT_HOST` is required. Every other variable has a default, but a
    /// variable that is set and fails to parse is reported rather than ignored.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mqtt_host = env::var("MQTT_HOST")
            .map_err(|_| ConfigError::MissingVariable("MQTT_HOST".to_string()))?;

        if mqtt_host.trim().is_empty() {
            return Err(ConfigError::InvalidValue("MQTT_HOST cannot be empty".to_string()));
        }

        let credentials = match (env::var("MQTT_USERNAME").ok(), env::var("MQTT_PASSWORD").ok()) {
            (Some(username), Some(password)) => Some(Credentials { username, password }),
            (None, None) => None,
            _ => {
                return Err(ConfigError::InvalidValue(
                    "MQTT_USERNAME and MQTT_PASSWORD must be set together".to_string(),
                ))
            }
        };

        let probe_topic = match env::var("MQTT_PROBE_TOPIC") {
            Ok(topic) if topic.trim().is_empty() => None,
            Ok(topic) => Some(topic),
            Err(_) => Some("topic/test".to_string()),
        };

        let snapshot_inbox = parse_var("SNAPSHOT_INBOX", 5usize)?;
        let key_inbox = parse_var("KEY_INBOX", 8usize)?;
        let refresh_interval_ms = parse_var("REFRESH_INTERVAL_MS", 500u64)?;

        if snapshot_inbox == 0 || key_inbox == 0 {
            return Err(ConfigError::InvalidValue(
                "SNAPSHOT_INBOX and KEY_INBOX must be greater than zero".to_string(),
            ));
        }
        if refresh_interval_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "REFRESH_INTERVAL_MS must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            mqtt_host,
            mqtt_port: parse_var("MQTT_PORT", 8883u16)?,
            mqtt_tls: parse_var("MQTT_TLS", true)?,
            credentials,
            topic: env::var("MQTT_TOPIC").unwrap_or_else(|_| "UAS".to_string()),
            probe_topic,
            client_prefix: env::var("MQTT_CLIENT_PREFIX")
                .unwrap_or_else(|_| "alarm-monitor".to_string()),
            keep_alive: Duration::from_secs(parse_var("MQTT_KEEP_ALIVE_SECS", 30u64)?),
            max_packet_bytes: parse_var("MQTT_MAX_PACKET_BYTES", 256 * 1024usize)?,
            connect_timeout: Duration::from_millis(parse_var("MQTT_CONNECT_TIMEOUT_MS", 10_000u64)?),
            max_reconnects: parse_var("MQTT_MAX_RECONNECTS", 10u32)?,
            publish_timeout: Duration::from_millis(parse_var("PUBLISH_TIMEOUT_MS", 200u64)?),
            refresh_interval: Duration::from_millis(refresh_interval_ms),
            quiescence: Duration::from_secs(parse_var("QUIESCENCE_SECS", 5u64)?),
            snapshot_inbox,
            key_inbox,
            log_path: env::var("ALARM_LOG_PATH").unwrap_or_else(|_| "alarm-monitor.log".to_string()),
            rust_log: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().to_lowercase().parse::<T>().map_err(|_| {
            ConfigError::InvalidValue(format!("{} has an unparsable value '{}'", name, raw))
        }),
        Err(_) => Ok(default),
    }
}
