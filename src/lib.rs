//! Live equipment alarm monitor
//!
//! Alarm notifications arrive on an MQTT topic, are folded into per-equipment
//! counts by the [`aggregator::Aggregator`], and reach the terminal dashboard
//! as immutable [`state::Snapshot`] copies.
//!
//! ```text
//! broker → transport::run_event_loop → IngestionAdapter → Aggregator::ingest
//!     ↓ try_send (capacity 5, drop when full)
//! ui::Presenter render loop ← KeyCommand inbox ← key listener thread
//! ```

pub mod aggregator;
pub mod config;
pub mod ingestion;
pub mod logging;
pub mod publisher;
pub mod shutdown;
pub mod state;
pub mod transport;
pub mod ui;

pub use aggregator::{Aggregator, IngestError};
pub use config::{ConfigError, RuntimeConfig};
pub use ingestion::{IngestOutcome, IngestionAdapter};
pub use publisher::{EventPublisher, MqttPublisher, PublishError, Publisher};
pub use state::{AlarmRecord, Snapshot};
