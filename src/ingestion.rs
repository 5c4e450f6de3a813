//! Ingestion adapter - transport payloads in, snapshots out
//!
//! Runs on the transport's delivery task. Each payload is folded into the
//! aggregator and the resulting snapshot is offered to the presenter's inbox
//! with `try_send`: a full inbox drops the snapshot instead of stalling the
//! broker connection.

use {
    crate::{aggregator::Aggregator, state::Snapshot, transport::MessageSink},
    std::sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    tokio::sync::mpsc::{self, error::TrySendError},
};

/// What happened to one inbound payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Snapshot queued for the presenter
    Forwarded,
    /// Aggregated, but the presenter inbox was full (or gone)
    Dropped,
    /// Structurally invalid payload, nothing aggregated
    Rejected,
}

pub struct IngestionAdapter {
    aggregator: Arc<Aggregator>,
    inbox: mpsc::Sender<Snapshot>,
    first_message: AtomicBool,
    dropped: AtomicU64,
}

impl IngestionAdapter {
    pub fn new(aggregator: Arc<Aggregator>, inbox: mpsc::Sender<Snapshot>) -> Self {
        Self {
            aggregator,
            inbox,
            first_message: AtomicBool::new(true),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn handle_payload(&self, payload: &[u8]) -> IngestOutcome {
        if self.first_message.swap(false, Ordering::Relaxed) {
            log::info!("📥 First alarm message received ({} bytes)", payload.len());
        }

        let snapshot = match self.aggregator.ingest(payload) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::warn!("Dropping alarm message: {}", e);
                return IngestOutcome::Rejected;
            }
        };

        log::debug!(
            "Aggregated alarm: global={} equipment={}",
            snapshot.global_count(),
            snapshot.equipment_count()
        );

        match self.inbox.try_send(snapshot) {
            Ok(()) => IngestOutcome::Forwarded,
            Err(TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                log::debug!("Presenter inbox full, snapshot dropped (total dropped: {})", dropped);
                IngestOutcome::Dropped
            }
            Err(TrySendError::Closed(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                log::debug!("Presenter inbox closed, snapshot dropped");
                IngestOutcome::Dropped
            }
        }
    }

    /// Snapshots discarded because the presenter inbox had no room
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl MessageSink for IngestionAdapter {
    fn on_message(&self, payload: &[u8]) {
        self.handle_payload(payload);
    }
}
