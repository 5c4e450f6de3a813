//! PUBACK tracking for QoS 1 publishes
//!
//! `rumqttc` hands out packet ids inside the event loop, so a publish is
//! matched in two steps: requests are queued in submission order, the event
//! loop pairs the oldest queued request with the next outgoing PUBLISH id, and
//! the matching PUBACK completes it.

use {
    rumqttc::{AsyncClient, ClientError, QoS},
    std::{
        collections::{HashMap, VecDeque},
        sync::{Mutex, MutexGuard, PoisonError},
    },
    tokio::sync::oneshot,
};

#[derive(Default)]
pub struct PublishAcks {
    queued: Mutex<VecDeque<oneshot::Sender<()>>>,
    in_flight: Mutex<HashMap<u16, oneshot::Sender<()>>>,
}

impl PublishAcks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a QoS 1 publish and return the receiver completed by its PUBACK
    ///
    /// The queue lock is held across `try_publish` so queue order always
    /// matches the order requests reach the event loop.
    pub fn submit(
        &self,
        client: &AsyncClient,
        topic: &str,
        payload: &[u8],
    ) -> Result<oneshot::Receiver<()>, ClientError> {
        let mut queued = lock(&self.queued);
        client.try_publish(topic, QoS::AtLeastOnce, false, payload.to_vec())?;

        let (tx, rx) = oneshot::channel();
        queued.push_back(tx);
        Ok(rx)
    }

    /// The event loop sent a PUBLISH with this packet id
    pub fn on_outgoing(&self, pkid: u16) {
        if pkid == 0 {
            return;
        }
        if let Some(tx) = lock(&self.queued).pop_front() {
            lock(&self.in_flight).insert(pkid, tx);
        }
    }

    pub fn on_puback(&self, pkid: u16) {
        if let Some(tx) = lock(&self.in_flight).remove(&pkid) {
            // The waiter may have timed out already
            let _ = tx.send(());
        }
    }

    /// Fail every publish already on the wire; the clean session drops them
    pub fn on_connection_lost(&self) {
        let mut in_flight = lock(&self.in_flight);
        if !in_flight.is_empty() {
            log::warn!("{} publish(es) lost with the connection", in_flight.len());
        }
        in_flight.clear();
    }

    pub fn pending(&self) -> usize {
        lock(&self.queued).len() + lock(&self.in_flight).len()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
