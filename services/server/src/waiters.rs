//! Process-local registry of tasks blocked waiting for a stream to grow.
//!
//! Mirrors the broadcast-channel-per-key pattern used elsewhere in this
//! workspace for fan-out notification: one `broadcast::Sender` per stream,
//! created lazily and kept only as long as something is subscribed to it.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

/// Payload delivered to a waiter on wake: the stream's `total_bytes` at the
/// moment of notify. Readers must re-query the store rather than trust this
/// value directly — notifications may be coalesced (§5).
#[derive(Debug, Clone, Copy)]
pub struct Notification {
    pub total_bytes: i64,
}

#[derive(Clone)]
pub struct WaiterRegistry {
    channels: Arc<RwLock<HashMap<Uuid, broadcast::Sender<Notification>>>>,
    max_waiters_per_stream: usize,
}

impl WaiterRegistry {
    pub fn new(max_waiters_per_stream: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            max_waiters_per_stream,
        }
    }

    async fn get_or_create(&self, stream_id: Uuid) -> broadcast::Sender<Notification> {
        {
            let reg = self.channels.read().await;
            if let Some(tx) = reg.get(&stream_id) {
                return tx.clone();
            }
        }
        let mut reg = self.channels.write().await;
        if let Some(tx) = reg.get(&stream_id) {
            return tx.clone();
        }
        let (tx, _rx) = broadcast::channel(1024);
        reg.insert(stream_id, tx.clone());
        tx
    }

    /// Subscribes to a stream's notifications. Returns `None` if the stream
    /// is already at its waiter cap, so the caller can fail fast with
    /// `WaiterSaturation` (§5) instead of queueing behind it.
    pub async fn subscribe(&self, stream_id: Uuid) -> Option<broadcast::Receiver<Notification>> {
        let tx = self.get_or_create(stream_id).await;
        if tx.receiver_count() >= self.max_waiters_per_stream {
            return None;
        }
        Some(tx.subscribe())
    }

    /// Wakes every current waiter on a stream. Non-blocking: a full channel
    /// drops the oldest unread notification rather than stalling the
    /// append path, which is safe because waiters always re-query the store.
    pub async fn notify(&self, stream_id: Uuid, total_bytes: i64) {
        let tx = self.get_or_create(stream_id).await;
        let _ = tx.send(Notification { total_bytes });
    }

    /// Drops the channel for a stream once nobody is subscribed, so the
    /// registry doesn't grow unbounded across the lifetime of the process.
    pub async fn evict_if_idle(&self, stream_id: Uuid) {
        let mut reg = self.channels.write().await;
        if let Some(tx) = reg.get(&stream_id) {
            if tx.receiver_count() == 0 {
                reg.remove(&stream_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn notify_wakes_an_existing_subscriber() {
        let registry = WaiterRegistry::new(10);
        let stream_id = Uuid::new_v4();
        let mut rx = registry.subscribe(stream_id).await.unwrap();
        registry.notify(stream_id, 128).await;
        let note = rx.recv().await.unwrap();
        assert_eq!(note.total_bytes, 128);
    }

    #[tokio::test]
    async fn subscribe_refuses_past_the_cap() {
        let registry = WaiterRegistry::new(1);
        let stream_id = Uuid::new_v4();
        let _first = registry.subscribe(stream_id).await.unwrap();
        assert!(registry.subscribe(stream_id).await.is_none());
    }

    #[tokio::test]
    async fn notify_without_subscribers_does_not_panic() {
        let registry = WaiterRegistry::new(10);
        registry.notify(Uuid::new_v4(), 0).await;
    }
}
