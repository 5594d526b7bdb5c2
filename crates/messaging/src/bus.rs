//! In-memory partitioned event bus.
//!
//! Each subscribed topic gets a fixed number of delivery lanes; an
//! envelope is routed to a lane by hashing its key, so events sharing a
//! key are handled one at a time in publish order, while events with
//! different keys run concurrently. This mirrors the partition-by-key
//! contract of the production message broker.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::envelope::Envelope;
use crate::error::{MessagingError, Result};
use crate::topic::Topic;

/// Default number of delivery lanes per topic.
pub const DEFAULT_PARTITIONS: usize = 4;

/// Publishing side of the message fabric.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publishes an envelope to its topic.
    async fn publish(&self, envelope: Envelope) -> Result<()>;
}

/// Consumer of a topic's events.
///
/// Delivery is at-least-once: the same envelope may arrive more than
/// once, and handlers must be idempotent. A returned error is logged
/// and counted, never redelivered by this in-memory bus.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Processes one delivered envelope.
    async fn handle(&self, envelope: Envelope) -> Result<()>;
}

struct BusInner {
    partitions: usize,
    lanes: RwLock<HashMap<Topic, Vec<mpsc::UnboundedSender<Envelope>>>>,
    in_flight: AtomicUsize,
}

/// In-memory event bus with partitioned, per-key ordered delivery.
///
/// Cloning is cheap and all clones share the same lanes. Subscribers
/// must be registered before the first publish to their topic —
/// envelopes published to a topic with no consumer are dropped with a
/// warning (a real broker would retain them).
#[derive(Clone)]
pub struct InMemoryEventBus {
    inner: Arc<BusInner>,
}

impl InMemoryEventBus {
    /// Creates a bus with [`DEFAULT_PARTITIONS`] lanes per topic.
    pub fn new() -> Self {
        Self::with_partitions(DEFAULT_PARTITIONS)
    }

    /// Creates a bus with a custom lane count per topic.
    pub fn with_partitions(partitions: usize) -> Self {
        Self {
            inner: Arc::new(BusInner {
                partitions: partitions.max(1),
                lanes: RwLock::new(HashMap::new()),
                in_flight: AtomicUsize::new(0),
            }),
        }
    }

    /// Registers the consumer for a topic, spawning one worker task per
    /// lane. Subscribing a topic twice replaces the previous consumer.
    pub fn subscribe(&self, topic: Topic, handler: Arc<dyn EventHandler>) {
        let mut senders = Vec::with_capacity(self.inner.partitions);

        for lane in 0..self.inner.partitions {
            let (tx, mut rx) = mpsc::unbounded_channel::<Envelope>();
            let handler = handler.clone();
            let inner = self.inner.clone();

            tokio::spawn(async move {
                while let Some(envelope) = rx.recv().await {
                    if let Err(e) = handler.handle(envelope).await {
                        metrics::counter!("bus_handler_failures_total").increment(1);
                        tracing::error!(%topic, lane, error = %e, "event handler failed");
                    }
                    inner.in_flight.fetch_sub(1, Ordering::SeqCst);
                }
            });

            senders.push(tx);
        }

        self.inner.lanes.write().unwrap().insert(topic, senders);
    }

    /// Waits until every published envelope, including any published by
    /// handlers while processing, has been handled. Test support.
    pub async fn quiesce(&self) {
        while self.inner.in_flight.load(Ordering::SeqCst) > 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    fn lane_for(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % self.inner.partitions
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(&self, envelope: Envelope) -> Result<()> {
        let topic = envelope.topic;
        let lane = self.lane_for(&envelope.key);

        let lanes = self.inner.lanes.read().unwrap();
        let Some(senders) = lanes.get(&topic) else {
            tracing::warn!(%topic, key = %envelope.key, "no consumer registered, dropping event");
            return Ok(());
        };

        metrics::counter!("bus_published_total").increment(1);
        self.inner.in_flight.fetch_add(1, Ordering::SeqCst);

        if senders[lane].send(envelope).is_err() {
            self.inner.in_flight.fetch_sub(1, Ordering::SeqCst);
            return Err(MessagingError::ChannelClosed(topic));
        }

        Ok(())
    }
}
