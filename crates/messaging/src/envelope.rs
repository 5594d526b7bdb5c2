//! Message envelope carried on the bus.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::topic::Topic;

/// A published message: topic, partition key and JSON payload.
///
/// The key determines the delivery lane — all envelopes with the same
/// key on the same topic are processed in publish order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// The channel this message belongs to.
    pub topic: Topic,

    /// Partition key (booking id, order id or user id depending on topic).
    pub key: String,

    /// The serialized event payload.
    pub payload: serde_json::Value,

    /// When the message was published.
    pub published_at: DateTime<Utc>,
}

impl Envelope {
    /// Creates an envelope by serializing `payload`.
    pub fn new(topic: Topic, key: impl Into<String>, payload: &impl Serialize) -> Result<Self> {
        Ok(Self {
            topic,
            key: key.into(),
            payload: serde_json::to_value(payload)?,
            published_at: Utc::now(),
        })
    }

    /// Deserializes the payload into the topic's event type.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }
}
