//! Outbound publishing to the message bus.

use maestro_common::topic;
use tokio::sync::mpsc;

use crate::bus::Bus;
use crate::error::Result;

/// A message ready to be published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publication {
    /// Full topic (or key expression).
    pub topic: String,
    /// Payload bytes.
    pub payload: Vec<u8>,
}

impl Publication {
    /// Create a publication.
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// Payload interpreted as UTF-8 (lossy), for logging.
    pub fn payload_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

/// Publisher for sending bridge output to the bus.
///
/// Wraps a [`Bus`] and the bridge's topic prefix.
#[derive(Clone, Debug)]
pub struct Publisher {
    bus: Bus,
    key_prefix: String,
}

impl Publisher {
    /// Create a new publisher.
    pub fn new(bus: Bus, key_prefix: impl Into<String>) -> Self {
        Self {
            bus,
            key_prefix: key_prefix.into(),
        }
    }

    /// Build a full topic from a suffix.
    pub fn build_key(&self, suffix: &str) -> String {
        topic::join(&self.key_prefix, suffix)
    }

    /// Publish a single message.
    pub async fn publish(&self, publication: &Publication) -> Result<()> {
        self.bus
            .publish(&publication.topic, publication.payload.clone())
            .await
    }

    /// Publish a batch of messages in order.
    ///
    /// Returns the number of successfully published messages and logs errors.
    pub async fn publish_batch(&self, publications: &[Publication]) -> PublishStats {
        let mut stats = PublishStats::default();

        for publication in publications {
            match self.publish(publication).await {
                Ok(()) => {
                    stats.success += 1;
                    tracing::info!(
                        topic = %publication.topic,
                        payload = %publication.payload_str(),
                        "Published"
                    );
                }
                Err(e) => {
                    stats.failed += 1;
                    tracing::warn!(error = %e, "Failed to publish");
                }
            }
        }

        stats
    }

    /// Publish a JSON value to a key.
    pub async fn publish_json<T: serde::Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let payload = serde_json::to_vec(value)?;
        self.bus.publish(key, payload).await
    }

    /// Publish every batch received on `rx` until all senders are dropped.
    pub async fn forward(self, mut rx: mpsc::UnboundedReceiver<Vec<Publication>>) {
        while let Some(batch) = rx.recv().await {
            let stats = self.publish_batch(&batch).await;
            if stats.failed > 0 {
                tracing::warn!(
                    total = stats.total(),
                    failed = stats.failed,
                    "Batch partially published"
                );
            }
        }
        tracing::debug!("Publication channel closed");
    }
}

/// Statistics from a batch publish operation.
#[derive(Debug, Default, Clone, Copy)]
pub struct PublishStats {
    /// Number of successfully published messages.
    pub success: usize,
    /// Number of failed publishes.
    pub failed: usize,
}

impl PublishStats {
    /// Total number of attempted publishes.
    pub fn total(&self) -> usize {
        self.success + self.failed
    }
}
