//! Per-owner live status channels.

use crate::metrics::MetricsRegistry;
use crate::types::StatusEvent;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

/// Fans status events out to clients subscribed under an owner id.
///
/// Events are not retained: a client only sees what is published while
/// it is subscribed.
pub struct StatusBroadcaster {
    channels: DashMap<String, broadcast::Sender<StatusEvent>>,
    capacity: usize,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl StatusBroadcaster {
    pub fn new(capacity: usize, metrics: Option<Arc<MetricsRegistry>>) -> Self {
        Self {
            channels: DashMap::new(),
            capacity: capacity.max(1),
            metrics,
        }
    }

    /// Join the owner's channel
    pub fn subscribe(&self, owner_id: &str) -> broadcast::Receiver<StatusEvent> {
        self.channels
            .entry(owner_id.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Deliver to every current subscriber. Returns how many received it.
    pub fn publish(&self, owner_id: &str, event: StatusEvent) -> usize {
        let delivered = match self.channels.get(owner_id) {
            Some(sender) => sender.send(event).unwrap_or(0),
            None => 0,
        };

        if delivered == 0 {
            // Drop channels whose clients are all gone.
            self.channels
                .remove_if(owner_id, |_, sender| sender.receiver_count() == 0);
            debug!(owner_id = %owner_id, "No live subscribers for status event");
        } else {
            debug!(owner_id = %owner_id, subscribers = delivered, "Status event published");
        }

        if let Some(ref m) = self.metrics {
            m.record_status_event(delivered > 0);
        }
        delivered
    }

    pub fn subscriber_count(&self, owner_id: &str) -> usize {
        self.channels
            .get(owner_id)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }
}
