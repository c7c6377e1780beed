//! Live telemetry feed
//!
//! Everything a presentation layer renders (phase changes, risk recomputes,
//! new security events, recorded actions) is also published on a broadcast
//! channel so it can be streamed instead of polled.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::action::GhostAction;
use crate::event::SecurityEvent;
use crate::session::Phase;

/// Buffered telemetry items per receiver before it starts lagging
const FEED_CAPACITY: usize = 256;

/// A single telemetry item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "camelCase")]
pub enum Telemetry {
    /// The session changed phase
    Phase(Phase),
    /// The risk score was recomputed or reset
    Risk(u8),
    /// A security event was appended
    Event(SecurityEvent),
    /// An action was recorded
    Action(GhostAction),
}

/// Sending half of the feed
#[derive(Debug, Clone)]
pub(crate) struct TelemetryFeed {
    tx: broadcast::Sender<Telemetry>,
}

impl TelemetryFeed {
    pub(crate) fn new() -> Self {
        let (tx, _) = broadcast::channel(FEED_CAPACITY);
        Self { tx }
    }

    /// Publish an item; never blocks, and having no receivers is fine
    pub(crate) fn publish(&self, item: Telemetry) {
        let _ = self.tx.send(item);
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<Telemetry> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_without_receivers() {
        let feed = TelemetryFeed::new();
        feed.publish(Telemetry::Risk(12));
    }

    #[tokio::test]
    async fn test_subscribers_see_items_in_order() {
        let feed = TelemetryFeed::new();
        let mut rx = feed.subscribe();

        feed.publish(Telemetry::Phase(Phase::Active));
        feed.publish(Telemetry::Risk(42));

        assert_eq!(rx.recv().await.unwrap(), Telemetry::Phase(Phase::Active));
        assert_eq!(rx.recv().await.unwrap(), Telemetry::Risk(42));
    }

    #[test]
    fn test_telemetry_json_shape() {
        let json = serde_json::to_value(Telemetry::Risk(7)).unwrap();
        assert_eq!(json["kind"], "risk");
        assert_eq!(json["data"], 7);
    }
}
