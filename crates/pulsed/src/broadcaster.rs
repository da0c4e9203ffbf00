//! Fan-out of events and snapshots to live clients.
//!
//! Best effort: frames go to whoever is subscribed at send time, with no
//! replay. A slow client that lags past the channel capacity loses the
//! oldest frames, never blocks the sender.

use pulse_shared::event::Event;
use pulse_shared::rpc::LiveMessage;
use pulse_shared::snapshot::{DetailedAnalysis, HealthSnapshot};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

pub const CHANNEL_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct Broadcaster {
    general: broadcast::Sender<Arc<LiveMessage>>,
    urgent: broadcast::Sender<Arc<LiveMessage>>,
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(CHANNEL_CAPACITY)
    }
}

impl Broadcaster {
    pub fn new(capacity: usize) -> Self {
        let (general, _) = broadcast::channel(capacity.max(1));
        let (urgent, _) = broadcast::channel(capacity.max(1));
        Self { general, urgent }
    }

    fn send(sender: &broadcast::Sender<Arc<LiveMessage>>, message: LiveMessage) -> usize {
        let name = message.name();
        // Err only means nobody is listening
        let delivered = sender.send(Arc::new(message)).unwrap_or(0);
        debug!("[LIVE] {} -> {} subscribers", name, delivered);
        delivered
    }

    /// Send an event to every subscriber; urgent events also go out as a
    /// critical alert. Returns the number of general subscribers reached.
    pub fn publish(&self, event: &Event) -> usize {
        let message = if event.is_provider_typed() {
            LiveMessage::DynatraceEvent(event.clone())
        } else {
            LiveMessage::GenericEvent(event.clone())
        };
        let delivered = Self::send(&self.general, message);
        if event.is_urgent() {
            Self::send(&self.urgent, LiveMessage::CriticalAlert(event.clone()));
        }
        delivered
    }

    pub fn publish_snapshot(&self, snapshot: &HealthSnapshot) -> usize {
        Self::send(&self.general, LiveMessage::HealthUpdate(snapshot.clone()))
    }

    pub fn publish_analysis(&self, analysis: &DetailedAnalysis) -> usize {
        Self::send(&self.general, LiveMessage::DetailedAnalysis(analysis.clone()))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<LiveMessage>> {
        self.general.subscribe()
    }

    /// Critical alerts only.
    pub fn subscribe_urgent(&self) -> broadcast::Receiver<Arc<LiveMessage>> {
        self.urgent.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.general.receiver_count()
    }
}
