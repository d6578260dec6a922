// RegistryEventStream - shared change-notification stream for registry writes
// Allows multiple consumers (persister, dashboards) to observe the same
// mutation without polling the registry.

use crate::authorization::WriterRole;
use crate::metrics;
use ethers::types::Address;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Change notification emitted by the registry after a successful mutation.
///
/// `sequence` is monotonic and assigned under the registry's write lock, so
/// subscribers observe events in exactly the order the mutations applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    TokenUpdated { key: Address, sequence: u64 },
    ProtocolUpdated { key: Address, sequence: u64 },
    WriterAuthorized {
        identity: Address,
        role: WriterRole,
        sequence: u64,
    },
    WriterRevoked {
        identity: Address,
        role: WriterRole,
        sequence: u64,
    },
}

impl RegistryEvent {
    pub fn sequence(&self) -> u64 {
        match self {
            RegistryEvent::TokenUpdated { sequence, .. } => *sequence,
            RegistryEvent::ProtocolUpdated { sequence, .. } => *sequence,
            RegistryEvent::WriterAuthorized { sequence, .. } => *sequence,
            RegistryEvent::WriterRevoked { sequence, .. } => *sequence,
        }
    }
}

/// Broadcast stream of registry events supporting multiple subscribers.
pub struct RegistryEventStream {
    sender: broadcast::Sender<RegistryEvent>,
}

impl RegistryEventStream {
    /// Creates a new stream with buffer space for `capacity` undelivered
    /// events per subscriber; slow subscribers past that observe a lag error.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribes a new consumer. The receiver sees every event published
    /// after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.sender.subscribe()
    }

    /// Publishes an event to all subscribers. Returns the number of active
    /// subscribers that received it; publishing with no subscribers is not an
    /// error.
    pub fn publish(&self, event: RegistryEvent) -> usize {
        let sequence = event.sequence();
        match self.sender.send(event) {
            Ok(count) => {
                metrics::increment_events_published();
                metrics::set_event_subscribers(count as f64);
                debug!("published registry event seq {} to {} subscribers", sequence, count);
                count
            }
            Err(broadcast::error::SendError(_)) => {
                metrics::increment_events_published();
                metrics::set_event_subscribers(0.0);
                warn!("published registry event seq {} with no active subscribers", sequence);
                0
            }
        }
    }

    /// Current number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
