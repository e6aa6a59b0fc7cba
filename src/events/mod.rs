use tokio::sync::broadcast;

use crate::services::cache_coordinator::{CollectionKey, MutationKind};

/// Why a session was torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEndReason {
    Logout,
    Expired,
}

/// Events screen controllers can observe instead of polling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    CollectionInvalidated {
        key: CollectionKey,
        cause: MutationKind,
        timestamp: String, // RFC 3339
    },
    SessionEnded {
        reason: SessionEndReason,
        timestamp: String, // RFC 3339
    },
}

/// Broadcast bus for [`SyncEvent`]s.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SyncEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Fire-and-forget. Having no subscribers is normal.
    pub fn publish(&self, event: SyncEvent) {
        if let Err(e) = self.tx.send(event) {
            tracing::trace!("Event dropped, no subscribers: {:?}", e.0);
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
