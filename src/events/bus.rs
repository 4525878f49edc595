//! # Lifecycle event bus.
//!
//! ```text
//! PrimarySession     ──┐
//! SecondarySession   ──┼──► Bus ──► Agent listener ──► SubscriberSet
//! PressureController ──┘   (broadcast ring)        └──► test receivers
//! ```
//!
//! Publishing never blocks, so teardown paths publish freely. Receivers that fall more
//! than `capacity` events behind see `RecvError::Lagged` and skip ahead. Events
//! published while nobody listens are gone.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for lifecycle events. Clones publish into the same channel.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a bus retaining up to `capacity` (min 1) undelivered events per receiver.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, ev: Event) {
        // Err only means there are no receivers right now.
        let _ = self.tx.send(ev);
    }

    /// Receiver observing events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new(1024)
    }
}
