use async_trait::async_trait;

use crate::events::{Event, EventKind};

/// Handler for the agent's lifecycle events.
///
/// Each subscriber gets its own worker and bounded queue inside the
/// [`SubscriberSet`](crate::SubscriberSet), so a slow handler only delays itself.
/// When its queue is full, further events for it are dropped and reported.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    async fn on_event(&self, event: &Event);

    /// Name used in overflow and panic reports.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Capacity of this subscriber's queue (min 1).
    fn queue_capacity(&self) -> usize {
        1024
    }

    /// Whether events of `kind` should be queued at all.
    ///
    /// Idle user streams emit a heartbeat every interval; subscribers that only care
    /// about transitions can skip those here instead of in `on_event`.
    fn wants(&self, _kind: EventKind) -> bool {
        true
    }
}
