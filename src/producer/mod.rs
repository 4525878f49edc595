//! # Producer seam: the event sources behind the two streams.
//!
//! The watch machinery that talks to the orchestration API lives outside this crate.
//! The stream controllers only depend on the contracts defined here:
//!
//! - [`Producer`]: starts the cluster watch for a primary stream and hands back an
//!   event queue plus a "bulk listing complete" signal.
//! - [`UserEventSource`]: starts the user-event watch for a secondary stream and hands
//!   back the watch future, which the controller spawns and later joins.
//!
//! ## Producer contract
//! ```text
//! start(ctx, request, pod_prefixes)
//!   ├─ Err(ProducerError)           watch setup failed; nothing was left running
//!   └─ Ok(ProducerOutput)
//!        ├─ events     closed by the producer when its watch terminates
//!        └─ bulk_done  fires exactly once when the initial listing finishes
//! ```
//!
//! Two interchangeable [`Producer`] variants (thin and full) are held by a
//! [`ProducerSet`]; the request picks one and the controller treats it as opaque.

mod model;

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::error::ProducerError;

pub use model::{
    EventBatch, EventStreamRequest, OrchestratorEvent, PodPrefixConfig, ResourceAction,
    UserEvent, UserEventFilter, UserEventRequest,
};

/// Handles returned by a successful [`Producer::start`].
pub struct ProducerOutput {
    /// Bounded queue of event batches.
    pub events: mpsc::Receiver<EventBatch>,
    /// Fires once when the initial full listing has been queued.
    pub bulk_done: oneshot::Receiver<()>,
}

/// Event source for the primary stream.
#[async_trait]
pub trait Producer: Send + Sync + 'static {
    /// Human-readable name (for logs).
    fn name(&self) -> &str;

    /// Starts watching the cluster.
    ///
    /// Cancelling `ctx` must stop the watch; the producer then closes its queue.
    /// The queue capacity should honor [`EventStreamRequest::queue_capacity`].
    async fn start(
        &self,
        ctx: CancellationToken,
        request: &EventStreamRequest,
        pod_prefixes: &PodPrefixConfig,
    ) -> Result<ProducerOutput, ProducerError>;

    /// Releases collaborator-side client handles shared with other watches.
    ///
    /// Called on every primary teardown, after the session context is cancelled.
    fn close_client(&self) {}
}

/// The thin and full producer variants.
#[derive(Clone)]
pub struct ProducerSet {
    thin: Arc<dyn Producer>,
    full: Arc<dyn Producer>,
}

impl ProducerSet {
    pub fn new(thin: Arc<dyn Producer>, full: Arc<dyn Producer>) -> Self {
        Self { thin, full }
    }

    /// Uses the same producer for both variants.
    pub fn single(producer: Arc<dyn Producer>) -> Self {
        Self {
            thin: Arc::clone(&producer),
            full: producer,
        }
    }

    /// Producer requested by `request`.
    pub fn select(&self, request: &EventStreamRequest) -> Arc<dyn Producer> {
        if request.thin {
            Arc::clone(&self.thin)
        } else {
            Arc::clone(&self.full)
        }
    }
}

/// Running user-event watch. Completes once the watch has fully stopped.
pub type WatchFuture = BoxFuture<'static, ()>;

/// Event source for the secondary stream.
#[async_trait]
pub trait UserEventSource: Send + Sync + 'static {
    /// Sets up the user-event watch.
    ///
    /// On success the returned future runs the watch: it enqueues events on `tx` until
    /// `ctx` is cancelled or the shared watch infrastructure goes away, then returns.
    /// Dropping `tx` when the future ends closes the queue.
    async fn start(
        &self,
        ctx: CancellationToken,
        tx: mpsc::Sender<UserEvent>,
        filter: &UserEventFilter,
    ) -> Result<WatchFuture, ProducerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    #[async_trait]
    impl Producer for Named {
        fn name(&self) -> &str {
            self.0
        }

        async fn start(
            &self,
            _ctx: CancellationToken,
            _request: &EventStreamRequest,
            _pod_prefixes: &PodPrefixConfig,
        ) -> Result<ProducerOutput, ProducerError> {
            Err(ProducerError::Canceled)
        }
    }

    #[test]
    fn request_selects_variant() {
        let set = ProducerSet::new(Arc::new(Named("thin")), Arc::new(Named("full")));
        let thin = EventStreamRequest {
            thin: true,
            ..EventStreamRequest::default()
        };
        assert_eq!(set.select(&thin).name(), "thin");
        assert_eq!(set.select(&EventStreamRequest::default()).name(), "full");
    }
}
