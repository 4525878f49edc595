//! # Non-blocking event fan-out to multiple subscribers.
//!
//! [`SubscriberSet`] hands each lifecycle event to every interested subscriber without
//! ever making a stream teardown wait on one.
//!
//! ```text
//! emit(event) ──► lane 1 (bounded) ──► worker ──► sub1.on_event()   panic ─► SubscriberPanicked
//!             ├─► lane 2 (bounded) ──► worker ──► sub2.on_event()
//!             └─► lane N            (skipped when !subN.wants(kind))
//! ```
//!
//! A full or closed lane drops the event for that subscriber only and reports a
//! `SubscriberOverflow` on the bus. Each subscriber sees its events in emit order.

use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::warn;

use crate::events::{Bus, Event, EventKind};
use crate::subscribers::Subscribe;

struct Lane {
    sub: Arc<dyn Subscribe>,
    tx: mpsc::Sender<Arc<Event>>,
}

/// Fan-out coordinator for lifecycle event subscribers.
pub struct SubscriberSet {
    lanes: Vec<Lane>,
    workers: Vec<JoinHandle<()>>,
    bus: Bus,
}

impl SubscriberSet {
    /// Spawns one worker per subscriber.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>, bus: Bus) -> Self {
        let (lanes, workers): (Vec<Lane>, Vec<JoinHandle<()>>) = subs
            .into_iter()
            .map(|sub| {
                let (tx, rx) = mpsc::channel(sub.queue_capacity().max(1));
                let worker = tokio::spawn(drive(Arc::clone(&sub), rx, bus.clone()));
                (Lane { sub, tx }, worker)
            })
            .unzip();
        Self {
            lanes,
            workers,
            bus,
        }
    }

    /// Queues `event` for every subscriber that wants it. Returns how many accepted it.
    pub fn emit(&self, event: &Event) -> usize {
        let shared = Arc::new(event.clone());
        let mut accepted = 0;

        for lane in self.lanes.iter().filter(|l| l.sub.wants(event.kind)) {
            let reason = match lane.tx.try_send(Arc::clone(&shared)) {
                Ok(()) => {
                    accepted += 1;
                    continue;
                }
                Err(TrySendError::Full(_)) => "full",
                Err(TrySendError::Closed(_)) => "closed",
            };
            warn!(subscriber = lane.sub.name(), reason, kind = ?event.kind, "subscriber dropped event");
            // Overflow reports never trigger further overflow reports.
            if event.kind != EventKind::SubscriberOverflow {
                self.bus
                    .publish(Event::subscriber_overflow(lane.sub.name(), reason));
            }
        }
        accepted
    }

    /// Closes every lane and waits for the workers to finish what is queued.
    pub async fn shutdown(self) {
        drop(self.lanes);
        for worker in self.workers {
            let _ = worker.await;
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lanes.len()
    }
}

async fn drive(sub: Arc<dyn Subscribe>, mut rx: mpsc::Receiver<Arc<Event>>, bus: Bus) {
    while let Some(ev) = rx.recv().await {
        let handled = std::panic::AssertUnwindSafe(sub.on_event(&ev))
            .catch_unwind()
            .await;
        if let Err(payload) = handled {
            let info = panic_message(payload.as_ref());
            warn!(subscriber = sub.name(), %info, "subscriber panicked");
            bus.publish(Event::subscriber_panicked(sub.name(), info));
        }
    }
}

/// Extracts a printable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&'static str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
