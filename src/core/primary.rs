//! # Primary stream controller.
//!
//! Owns the lifetime of one orchestrator event stream RPC.
//!
//! ## States
//! ```text
//! Idle ──► GuardAcquiring ──(busy)──────────────────────────► Err(ChannelInUse)
//!               │
//!               ▼
//!          TuningEngaged ──(producer start fails)──► cancel, restore, release ─► Err(ProducerStartFailed)
//!               │
//!               ▼
//!          Forwarding ── queue closed ──────┐
//!               ├────── forward failed ─────┤
//!               ├────── client closed ──────┤
//!               └────── ctx cancelled ──────┤
//!                                           ▼
//!                                       Draining: cancel ctx → close producer client
//!                                                 → drain queue → end tuning race
//!                                           ▼
//!                                       Released: clear primary guard
//! ```
//!
//! ## Rules
//! - Open errors are returned before any background task is spawned.
//! - Teardown order is always cancel → drain → restore → release, and it runs on every
//!   exit path: normal return, forward error, panic in the transport, or the RPC future
//!   being dropped (the session's `Drop` runs the same teardown).
//! - The guard is observably free as soon as `forward` returns.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use crate::core::drain::drain_queue;
use crate::core::guard::{ExclusionGuard, GuardLease, StreamKind};
use crate::core::pressure::{PressureController, RestoreTrigger, TuningSnapshot};
use crate::error::StreamError;
use crate::events::{Bus, Event, EventKind};
use crate::producer::{EventBatch, EventStreamRequest, Producer, ProducerSet};
use crate::transport::{send_guarded, SendOutcome, StreamSink};

const KIND: StreamKind = StreamKind::Primary;

/// Admits and runs primary stream sessions.
#[derive(Clone)]
pub struct PrimaryStream {
    guard: ExclusionGuard,
    pressure: PressureController,
    producers: ProducerSet,
    bus: Bus,
}

impl PrimaryStream {
    pub fn new(
        guard: ExclusionGuard,
        pressure: PressureController,
        producers: ProducerSet,
        bus: Bus,
    ) -> Self {
        Self {
            guard,
            pressure,
            producers,
            bus,
        }
    }

    /// Opens and forwards a primary stream until it ends.
    ///
    /// `client` is the transport's cancellation token; cancelling it ends the stream
    /// without an error.
    pub async fn run<S>(
        &self,
        request: &EventStreamRequest,
        sink: S,
        client: &CancellationToken,
    ) -> Result<(), StreamError>
    where
        S: StreamSink<EventBatch>,
    {
        let session = self.open(request, client).await?;
        session.forward(sink).await
    }

    /// Admits a session and starts its producer.
    ///
    /// On success the producer is running and bulk tuning is engaged; the caller must
    /// drive [`PrimarySession::forward`] (or drop the session to tear it down).
    pub async fn open(
        &self,
        request: &EventStreamRequest,
        client: &CancellationToken,
    ) -> Result<PrimarySession, StreamError> {
        info!("starting orchestrator event stream");
        debug!(?request, "orchestrator event stream options");

        let Some(lease) = self.guard.try_acquire(KIND) else {
            error!("orchestrator event channel in use");
            self.bus
                .publish(Event::new(EventKind::GuardRejected).with_stream(KIND));
            return Err(StreamError::ChannelInUse { kind: KIND });
        };

        let tuning = self.pressure.engage(request.startup_tuning);
        let ctx = client.child_token();
        let producer = self.producers.select(request);
        let pod_prefixes = request.pod_prefix_config();

        // Cancels the producer context if this future is dropped mid-start.
        let start_guard = ctx.clone().drop_guard();
        let started = producer.start(ctx.clone(), request, &pod_prefixes).await;
        let ctx = start_guard.disarm();

        let output = match started {
            Ok(output) => output,
            Err(source) => {
                error!(producer = producer.name(), %source, "failed to start producer, cleaning up");
                ctx.cancel();
                tuning.restore(RestoreTrigger::SessionEnd);
                drop(lease);
                self.bus.publish(
                    Event::new(EventKind::ProducerStartFailed)
                        .with_stream(KIND)
                        .with_reason(source.to_string()),
                );
                self.bus
                    .publish(Event::new(EventKind::SessionReleased).with_stream(KIND));
                return Err(StreamError::ProducerStartFailed { kind: KIND, source });
            }
        };

        let session_end = CancellationToken::new();
        let restore = tuning.restore_race(output.bulk_done, session_end.clone());
        self.bus
            .publish(Event::new(EventKind::SessionOpened).with_stream(KIND));

        Ok(PrimarySession {
            ctx,
            events: output.events,
            producer,
            tuning,
            session_end,
            restore: Some(restore),
            lease,
            bus: self.bus.clone(),
            torn_down: false,
        })
    }
}

/// One admitted primary stream.
///
/// Dropping the session without calling [`forward`](Self::forward) runs the full
/// teardown.
pub struct PrimarySession {
    ctx: CancellationToken,
    events: mpsc::Receiver<EventBatch>,
    producer: Arc<dyn Producer>,
    tuning: TuningSnapshot,
    session_end: CancellationToken,
    restore: Option<JoinHandle<Option<RestoreTrigger>>>,
    lease: GuardLease,
    bus: Bus,
    torn_down: bool,
}

impl PrimarySession {
    /// The session context handed to the producer.
    pub fn context(&self) -> &CancellationToken {
        &self.ctx
    }

    /// Forwards event batches to `sink` until the queue closes, a send fails, the client
    /// closes its side or the session context is cancelled; then tears the session down.
    pub async fn forward<S>(mut self, mut sink: S) -> Result<(), StreamError>
    where
        S: StreamSink<EventBatch>,
    {
        info!("entering orchestrator event forwarding loop");
        let result = loop {
            tokio::select! {
                biased;
                _ = self.ctx.cancelled() => {
                    info!("orchestrator event stream context cancelled");
                    break Ok(());
                }
                _ = sink.closed() => {
                    info!("orchestrator event stream closed by client");
                    break Ok(());
                }
                batch = self.events.recv() => {
                    let Some(batch) = batch else {
                        debug!("orchestrator event stream finished");
                        break Ok(());
                    };
                    let size = batch.len();
                    match send_guarded(&mut sink, batch, &self.ctx).await {
                        SendOutcome::Sent => trace!(size, "forwarded event batch"),
                        SendOutcome::Canceled => {
                            info!("orchestrator event stream cancelled during send");
                            break Ok(());
                        }
                        SendOutcome::Failed(source) => {
                            error!(size, %source, "sending event batch failed");
                            self.bus.publish(
                                Event::new(EventKind::ForwardFailed)
                                    .with_stream(KIND)
                                    .with_reason(source.to_string()),
                            );
                            break Err(StreamError::ForwardFailed { kind: KIND, source });
                        }
                    }
                }
            }
        };

        self.teardown();
        if let Some(restore) = self.restore.take() {
            // Already restored synchronously above; this only reaps the race task.
            let _ = restore.await;
        }
        result
    }

    /// Cancel → drain → restore → release. Idempotent.
    fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        info!("orchestrator event stream closing");

        self.ctx.cancel();
        self.producer.close_client();

        let discarded = drain_queue(&mut self.events);
        debug!(discarded, "drained orchestrator event queue");
        self.bus.publish(
            Event::new(EventKind::SessionDrained)
                .with_stream(KIND)
                .with_count(discarded),
        );

        self.session_end.cancel();
        self.tuning.restore(RestoreTrigger::SessionEnd);

        self.lease.release();
        self.bus
            .publish(Event::new(EventKind::SessionReleased).with_stream(KIND));
    }
}

impl Drop for PrimarySession {
    fn drop(&mut self) {
        self.teardown();
    }
}
