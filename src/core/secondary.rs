//! # Secondary stream controller.
//!
//! Owns the lifetime of one user event stream RPC.
//!
//! ## States
//! ```text
//! Idle ──► GuardAcquiring ──(busy)──► Err(ChannelInUse)
//!               │
//!               ▼
//!          Watching ── queue closed / client closed / ctx cancelled / forward failed
//!               │   └─ idle for one heartbeat ─► log heartbeat, keep waiting
//!               ▼
//!          Draining: cancel ctx → drain queue
//!               ▼
//!          Joined:   await the watch task
//!               ▼
//!          Released: clear secondary guard
//! ```
//!
//! ## Rules
//! - The guard is released strictly **after** the watch task has stopped, so a new
//!   session never overlaps the old watch's cleanup on shared watch infrastructure.
//! - A primary teardown that closes the shared watch infrastructure shows up here as
//!   an ordinary queue close.
//! - If the session is dropped mid-stream or while it is joining the watch, the drop
//!   cancels and drains (once) and hands the join-then-release step to a detached task.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::core::drain::drain_queue;
use crate::core::export::ExportSwitch;
use crate::core::guard::{ExclusionGuard, GuardLease, StreamKind};
use crate::core::pressure::PressureController;
use crate::error::StreamError;
use crate::events::{Bus, Event, EventKind};
use crate::producer::{UserEvent, UserEventFilter, UserEventRequest, UserEventSource};
use crate::transport::{send_guarded, SendOutcome, StreamSink};

const KIND: StreamKind = StreamKind::Secondary;

/// Admits and runs user event stream sessions.
#[derive(Clone)]
pub struct SecondaryStream {
    guard: ExclusionGuard,
    pressure: PressureController,
    source: Arc<dyn UserEventSource>,
    export: ExportSwitch,
    heartbeat: Duration,
    bus: Bus,
}

impl SecondaryStream {
    pub fn new(
        guard: ExclusionGuard,
        pressure: PressureController,
        source: Arc<dyn UserEventSource>,
        export: ExportSwitch,
        heartbeat: Duration,
        bus: Bus,
    ) -> Self {
        Self {
            guard,
            pressure,
            source,
            export,
            heartbeat,
            bus,
        }
    }

    /// Opens and forwards a user event stream until it ends.
    pub async fn run<S>(
        &self,
        request: &UserEventRequest,
        sink: S,
        client: &CancellationToken,
    ) -> Result<(), StreamError>
    where
        S: StreamSink<UserEvent>,
    {
        let session = self.open(request, client).await?;
        session.forward(sink).await
    }

    /// Admits a session and starts its watch task.
    pub async fn open(
        &self,
        request: &UserEventRequest,
        client: &CancellationToken,
    ) -> Result<SecondarySession, StreamError> {
        info!("starting user event stream");
        debug!(?request, "user event stream options");

        let Some(lease) = self.guard.try_acquire(KIND) else {
            error!("previous user event stream still active");
            self.bus
                .publish(Event::new(EventKind::GuardRejected).with_stream(KIND));
            return Err(StreamError::ChannelInUse { kind: KIND });
        };

        self.pressure.reclaim();

        let (tx, events) = mpsc::channel(request.queue_capacity());
        let ctx = client.child_token();
        let filter = request.filter();

        let start_guard = ctx.clone().drop_guard();
        let watch = match self.source.start(ctx.clone(), tx, &filter).await {
            Ok(watch) => watch,
            Err(source) => {
                error!(%source, "could not start user event watch");
                drop(start_guard);
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
        let ctx = start_guard.disarm();

        self.bus
            .publish(Event::new(EventKind::SessionOpened).with_stream(KIND));

        Ok(SecondarySession {
            ctx,
            events,
            watch: Some(tokio::spawn(watch)),
            lease: Some(lease),
            drained: false,
            filter,
            export: self.export.clone(),
            heartbeat: self.heartbeat,
            bus: self.bus.clone(),
        })
    }
}

/// One admitted user event stream.
pub struct SecondarySession {
    ctx: CancellationToken,
    events: mpsc::Receiver<UserEvent>,
    watch: Option<JoinHandle<()>>,
    /// `None` once the session has been released.
    lease: Option<GuardLease>,
    drained: bool,
    filter: UserEventFilter,
    export: ExportSwitch,
    heartbeat: Duration,
    bus: Bus,
}

impl SecondarySession {
    /// The session context handed to the watch.
    pub fn context(&self) -> &CancellationToken {
        &self.ctx
    }

    /// Forwards user events to `sink` until the stream ends, then drains, joins the
    /// watch task and releases the guard.
    ///
    /// Quiet periods never end the stream: each idle heartbeat interval is logged and
    /// the loop keeps waiting.
    pub async fn forward<S>(mut self, mut sink: S) -> Result<(), StreamError>
    where
        S: StreamSink<UserEvent>,
    {
        info!("entering user event forwarding loop");
        let result = loop {
            tokio::select! {
                biased;
                _ = self.ctx.cancelled() => {
                    debug!("user event stream context cancelled");
                    break Ok(());
                }
                _ = sink.closed() => {
                    debug!("user event stream closed by client");
                    break Ok(());
                }
                received = tokio::time::timeout(self.heartbeat, self.events.recv()) => {
                    let event = match received {
                        Err(_idle) => {
                            debug!(interval = ?self.heartbeat, "no user events for one heartbeat interval");
                            self.bus
                                .publish(Event::new(EventKind::Heartbeat).with_stream(KIND));
                            continue;
                        }
                        Ok(None) => {
                            info!("user event stream finished");
                            break Ok(());
                        }
                        Ok(Some(event)) => event,
                    };

                    if !self.export.is_enabled() || !self.filter.admits(&event) {
                        trace!(kind = %event.kind, uid = %event.uid, "user event not exported");
                        continue;
                    }

                    let (kind, uid) = (event.kind.clone(), event.uid.clone());
                    match send_guarded(&mut sink, event, &self.ctx).await {
                        SendOutcome::Sent => {}
                        SendOutcome::Canceled => break Ok(()),
                        SendOutcome::Failed(source) => {
                            error!(%kind, %uid, %source, "sending user event failed");
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

        self.finish().await;
        result
    }

    /// Cancel → drain → join → release.
    ///
    /// The lease and the watch handle stay in `self` until the join completes, so a
    /// forward future dropped mid-join leaves the rest to [`Drop`].
    async fn finish(&mut self) {
        if self.lease.is_none() {
            return;
        }
        info!("user event stream exiting");
        self.cancel_and_drain();

        if let Some(watch) = self.watch.as_mut() {
            join_watch(watch, &self.bus).await;
            self.watch = None;
        }
        if let Some(lease) = self.lease.take() {
            release(lease, &self.bus);
        }
    }

    fn cancel_and_drain(&mut self) {
        self.ctx.cancel();
        if self.drained {
            return;
        }
        self.drained = true;
        let discarded = drain_queue(&mut self.events);
        debug!(discarded, "drained user event queue");
        self.bus.publish(
            Event::new(EventKind::SessionDrained)
                .with_stream(KIND)
                .with_count(discarded),
        );
    }
}

impl Drop for SecondarySession {
    fn drop(&mut self) {
        let Some(lease) = self.lease.take() else {
            return;
        };
        info!("user event stream dropped, cleaning up");
        self.cancel_and_drain();

        let watch = self.watch.take();
        let bus = self.bus.clone();
        match (watch, tokio::runtime::Handle::try_current()) {
            (Some(mut watch), Ok(rt)) => {
                rt.spawn(async move {
                    join_watch(&mut watch, &bus).await;
                    release(lease, &bus);
                });
            }
            (watch, _) => {
                if let Some(watch) = watch {
                    warn!("no runtime to join user event watch, aborting it");
                    watch.abort();
                }
                release(lease, &bus);
            }
        }
    }
}

async fn join_watch(watch: &mut JoinHandle<()>, bus: &Bus) {
    if let Err(e) = watch.await {
        if e.is_panic() {
            warn!("user event watch panicked");
        }
    }
    debug!("user event watch joined");
    bus.publish(Event::new(EventKind::WatchJoined).with_stream(KIND));
}

fn release(mut lease: GuardLease, bus: &Bus) {
    lease.release();
    debug!(stream = %lease.kind(), "exclusion guard released");
    bus.publish(Event::new(EventKind::SessionReleased).with_stream(KIND));
}
