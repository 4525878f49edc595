//! # Resource-pressure controller.
//!
//! The initial full listing of a primary stream allocates heavily. While it runs, the
//! process-wide reclamation setting is switched to a more aggressive "bulk" value and
//! restored afterwards.
//!
//! ## Flow
//! ```text
//! engage(bulk) ──► knob.set(bulk) (warn if previous != steady) ──► knob.reclaim()
//!      │
//!      └─► TuningSnapshot ──► restore_race(bulk_done, session_end)
//!                                  ├─ bulk_done fires first   ─► restore (BulkDone)
//!                                  └─ session_end fires first ─► restore (SessionEnd)
//!                                        knob.set(previous) (error if observed != bulk)
//!                                        knob.reclaim()
//! ```
//!
//! ## Rules
//! - A snapshot restores **exactly once**; later `restore` calls and the drop are no-ops.
//! - Mismatches are diagnostic only: logged and published, never escalated.
//! - The knob supports a single primary session at a time; the exclusion guard
//!   provides that serialization.

use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::DEFAULT_TUNING;
use crate::events::{Bus, Event, EventKind};

/// Process-wide reclamation setting.
pub trait ReclaimKnob: Send + Sync + 'static {
    /// Overwrites the setting and returns the previous value.
    fn set(&self, value: i32) -> i32;

    /// Reads the current setting.
    fn get(&self) -> i32;

    /// Runs an immediate reclamation pass.
    fn reclaim(&self);
}

/// Hook invoked for every reclamation pass.
pub type ReclaimHook = Box<dyn Fn() + Send + Sync>;

/// In-process [`ReclaimKnob`] backed by an atomic.
///
/// Allocation-heavy collaborators read [`SharedKnob::get`] to decide how eagerly they
/// release cached memory; the optional hook runs on every reclamation pass.
pub struct SharedKnob {
    value: AtomicI32,
    passes: AtomicU64,
    hook: Option<ReclaimHook>,
}

impl SharedKnob {
    /// Creates a knob holding `initial`.
    pub fn new(initial: i32) -> Self {
        Self {
            value: AtomicI32::new(initial),
            passes: AtomicU64::new(0),
            hook: None,
        }
    }

    /// Attaches a hook run on every reclamation pass.
    pub fn with_hook(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    /// Number of reclamation passes so far.
    pub fn passes(&self) -> u64 {
        self.passes.load(Ordering::Acquire)
    }
}

impl Default for SharedKnob {
    fn default() -> Self {
        Self::new(DEFAULT_TUNING)
    }
}

impl ReclaimKnob for SharedKnob {
    fn set(&self, value: i32) -> i32 {
        self.value.swap(value, Ordering::AcqRel)
    }

    fn get(&self) -> i32 {
        self.value.load(Ordering::Acquire)
    }

    fn reclaim(&self) {
        self.passes.fetch_add(1, Ordering::AcqRel);
        if let Some(hook) = &self.hook {
            hook();
        }
    }
}

/// Which signal won the restore race.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RestoreTrigger {
    /// The producer finished its initial listing.
    BulkDone,
    /// The session ended first.
    SessionEnd,
}

impl RestoreTrigger {
    /// Returns a short stable name for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            RestoreTrigger::BulkDone => "bulk_done",
            RestoreTrigger::SessionEnd => "session_end",
        }
    }
}

/// Engages and restores bulk tuning around primary streams.
#[derive(Clone)]
pub struct PressureController {
    knob: Arc<dyn ReclaimKnob>,
    steady: i32,
    bus: Bus,
}

impl PressureController {
    /// Creates a controller over `knob`; `steady` is the value expected between sessions.
    pub fn new(knob: Arc<dyn ReclaimKnob>, steady: i32, bus: Bus) -> Self {
        Self { knob, steady, bus }
    }

    /// Runs a reclamation pass without touching the setting.
    pub fn reclaim(&self) {
        debug!("running reclamation pass");
        self.knob.reclaim();
    }

    /// Applies `bulk` and returns the snapshot that will restore the previous value.
    pub fn engage(&self, bulk: i32) -> TuningSnapshot {
        let previous = self.knob.set(bulk);
        debug!(bulk, previous, "engaging bulk tuning");
        if previous != self.steady {
            warn!(
                previous,
                expected = self.steady,
                "tuning was not at steady state when engaging bulk tuning"
            );
            self.bus.publish(
                Event::new(EventKind::TuningMismatch)
                    .with_tuning(previous, self.steady)
                    .with_reason("engage"),
            );
        }
        self.bus
            .publish(Event::new(EventKind::TuningEngaged).with_tuning(previous, bulk));
        self.knob.reclaim();

        TuningSnapshot {
            state: Arc::new(Mutex::new(SnapshotState {
                knob: Arc::clone(&self.knob),
                bus: self.bus.clone(),
                previous,
                bulk,
                restored: false,
            })),
            previous,
            bulk,
        }
    }
}

/// Captured tuning state of one primary session.
///
/// Clones share the one-shot restore flag: whichever clone restores first wins, every
/// later attempt is a no-op. If no clone ever restores, the last drop does.
#[derive(Clone)]
pub struct TuningSnapshot {
    state: Arc<Mutex<SnapshotState>>,
    previous: i32,
    bulk: i32,
}

struct SnapshotState {
    knob: Arc<dyn ReclaimKnob>,
    bus: Bus,
    previous: i32,
    bulk: i32,
    restored: bool,
}

impl TuningSnapshot {
    /// Value in effect before the session engaged bulk tuning.
    pub fn previous(&self) -> i32 {
        self.previous
    }

    /// Bulk value applied for the listing phase.
    pub fn bulk(&self) -> i32 {
        self.bulk
    }

    /// True once the previous value has been put back.
    pub fn is_restored(&self) -> bool {
        self.lock().restored
    }

    /// Restores the previous value. Returns `false` if already restored.
    pub fn restore(&self, trigger: RestoreTrigger) -> bool {
        self.lock().restore(trigger)
    }

    /// Spawns the restore race: whichever of `bulk_done` or `session_end` fires first
    /// restores the tuning; the other signal is ignored.
    ///
    /// Resolves to the trigger that restored, or `None` when another path restored
    /// first. A `bulk_done` sender dropped without firing counts as the listing being over.
    pub fn restore_race(
        &self,
        bulk_done: oneshot::Receiver<()>,
        session_end: CancellationToken,
    ) -> JoinHandle<Option<RestoreTrigger>> {
        let snapshot = self.clone();
        tokio::spawn(async move {
            let trigger = tokio::select! {
                biased;
                _ = session_end.cancelled() => {
                    debug!("primary stream exiting before initial listing completed");
                    RestoreTrigger::SessionEnd
                }
                res = bulk_done => {
                    match res {
                        Ok(()) => info!("orchestrator initial listing complete"),
                        Err(_) => debug!("producer dropped its listing signal"),
                    }
                    RestoreTrigger::BulkDone
                }
            };
            snapshot.restore(trigger).then_some(trigger)
        })
    }

    fn lock(&self) -> MutexGuard<'_, SnapshotState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl SnapshotState {
    fn restore(&mut self, trigger: RestoreTrigger) -> bool {
        if self.restored {
            return false;
        }
        self.restored = true;

        let observed = self.knob.set(self.previous);
        debug!(restored = self.previous, observed, trigger = trigger.as_str(), "restoring tuning");
        if observed != self.bulk {
            error!(
                observed,
                expected = self.bulk,
                "tuning changed by someone else during bulk listing"
            );
            self.bus.publish(
                Event::new(EventKind::TuningMismatch)
                    .with_tuning(observed, self.bulk)
                    .with_reason("restore"),
            );
        }
        self.bus.publish(
            Event::new(EventKind::TuningRestored)
                .with_tuning(self.previous, observed)
                .with_reason(trigger.as_str()),
        );
        self.knob.reclaim();
        true
    }
}

impl Drop for SnapshotState {
    fn drop(&mut self) {
        self.restore(RestoreTrigger::SessionEnd);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn controller(initial: i32) -> (Arc<SharedKnob>, PressureController, Bus) {
        let knob = Arc::new(SharedKnob::new(initial));
        let bus = Bus::new(64);
        let ctl = PressureController::new(knob.clone(), DEFAULT_TUNING, bus.clone());
        (knob, ctl, bus)
    }

    #[test]
    fn engage_applies_bulk_and_reclaims() {
        let (knob, ctl, _bus) = controller(DEFAULT_TUNING);
        let snap = ctl.engage(20);
        assert_eq!(knob.get(), 20);
        assert_eq!(snap.previous(), DEFAULT_TUNING);
        assert_eq!(knob.passes(), 1);
        drop(snap);
        assert_eq!(knob.get(), DEFAULT_TUNING);
        assert_eq!(knob.passes(), 2);
    }

    #[test]
    fn hook_runs_on_every_reclamation_pass() {
        let runs = Arc::new(AtomicU64::new(0));
        let knob = Arc::new(SharedKnob::new(DEFAULT_TUNING).with_hook({
            let runs = Arc::clone(&runs);
            move || {
                runs.fetch_add(1, Ordering::SeqCst);
            }
        }));
        let ctl = PressureController::new(knob.clone(), DEFAULT_TUNING, Bus::new(8));

        ctl.reclaim();
        let snap = ctl.engage(20);
        assert!(snap.restore(RestoreTrigger::BulkDone));

        assert_eq!(runs.load(Ordering::SeqCst), 3);
        assert_eq!(knob.passes(), 3);
    }

    #[test]
    fn restore_happens_once() {
        let (knob, ctl, _bus) = controller(DEFAULT_TUNING);
        let snap = ctl.engage(10);
        assert!(snap.restore(RestoreTrigger::BulkDone));
        knob.set(55);
        assert!(!snap.restore(RestoreTrigger::SessionEnd));
        drop(snap);
        assert_eq!(knob.get(), 55, "a restored snapshot must not touch the knob again");
        assert_eq!(knob.passes(), 2);
    }

    #[test]
    fn unexpected_values_are_reported_not_fatal() {
        let (knob, ctl, bus) = controller(70);
        let mut rx = bus.subscribe();

        let snap = ctl.engage(20);
        knob.set(33);
        assert!(snap.restore(RestoreTrigger::SessionEnd));
        assert_eq!(knob.get(), 70);

        let mut mismatches = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            if ev.kind == EventKind::TuningMismatch {
                mismatches.push((ev.reason.as_deref().map(str::to_owned), ev.tuning));
            }
        }
        assert_eq!(
            mismatches,
            vec![
                (Some("engage".to_string()), Some((70, DEFAULT_TUNING))),
                (Some("restore".to_string()), Some((33, 20))),
            ]
        );
    }

    #[tokio::test]
    async fn bulk_done_wins_race() {
        let (knob, ctl, _bus) = controller(DEFAULT_TUNING);
        let snap = ctl.engage(20);
        let (tx, rx) = oneshot::channel();
        let end = CancellationToken::new();
        let race = snap.restore_race(rx, end.clone());

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(knob.get(), 20, "bulk value holds until a signal fires");

        tx.send(()).expect("send");
        assert_eq!(race.await.expect("join"), Some(RestoreTrigger::BulkDone));
        assert_eq!(knob.get(), DEFAULT_TUNING);

        end.cancel();
        assert_eq!(knob.get(), DEFAULT_TUNING);
        assert_eq!(knob.passes(), 2);
    }

    #[tokio::test]
    async fn session_end_wins_race() {
        let (knob, ctl, _bus) = controller(DEFAULT_TUNING);
        let snap = ctl.engage(20);
        let (tx, rx) = oneshot::channel::<()>();
        let end = CancellationToken::new();
        let race = snap.restore_race(rx, end.clone());

        end.cancel();
        assert_eq!(race.await.expect("join"), Some(RestoreTrigger::SessionEnd));
        assert_eq!(knob.get(), DEFAULT_TUNING);

        let _ = tx.send(());
        assert_eq!(knob.passes(), 2);
    }

    #[tokio::test]
    async fn race_loser_after_direct_restore_is_noop() {
        let (knob, ctl, _bus) = controller(DEFAULT_TUNING);
        let snap = ctl.engage(20);
        let (tx, rx) = oneshot::channel();
        let end = CancellationToken::new();
        let race = snap.restore_race(rx, end.clone());

        assert!(snap.restore(RestoreTrigger::SessionEnd));
        assert!(snap.is_restored());
        knob.set(42);

        tx.send(()).expect("send");
        assert_eq!(race.await.expect("join"), None);
        assert_eq!(knob.get(), 42);
        drop(snap);
        assert_eq!(knob.get(), 42);
    }
}
