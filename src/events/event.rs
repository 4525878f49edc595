//! # Lifecycle events emitted by the stream controllers.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Admission events**: a session was admitted or rejected by its exclusion guard
//! - **Tuning events**: bulk reclamation engaged, restored, or found inconsistent
//! - **Teardown events**: forward failures, queue drains, watch joins, guard releases
//!
//! The [`Event`] struct carries metadata such as timestamps, the stream kind,
//! reasons, and tuning values.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Within one session, `SessionDrained` is always published before `SessionReleased`.
//!
//! ## Example
//! ```rust
//! use coagent::{Event, EventKind, StreamKind};
//!
//! let ev = Event::new(EventKind::TuningMismatch)
//!     .with_stream(StreamKind::Primary)
//!     .with_tuning(50, 20)
//!     .with_reason("restore found unexpected value");
//!
//! assert_eq!(ev.kind, EventKind::TuningMismatch);
//! assert_eq!(ev.stream, Some(StreamKind::Primary));
//! assert_eq!(ev.tuning, Some((50, 20)));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::SystemTime;

use crate::core::StreamKind;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `reason`: subscriber name and panic info
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `reason`: subscriber name and cause (`full`, `closed`)
    SubscriberOverflow,

    // === Admission events ===
    /// A session acquired its exclusion guard.
    ///
    /// Sets:
    /// - `stream`: stream kind
    SessionOpened,

    /// A session was refused because the guard was held.
    ///
    /// Sets:
    /// - `stream`: stream kind
    GuardRejected,

    /// The producer (or user-event source) failed to start.
    ///
    /// Sets:
    /// - `stream`: stream kind
    /// - `reason`: producer error
    ProducerStartFailed,

    // === Tuning events ===
    /// Bulk reclamation tuning was applied.
    ///
    /// Sets:
    /// - `tuning`: `(previous, bulk)`
    TuningEngaged,

    /// The previous tuning value was restored.
    ///
    /// Sets:
    /// - `tuning`: `(restored, observed_before_restore)`
    /// - `reason`: `bulk_done` or `session_end`
    TuningRestored,

    /// A tuning value other than the expected one was observed.
    ///
    /// Diagnostic only; never escalated to a failure.
    ///
    /// Sets:
    /// - `tuning`: `(observed, expected)`
    /// - `reason`: `engage` or `restore`
    TuningMismatch,

    // === Streaming events ===
    /// The secondary stream was idle for one heartbeat interval.
    ///
    /// Sets:
    /// - `stream`: stream kind
    Heartbeat,

    /// The client transport rejected a send.
    ///
    /// Sets:
    /// - `stream`: stream kind
    /// - `reason`: transport error
    ForwardFailed,

    // === Teardown events ===
    /// The session queue was drained after the forwarding loop stopped.
    ///
    /// Sets:
    /// - `stream`: stream kind
    /// - `count`: number of discarded items
    SessionDrained,

    /// The secondary watch task has fully stopped.
    ///
    /// Sets:
    /// - `stream`: stream kind
    WatchJoined,

    /// The exclusion guard was cleared; a new session of this kind may be admitted.
    ///
    /// Sets:
    /// - `stream`: stream kind
    SessionReleased,
}

/// Lifecycle event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Stream kind the event belongs to, if any.
    pub stream: Option<StreamKind>,
    /// Human-readable reason (errors, trigger names, overflow details).
    pub reason: Option<Arc<str>>,
    /// Item count (drained items).
    pub count: Option<u64>,
    /// Pair of tuning values; meaning depends on the kind.
    pub tuning: Option<(i32, i32)>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            stream: None,
            reason: None,
            count: None,
            tuning: None,
        }
    }

    /// Attaches the stream kind.
    #[inline]
    pub fn with_stream(mut self, stream: StreamKind) -> Self {
        self.stream = Some(stream);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches an item count.
    #[inline]
    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count as u64);
        self
    }

    /// Attaches a pair of tuning values.
    #[inline]
    pub fn with_tuning(mut self, first: i32, second: i32) -> Self {
        self.tuning = Some((first, second));
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_reason(format!("subscriber={subscriber} info={info}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_is_monotonic() {
        let a = Event::new(EventKind::SessionOpened);
        let b = Event::new(EventKind::SessionReleased);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn builders_set_fields() {
        let ev = Event::new(EventKind::SessionDrained)
            .with_stream(StreamKind::Secondary)
            .with_count(3);
        assert_eq!(ev.stream, Some(StreamKind::Secondary));
        assert_eq!(ev.count, Some(3));
        assert!(ev.reason.is_none());
    }
}
