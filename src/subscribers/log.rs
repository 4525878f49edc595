//! # LogWriter: lifecycle events as `tracing` records
//!
//! A minimal subscriber that renders incoming [`Event`]s through `tracing`.
//!
//! ## Example output
//! ```text
//! INFO  session opened stream=primary
//! WARN  guard rejected stream=primary
//! INFO  tuning restored restored=100 observed=20 trigger="bulk_done"
//! DEBUG session drained stream=secondary discarded=4
//! INFO  session released stream=secondary
//! ```

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let stream = e.stream.map(|s| s.as_str()).unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");
        match e.kind {
            EventKind::SessionOpened => info!(stream, seq = e.seq, "session opened"),
            EventKind::GuardRejected => warn!(stream, seq = e.seq, "guard rejected"),
            EventKind::ProducerStartFailed => {
                error!(stream, seq = e.seq, reason, "producer start failed")
            }
            EventKind::TuningEngaged => {
                let (previous, bulk) = e.tuning.unwrap_or_default();
                info!(previous, bulk, "tuning engaged")
            }
            EventKind::TuningRestored => {
                let (restored, observed) = e.tuning.unwrap_or_default();
                info!(restored, observed, trigger = reason, "tuning restored")
            }
            EventKind::TuningMismatch => {
                let (observed, expected) = e.tuning.unwrap_or_default();
                warn!(observed, expected, phase = reason, "tuning mismatch")
            }
            EventKind::Heartbeat => debug!(stream, "no events for one heartbeat interval"),
            EventKind::ForwardFailed => warn!(stream, reason, "forward failed"),
            EventKind::SessionDrained => {
                debug!(stream, discarded = e.count.unwrap_or(0), "session drained")
            }
            EventKind::WatchJoined => debug!(stream, "watch joined"),
            EventKind::SessionReleased => info!(stream, seq = e.seq, "session released"),
            EventKind::SubscriberOverflow => warn!(reason, "subscriber overflow"),
            EventKind::SubscriberPanicked => warn!(reason, "subscriber panicked"),
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
