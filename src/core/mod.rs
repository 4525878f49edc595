//! Stream core: admission, memory pressure and session lifecycles.
//!
//! Internal modules:
//! - [`guard`]: per-kind exclusion between concurrent stream sessions;
//! - [`pressure`]: collector tuning windows and reclaim passes;
//! - [`drain`]: close-then-discard for abandoned queues;
//! - [`export`]: the user event export switch;
//! - [`primary`]: orchestrator event stream sessions;
//! - [`secondary`]: user event stream sessions.

mod drain;
mod export;
mod guard;
mod pressure;
mod primary;
mod secondary;

pub use drain::drain_queue;
pub use export::ExportSwitch;
pub use guard::{ExclusionGuard, GuardLease, StreamKind};
pub use pressure::{
    PressureController, ReclaimKnob, RestoreTrigger, SharedKnob, TuningSnapshot,
};
pub use primary::{PrimarySession, PrimaryStream};
pub use secondary::{SecondarySession, SecondaryStream};
