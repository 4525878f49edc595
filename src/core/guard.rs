//! # Exclusion guard: single-holder admission per stream kind.
//!
//! The upstream event source is a singleton per process, so at most one primary stream
//! and, independently, at most one secondary stream may be active at any time.
//!
//! ## Rules
//! - Acquisition is **non-blocking**: a busy guard is reported immediately, never queued.
//! - The holder receives a [`GuardLease`]; dropping the lease clears the flag.
//! - [`ExclusionGuard::release`] is safe to call on a guard that was never acquired.
//! - The two kinds are fully independent.
//!
//! ```text
//! try_acquire(Primary) ──► Some(lease) ──► ... session ... ──► drop(lease) ──► free
//! try_acquire(Primary) ──► None  (while the lease above is alive)
//! ```

use std::fmt;
use std::sync::{Arc, Mutex};

/// Which stream an exclusion guard protects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// The orchestrator resource event stream.
    Primary,
    /// The user event stream.
    Secondary,
}

impl StreamKind {
    /// Returns a short stable name for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamKind::Primary => "primary",
            StreamKind::Secondary => "secondary",
        }
    }

    fn index(self) -> usize {
        match self {
            StreamKind::Primary => 0,
            StreamKind::Secondary => 1,
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// In-use flags for both stream kinds.
///
/// Cheap to clone; clones share the same flags.
#[derive(Clone, Debug, Default)]
pub struct ExclusionGuard {
    in_use: Arc<Mutex<[bool; 2]>>,
}

impl ExclusionGuard {
    /// Creates a guard with both kinds free.
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically tests and sets the in-use flag for `kind`.
    ///
    /// Returns `None` without waiting if the flag is already set.
    pub fn try_acquire(&self, kind: StreamKind) -> Option<GuardLease> {
        let mut flags = self.lock();
        if flags[kind.index()] {
            return None;
        }
        flags[kind.index()] = true;
        drop(flags);

        Some(GuardLease {
            guard: self.clone(),
            kind,
            released: false,
        })
    }

    /// Clears the in-use flag for `kind`.
    pub fn release(&self, kind: StreamKind) {
        self.lock()[kind.index()] = false;
    }

    /// Returns true if `kind` currently has a holder.
    pub fn is_held(&self, kind: StreamKind) -> bool {
        self.lock()[kind.index()]
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, [bool; 2]> {
        // The flags stay consistent under poisoning: every write is a single store.
        self.in_use.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Proof of holding the guard for one stream kind.
///
/// Releasing is idempotent; dropping an unreleased lease releases it.
#[derive(Debug)]
pub struct GuardLease {
    guard: ExclusionGuard,
    kind: StreamKind,
    released: bool,
}

impl GuardLease {
    /// The kind this lease holds.
    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    /// Clears the guard. Later calls (and the drop) do nothing.
    pub fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.guard.release(self.kind);
        }
    }
}

impl Drop for GuardLease {
    fn drop(&mut self) {
        self.release();
    }
}
