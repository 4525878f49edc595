//! Event export switch toggled by `set_option("events", ...)`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Whether user events reach the client at all.
///
/// Cheap to clone; clones share the flag. While export is stopped, user event streams
/// stay open but discard what they receive.
#[derive(Clone, Debug, Default)]
pub struct ExportSwitch {
    enabled: Arc<AtomicBool>,
}

impl ExportSwitch {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: Arc::new(AtomicBool::new(enabled)),
        }
    }

    pub fn set(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }
}
