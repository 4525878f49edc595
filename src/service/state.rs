use std::sync::Arc;

use crate::config::DEFAULT_TUNING;
use crate::core::{ExclusionGuard, ExportSwitch, ReclaimKnob, SharedKnob};

/// Cross-session state shared by every stream of one agent.
///
/// Independent instances never interfere, so tests build one per case.
#[derive(Clone)]
pub struct AgentState {
    pub guard: ExclusionGuard,
    pub knob: Arc<dyn ReclaimKnob>,
    pub export: ExportSwitch,
}

impl AgentState {
    pub fn new(knob: Arc<dyn ReclaimKnob>, export_enabled: bool) -> Self {
        Self {
            guard: ExclusionGuard::new(),
            knob,
            export: ExportSwitch::new(export_enabled),
        }
    }
}

impl Default for AgentState {
    /// Fresh guard, a [`SharedKnob`] at the steady default and export stopped.
    fn default() -> Self {
        Self::new(Arc::new(SharedKnob::new(DEFAULT_TUNING)), false)
    }
}
