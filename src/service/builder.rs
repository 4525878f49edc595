use std::sync::Arc;

use crate::config::AgentConfig;
use crate::core::{PressureController, PrimaryStream, ReclaimKnob, SecondaryStream, SharedKnob};
use crate::events::Bus;
use crate::producer::{ProducerSet, UserEventSource};
use crate::runtime::{CommandDispatcher, RuntimeConnector};
use crate::subscribers::{Subscribe, SubscriberSet};

use super::{Agent, AgentState};

/// Collaborators the agent drives but does not implement.
pub struct AgentDeps {
    pub producers: ProducerSet,
    pub user_events: Arc<dyn UserEventSource>,
    pub connector: Arc<dyn RuntimeConnector>,
}

/// Builder for constructing an [`Agent`] with optional features.
pub struct AgentBuilder {
    cfg: AgentConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
    knob: Option<Arc<dyn ReclaimKnob>>,
    export_enabled: bool,
}

impl AgentBuilder {
    pub fn new(cfg: AgentConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            knob: None,
            export_enabled: false,
        }
    }

    /// Sets lifecycle event subscribers.
    ///
    /// Subscribers receive session events (admission, tuning, teardown) through
    /// dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Sets the collector tuning knob. Defaults to a [`SharedKnob`] at the steady value.
    pub fn with_knob(mut self, knob: Arc<dyn ReclaimKnob>) -> Self {
        self.knob = Some(knob);
        self
    }

    /// Starts with user event export enabled. Export is stopped by default until the
    /// backend sends `events` = `start`.
    pub fn with_export_enabled(mut self, enabled: bool) -> Self {
        self.export_enabled = enabled;
        self
    }

    /// Builds the agent and starts its subscriber listener.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn build(self, deps: AgentDeps) -> Arc<Agent> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = Arc::new(SubscriberSet::new(self.subscribers, bus.clone()));

        let knob = self
            .knob
            .unwrap_or_else(|| Arc::new(SharedKnob::new(self.cfg.steady_tuning)));
        let state = AgentState::new(knob, self.export_enabled);
        let pressure =
            PressureController::new(Arc::clone(&state.knob), self.cfg.steady_tuning, bus.clone());

        let primary = PrimaryStream::new(
            state.guard.clone(),
            pressure.clone(),
            deps.producers,
            bus.clone(),
        );
        let secondary = SecondaryStream::new(
            state.guard.clone(),
            pressure,
            deps.user_events,
            state.export.clone(),
            self.cfg.heartbeat_clamped(),
            bus.clone(),
        );
        let commands = CommandDispatcher::new(&self.cfg, deps.connector);

        let agent = Arc::new(Agent::new_internal(
            self.cfg, state, bus, primary, secondary, commands, subs,
        ));
        agent.subscriber_listener();
        agent
    }
}
