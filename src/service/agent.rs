//! # Agent facade.
//!
//! [`Agent`] is what an RPC server binds its handlers to. Each handler maps onto one
//! method:
//!
//! ```text
//! OrchestratorEventStream ──► start_orchestrator_event_stream ──► PrimaryStream::run
//! UserEventStream         ──► attach_user_event_stream        ──► SecondaryStream::run
//! SetOption               ──► set_option                      ──► ExportSwitch
//! RuntimeCommand          ──► perform_runtime_command         ──► CommandDispatcher
//! Ping                    ──► ping                            ──► Pong
//! ```
//!
//! Every session publishes lifecycle events on the agent's [`Bus`]; a listener task
//! forwards them to the configured subscribers.

use std::sync::{Arc, Mutex};

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::options::{self, OptionResult};
use super::ping::Pong;
use super::state::AgentState;
use crate::config::AgentConfig;
use crate::core::{PrimaryStream, SecondaryStream};
use crate::error::StreamError;
use crate::events::Bus;
use crate::producer::{EventBatch, EventStreamRequest, UserEvent, UserEventRequest};
use crate::runtime::{CommandDispatcher, CommandResult, RuntimeCommand};
use crate::subscribers::SubscriberSet;
use crate::transport::StreamSink;

/// Orchestration agent: stream controllers plus the unary operations.
///
/// Built with [`AgentBuilder`](super::AgentBuilder).
pub struct Agent {
    cfg: AgentConfig,
    state: AgentState,
    bus: Bus,
    primary: PrimaryStream,
    secondary: SecondaryStream,
    commands: CommandDispatcher,
    subs: Mutex<Option<Arc<SubscriberSet>>>,
    listener: Mutex<Option<JoinHandle<()>>>,
    listener_stop: CancellationToken,
}

impl Agent {
    pub(super) fn new_internal(
        cfg: AgentConfig,
        state: AgentState,
        bus: Bus,
        primary: PrimaryStream,
        secondary: SecondaryStream,
        commands: CommandDispatcher,
        subs: Arc<SubscriberSet>,
    ) -> Self {
        Self {
            cfg,
            state,
            bus,
            primary,
            secondary,
            commands,
            subs: Mutex::new(Some(subs)),
            listener: Mutex::new(None),
            listener_stop: CancellationToken::new(),
        }
    }

    /// Subscribes to the bus and forwards events to the subscriber set (fire-and-forget).
    pub(super) fn subscriber_listener(&self) {
        let Some(set) = self.subscribers() else {
            return;
        };
        if set.is_empty() {
            return;
        }
        let mut rx = self.bus.subscribe();
        let stop = self.listener_stop.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = stop.cancelled() => break,
                    ev = rx.recv() => match ev {
                        Ok(ev) => {
                            set.emit(&ev);
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "subscriber listener lagged behind the bus");
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
        });
        *self.listener.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
    }

    /// Runs an orchestrator event stream to completion.
    ///
    /// Returns `Ok` when the producer finished, the client went away or `client` was
    /// cancelled. See [`PrimaryStream`] for the session lifecycle.
    pub async fn start_orchestrator_event_stream<S>(
        &self,
        request: &EventStreamRequest,
        sink: S,
        client: &CancellationToken,
    ) -> Result<(), StreamError>
    where
        S: StreamSink<EventBatch>,
    {
        self.primary.run(request, sink, client).await
    }

    /// Runs a user event stream to completion.
    pub async fn attach_user_event_stream<S>(
        &self,
        request: &UserEventRequest,
        sink: S,
        client: &CancellationToken,
    ) -> Result<(), StreamError>
    where
        S: StreamSink<UserEvent>,
    {
        self.secondary.run(request, sink, client).await
    }

    /// Sets an agent option. Only `events` = `start` | `stop` is recognized.
    pub fn set_option(&self, key: &str, value: &str) -> OptionResult {
        debug!(key, value, "received set option");
        let res = options::apply(&self.state.export, key, value);
        match &res {
            Ok(()) => info!(key, value, "option applied"),
            Err(e) => warn!(key, value, error = %e, label = e.as_label(), "option rejected"),
        }
        OptionResult::from(res)
    }

    /// Performs a container runtime command.
    pub async fn perform_runtime_command(&self, command: &RuntimeCommand) -> CommandResult {
        self.commands.perform(command).await
    }

    /// Echoes `token` with this process's pid and resident memory.
    pub fn ping(&self, token: i64) -> Pong {
        debug!(token, "received ping");
        Pong::answer(token)
    }

    pub fn config(&self) -> &AgentConfig {
        &self.cfg
    }

    pub fn state(&self) -> &AgentState {
        &self.state
    }

    /// The agent's lifecycle event bus.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Stops the subscriber listener and waits for subscribers to finish their queues.
    ///
    /// Streams still running keep publishing to the bus; nothing reaches subscribers
    /// afterwards. Calling it twice is a no-op.
    pub async fn shutdown(&self) {
        self.listener_stop.cancel();
        let listener = self
            .listener
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(listener) = listener {
            let _ = listener.await;
        }

        let subs = self.subs.lock().unwrap_or_else(|e| e.into_inner()).take();
        match subs.map(Arc::try_unwrap) {
            Some(Ok(set)) => set.shutdown().await,
            Some(Err(_)) => warn!("subscriber set still shared, skipping graceful shutdown"),
            None => {}
        }
    }

    fn subscribers(&self) -> Option<Arc<SubscriberSet>> {
        self.subs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(Arc::clone)
    }
}
