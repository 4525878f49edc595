//! # coagent
//!
//! **coagent** is the orchestration core of a node-local control-plane agent.
//!
//! It serves two long-lived server-streaming RPCs to a backend and a few unary calls:
//! an orchestrator event stream (cluster resource changes, in batches), a user event
//! stream (human-readable cluster events), an option switch, container runtime commands
//! and a ping. The crate owns the concurrency around those streams; the watch logic
//! that actually produces events and the RPC framework are collaborators plugged in
//! through traits.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   RPC handler (per call)          RPC handler (per call)        unary handlers
//!          │                                 │                          │
//!          ▼                                 ▼                          ▼
//! ┌───────────────────────────────────────────────────────────────────────────────┐
//! │  Agent                                                                        │
//! │  - AgentState: ExclusionGuard (one slot per stream kind), tuning knob,        │
//! │                export switch                                                  │
//! │  - PrimaryStream   ── Producer (thin/full) ── PressureController              │
//! │  - SecondaryStream ── UserEventSource      ── PressureController::reclaim     │
//! │  - CommandDispatcher ── ClientCache ── RuntimeConnector                       │
//! └──────┬───────────────────────────┬────────────────────────────────────────────┘
//!        │ publishes                 │ publishes
//!        │ - SessionOpened           │ - Heartbeat
//!        │ - TuningEngaged/Restored  │ - WatchJoined
//!        │ - SessionDrained/Released │ - GuardRejected ...
//!        ▼                           ▼
//! ┌───────────────────────────────────────────────────────────────────────────────┐
//! │                          Bus (broadcast channel)                              │
//! │                    (capacity: AgentConfig::bus_capacity)                      │
//! └──────────────────────────────────┬────────────────────────────────────────────┘
//!                                    ▼
//!                        ┌──────────────────────┐
//!                        │ subscriber_listener  │
//!                        │     (in Agent)       │
//!                        └──────────┬───────────┘
//!                                   ▼
//!                             SubscriberSet
//!                           (per-sub queues)
//!                        ┌──────────┼──────────┐
//!                        ▼          ▼          ▼
//!                    sub1.on    sub2.on    subN.on
//!                    _event()   _event()   _event()
//! ```
//!
//! ### Primary stream lifecycle
//! ```text
//! start_orchestrator_event_stream(request, sink, client)
//!   ├─► guard.try_acquire(Primary)        busy ─► Err(ChannelInUse)
//!   ├─► tuning := startup value (previous value saved)
//!   ├─► producer.start(ctx = client.child_token())
//!   │       └─ Err ─► cancel, restore tuning, release ─► Err(ProducerStartFailed)
//!   ├─► spawn restore race: bulk_done vs session end (first one restores)
//!   ├─► loop: forward batches
//!   │       exit: queue closed / client closed / ctx cancelled ─► Ok
//!   │             sink rejected a batch                       ─► Err(ForwardFailed)
//!   └─► teardown: cancel → close client → drain queue → restore tuning → release guard
//! ```
//!
//! ### Secondary stream lifecycle
//! ```text
//! attach_user_event_stream(request, sink, client)
//!   ├─► guard.try_acquire(Secondary)      busy ─► Err(ChannelInUse)
//!   ├─► reclaim pass, source.start(ctx) ─► spawn watch task
//!   ├─► loop: forward admitted events; idle heartbeat ─► log and keep waiting
//!   └─► teardown: cancel → drain queue → join watch task → release guard
//! ```
//!
//! ## Features
//! | Area               | Description                                                    | Key types / traits                               |
//! |--------------------|----------------------------------------------------------------|--------------------------------------------------|
//! | **Agent**          | RPC-facing facade over both streams and the unary calls.       | [`Agent`], [`AgentBuilder`]                      |
//! | **Admission**      | At most one live session per stream kind.                      | [`ExclusionGuard`], [`GuardLease`]               |
//! | **Memory pressure**| Temporary collector tuning during bulk load, restored once.    | [`PressureController`], [`ReclaimKnob`]          |
//! | **Producers**      | Watch collaborators feeding the streams.                       | [`Producer`], [`UserEventSource`]                |
//! | **Transport**      | Server side of a streaming response.                           | [`StreamSink`]                                   |
//! | **Runtime commands**| Stop/pause/unpause/kill against Docker or CRI.                | [`RuntimeClient`], [`CommandDispatcher`]         |
//! | **Subscriber API** | Hook into session lifecycle events.                            | [`Subscribe`], [`Event`]                         |
//! | **Errors**         | Typed errors for streams, options and commands.                | [`StreamError`], [`OptionError`], [`CommandError`]|
//! | **Configuration**  | Centralized agent settings.                                    | [`AgentConfig`]                                  |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] subscriber rendering events
//!   through `tracing`.
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use coagent::{
//!     AgentBuilder, AgentConfig, AgentDeps, EventStreamRequest, ProducerSet,
//! };
//! # use coagent::{Producer, UserEventSource, RuntimeConnector};
//! # fn collaborators() -> (Arc<dyn Producer>, Arc<dyn UserEventSource>, Arc<dyn RuntimeConnector>) { unimplemented!() }
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = AgentConfig::from_env();
//!     let socket = coagent::bind_control_socket(&cfg.socket_path)?;
//!
//!     let (producer, user_events, connector) = collaborators();
//!     let agent = AgentBuilder::new(cfg).build(AgentDeps {
//!         producers: ProducerSet::single(producer),
//!         user_events,
//!         connector,
//!     });
//!
//!     // One call per incoming RPC; `tx` is the response stream.
//!     let (tx, _rx) = tokio::sync::mpsc::channel(16);
//!     agent
//!         .start_orchestrator_event_stream(&EventStreamRequest::default(), tx, &CancellationToken::new())
//!         .await?;
//!
//!     drop(socket);
//!     agent.shutdown().await;
//!     Ok(())
//! }
//! ```
mod config;
mod core;
mod error;
mod events;
mod producer;
mod runtime;
mod service;
mod socket;
mod subscribers;
mod transport;

// ---- Public re-exports ----

pub use config::{AgentConfig, DEFAULT_TUNING, HOST_ROOT_ENV, MIN_HEARTBEAT, SOCKET_PATH_ENV};
pub use core::{
    drain_queue, ExclusionGuard, ExportSwitch, GuardLease, PressureController, PrimarySession,
    PrimaryStream, ReclaimKnob, RestoreTrigger, SecondarySession, SecondaryStream, SharedKnob,
    StreamKind, TuningSnapshot,
};
pub use error::{CommandError, OptionError, ProducerError, SinkError, StreamError};
pub use events::{Bus, Event, EventKind};
pub use producer::{
    EventBatch, EventStreamRequest, OrchestratorEvent, PodPrefixConfig, Producer, ProducerOutput,
    ProducerSet, ResourceAction, UserEvent, UserEventFilter, UserEventRequest, UserEventSource,
    WatchFuture,
};
pub use runtime::{
    ClientCache, CommandDispatcher, CommandKind, CommandResult, RuntimeClient, RuntimeCommand,
    RuntimeConnector, RuntimeTarget,
};
pub use service::{Agent, AgentBuilder, AgentDeps, AgentState, OptionResult, Pong, EVENTS_KEY};
pub use socket::{bind_control_socket, ControlSocket};
pub use subscribers::{Subscribe, SubscriberSet};
pub use transport::StreamSink;

// Optional: expose a simple built-in logger subscriber.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
