//! Lifecycle events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to session lifecycle events emitted by the stream controllers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `PrimarySession`, `SecondarySession`, `PressureController`,
//!   `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the `Agent` listener (fans out to `SubscriberSet`), tests.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
