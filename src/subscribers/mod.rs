//! # Lifecycle event subscribers.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out and the
//! built-in [`LogWriter`] (feature `logging`).
//!
//! ## Architecture
//! ```text
//! Session ── publish(Event) ──► Bus ──► Agent listener ──► SubscriberSet::emit(&Event)
//!                                                            ┌─────────┬─────────┐
//!                                                            ▼         ▼         ▼
//!                                                       LogWriter   Metrics   Custom
//! ```
//!
//! ## Implementing custom subscribers
//! ```no_run
//! use coagent::{Event, EventKind, Subscribe};
//! use async_trait::async_trait;
//!
//! struct RejectionCounter;
//!
//! #[async_trait]
//! impl Subscribe for RejectionCounter {
//!     async fn on_event(&self, event: &Event) {
//!         if event.kind == EventKind::GuardRejected {
//!             // increment counter
//!         }
//!     }
//! }
//! ```

#[cfg(feature = "logging")]
mod log;
mod set;
mod subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub(crate) use set::panic_message;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
