//! Error types used by the coagent stream controllers and unary handlers.
//!
//! This module defines the error enums surfaced by the agent:
//!
//! - [`StreamError`]: failures opening or running an event stream.
//! - [`ProducerError`]: a producer or user-event source could not start watching.
//! - [`SinkError`]: the client transport rejected a send.
//! - [`OptionError`]: a malformed `set_option` request.
//! - [`CommandError`]: a runtime command could not be performed.
//!
//! All types provide `as_label` for logs/metrics, matching the labels published on the
//! event bus.

use std::time::Duration;
use thiserror::Error;

use crate::core::StreamKind;

/// # Errors produced by the stream controllers.
///
/// `ChannelInUse` and `ProducerStartFailed` are stream-open errors: they are returned
/// before any background task is spawned. `ForwardFailed` ends a stream mid-flight.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum StreamError {
    /// The exclusion guard for this stream kind is held by another session.
    ///
    /// Callers should retry later; this is not a bug.
    #[error("{kind} channel in use")]
    ChannelInUse {
        /// Which stream kind was rejected.
        kind: StreamKind,
    },

    /// The event source could not begin watching.
    #[error("failed to start {kind} producer: {source}")]
    ProducerStartFailed {
        /// Which stream kind failed to start.
        kind: StreamKind,
        /// Underlying producer error.
        #[source]
        source: ProducerError,
    },

    /// The client transport rejected a send; the stream is over.
    #[error("forwarding on {kind} stream failed: {source}")]
    ForwardFailed {
        /// Which stream kind failed.
        kind: StreamKind,
        /// Underlying transport error.
        #[source]
        source: SinkError,
    },
}

impl StreamError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use coagent::{StreamError, StreamKind};
    ///
    /// let err = StreamError::ChannelInUse { kind: StreamKind::Primary };
    /// assert_eq!(err.as_label(), "stream_channel_in_use");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            StreamError::ChannelInUse { .. } => "stream_channel_in_use",
            StreamError::ProducerStartFailed { .. } => "stream_producer_start_failed",
            StreamError::ForwardFailed { .. } => "stream_forward_failed",
        }
    }

    /// Indicates whether the stream was refused before it opened.
    ///
    /// Open errors leave no session state behind.
    pub fn is_open_error(&self) -> bool {
        matches!(
            self,
            StreamError::ChannelInUse { .. } | StreamError::ProducerStartFailed { .. }
        )
    }
}

/// # Errors reported by event producers and user-event sources.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProducerError {
    /// Watch setup against the orchestration API failed.
    #[error("watch setup failed: {reason}")]
    WatchSetup {
        /// The underlying message.
        reason: String,
    },

    /// The session context was cancelled before the watch could start.
    #[error("context cancelled before watch start")]
    Canceled,
}

/// # Errors reported by client transports.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// The client side of the stream has gone away.
    #[error("client stream closed")]
    Closed,

    /// The transport failed to deliver the item.
    #[error("transport error: {reason}")]
    Transport {
        /// The underlying message.
        reason: String,
    },

    /// The forwarding future panicked while sending.
    #[error("send panicked: {info}")]
    Panicked {
        /// Panic payload, when it was a string.
        info: String,
    },
}

/// # Errors for malformed `set_option` requests.
///
/// Reported inside an [`OptionResult`](crate::OptionResult), never as a transport
/// error. A rejected option leaves the export state unchanged.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OptionError {
    /// The key is not recognized.
    #[error("Unknown key {key}")]
    UnknownOption {
        /// The rejected key.
        key: String,
    },

    /// The key is recognized but the value is not.
    #[error("Unknown value {value} for key {key}")]
    UnknownValue {
        /// The option key.
        key: String,
        /// The rejected value.
        value: String,
    },
}

impl OptionError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            OptionError::UnknownOption { .. } => "option_unknown_key",
            OptionError::UnknownValue { .. } => "option_unknown_value",
        }
    }
}

/// # Errors for runtime commands.
///
/// Reported inside a [`CommandResult`](crate::CommandResult).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// The command code does not map to a known command.
    #[error("Unknown {runtime} command {code}")]
    UnknownCommand {
        /// Runtime name (`docker`, `cri`).
        runtime: &'static str,
        /// The rejected command code.
        code: i32,
    },

    /// No client could be created for the runtime endpoint.
    #[error("could not connect to {endpoint}: {reason}")]
    Connect {
        /// Resolved endpoint.
        endpoint: String,
        /// The underlying message.
        reason: String,
    },

    /// The runtime client reported a failure.
    #[error("{reason}")]
    RuntimeCommandFailed {
        /// The underlying message.
        reason: String,
    },

    /// The runtime did not answer within the bound.
    #[error("runtime command timed out after {timeout:?}")]
    Timeout {
        /// The bound that was exceeded.
        timeout: Duration,
    },
}

impl CommandError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use coagent::CommandError;
    ///
    /// let err = CommandError::UnknownCommand { runtime: "docker", code: 9 };
    /// assert_eq!(err.as_label(), "command_unknown");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            CommandError::UnknownCommand { .. } => "command_unknown",
            CommandError::Connect { .. } => "command_connect_failed",
            CommandError::RuntimeCommandFailed { .. } => "command_failed",
            CommandError::Timeout { .. } => "command_timeout",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_errors_are_classified() {
        let busy = StreamError::ChannelInUse {
            kind: StreamKind::Secondary,
        };
        assert!(busy.is_open_error());
        assert_eq!(busy.to_string(), "secondary channel in use");

        let forward = StreamError::ForwardFailed {
            kind: StreamKind::Primary,
            source: SinkError::Closed,
        };
        assert!(!forward.is_open_error());
        assert_eq!(forward.as_label(), "stream_forward_failed");
    }

    #[test]
    fn option_messages_name_key_and_value() {
        let err = OptionError::UnknownValue {
            key: "events".into(),
            value: "bogus".into(),
        };
        assert_eq!(err.to_string(), "Unknown value bogus for key events");
        assert_eq!(err.as_label(), "option_unknown_value");
    }
}
