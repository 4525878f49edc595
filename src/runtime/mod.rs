//! # Container runtime commands.
//!
//! A stateless shim between the agent's command RPC and a container runtime:
//!
//! ```text
//! RuntimeCommand ──► CommandDispatcher ──► ClientCache ──► RuntimeConnector::connect
//!                          │                    │
//!                          │                    └─ one client per endpoint, reused
//!                          ▼
//!                    RuntimeClient::{stop, pause, unpause, kill}
//!                          │  (stop/kill bounded by a timeout)
//!                          ▼
//!                    CommandResult { successful, errstr }
//! ```
//!
//! The agent ships no runtime client of its own; embedders implement
//! [`RuntimeConnector`] and [`RuntimeClient`] for the Docker engine API and CRI.

mod client;
mod dispatcher;

pub use client::{ClientCache, RuntimeClient, RuntimeConnector};
pub use dispatcher::CommandDispatcher;

use crate::error::CommandError;

/// Container operation requested by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Stop,
    Pause,
    Unpause,
    Kill,
}

impl CommandKind {
    /// Maps a wire command code (`0..=3`) to a kind.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(CommandKind::Stop),
            1 => Some(CommandKind::Pause),
            2 => Some(CommandKind::Unpause),
            3 => Some(CommandKind::Kill),
            _ => None,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            CommandKind::Stop => 0,
            CommandKind::Pause => 1,
            CommandKind::Unpause => 2,
            CommandKind::Kill => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CommandKind::Stop => "stop",
            CommandKind::Pause => "pause",
            CommandKind::Unpause => "unpause",
            CommandKind::Kill => "kill",
        }
    }
}

/// Which runtime a command addresses.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RuntimeTarget {
    /// The Docker engine at `var/run/docker.sock` under the host root.
    Docker,
    /// A CRI runtime listening on `socket_path` under the host root.
    Cri { socket_path: String },
}

impl RuntimeTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuntimeTarget::Docker => "docker",
            RuntimeTarget::Cri { .. } => "cri",
        }
    }
}

/// One container command as received from the backend.
///
/// `code` stays raw so unknown codes can be reported back instead of rejected at decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeCommand {
    pub target: RuntimeTarget,
    pub code: i32,
    pub container_id: String,
}

impl RuntimeCommand {
    pub fn new(target: RuntimeTarget, kind: CommandKind, container_id: impl Into<String>) -> Self {
        Self {
            target,
            code: kind.code(),
            container_id: container_id.into(),
        }
    }
}

/// Unary response of a runtime command.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandResult {
    pub successful: bool,
    /// Failure description; `None` on success.
    pub errstr: Option<String>,
}

impl From<Result<(), CommandError>> for CommandResult {
    fn from(res: Result<(), CommandError>) -> Self {
        match res {
            Ok(()) => CommandResult {
                successful: true,
                errstr: None,
            },
            Err(e) => CommandResult {
                successful: false,
                errstr: Some(e.to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip_and_reject_unknown() {
        for kind in [
            CommandKind::Stop,
            CommandKind::Pause,
            CommandKind::Unpause,
            CommandKind::Kill,
        ] {
            assert_eq!(CommandKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(CommandKind::from_code(4), None);
        assert_eq!(CommandKind::from_code(-1), None);
    }

    #[test]
    fn failures_carry_the_message() {
        let res = CommandResult::from(Err(CommandError::RuntimeCommandFailed {
            reason: "no such container: abc".into(),
        }));
        assert!(!res.successful);
        assert_eq!(res.errstr.as_deref(), Some("no such container: abc"));
        assert!(CommandResult::from(Ok(())).successful);
    }
}
