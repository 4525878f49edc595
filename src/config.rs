//! # Agent configuration.
//!
//! Provides [`AgentConfig`], centralized settings for the agent and its stream controllers.
//!
//! Config is used in two ways:
//! 1. **Agent creation**: `AgentBuilder::new(config).build(deps)`
//! 2. **Endpoint resolution**: [`AgentConfig::docker_endpoint`], [`AgentConfig::cri_endpoint`]
//!
//! ## Environment
//! - `COAGENT_HOST_ROOT`: prefix under which host runtime sockets are found (e.g. `/host`).
//! - `COAGENT_SOCKET_PATH`: path of the agent's own control socket.
//!
//! ## Sentinel values
//! - `bus_capacity = 0` → clamped to 1
//! - `heartbeat = 0s` → clamped to [`MIN_HEARTBEAT`]

use std::path::PathBuf;
use std::time::Duration;

/// Environment variable holding the host root override.
pub const HOST_ROOT_ENV: &str = "COAGENT_HOST_ROOT";

/// Environment variable holding the control socket path.
pub const SOCKET_PATH_ENV: &str = "COAGENT_SOCKET_PATH";

/// Steady-state reclamation setting expected outside bulk listing.
pub const DEFAULT_TUNING: i32 = 100;

/// Smallest idle heartbeat interval accepted by the secondary stream.
pub const MIN_HEARTBEAT: Duration = Duration::from_millis(10);

/// Global configuration for the agent.
///
/// ## Field semantics
/// - `host_root`: Prefix for host runtime sockets (`None` = host filesystem root)
/// - `socket_path`: Control socket path, removed and recreated at startup
/// - `steady_tuning`: Reclamation setting expected when no bulk listing is running
/// - `heartbeat`: Idle interval of the user-event stream before a heartbeat is logged
/// - `stop_grace`: Grace period passed to the runtime on `stop`
/// - `command_timeout`: Upper bound on a single stop/kill round trip
/// - `bus_capacity`: Lifecycle event bus ring buffer size (min 1)
/// - `docker_api_version`: API version requested from the Docker engine
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// Prefix under which host runtime sockets are found.
    pub host_root: Option<PathBuf>,

    /// Path of the agent's control socket.
    pub socket_path: PathBuf,

    /// Reclamation setting expected at steady state.
    ///
    /// A primary stream that finds a different value when engaging bulk tuning logs a
    /// warning: another session may have left it misconfigured.
    pub steady_tuning: i32,

    /// Idle interval after which the user-event stream logs a heartbeat and keeps waiting.
    pub heartbeat: Duration,

    /// Grace period the runtime gives a container on `stop`.
    pub stop_grace: Duration,

    /// Upper bound on a stop/kill round trip, on top of `stop_grace`.
    pub command_timeout: Duration,

    /// Capacity of the lifecycle event bus.
    pub bus_capacity: usize,

    /// Docker engine API version.
    pub docker_api_version: String,
}

impl AgentConfig {
    /// Builds a config from defaults overridden by the process environment.
    ///
    /// An empty `COAGENT_HOST_ROOT` is treated as unset.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from defaults overridden by `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();
        if let Some(root) = lookup(HOST_ROOT_ENV).filter(|r| !r.is_empty()) {
            cfg.host_root = Some(PathBuf::from(root));
        }
        if let Some(sock) = lookup(SOCKET_PATH_ENV).filter(|s| !s.is_empty()) {
            cfg.socket_path = PathBuf::from(sock);
        }
        cfg
    }

    /// Returns the host root as a path prefix ending in `/`, or an empty string.
    pub fn host_prefix(&self) -> String {
        match &self.host_root {
            Some(root) => {
                let root = root.to_string_lossy();
                format!("{}/", root.trim_end_matches('/'))
            }
            None => String::new(),
        }
    }

    /// Endpoint of the Docker engine socket under the host root.
    pub fn docker_endpoint(&self) -> String {
        format!("unix:///{}var/run/docker.sock", self.host_prefix())
    }

    /// Endpoint of a CRI runtime socket under the host root.
    pub fn cri_endpoint(&self, socket_path: &str) -> String {
        format!(
            "unix:///{}{}",
            self.host_prefix(),
            socket_path.trim_start_matches('/')
        )
    }

    /// Returns the heartbeat interval clamped to [`MIN_HEARTBEAT`].
    #[inline]
    pub fn heartbeat_clamped(&self) -> Duration {
        self.heartbeat.max(MIN_HEARTBEAT)
    }

    /// Returns the bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for AgentConfig {
    /// Default configuration:
    ///
    /// - `host_root = None`
    /// - `socket_path = /opt/coagent/run/coagent.sock`
    /// - `steady_tuning = 100`
    /// - `heartbeat = 10s`
    /// - `stop_grace = 30s`
    /// - `command_timeout = 10s`
    /// - `bus_capacity = 1024`
    /// - `docker_api_version = "v1.18"`
    fn default() -> Self {
        Self {
            host_root: None,
            socket_path: PathBuf::from("/opt/coagent/run/coagent.sock"),
            steady_tuning: DEFAULT_TUNING,
            heartbeat: Duration::from_secs(10),
            stop_grace: Duration::from_secs(30),
            command_timeout: Duration::from_secs(10),
            bus_capacity: 1024,
            docker_api_version: "v1.18".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_from(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn endpoints_without_host_root() {
        let cfg = AgentConfig::default();
        assert_eq!(cfg.docker_endpoint(), "unix:///var/run/docker.sock");
        assert_eq!(
            cfg.cri_endpoint("/run/crio/crio.sock"),
            "unix:///run/crio/crio.sock"
        );
    }

    #[test]
    fn endpoints_follow_host_root() {
        let cfg = AgentConfig::from_lookup(lookup_from(&[(HOST_ROOT_ENV, "/host/")]));
        assert_eq!(cfg.docker_endpoint(), "unix:////host/var/run/docker.sock");
        assert_eq!(
            cfg.cri_endpoint("/run/containerd/containerd.sock"),
            "unix:////host/run/containerd/containerd.sock"
        );
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let cfg = AgentConfig::from_lookup(lookup_from(&[
            (HOST_ROOT_ENV, ""),
            (SOCKET_PATH_ENV, "/tmp/agent.sock"),
        ]));
        assert!(cfg.host_root.is_none());
        assert_eq!(cfg.socket_path, PathBuf::from("/tmp/agent.sock"));
    }

    #[test]
    fn clamps() {
        let cfg = AgentConfig {
            heartbeat: Duration::ZERO,
            bus_capacity: 0,
            ..AgentConfig::default()
        };
        assert_eq!(cfg.heartbeat_clamped(), MIN_HEARTBEAT);
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }
}
