//! Data carried on the event streams.

use std::collections::HashSet;

/// What happened to an orchestrated resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceAction {
    Added,
    Updated,
    Deleted,
}

/// One orchestration resource change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrchestratorEvent {
    /// Resource kind (`Pod`, `Deployment`, ...).
    pub kind: String,
    /// Unique id assigned by the orchestrator.
    pub uid: String,
    /// Resource name.
    pub name: String,
    /// Namespace, for namespaced resources.
    pub namespace: Option<String>,
    pub action: ResourceAction,
}

/// Ordered group of resource changes, forwarded as one stream item.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventBatch {
    pub events: Vec<OrchestratorEvent>,
}

impl EventBatch {
    pub fn new(events: Vec<OrchestratorEvent>) -> Self {
        Self { events }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Operator-originated event destined for the user event stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserEvent {
    /// Kind of the involved object.
    pub kind: String,
    /// Uid of the involved object.
    pub uid: String,
    pub reason: String,
    pub message: String,
    /// Debug-level events are only exported on request.
    pub debug: bool,
}

/// Request for the primary (orchestrator events) stream.
#[derive(Clone, Debug)]
pub struct EventStreamRequest {
    /// Selects the thin producer variant instead of the full one.
    pub thin: bool,
    /// Reclamation setting applied during the initial listing.
    pub startup_tuning: i32,
    /// Pod name prefixes used for address-range discovery.
    pub pod_prefixes: Vec<String>,
    /// Desired event queue depth (floor of 1).
    pub queue_len: usize,
}

impl EventStreamRequest {
    /// Queue depth clamped to a minimum of 1.
    #[inline]
    pub fn queue_capacity(&self) -> usize {
        self.queue_len.max(1)
    }

    /// Pod-prefix configuration handed to the producer.
    pub fn pod_prefix_config(&self) -> PodPrefixConfig {
        PodPrefixConfig::new(self.pod_prefixes.iter().cloned())
    }
}

impl Default for EventStreamRequest {
    fn default() -> Self {
        Self {
            thin: false,
            startup_tuning: 20,
            pod_prefixes: Vec::new(),
            queue_len: 1,
        }
    }
}

/// Pod name prefixes consulted when discovering cluster address ranges.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PodPrefixConfig {
    prefixes: Vec<String>,
}

impl PodPrefixConfig {
    /// Builds a config; empty prefixes are dropped.
    pub fn new(prefixes: impl IntoIterator<Item = String>) -> Self {
        Self {
            prefixes: prefixes.into_iter().filter(|p| !p.is_empty()).collect(),
        }
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    /// True if `pod_name` starts with any configured prefix.
    pub fn matches(&self, pod_name: &str) -> bool {
        self.prefixes.iter().any(|p| pod_name.starts_with(p.as_str()))
    }
}

/// Request for the secondary (user events) stream.
#[derive(Clone, Debug, Default)]
pub struct UserEventRequest {
    /// Desired queue depth (floor of 1).
    pub queue_len: usize,
    /// Export debug-level events too.
    pub collect_debug: bool,
    /// Object kinds to export; empty exports every kind.
    pub include_kinds: Vec<String>,
}

impl UserEventRequest {
    /// Queue depth clamped to a minimum of 1.
    #[inline]
    pub fn queue_capacity(&self) -> usize {
        self.queue_len.max(1)
    }

    pub fn filter(&self) -> UserEventFilter {
        UserEventFilter {
            collect_debug: self.collect_debug,
            include_kinds: self.include_kinds.iter().cloned().collect(),
        }
    }
}

/// Which user events a session exports.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserEventFilter {
    pub collect_debug: bool,
    pub include_kinds: HashSet<String>,
}

impl UserEventFilter {
    /// True if `event` should reach the client.
    pub fn admits(&self, event: &UserEvent) -> bool {
        if event.debug && !self.collect_debug {
            return false;
        }
        self.include_kinds.is_empty() || self.include_kinds.contains(&event.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_event(kind: &str, debug: bool) -> UserEvent {
        UserEvent {
            kind: kind.into(),
            uid: "u-1".into(),
            reason: "Scheduled".into(),
            message: "assigned".into(),
            debug,
        }
    }

    #[test]
    fn queue_depth_has_floor_of_one() {
        let req = EventStreamRequest {
            queue_len: 0,
            ..EventStreamRequest::default()
        };
        assert_eq!(req.queue_capacity(), 1);
        assert_eq!(UserEventRequest::default().queue_capacity(), 1);
    }

    #[test]
    fn filter_respects_debug_flag_and_kinds() {
        let req = UserEventRequest {
            queue_len: 4,
            collect_debug: false,
            include_kinds: vec!["Pod".into()],
        };
        let filter = req.filter();
        assert!(filter.admits(&user_event("Pod", false)));
        assert!(!filter.admits(&user_event("Pod", true)));
        assert!(!filter.admits(&user_event("Node", false)));

        let open = UserEventFilter {
            collect_debug: true,
            ..UserEventFilter::default()
        };
        assert!(open.admits(&user_event("Node", true)));
    }

    #[test]
    fn pod_prefixes() {
        let cfg = PodPrefixConfig::new(vec!["kube-apiserver".into(), String::new()]);
        assert_eq!(cfg.prefixes().len(), 1);
        assert!(cfg.matches("kube-apiserver-node-1"));
        assert!(!cfg.matches("etcd-node-1"));
    }
}
