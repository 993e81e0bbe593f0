//! Node and pod lifecycle classification
//!
//! Every predicate is a total function of its inputs. Node predicates that
//! depend on age take the reference clock and the "new node" threshold
//! explicitly so they can be evaluated against a fixed instant.
//!
//! Precedence for nodes: a node is on its way out when it is to be removed
//! (decommissioning or scaling down), removable, or terminated. It is
//! available for scheduling only when it is neither bootstrapping nor on
//! its way out.

use crate::keys::{
    LABEL_KEY_REMOVABLE, TAINT_KEY_INIT, TAINT_KEY_NODE_DECOMMISSIONING,
    TAINT_KEY_NODE_SCALING_DOWN,
};
use crate::models::{Node, Pod, PodPhase, Taint, TaintEffect};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Time elapsed since the node was registered, zero if created in the future
pub fn node_age(node: &Node, now: DateTime<Utc>) -> Duration {
    (now - node.created_at).to_std().unwrap_or_default()
}

/// Time elapsed since the pod was created, zero if created in the future
pub fn pod_age(pod: &Pod, now: DateTime<Utc>) -> Duration {
    (now - pod.created_at).to_std().unwrap_or_default()
}

pub fn find_label<'a>(labels: &'a BTreeMap<String, String>, key: &str) -> Option<&'a str> {
    labels.get(key).map(String::as_str)
}

pub fn has_label_and_value(labels: &BTreeMap<String, String>, key: &str, value: &str) -> bool {
    find_label(labels, key) == Some(value)
}

pub fn find_taint<'a>(node: &'a Node, key: &str) -> Option<&'a Taint> {
    node.taints.iter().find(|taint| taint.key == key)
}

pub fn has_no_execute_taint(node: &Node) -> bool {
    node.taints
        .iter()
        .any(|taint| taint.effect == TaintEffect::NoExecute)
}

/// A new node that is not ready to take work yet.
///
/// The init taint is authoritative. Past `age_threshold` a node is never
/// considered bootstrapping; before it, a broken looking node is assumed to
/// still be initializing.
pub fn is_node_bootstrapping(node: &Node, now: DateTime<Utc>, age_threshold: Duration) -> bool {
    if find_taint(node, TAINT_KEY_INIT).is_some() {
        return true;
    }
    if node_age(node, now) > age_threshold {
        return false;
    }
    is_node_broken(node)
}

/// Heuristic for nodes that cannot run anything: a `NoExecute` taint of any
/// kind, or a registration without CPU.
pub fn is_node_broken(node: &Node) -> bool {
    has_no_execute_taint(node) || node.allocatable.cpu == 0
}

pub fn is_node_decommissioned(node: &Node) -> bool {
    find_taint(node, TAINT_KEY_NODE_DECOMMISSIONING).is_some()
}

pub fn is_node_scaling_down(node: &Node) -> bool {
    find_taint(node, TAINT_KEY_NODE_SCALING_DOWN).is_some()
}

pub fn is_node_to_remove(node: &Node) -> bool {
    is_node_decommissioned(node) || is_node_scaling_down(node)
}

/// Only the presence of the removable label matters, not its value
pub fn is_node_removable(node: &Node) -> bool {
    node.labels.contains_key(LABEL_KEY_REMOVABLE)
}

/// There is no in-band signal telling whether a node object still has a
/// live instance behind it. Node garbage collection is trusted to remove
/// such objects promptly, so this is always false.
pub fn is_node_terminated(_node: &Node) -> bool {
    false
}

pub fn is_node_on_its_way_out(node: &Node) -> bool {
    is_node_to_remove(node) || is_node_removable(node) || is_node_terminated(node)
}

pub fn is_node_available_for_scheduling(
    node: &Node,
    now: DateTime<Utc>,
    age_threshold: Duration,
) -> bool {
    !is_node_bootstrapping(node, now, age_threshold) && !is_node_on_its_way_out(node)
}

pub fn is_pod_finished(pod: &Pod) -> bool {
    matches!(pod.phase, PodPhase::Succeeded | PodPhase::Failed)
}

pub fn is_pod_waiting_to_be_scheduled(pod: &Pod) -> bool {
    pod.assigned_node().is_none() && !is_pod_finished(pod)
}

/// Node assignment is authoritative; the reported `Running` phase is not
/// consulted.
pub fn is_pod_running(pod: &Pod) -> bool {
    !is_pod_finished(pod) && pod.assigned_node().is_some()
}

/// Coarse pod state used for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PodState {
    #[serde(rename = "running")]
    Running,
    #[serde(rename = "finished")]
    Finished,
    #[serde(rename = "notScheduled")]
    NotScheduled,
}

impl fmt::Display for PodState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PodState::Running => "running",
            PodState::Finished => "finished",
            PodState::NotScheduled => "notScheduled",
        };
        f.write_str(name)
    }
}

pub fn pod_state(pod: &Pod) -> PodState {
    if is_pod_running(pod) {
        PodState::Running
    } else if is_pod_finished(pod) {
        PodState::Finished
    } else {
        PodState::NotScheduled
    }
}
