//! Builders for pools, nodes and pods used across unit tests

pub use crate::catalog::{m5_metal, r5_metal};

use crate::keys::{
    new_decommissioning_taint, new_scaling_down_taint, LABEL_KEY_REMOVABLE,
    LABEL_KEY_RESOURCE_POOL, TRUE,
};
use crate::models::{MachineShape, Node, Pod, PodPhase, ResourcePoolSpec, ScalingRules, Taint};
use crate::resources::ResourceVector;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::BTreeMap;

pub const TEST_POOL: &str = "elastic";

fn epoch() -> DateTime<Utc> {
    Utc.timestamp_opt(0, 0).unwrap()
}

pub fn new_pool_of(name: &str, unit_shape: ResourceVector, target_count: i64) -> ResourcePoolSpec {
    ResourcePoolSpec {
        name: name.to_string(),
        unit_shape,
        target_count,
        scaling_rules: ScalingRules {
            min_idle: 0,
            max_idle: 2,
            min_size: 0,
            max_size: 10,
            auto_scaling_enabled: true,
        },
        requested_at: 0,
    }
}

/// Pool whose unit shape is `1 / parts` of the given machine
pub fn new_pool_of_machine(
    name: &str,
    machine: &MachineShape,
    parts: i64,
    target_count: i64,
) -> ResourcePoolSpec {
    new_pool_of(name, machine.resources.divide(parts), target_count)
}

/// Node registered long ago, labeled for `pool`
pub fn new_node(name: &str, pool: &str, machine: &MachineShape) -> Node {
    Node {
        id: name.to_string(),
        labels: BTreeMap::from([(LABEL_KEY_RESOURCE_POOL.to_string(), pool.to_string())]),
        taints: Vec::new(),
        allocatable: machine.resources,
        created_at: epoch(),
    }
}

pub fn new_nodes(count: usize, prefix: &str, pool: &str, machine: &MachineShape) -> Vec<Node> {
    (0..count)
        .map(|i| new_node(&format!("{}-{}", prefix, i), pool, machine))
        .collect()
}

pub fn new_not_scheduled_pod(
    name: &str,
    pool: &str,
    resources: ResourceVector,
    now: DateTime<Utc>,
) -> Pod {
    Pod {
        id: name.to_string(),
        labels: BTreeMap::from([(LABEL_KEY_RESOURCE_POOL.to_string(), pool.to_string())]),
        annotations: BTreeMap::new(),
        phase: PodPhase::Pending,
        node_id: None,
        container_requests: vec![resources],
        created_at: now,
    }
}

pub fn new_not_scheduled_pods(
    count: usize,
    prefix: &str,
    pool: &str,
    resources: ResourceVector,
    now: DateTime<Utc>,
) -> Vec<Pod> {
    (0..count)
        .map(|i| new_not_scheduled_pod(&format!("{}#{}", prefix, i), pool, resources, now))
        .collect()
}

pub fn but_pod_resource_pools(mut pod: Pod, pools: &[&str]) -> Pod {
    pod.labels
        .insert(LABEL_KEY_RESOURCE_POOL.to_string(), pools.join(","));
    pod
}

pub fn but_pod_assigned_to_node(mut pod: Pod, node: &Node) -> Pod {
    pod.node_id = Some(node.id.clone());
    pod
}

pub fn but_pod_running_on_node(pod: Pod, node: &Node) -> Pod {
    let mut pod = but_pod_assigned_to_node(pod, node);
    pod.phase = PodPhase::Running;
    pod
}

pub fn but_pod_finished(mut pod: Pod) -> Pod {
    pod.phase = PodPhase::Succeeded;
    pod
}

pub fn but_node_created_at(mut node: Node, created_at: DateTime<Utc>) -> Node {
    node.created_at = created_at;
    node
}

pub fn but_node_with_taint(mut node: Node, taint: Taint) -> Node {
    node.taints.push(taint);
    node
}

pub fn but_node_decommissioned(source: &str, node: Node) -> Node {
    but_node_with_taint(node, new_decommissioning_taint(source, Utc::now()))
}

pub fn but_node_scaling_down(source: &str, node: Node) -> Node {
    but_node_with_taint(node, new_scaling_down_taint(source, Utc::now()))
}

pub fn but_node_removable(mut node: Node) -> Node {
    node.labels
        .insert(LABEL_KEY_REMOVABLE.to_string(), TRUE.to_string());
    node
}
