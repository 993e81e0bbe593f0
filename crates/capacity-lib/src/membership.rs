//! Resource pool membership of nodes and pods
//!
//! A node names exactly one pool in its membership label. A pod may list
//! several pools, comma separated; the first one is its primary pool, the
//! one scaled up when the pod needs capacity.

use crate::keys::LABEL_KEY_RESOURCE_POOL;
use crate::lifecycle::{find_label, has_label_and_value};
use crate::models::{Node, Pod, ResourcePoolSpec};

pub fn node_belongs_to_pool(node: &Node, pool: &ResourcePoolSpec) -> bool {
    has_label_and_value(&node.labels, LABEL_KEY_RESOURCE_POOL, &pool.name)
}

/// Pools a pod is assigned to, in declaration order.
///
/// The label wins over the annotation. Returns `None` when neither is set
/// or the value holds no non-blank pool name.
pub fn pod_assigned_pools(pod: &Pod) -> Option<Vec<String>> {
    let raw = find_label(&pod.labels, LABEL_KEY_RESOURCE_POOL)
        .or_else(|| find_label(&pod.annotations, LABEL_KEY_RESOURCE_POOL))?;

    let names: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect();

    if names.is_empty() {
        None
    } else {
        Some(names)
    }
}

pub fn pod_primary_pool(pod: &Pod) -> Option<String> {
    pod_assigned_pools(pod).and_then(|pools| pools.into_iter().next())
}

/// Whether a pod counts against `pool`.
///
/// GPU pods never land in a pool without GPUs. A scheduled pod additionally
/// needs its node to be part of the pool, so a stale label surviving a
/// reschedule onto an unrelated node does not count.
pub fn pod_belongs_to_pool(pod: &Pod, pool: &ResourcePoolSpec, nodes: &[Node]) -> bool {
    if pool.unit_shape.gpu <= 0 && pod.resources().gpu > 0 {
        return false;
    }

    let Some(assigned) = pod_assigned_pools(pod) else {
        return false;
    };
    if !assigned.iter().any(|name| *name == pool.name) {
        return false;
    }

    match pod.assigned_node() {
        None => true,
        Some(node_id) => nodes
            .iter()
            .any(|node| node.id == node_id && node_belongs_to_pool(node, pool)),
    }
}

/// Pods whose primary pool is `pool_name`
pub fn pods_with_primary_pool<'a>(
    pool_name: &str,
    pods: impl IntoIterator<Item = &'a Pod>,
) -> Vec<&'a Pod> {
    pods.into_iter()
        .filter(|pod| pod_primary_pool(pod).as_deref() == Some(pool_name))
        .collect()
}
