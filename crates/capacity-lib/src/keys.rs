//! Well-known label, taint and resource names

use crate::models::{Taint, TaintEffect};
use chrono::{DateTime, Utc};

/// Pool membership. A single pool name on nodes, a comma separated list
/// on pods (label first, annotation as fallback).
pub const LABEL_KEY_RESOURCE_POOL: &str = "scaler.titus.netflix.com/resource-pool";

/// Presence alone marks a node as removable
pub const LABEL_KEY_REMOVABLE: &str = "node.titus.netflix.com/removable";

pub const TAINT_KEY_INIT: &str = "node.titus.netflix.com/uninitialized";
pub const TAINT_KEY_NODE_DECOMMISSIONING: &str = "node.titus.netflix.com/decommissioning";
pub const TAINT_KEY_NODE_SCALING_DOWN: &str = "node.titus.netflix.com/scaling-down";

pub const RESOURCE_CPU: &str = "cpu";
pub const RESOURCE_MEMORY: &str = "memory";
pub const RESOURCE_EPHEMERAL_STORAGE: &str = "ephemeral-storage";
pub const RESOURCE_GPU: &str = "nvidia.com/gpu";
pub const RESOURCE_NETWORK: &str = "titus/network";

pub const TRUE: &str = "True";

pub const ONE_MEGABYTE: i64 = 1024 * 1024;
pub const ONE_MBPS: i64 = 1_000_000;

pub const RESOURCE_POOL_ELASTIC: &str = "elastic";
pub const RESOURCE_POOL_ELASTIC_GPU: &str = "elasticGpu";
pub const RESOURCE_POOL_RESERVED: &str = "reserved";
/// Pool of simulated nodes, never backed by real machines
pub const RESOURCE_POOL_MOCK_NODES: &str = "mock-nodes";

pub fn is_mock_resource_pool(pool_name: &str) -> bool {
    pool_name == RESOURCE_POOL_MOCK_NODES
}

pub fn new_decommissioning_taint(source: &str, now: DateTime<Utc>) -> Taint {
    Taint {
        key: TAINT_KEY_NODE_DECOMMISSIONING.to_string(),
        value: source.to_string(),
        effect: TaintEffect::NoExecute,
        time_added: Some(now),
    }
}

pub fn new_scaling_down_taint(source: &str, now: DateTime<Utc>) -> Taint {
    Taint {
        key: TAINT_KEY_NODE_SCALING_DOWN.to_string(),
        value: source.to_string(),
        effect: TaintEffect::NoExecute,
        time_added: Some(now),
    }
}
