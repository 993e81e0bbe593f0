//! Single line JSON renderings of pools, machines, nodes, pods and
//! snapshots for diagnostics.
//!
//! `Compact` and `Essentials` project an entity to a small record with
//! PascalCase keys in a fixed order. `Details` dumps the whole entity,
//! except for snapshots where it is the same as `Essentials`.

use crate::lifecycle::{is_node_available_for_scheduling, is_node_on_its_way_out, pod_state};
use crate::models::{MachineShape, Node, Pod, ResourcePoolSpec};
use crate::resources::ResourceVector;
use crate::snapshot::ResourceSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatLevel {
    #[default]
    Compact,
    Essentials,
    Details,
}

impl FromStr for FormatLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "compact" => Ok(FormatLevel::Compact),
            "essentials" => Ok(FormatLevel::Essentials),
            "details" => Ok(FormatLevel::Details),
            other => Err(format!("unknown format level: {}", other)),
        }
    }
}

impl fmt::Display for FormatLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FormatLevel::Compact => "compact",
            FormatLevel::Essentials => "essentials",
            FormatLevel::Details => "details",
        };
        f.write_str(name)
    }
}

/// Serialize to JSON, or a fixed marker if that fails
pub fn to_json_string<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "<formatting error>".to_string())
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct PoolCompact<'a> {
    name: &'a str,
    resource_count: i64,
    auto_scaling_enabled: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct PoolEssentials<'a> {
    name: &'a str,
    resource_count: i64,
    resource_shape: ResourceVector,
    auto_scaling_enabled: bool,
}

pub fn format_resource_pool(pool: &ResourcePoolSpec, level: FormatLevel) -> String {
    match level {
        FormatLevel::Compact => to_json_string(&PoolCompact {
            name: &pool.name,
            resource_count: pool.target_count,
            auto_scaling_enabled: pool.scaling_rules.auto_scaling_enabled,
        }),
        FormatLevel::Essentials => to_json_string(&PoolEssentials {
            name: &pool.name,
            resource_count: pool.target_count,
            resource_shape: pool.unit_shape,
            auto_scaling_enabled: pool.scaling_rules.auto_scaling_enabled,
        }),
        FormatLevel::Details => to_json_string(pool),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct MachineCompact<'a> {
    name: &'a str,
    compute_resource: ResourceVector,
}

pub fn format_machine_shape(machine: &MachineShape, level: FormatLevel) -> String {
    match level {
        FormatLevel::Details => to_json_string(machine),
        _ => to_json_string(&MachineCompact {
            name: &machine.name,
            compute_resource: machine.resources,
        }),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct NodeSummary<'a> {
    name: &'a str,
    up: bool,
    on_way_out: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    available_resources: Option<ResourceVector>,
}

/// `Up` means available for scheduling as of `now`
pub fn format_node(
    node: &Node,
    now: DateTime<Utc>,
    age_threshold: Duration,
    level: FormatLevel,
) -> String {
    let mut summary = NodeSummary {
        name: &node.id,
        up: is_node_available_for_scheduling(node, now, age_threshold),
        on_way_out: is_node_on_its_way_out(node),
        available_resources: None,
    };
    match level {
        FormatLevel::Compact => to_json_string(&summary),
        FormatLevel::Essentials => {
            summary.available_resources = Some(node.allocatable);
            to_json_string(&summary)
        }
        FormatLevel::Details => to_json_string(node),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct PodSummary<'a> {
    name: &'a str,
    state: String,
    node: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    compute_resources: Option<ResourceVector>,
}

pub fn format_pod(pod: &Pod, level: FormatLevel) -> String {
    let mut summary = PodSummary {
        name: &pod.id,
        state: pod_state(pod).to_string(),
        node: pod.node_id.as_deref().unwrap_or(""),
        compute_resources: None,
    };
    match level {
        FormatLevel::Compact => to_json_string(&summary),
        FormatLevel::Essentials => {
            summary.compute_resources = Some(pod.resources());
            to_json_string(&summary)
        }
        FormatLevel::Details => to_json_string(pod),
    }
}

/// Aggregate numbers of a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SnapshotSummary {
    pub name: String,
    pub active_node_count: i64,
    pub not_provisioned_node_count: i64,
    pub on_way_out_node_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_resources: Option<ResourceVector>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_provisioned_resources: Option<ResourceVector>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_way_out_resources: Option<ResourceVector>,
}

impl SnapshotSummary {
    /// Resources are only filled in above `Compact`
    pub fn of(snapshot: &ResourceSnapshot, level: FormatLevel) -> Self {
        let with_resources = level != FormatLevel::Compact;
        Self {
            name: snapshot.pool().name.clone(),
            active_node_count: snapshot.active_node_count(),
            not_provisioned_node_count: snapshot.not_provisioned_count(),
            on_way_out_node_count: snapshot.on_way_out_node_count(),
            active_resources: with_resources.then(|| snapshot.active_capacity()),
            not_provisioned_resources: with_resources
                .then(|| snapshot.not_provisioned_capacity()),
            on_way_out_resources: with_resources.then(|| snapshot.on_way_out_capacity()),
        }
    }
}

pub fn format_snapshot(snapshot: &ResourceSnapshot, level: FormatLevel) -> String {
    to_json_string(&SnapshotSummary::of(snapshot, level))
}
