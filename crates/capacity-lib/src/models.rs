//! Core data models for resource pool accounting

use crate::resources::ResourceVector;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Autoscaling bounds of a resource pool
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScalingRules {
    pub min_idle: i64,
    pub max_idle: i64,
    pub min_size: i64,
    pub max_size: i64,
    pub auto_scaling_enabled: bool,
}

/// Desired shape and size of a resource pool
///
/// `unit_shape * target_count` is the total capacity the pool should have.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcePoolSpec {
    pub name: String,
    pub unit_shape: ResourceVector,
    pub target_count: i64,
    #[serde(default)]
    pub scaling_rules: ScalingRules,
    /// Epoch seconds of the last size change request
    #[serde(default)]
    pub requested_at: i64,
}

impl ResourcePoolSpec {
    pub fn desired_capacity(&self) -> ResourceVector {
        self.unit_shape.multiply(self.target_count)
    }
}

/// A named instance type and its total capacity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineShape {
    pub name: String,
    pub resources: ResourceVector,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaintEffect {
    NoSchedule,
    PreferNoSchedule,
    NoExecute,
}

impl TaintEffect {
    /// Parse the effect name used by the scheduler, defaulting to `NoSchedule`
    pub fn parse(effect: &str) -> Self {
        match effect {
            "NoExecute" => TaintEffect::NoExecute,
            "PreferNoSchedule" => TaintEffect::PreferNoSchedule,
            _ => TaintEffect::NoSchedule,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaintEffect::NoSchedule => "NoSchedule",
            TaintEffect::PreferNoSchedule => "PreferNoSchedule",
            TaintEffect::NoExecute => "NoExecute",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Taint {
    pub key: String,
    #[serde(default)]
    pub value: String,
    pub effect: TaintEffect,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_added: Option<DateTime<Utc>>,
}

/// A cluster node as seen by one accounting cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub taints: Vec<Taint>,
    pub allocatable: ResourceVector,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PodPhase {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl PodPhase {
    /// Parse a phase name, treating anything unknown as `Pending`
    pub fn parse(phase: &str) -> Self {
        match phase {
            "Running" => PodPhase::Running,
            "Succeeded" => PodPhase::Succeeded,
            "Failed" => PodPhase::Failed,
            _ => PodPhase::Pending,
        }
    }
}

/// A workload pod as seen by one accounting cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pod {
    pub id: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub phase: PodPhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(default)]
    pub container_requests: Vec<ResourceVector>,
    pub created_at: DateTime<Utc>,
}

impl Pod {
    /// Aggregate requests over all containers
    pub fn resources(&self) -> ResourceVector {
        self.container_requests.iter().copied().sum()
    }

    /// Assigned node, treating an empty name as unassigned
    pub fn assigned_node(&self) -> Option<&str> {
        self.node_id.as_deref().filter(|id| !id.is_empty())
    }
}

/// Pods grouped under the node they are scheduled on
#[derive(Debug, Clone)]
pub struct NodeAndPods<'a> {
    pub node: &'a Node,
    pub pods: Vec<&'a Pod>,
}
