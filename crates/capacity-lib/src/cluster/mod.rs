//! Access to cluster state
//!
//! The snapshot never talks to the cluster directly. It goes through a
//! `ClusterSource`, which reads pool specs, machine shapes, nodes and pods,
//! and applies the two patches the accounting loop may issue. Two
//! implementations are provided: a Kubernetes API backed one and an
//! in-memory one for tests and offline inspection.

mod kubernetes;
mod memory;
mod quantity;

pub use kubernetes::{
    node_from_kube, pod_from_kube, resources_from_kube, KubeCluster, KubeClusterConfig,
};
pub use memory::{InMemoryCluster, Inventory, Operation};
pub use quantity::parse_quantity;

use crate::error::PoolResult;
use crate::models::{MachineShape, Node, Pod, ResourcePoolSpec};
use async_trait::async_trait;

/// Read/patch contract of the cluster control plane
#[async_trait]
pub trait ClusterSource: Send + Sync {
    /// Read the spec of a single pool
    async fn read_pool_spec(&self, pool_name: &str) -> PoolResult<ResourcePoolSpec>;

    /// List every known machine shape
    async fn list_machine_shapes(&self) -> PoolResult<Vec<MachineShape>>;

    /// List all nodes, of every pool
    async fn list_nodes(&self) -> PoolResult<Vec<Node>>;

    /// List all pods, of every pool
    async fn list_pods(&self) -> PoolResult<Vec<Pod>>;

    /// Merge-patch the target count of a pool and return the stored spec
    async fn patch_pool_spec(&self, updated: &ResourcePoolSpec) -> PoolResult<ResourcePoolSpec>;

    /// Patch the labels and taints of a node from `original` to `updated`
    /// and return the stored node
    async fn patch_node(&self, original: &Node, updated: &Node) -> PoolResult<Node>;
}
