//! In-memory cluster source
//!
//! Holds a whole inventory behind a lock. Used by tests, where individual
//! operations can be made to fail, and by offline inspection of an
//! inventory dumped to a JSON file.

use super::ClusterSource;
use crate::error::{PoolError, PoolResult};
use crate::models::{MachineShape, Node, Pod, ResourcePoolSpec};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::RwLock;
use tracing::debug;

/// Everything a cluster source can serve
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Inventory {
    pub pools: Vec<ResourcePoolSpec>,
    pub machines: Vec<MachineShape>,
    pub nodes: Vec<Node>,
    pub pods: Vec<Pod>,
}

/// Collaborator operations that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ReadPoolSpec,
    ListMachineShapes,
    ListNodes,
    ListPods,
    PatchPoolSpec,
    PatchNode,
}

pub struct InMemoryCluster {
    inventory: RwLock<Inventory>,
    failures: RwLock<HashMap<Operation, PoolError>>,
}

impl InMemoryCluster {
    pub fn new(inventory: Inventory) -> Self {
        Self {
            inventory: RwLock::new(inventory),
            failures: RwLock::new(HashMap::new()),
        }
    }

    /// Load an inventory document written as JSON
    pub async fn from_file(path: &Path) -> PoolResult<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| PoolError::Transport(format!("{}: {}", path.display(), e)))?;
        let inventory: Inventory = serde_json::from_str(&raw)
            .map_err(|e| PoolError::Validation(format!("{}: {}", path.display(), e)))?;
        debug!(
            path = %path.display(),
            pools = inventory.pools.len(),
            nodes = inventory.nodes.len(),
            pods = inventory.pods.len(),
            "Loaded inventory"
        );
        Ok(Self::new(inventory))
    }

    /// Write the current inventory back as pretty-printed JSON
    pub async fn save_to_file(&self, path: &Path) -> PoolResult<()> {
        let inventory = self.inventory.read().await;
        let json = serde_json::to_string_pretty(&*inventory)
            .map_err(|e| PoolError::Validation(e.to_string()))?;
        tokio::fs::write(path, json)
            .await
            .map_err(|e| PoolError::Transport(format!("{}: {}", path.display(), e)))
    }

    /// Make every later call of `operation` fail with `error`
    pub async fn fail_on(&self, operation: Operation, error: PoolError) {
        self.failures.write().await.insert(operation, error);
    }

    pub async fn clear_failures(&self) {
        self.failures.write().await.clear();
    }

    /// Copy of the current inventory
    pub async fn inventory(&self) -> Inventory {
        self.inventory.read().await.clone()
    }

    /// Replace the node list, as if the cluster had changed
    pub async fn set_nodes(&self, nodes: Vec<Node>) {
        self.inventory.write().await.nodes = nodes;
    }

    pub async fn set_pools(&self, pools: Vec<ResourcePoolSpec>) {
        self.inventory.write().await.pools = pools;
    }

    pub async fn set_machines(&self, machines: Vec<MachineShape>) {
        self.inventory.write().await.machines = machines;
    }

    pub async fn set_pods(&self, pods: Vec<Pod>) {
        self.inventory.write().await.pods = pods;
    }

    async fn check(&self, operation: Operation) -> PoolResult<()> {
        match self.failures.read().await.get(&operation) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ClusterSource for InMemoryCluster {
    async fn read_pool_spec(&self, pool_name: &str) -> PoolResult<ResourcePoolSpec> {
        self.check(Operation::ReadPoolSpec).await?;
        self.inventory
            .read()
            .await
            .pools
            .iter()
            .find(|pool| pool.name == pool_name)
            .cloned()
            .ok_or_else(|| PoolError::not_found(format!("resource pool {}", pool_name)))
    }

    async fn list_machine_shapes(&self) -> PoolResult<Vec<MachineShape>> {
        self.check(Operation::ListMachineShapes).await?;
        Ok(self.inventory.read().await.machines.clone())
    }

    async fn list_nodes(&self) -> PoolResult<Vec<Node>> {
        self.check(Operation::ListNodes).await?;
        Ok(self.inventory.read().await.nodes.clone())
    }

    async fn list_pods(&self) -> PoolResult<Vec<Pod>> {
        self.check(Operation::ListPods).await?;
        Ok(self.inventory.read().await.pods.clone())
    }

    async fn patch_pool_spec(&self, updated: &ResourcePoolSpec) -> PoolResult<ResourcePoolSpec> {
        self.check(Operation::PatchPoolSpec).await?;
        let mut inventory = self.inventory.write().await;
        let stored = inventory
            .pools
            .iter_mut()
            .find(|pool| pool.name == updated.name)
            .ok_or_else(|| PoolError::not_found(format!("resource pool {}", updated.name)))?;
        stored.target_count = updated.target_count;
        stored.requested_at = updated.requested_at;
        Ok(stored.clone())
    }

    async fn patch_node(&self, original: &Node, updated: &Node) -> PoolResult<Node> {
        self.check(Operation::PatchNode).await?;
        let mut inventory = self.inventory.write().await;
        let stored = inventory
            .nodes
            .iter_mut()
            .find(|node| node.id == original.id)
            .ok_or_else(|| PoolError::not_found(format!("node {}", original.id)))?;
        stored.labels = updated.labels.clone();
        stored.taints = updated.taints.clone();
        Ok(stored.clone())
    }
}
