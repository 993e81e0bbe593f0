//! Capacity snapshot of a single resource pool
//!
//! A `ResourceSnapshot` caches the pool spec, the machine catalog, the
//! pool's nodes and the pods running in (or waiting for) the pool. Each
//! collection is refreshed independently, and always wholesale: a failed
//! reload leaves the previous collection in place. Capacity queries run
//! over whatever was loaded last and never fail.
//!
//! Reloads and mutations take `&mut self`, so a snapshot shared between
//! tasks must sit behind a lock owned by the caller.

use crate::catalog;
use crate::cluster::ClusterSource;
use crate::error::{PoolError, PoolResult};
use crate::grouping;
use crate::lifecycle::is_node_on_its_way_out;
use crate::membership::{node_belongs_to_pool, pod_belongs_to_pool, pods_with_primary_pool};
use crate::models::{MachineShape, Node, NodeAndPods, Pod, ResourcePoolSpec};
use crate::resources::ResourceVector;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[cfg(test)]
mod tests;

pub struct ResourceSnapshot {
    source: Arc<dyn ClusterSource>,
    pool_name: String,
    node_bootstrap_threshold: Duration,

    pool: ResourcePoolSpec,
    machines: Vec<MachineShape>,
    nodes: Vec<Node>,
    /// Pods belonging to this pool, whatever their primary pool
    pods: Vec<Pod>,
    /// Pods whose primary pool is this one
    primary_pods: Vec<Pod>,
    /// Position of each node in `nodes`
    nodes_by_id: HashMap<String, usize>,
}

impl ResourceSnapshot {
    /// Read the pool spec, machines, nodes and, when `with_pods` is set,
    /// pods. Any failure aborts the load.
    pub async fn load(
        source: Arc<dyn ClusterSource>,
        pool_name: &str,
        node_bootstrap_threshold: Duration,
        with_pods: bool,
    ) -> PoolResult<Self> {
        let pool = read_pool(source.as_ref(), pool_name).await?;
        let mut snapshot = Self {
            source,
            pool_name: pool_name.to_string(),
            node_bootstrap_threshold,
            pool,
            machines: Vec::new(),
            nodes: Vec::new(),
            pods: Vec::new(),
            primary_pods: Vec::new(),
            nodes_by_id: HashMap::new(),
        };

        snapshot.reload_machines().await?;
        snapshot.reload_nodes().await?;
        if with_pods {
            snapshot.reload_pods().await?;
        }

        info!(
            pool = %snapshot.pool_name,
            nodes = snapshot.nodes.len(),
            pods = snapshot.pods.len(),
            "Resource snapshot loaded"
        );
        Ok(snapshot)
    }

    pub async fn reload_resource_pool(&mut self) -> PoolResult<()> {
        self.pool = read_pool(self.source.as_ref(), &self.pool_name).await?;
        Ok(())
    }

    pub async fn reload_machines(&mut self) -> PoolResult<()> {
        let machines = self.source.list_machine_shapes().await.map_err(|e| {
            warn!(pool = %self.pool_name, error = %e, "Cannot read machine types");
            e
        })?;
        self.machines = machines;
        Ok(())
    }

    /// Replace the node list with the nodes labeled for this pool
    pub async fn reload_nodes(&mut self) -> PoolResult<()> {
        let all_nodes = self.source.list_nodes().await.map_err(|e| {
            warn!(pool = %self.pool_name, error = %e, "Cannot read nodes");
            e
        })?;
        let total = all_nodes.len();

        let nodes: Vec<Node> = all_nodes
            .into_iter()
            .filter(|node| node_belongs_to_pool(node, &self.pool))
            .collect();
        self.nodes_by_id = nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (node.id.clone(), index))
            .collect();
        self.nodes = nodes;

        debug!(pool = %self.pool_name, total, kept = self.nodes.len(), "Reloaded nodes");
        Ok(())
    }

    /// Replace the pod list with the pods belonging to this pool.
    ///
    /// Membership of scheduled pods is checked against the currently loaded
    /// nodes, so nodes should be reloaded first.
    pub async fn reload_pods(&mut self) -> PoolResult<()> {
        let all_pods = self.source.list_pods().await.map_err(|e| {
            warn!(pool = %self.pool_name, error = %e, "Cannot read pods");
            e
        })?;
        let total = all_pods.len();

        let pods: Vec<Pod> = all_pods
            .into_iter()
            .filter(|pod| pod_belongs_to_pool(pod, &self.pool, &self.nodes))
            .collect();
        self.primary_pods = pods_with_primary_pool(&self.pool_name, &pods)
            .into_iter()
            .cloned()
            .collect();
        self.pods = pods;

        debug!(
            pool = %self.pool_name,
            total,
            kept = self.pods.len(),
            primary = self.primary_pods.len(),
            "Reloaded pods"
        );
        Ok(())
    }

    /// Refresh every collection in dependency order, stopping at the first
    /// failure
    pub async fn reload(&mut self, with_pods: bool) -> PoolResult<()> {
        self.reload_resource_pool().await?;
        self.reload_machines().await?;
        self.reload_nodes().await?;
        if with_pods {
            self.reload_pods().await?;
        }
        Ok(())
    }

    fn active_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|node| !is_node_on_its_way_out(node))
    }

    fn on_way_out_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|node| is_node_on_its_way_out(node))
    }

    /// Allocatable resources of every node not on its way out, bootstrapping
    /// nodes included
    pub fn active_capacity(&self) -> ResourceVector {
        grouping::sum_node_resources(self.active_nodes())
    }

    pub fn active_node_count(&self) -> i64 {
        self.active_nodes().count() as i64
    }

    /// Allocatable resources of nodes marked for removal
    pub fn on_way_out_capacity(&self) -> ResourceVector {
        grouping::sum_node_resources(self.on_way_out_nodes())
    }

    pub fn on_way_out_node_count(&self) -> i64 {
        self.on_way_out_nodes().count() as i64
    }

    /// Capacity still missing to reach the target size, never negative
    pub fn not_provisioned_capacity(&self) -> ResourceVector {
        self.pool
            .desired_capacity()
            .sub_with_floor(&self.active_capacity(), 0)
    }

    /// Number of machines of the pool's unit shape needed to cover the gap
    pub fn not_provisioned_count(&self) -> i64 {
        self.not_provisioned_capacity()
            .split_by_with_ceil(&self.pool.unit_shape)
    }

    /// Change the pool's target count.
    ///
    /// On success the cached spec is replaced by the stored one. On failure
    /// it is left untouched.
    pub async fn adjust_pool_size(&mut self, target_count: i64) -> PoolResult<()> {
        let mut update = self.pool.clone();
        update.target_count = target_count;
        update.requested_at = Utc::now().timestamp();

        let previous = self.pool.target_count;
        let stored = self.source.patch_pool_spec(&update).await.map_err(|e| {
            warn!(pool = %self.pool_name, target_count, error = %e, "Cannot resize resource pool");
            e
        })?;
        self.pool = stored;

        info!(
            pool = %self.pool_name,
            previous,
            target_count = self.pool.target_count,
            "Resource pool resized"
        );
        Ok(())
    }

    /// Apply `mutation` to a copy of a node and patch it into the cluster.
    ///
    /// The cached node is replaced by the stored copy on success and left
    /// untouched on failure. Fails with `NotFound` when the node is not part
    /// of this snapshot.
    pub async fn update_node<F>(&mut self, node_id: &str, mutation: F) -> PoolResult<()>
    where
        F: FnOnce(&mut Node),
    {
        let index = *self.nodes_by_id.get(node_id).ok_or_else(|| {
            PoolError::not_found(format!(
                "resource pool {} does not include node {}",
                self.pool_name, node_id
            ))
        })?;

        let original = &self.nodes[index];
        let mut updated = original.clone();
        mutation(&mut updated);

        let stored = self
            .source
            .patch_node(original, &updated)
            .await
            .map_err(|e| {
                warn!(pool = %self.pool_name, node_id, error = %e, "Cannot update node");
                e
            })?;
        self.nodes[index] = stored;

        debug!(pool = %self.pool_name, node_id, "Node updated");
        Ok(())
    }

    pub fn pool_name(&self) -> &str {
        &self.pool_name
    }

    pub fn node_bootstrap_threshold(&self) -> Duration {
        self.node_bootstrap_threshold
    }

    pub fn pool(&self) -> &ResourcePoolSpec {
        &self.pool
    }

    pub fn machines(&self) -> &[MachineShape] {
        &self.machines
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn pods(&self) -> &[Pod] {
        &self.pods
    }

    pub fn primary_pods(&self) -> &[Pod] {
        &self.primary_pods
    }

    pub fn node(&self, node_id: &str) -> Option<&Node> {
        self.nodes_by_id.get(node_id).map(|&index| &self.nodes[index])
    }

    pub fn find_machine(&self, name: &str) -> Option<&MachineShape> {
        catalog::find_machine(&self.machines, name)
    }

    /// Group the loaded pods under the loaded nodes
    pub fn group_nodes_and_pods(&self) -> (HashMap<String, NodeAndPods<'_>>, Vec<&Pod>) {
        grouping::group_nodes_and_pods(&self.pool, &self.pods, &self.nodes)
    }
}

async fn read_pool(source: &dyn ClusterSource, pool_name: &str) -> PoolResult<ResourcePoolSpec> {
    source.read_pool_spec(pool_name).await.map_err(|e| {
        warn!(pool = %pool_name, error = %e, "Cannot read resource pool");
        e
    })
}
