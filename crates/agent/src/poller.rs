//! Snapshot reload loop
//!
//! Owns the pool's `ResourceSnapshot`. Each tick reloads it, publishes the
//! aggregates and dumps it to the log. A failed reload is logged and the
//! cycle skipped; the snapshot keeps its last good state.

use crate::api::LatestSummary;
use crate::config::AgentConfig;
use capacity_lib::format::SnapshotSummary;
use capacity_lib::health::{components, HealthRegistry};
use capacity_lib::{
    ClusterSource, FormatLevel, PoolError, PoolMetrics, PoolResult, ResourceSnapshot,
    StructuredLogger,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::info;

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub pool_name: String,
    pub node_bootstrap_threshold: Duration,
    pub reload_interval: Duration,
    pub with_pods: bool,
    pub format_level: FormatLevel,
    pub dump_nodes: bool,
    pub dump_pods: bool,
}

impl From<&AgentConfig> for PollerConfig {
    fn from(config: &AgentConfig) -> Self {
        Self {
            pool_name: config.pool_name.clone(),
            node_bootstrap_threshold: config.node_bootstrap_threshold(),
            reload_interval: config.reload_interval(),
            with_pods: config.with_pods,
            format_level: config.format_level,
            dump_nodes: config.dump_nodes,
            dump_pods: config.dump_pods,
        }
    }
}

pub struct PoolPoller {
    source: Arc<dyn ClusterSource>,
    config: PollerConfig,
    snapshot: Option<ResourceSnapshot>,
    health: HealthRegistry,
    metrics: PoolMetrics,
    logger: StructuredLogger,
    latest: LatestSummary,
}

impl PoolPoller {
    pub fn new(
        source: Arc<dyn ClusterSource>,
        config: PollerConfig,
        health: HealthRegistry,
        metrics: PoolMetrics,
        latest: LatestSummary,
    ) -> Self {
        let logger = StructuredLogger::new(&config.pool_name);
        Self {
            source,
            config,
            snapshot: None,
            health,
            metrics,
            logger,
            latest,
        }
    }

    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            pool = %self.config.pool_name,
            interval_secs = self.config.reload_interval.as_secs(),
            "Starting snapshot reload loop"
        );

        let mut ticker = interval(self.config.reload_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // Failures are logged and reflected in health by `cycle`
                    let _ = self.cycle().await;
                }
                _ = shutdown.recv() => {
                    info!(pool = %self.config.pool_name, "Shutting down snapshot reload loop");
                    break;
                }
            }
        }
    }

    /// Load the snapshot on first use, reload it afterwards
    pub async fn cycle(&mut self) -> PoolResult<()> {
        let start = Instant::now();
        let result = match self.snapshot.as_mut() {
            Some(snapshot) => snapshot.reload(self.config.with_pods).await,
            None => ResourceSnapshot::load(
                self.source.clone(),
                &self.config.pool_name,
                self.config.node_bootstrap_threshold,
                self.config.with_pods,
            )
            .await
            .map(|snapshot| {
                self.snapshot = Some(snapshot);
            }),
        };
        let elapsed = start.elapsed();
        self.metrics
            .observe_reload_latency(&self.config.pool_name, elapsed.as_secs_f64());

        match result {
            Ok(()) => {
                self.on_success(elapsed).await;
                Ok(())
            }
            Err(e) => {
                self.on_failure(&e).await;
                Err(e)
            }
        }
    }

    async fn on_success(&self, elapsed: Duration) {
        let Some(snapshot) = self.snapshot.as_ref() else {
            return;
        };

        self.metrics.record_snapshot(snapshot);
        *self.latest.write().await = Some(SnapshotSummary::of(snapshot, FormatLevel::Essentials));

        self.health.set_healthy(components::CLUSTER_SOURCE).await;
        self.health.set_healthy(components::SNAPSHOT).await;
        self.health.set_loaded(true).await;

        self.logger.log_reloaded(snapshot, elapsed.as_millis());
        self.logger.dump_snapshot(
            snapshot,
            self.config.format_level,
            self.config.dump_nodes,
            self.config.dump_pods,
        );
    }

    async fn on_failure(&self, error: &PoolError) {
        self.logger.log_reload_failed(error);
        self.metrics
            .inc_reload_errors(&self.config.pool_name, error);
        self.health
            .set_degraded(components::CLUSTER_SOURCE, error.to_string())
            .await;

        if self.snapshot.is_some() {
            self.health
                .set_degraded(components::SNAPSHOT, "serving last good snapshot")
                .await;
        } else {
            self.health
                .set_unhealthy(components::SNAPSHOT, "snapshot never loaded")
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capacity_lib::catalog::r5_metal;
    use capacity_lib::cluster::{InMemoryCluster, Inventory, Operation};
    use capacity_lib::health::ComponentStatus;
    use capacity_lib::keys::LABEL_KEY_RESOURCE_POOL;
    use capacity_lib::{Node, ResourcePoolSpec, ScalingRules};
    use chrono::Utc;
    use std::collections::BTreeMap;

    const POOL: &str = "pollerPool";

    fn node(id: &str) -> Node {
        Node {
            id: id.to_string(),
            labels: BTreeMap::from([(LABEL_KEY_RESOURCE_POOL.to_string(), POOL.to_string())]),
            taints: Vec::new(),
            allocatable: r5_metal().resources,
            created_at: Utc::now() - chrono::Duration::hours(1),
        }
    }

    fn cluster() -> Arc<InMemoryCluster> {
        Arc::new(InMemoryCluster::new(Inventory {
            pools: vec![ResourcePoolSpec {
                name: POOL.to_string(),
                unit_shape: r5_metal().resources,
                target_count: 3,
                scaling_rules: ScalingRules::default(),
                requested_at: 0,
            }],
            machines: vec![r5_metal()],
            nodes: vec![node("node-0")],
            pods: Vec::new(),
        }))
    }

    fn poller(cluster: Arc<InMemoryCluster>) -> (PoolPoller, HealthRegistry, LatestSummary) {
        let health = HealthRegistry::new();
        let latest = LatestSummary::default();
        let config = PollerConfig {
            pool_name: POOL.to_string(),
            node_bootstrap_threshold: Duration::from_secs(600),
            reload_interval: Duration::from_millis(10),
            with_pods: true,
            format_level: FormatLevel::Compact,
            dump_nodes: true,
            dump_pods: true,
        };
        let poller = PoolPoller::new(
            cluster,
            config,
            health.clone(),
            PoolMetrics::new(),
            latest.clone(),
        );
        (poller, health, latest)
    }

    #[tokio::test]
    async fn test_first_cycle_loads_snapshot() {
        let (mut poller, health, latest) = poller(cluster());

        poller.cycle().await.unwrap();

        assert!(health.readiness().await.ready);
        let summary = latest.read().await.clone().unwrap();
        assert_eq!(summary.active_node_count, 1);
        assert_eq!(summary.not_provisioned_node_count, 2);
        assert_eq!(poller.snapshot.as_ref().map(|s| s.nodes().len()), Some(1));
    }

    #[tokio::test]
    async fn test_failed_first_load_is_unhealthy() {
        let cluster = cluster();
        cluster
            .fail_on(Operation::ReadPoolSpec, PoolError::transport("unreachable"))
            .await;
        let (mut poller, health, latest) = poller(cluster);

        assert!(poller.cycle().await.is_err());

        assert!(!health.readiness().await.ready);
        assert_eq!(health.health().await.status, ComponentStatus::Unhealthy);
        assert!(latest.read().await.is_none());
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_last_good_state() {
        let cluster = cluster();
        let (mut poller, health, latest) = poller(cluster.clone());
        poller.cycle().await.unwrap();

        cluster.set_nodes(vec![node("node-0"), node("node-1")]).await;
        cluster
            .fail_on(Operation::ListNodes, PoolError::transport("timeout"))
            .await;
        assert!(poller.cycle().await.is_err());

        assert_eq!(health.health().await.status, ComponentStatus::Degraded);
        assert!(health.readiness().await.ready);
        assert_eq!(latest.read().await.clone().unwrap().active_node_count, 1);

        cluster.clear_failures().await;
        poller.cycle().await.unwrap();
        assert_eq!(health.health().await.status, ComponentStatus::Healthy);
        assert_eq!(latest.read().await.clone().unwrap().active_node_count, 2);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let (poller, health, _latest) = poller(cluster());
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let handle = tokio::spawn(poller.run(shutdown_rx));
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(()).unwrap();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(health.readiness().await.ready);
    }
}
