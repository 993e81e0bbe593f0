//! Prometheus gauges and structured log events for pool accounting

use crate::error::PoolError;
use crate::format::{
    format_node, format_pod, format_resource_pool, format_snapshot, FormatLevel,
};
use crate::snapshot::ResourceSnapshot;
use chrono::Utc;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge_vec, HistogramVec,
    IntCounterVec, IntGaugeVec,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Buckets for reload latency, in seconds
const RELOAD_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

static GLOBAL_METRICS: OnceLock<PoolMetricsInner> = OnceLock::new();

struct PoolMetricsInner {
    active_nodes: IntGaugeVec,
    on_way_out_nodes: IntGaugeVec,
    not_provisioned_nodes: IntGaugeVec,
    target_count: IntGaugeVec,
    active_cpu: IntGaugeVec,
    not_provisioned_cpu: IntGaugeVec,
    reload_latency_seconds: HistogramVec,
    reload_errors: IntCounterVec,
}

impl PoolMetricsInner {
    fn new() -> Self {
        Self {
            active_nodes: register_int_gauge_vec!(
                "resource_pool_active_nodes",
                "Nodes of the pool that are not on their way out",
                &["pool"]
            )
            .expect("Failed to register active_nodes"),

            on_way_out_nodes: register_int_gauge_vec!(
                "resource_pool_on_way_out_nodes",
                "Nodes of the pool marked for removal",
                &["pool"]
            )
            .expect("Failed to register on_way_out_nodes"),

            not_provisioned_nodes: register_int_gauge_vec!(
                "resource_pool_not_provisioned_nodes",
                "Machines still needed to reach the target size",
                &["pool"]
            )
            .expect("Failed to register not_provisioned_nodes"),

            target_count: register_int_gauge_vec!(
                "resource_pool_target_count",
                "Target number of unit shapes in the pool",
                &["pool"]
            )
            .expect("Failed to register target_count"),

            active_cpu: register_int_gauge_vec!(
                "resource_pool_active_cpu",
                "Allocatable CPUs of active nodes",
                &["pool"]
            )
            .expect("Failed to register active_cpu"),

            not_provisioned_cpu: register_int_gauge_vec!(
                "resource_pool_not_provisioned_cpu",
                "CPUs still missing to reach the target size",
                &["pool"]
            )
            .expect("Failed to register not_provisioned_cpu"),

            reload_latency_seconds: register_histogram_vec!(
                "resource_pool_reload_latency_seconds",
                "Time spent reloading a pool snapshot",
                &["pool"],
                RELOAD_BUCKETS.to_vec()
            )
            .expect("Failed to register reload_latency_seconds"),

            reload_errors: register_int_counter_vec!(
                "resource_pool_reload_errors_total",
                "Failed snapshot reloads by error kind",
                &["pool", "kind"]
            )
            .expect("Failed to register reload_errors"),
        }
    }
}

/// Handle to the process wide pool metrics. Clones share the same series.
#[derive(Clone)]
pub struct PoolMetrics {
    inner: &'static PoolMetricsInner,
}

impl Default for PoolMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PoolMetrics {
    pub fn new() -> Self {
        Self {
            inner: GLOBAL_METRICS.get_or_init(PoolMetricsInner::new),
        }
    }

    /// Publish the aggregates of a freshly reloaded snapshot
    pub fn record_snapshot(&self, snapshot: &ResourceSnapshot) {
        let labels = [snapshot.pool_name()];
        let inner = self.inner;
        inner
            .active_nodes
            .with_label_values(&labels)
            .set(snapshot.active_node_count());
        inner
            .on_way_out_nodes
            .with_label_values(&labels)
            .set(snapshot.on_way_out_node_count());
        inner
            .not_provisioned_nodes
            .with_label_values(&labels)
            .set(snapshot.not_provisioned_count());
        inner
            .target_count
            .with_label_values(&labels)
            .set(snapshot.pool().target_count);
        inner
            .active_cpu
            .with_label_values(&labels)
            .set(snapshot.active_capacity().cpu);
        inner
            .not_provisioned_cpu
            .with_label_values(&labels)
            .set(snapshot.not_provisioned_capacity().cpu);
    }

    pub fn observe_reload_latency(&self, pool: &str, duration_secs: f64) {
        self.inner
            .reload_latency_seconds
            .with_label_values(&[pool])
            .observe(duration_secs);
    }

    pub fn inc_reload_errors(&self, pool: &str, error: &PoolError) {
        self.inner
            .reload_errors
            .with_label_values(&[pool, error_kind(error)])
            .inc();
    }
}

fn error_kind(error: &PoolError) -> &'static str {
    match error {
        PoolError::NotFound(_) => "not_found",
        PoolError::Conflict(_) => "conflict",
        PoolError::Transport(_) => "transport",
        PoolError::Validation(_) => "validation",
    }
}

/// Event-tagged log records for one pool
#[derive(Clone)]
pub struct StructuredLogger {
    pool_name: String,
}

impl StructuredLogger {
    pub fn new(pool_name: impl Into<String>) -> Self {
        Self {
            pool_name: pool_name.into(),
        }
    }

    pub fn log_startup(&self, version: &str, reload_interval_secs: u64) {
        info!(
            event = "agent_started",
            pool = %self.pool_name,
            agent_version = %version,
            reload_interval_secs,
            "Capacity agent started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_shutdown",
            pool = %self.pool_name,
            reason = %reason,
            "Capacity agent shutting down"
        );
    }

    pub fn log_reloaded(&self, snapshot: &ResourceSnapshot, elapsed_ms: u128) {
        info!(
            event = "snapshot_reloaded",
            pool = %self.pool_name,
            nodes = snapshot.nodes().len(),
            pods = snapshot.pods().len(),
            elapsed_ms,
            "Resource snapshot reloaded"
        );
    }

    /// The snapshot keeps serving its last good state after this
    pub fn log_reload_failed(&self, error: &PoolError) {
        warn!(
            event = "snapshot_reload_failed",
            pool = %self.pool_name,
            error = %error,
            retryable = error.is_retryable(),
            "Resource snapshot reload failed, keeping previous state"
        );
    }

    pub fn log_pool_resized(&self, previous: i64, target_count: i64) {
        info!(
            event = "pool_resized",
            pool = %self.pool_name,
            previous,
            target_count,
            "Resource pool resized"
        );
    }

    pub fn log_node_updated(&self, node_id: &str, change: &str) {
        info!(
            event = "node_updated",
            pool = %self.pool_name,
            node_id = %node_id,
            change = %change,
            "Node updated"
        );
    }

    /// Log the aggregates and the pool, then optionally every node and pod
    pub fn dump_snapshot(
        &self,
        snapshot: &ResourceSnapshot,
        level: FormatLevel,
        with_nodes: bool,
        with_pods: bool,
    ) {
        info!(
            event = "snapshot_dump",
            pool = %self.pool_name,
            "Resource pool aggregates: {}",
            format_snapshot(snapshot, level)
        );
        info!(
            event = "snapshot_dump",
            pool = %self.pool_name,
            "Resource pool: {}",
            format_resource_pool(snapshot.pool(), level)
        );
        if with_nodes {
            let now = Utc::now();
            for node in snapshot.nodes() {
                info!(
                    event = "snapshot_dump",
                    pool = %self.pool_name,
                    "Node: {}",
                    format_node(node, now, snapshot.node_bootstrap_threshold(), level)
                );
            }
        }
        if with_pods {
            for pod in snapshot.pods() {
                info!(
                    event = "snapshot_dump",
                    pool = %self.pool_name,
                    "Pod: {}",
                    format_pod(pod, level)
                );
            }
        }
    }
}
