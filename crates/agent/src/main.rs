//! Capacity Agent - resource pool capacity accounting
//!
//! Runs next to the cluster autoscaler, periodically rebuilding the capacity
//! snapshot of one resource pool and exporting its aggregates.

use anyhow::{Context, Result};
use capacity_agent::{api, config, poller};
use capacity_lib::{
    health::{components, HealthRegistry},
    keys::is_mock_resource_pool,
    observability::{PoolMetrics, StructuredLogger},
    ClusterSource, KubeCluster,
};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting capacity-agent");

    let config = config::AgentConfig::load()?;
    info!(
        pool = %config.pool_name,
        namespace = %config.namespace,
        "Agent configured"
    );
    if is_mock_resource_pool(&config.pool_name) {
        warn!(pool = %config.pool_name, "Accounting for a pool of simulated nodes");
    }

    let health_registry = HealthRegistry::new();
    health_registry.register(components::CLUSTER_SOURCE).await;
    health_registry.register(components::SNAPSHOT).await;

    let metrics = PoolMetrics::new();

    let logger = StructuredLogger::new(&config.pool_name);
    logger.log_startup(AGENT_VERSION, config.reload_interval_secs);

    let cluster = KubeCluster::connect(
        config.kubeconfig.as_deref().map(Path::new),
        config.cluster_config(),
    )
    .await
    .context("Failed to connect to the Kubernetes API")?;
    let source: Arc<dyn ClusterSource> = Arc::new(cluster);

    let latest = api::LatestSummary::default();
    let app_state = Arc::new(api::AppState::new(health_registry.clone(), latest.clone()));
    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let poller = poller::PoolPoller::new(
        source,
        poller::PollerConfig::from(&config),
        health_registry,
        metrics,
        latest,
    );
    let poller_handle = tokio::spawn(poller.run(shutdown_rx));

    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");

    let _ = shutdown_tx.send(());
    if let Err(e) = poller_handle.await {
        warn!(error = %e, "Reload loop did not stop cleanly");
    }
    api_handle.abort();

    info!("Shutdown complete");
    Ok(())
}
