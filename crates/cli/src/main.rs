//! Resource pool capacity CLI
//!
//! Inspect the capacity snapshot of a resource pool and apply the two
//! changes the accounting loop may make: resizing the pool and marking
//! nodes for removal.

mod commands;
mod output;

use anyhow::{Context, Result};
use capacity_lib::{
    ClusterSource, FormatLevel, InMemoryCluster, KubeCluster, KubeClusterConfig,
    ResourceSnapshot,
};
use clap::{Parser, Subcommand};
use commands::{inspect, mutate};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Resource pool capacity CLI
#[derive(Parser)]
#[command(name = "poolctl")]
#[command(author, version, about = "Inspect and adjust resource pool capacity", long_about = None)]
pub struct Cli {
    /// Resource pool to operate on
    #[arg(long, short, env = "POOLCTL_POOL", default_value = "elastic")]
    pub pool: String,

    /// Namespace of the pool and machine type resources
    #[arg(long, short, env = "POOLCTL_NAMESPACE", default_value = "default")]
    pub namespace: String,

    /// Path to kubeconfig file (uses default if not specified)
    #[arg(long, env = "KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// Work on a JSON inventory file instead of a cluster; mutations are
    /// written back to it
    #[arg(long)]
    pub inventory: Option<PathBuf>,

    /// Nodes younger than this many seconds may still be initializing
    #[arg(long, default_value_t = 600)]
    pub bootstrap_threshold_secs: u64,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Detail level of JSON output (compact, essentials, details)
    #[arg(long, short, default_value = "essentials")]
    pub level: FormatLevel,

    /// Log library diagnostics to stderr
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show active, leaving and missing capacity of the pool
    Snapshot,

    /// List the pool's nodes and their lifecycle state
    Nodes,

    /// List the pods running in or waiting for the pool
    Pods {
        /// Only pods whose primary pool is this one
        #[arg(long)]
        primary: bool,
    },

    /// Set the pool's target count
    Resize {
        /// New number of unit shapes
        count: i64,
    },

    /// Label a node as removable
    MarkRemovable {
        /// Node name
        node: String,
    },

    /// Taint a node as decommissioning
    Decommission {
        /// Node name
        node: String,

        /// Who requested the decommissioning, stored as the taint value
        #[arg(long, default_value = "poolctl")]
        source: String,
    },
}

impl Commands {
    fn needs_pods(&self) -> bool {
        matches!(self, Commands::Pods { .. })
    }

    fn is_mutation(&self) -> bool {
        matches!(
            self,
            Commands::Resize { .. } | Commands::MarkRemovable { .. } | Commands::Decommission { .. }
        )
    }
}

/// Where the snapshot reads from
enum Backend {
    Cluster,
    Inventory(Arc<InMemoryCluster>, PathBuf),
}

async fn connect(cli: &Cli) -> Result<(Arc<dyn ClusterSource>, Backend)> {
    if let Some(path) = &cli.inventory {
        let cluster = Arc::new(
            InMemoryCluster::from_file(path)
                .await
                .with_context(|| format!("Failed to load inventory {}", path.display()))?,
        );
        let source: Arc<dyn ClusterSource> = cluster.clone();
        return Ok((source, Backend::Inventory(cluster, path.clone())));
    }

    let config = KubeClusterConfig {
        namespace: cli.namespace.clone(),
        ..KubeClusterConfig::default()
    };
    let cluster = KubeCluster::connect(cli.kubeconfig.as_deref(), config)
        .await
        .context("Failed to connect to the Kubernetes API")?;
    let source: Arc<dyn ClusterSource> = Arc::new(cluster);
    Ok((source, Backend::Cluster))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new("debug"))
            .with_writer(std::io::stderr)
            .init();
    }

    let (source, backend) = connect(&cli).await?;
    let mut snapshot = ResourceSnapshot::load(
        source,
        &cli.pool,
        Duration::from_secs(cli.bootstrap_threshold_secs),
        cli.command.needs_pods(),
    )
    .await
    .with_context(|| format!("Failed to load resource pool {}", cli.pool))?;

    match &cli.command {
        Commands::Snapshot => inspect::show_snapshot(&snapshot, cli.format, cli.level),
        Commands::Nodes => inspect::list_nodes(&snapshot, cli.format, cli.level),
        Commands::Pods { primary } => inspect::list_pods(&snapshot, *primary, cli.format, cli.level),
        Commands::Resize { count } => mutate::resize(&mut snapshot, *count).await?,
        Commands::MarkRemovable { node } => mutate::mark_removable(&mut snapshot, node).await?,
        Commands::Decommission { node, source } => {
            mutate::decommission(&mut snapshot, node, source).await?
        }
    }

    if let (true, Backend::Inventory(cluster, path)) = (cli.command.is_mutation(), &backend) {
        cluster
            .save_to_file(path)
            .await
            .with_context(|| format!("Failed to write inventory {}", path.display()))?;
        output::print_info(&format!("Inventory {} updated", path.display()));
    }

    Ok(())
}
