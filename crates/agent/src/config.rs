//! Agent configuration

use anyhow::{Context, Result};
use capacity_lib::{FormatLevel, KubeClusterConfig};
use serde::Deserialize;
use std::time::Duration;

/// Agent configuration, read from `CAPACITY_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Resource pool to account for
    #[serde(default = "default_pool_name")]
    pub pool_name: String,

    /// Namespace of the pool and machine type custom resources
    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default)]
    pub crd_group: Option<String>,

    #[serde(default)]
    pub crd_version: Option<String>,

    /// Explicit kubeconfig, in-cluster config otherwise
    #[serde(default)]
    pub kubeconfig: Option<String>,

    /// Nodes younger than this may still be initializing
    #[serde(default = "default_node_bootstrap_threshold")]
    pub node_bootstrap_threshold_secs: u64,

    #[serde(default = "default_reload_interval")]
    pub reload_interval_secs: u64,

    /// Also reload pods on every cycle
    #[serde(default = "default_true")]
    pub with_pods: bool,

    #[serde(default = "default_format_level")]
    pub format_level: FormatLevel,

    #[serde(default)]
    pub dump_nodes: bool,

    #[serde(default)]
    pub dump_pods: bool,

    /// API server port for health/metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,
}

fn default_pool_name() -> String {
    capacity_lib::keys::RESOURCE_POOL_ELASTIC.to_string()
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_node_bootstrap_threshold() -> u64 {
    600
}

fn default_reload_interval() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_format_level() -> FormatLevel {
    FormatLevel::Essentials
}

fn default_api_port() -> u16 {
    8080
}

impl AgentConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("CAPACITY"))
            .build()?;
        Self::from_config(config)
    }

    fn from_config(config: config::Config) -> Result<Self> {
        config
            .try_deserialize()
            .context("Invalid CAPACITY_* configuration")
    }

    pub fn node_bootstrap_threshold(&self) -> Duration {
        Duration::from_secs(self.node_bootstrap_threshold_secs)
    }

    pub fn reload_interval(&self) -> Duration {
        Duration::from_secs(self.reload_interval_secs.max(1))
    }

    pub fn cluster_config(&self) -> KubeClusterConfig {
        let defaults = KubeClusterConfig::default();
        KubeClusterConfig {
            namespace: self.namespace.clone(),
            crd_group: self.crd_group.clone().unwrap_or(defaults.crd_group),
            crd_version: self.crd_version.clone().unwrap_or(defaults.crd_version),
        }
    }
}
