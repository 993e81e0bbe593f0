//! Capacity accounting for autoscaled resource pools
//!
//! This crate provides:
//! - Resource vector arithmetic
//! - Node and pod lifecycle classification
//! - Pool membership resolution and inventory grouping
//! - A per-pool capacity snapshot backed by a pluggable cluster source
//! - Diagnostic formatting, health checks and metrics

pub mod catalog;
pub mod cluster;
pub mod error;
pub mod format;
pub mod grouping;
pub mod health;
pub mod keys;
pub mod lifecycle;
pub mod membership;
pub mod models;
pub mod observability;
pub mod resources;
pub mod snapshot;

#[cfg(test)]
pub(crate) mod fixtures;

pub use cluster::{ClusterSource, InMemoryCluster, Inventory, KubeCluster, KubeClusterConfig};
pub use error::{PoolError, PoolResult};
pub use format::FormatLevel;
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{PoolMetrics, StructuredLogger};
pub use resources::ResourceVector;
pub use snapshot::ResourceSnapshot;
