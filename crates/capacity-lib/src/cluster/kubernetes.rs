//! Kubernetes API backed cluster source
//!
//! Nodes and pods come from the core API. Pool specs and machine shapes are
//! custom resources read as dynamic objects, so no generated CRD types are
//! needed. All patches are JSON merge patches.

use super::{parse_quantity, ClusterSource};
use crate::error::{PoolError, PoolResult};
use crate::keys::{
    ONE_MBPS, ONE_MEGABYTE, RESOURCE_CPU, RESOURCE_EPHEMERAL_STORAGE, RESOURCE_GPU,
    RESOURCE_MEMORY, RESOURCE_NETWORK,
};
use crate::models::{
    MachineShape, Node, Pod, PodPhase, ResourcePoolSpec, ScalingRules, Taint, TaintEffect,
};
use crate::resources::ResourceVector;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use k8s_openapi::api::core::v1::{Node as KubeNode, Pod as KubePod};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::api::{
    Api, ApiResource, DynamicObject, GroupVersionKind, ListParams, Patch, PatchParams,
};
use kube::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

const DEFAULT_CRD_GROUP: &str = "config.titus.netflix.com";
const DEFAULT_CRD_VERSION: &str = "v1";

/// Where the pool and machine custom resources live
#[derive(Debug, Clone)]
pub struct KubeClusterConfig {
    pub namespace: String,
    pub crd_group: String,
    pub crd_version: String,
}

impl Default for KubeClusterConfig {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            crd_group: DEFAULT_CRD_GROUP.to_string(),
            crd_version: DEFAULT_CRD_VERSION.to_string(),
        }
    }
}

/// Cluster source talking to a Kubernetes API server
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
    config: KubeClusterConfig,
    pool_resource: ApiResource,
    machine_resource: ApiResource,
}

impl KubeCluster {
    pub fn new(client: Client, config: KubeClusterConfig) -> Self {
        let pool_gvk =
            GroupVersionKind::gvk(&config.crd_group, &config.crd_version, "ResourcePoolConfig");
        let machine_gvk =
            GroupVersionKind::gvk(&config.crd_group, &config.crd_version, "MachineTypeConfig");
        Self {
            client,
            pool_resource: ApiResource::from_gvk_with_plural(&pool_gvk, "resourcepoolconfigs"),
            machine_resource: ApiResource::from_gvk_with_plural(
                &machine_gvk,
                "machinetypeconfigs",
            ),
            config,
        }
    }

    /// Connect using an explicit kubeconfig, or the in-cluster/default one
    pub async fn connect(kubeconfig: Option<&Path>, config: KubeClusterConfig) -> PoolResult<Self> {
        let client = match kubeconfig {
            Some(path) => {
                let kubeconfig =
                    kube::config::Kubeconfig::read_from(path).map_err(PoolError::transport)?;
                let options = kube::config::KubeConfigOptions::default();
                let client_config = kube::Config::from_custom_kubeconfig(kubeconfig, &options)
                    .await
                    .map_err(PoolError::transport)?;
                Client::try_from(client_config).map_err(PoolError::transport)?
            }
            None => Client::try_default().await.map_err(PoolError::transport)?,
        };
        info!(
            namespace = %config.namespace,
            group = %config.crd_group,
            "Connected to Kubernetes API"
        );
        Ok(Self::new(client, config))
    }

    fn pool_api(&self) -> Api<DynamicObject> {
        Api::namespaced_with(
            self.client.clone(),
            &self.config.namespace,
            &self.pool_resource,
        )
    }

    fn machine_api(&self) -> Api<DynamicObject> {
        Api::namespaced_with(
            self.client.clone(),
            &self.config.namespace,
            &self.machine_resource,
        )
    }
}

#[async_trait]
impl ClusterSource for KubeCluster {
    async fn read_pool_spec(&self, pool_name: &str) -> PoolResult<ResourcePoolSpec> {
        let object = self
            .pool_api()
            .get(pool_name)
            .await
            .map_err(|e| map_kube_error(e, &format!("resource pool {}", pool_name)))?;
        pool_from_object(&object)
    }

    async fn list_machine_shapes(&self) -> PoolResult<Vec<MachineShape>> {
        let list = self
            .machine_api()
            .list(&ListParams::default())
            .await
            .map_err(|e| map_kube_error(e, "machine types"))?;
        list.items.iter().map(machine_from_object).collect()
    }

    async fn list_nodes(&self) -> PoolResult<Vec<Node>> {
        let api: Api<KubeNode> = Api::all(self.client.clone());
        let list = api
            .list(&ListParams::default())
            .await
            .map_err(|e| map_kube_error(e, "nodes"))?;
        debug!(count = list.items.len(), "Listed nodes");
        Ok(list.items.iter().map(node_from_kube).collect())
    }

    async fn list_pods(&self) -> PoolResult<Vec<Pod>> {
        let api: Api<KubePod> = Api::all(self.client.clone());
        let list = api
            .list(&ListParams::default())
            .await
            .map_err(|e| map_kube_error(e, "pods"))?;
        debug!(count = list.items.len(), "Listed pods");
        Ok(list.items.iter().map(pod_from_kube).collect())
    }

    async fn patch_pool_spec(&self, updated: &ResourcePoolSpec) -> PoolResult<ResourcePoolSpec> {
        let patch = json!({
            "spec": {
                "resourceCount": updated.target_count,
                "requestedAt": updated.requested_at,
            }
        });
        let object = self
            .pool_api()
            .patch(&updated.name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| map_kube_error(e, &format!("resource pool {}", updated.name)))?;
        pool_from_object(&object)
    }

    async fn patch_node(&self, original: &Node, updated: &Node) -> PoolResult<Node> {
        let patch = node_patch(original, updated);
        let api: Api<KubeNode> = Api::all(self.client.clone());
        let node = api
            .patch(&original.id, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| map_kube_error(e, &format!("node {}", original.id)))?;
        Ok(node_from_kube(&node))
    }
}

fn map_kube_error(err: kube::Error, what: &str) -> PoolError {
    match err {
        kube::Error::Api(response) if response.code == 404 => {
            PoolError::NotFound(format!("{}: {}", what, response.message))
        }
        kube::Error::Api(response) if response.code == 409 => {
            PoolError::Conflict(format!("{}: {}", what, response.message))
        }
        other => PoolError::Transport(format!("{}: {}", what, other)),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PoolSpecWire {
    name: String,
    resource_shape: ResourceVector,
    resource_count: i64,
    scaling_rules: ScalingRules,
    requested_at: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct MachineWire {
    name: String,
    compute_resource: ResourceVector,
}

fn object_spec<T: for<'de> Deserialize<'de>>(object: &DynamicObject) -> PoolResult<(String, T)> {
    let name = object.metadata.name.clone().unwrap_or_default();
    let spec = object
        .data
        .get("spec")
        .cloned()
        .ok_or_else(|| PoolError::Transport(format!("object {} has no spec", name)))?;
    let spec = serde_json::from_value(spec)
        .map_err(|e| PoolError::Transport(format!("malformed spec of {}: {}", name, e)))?;
    Ok((name, spec))
}

fn pool_from_object(object: &DynamicObject) -> PoolResult<ResourcePoolSpec> {
    let (object_name, spec): (String, PoolSpecWire) = object_spec(object)?;
    Ok(ResourcePoolSpec {
        name: if spec.name.is_empty() {
            object_name
        } else {
            spec.name
        },
        unit_shape: spec.resource_shape,
        target_count: spec.resource_count,
        scaling_rules: spec.scaling_rules,
        requested_at: spec.requested_at,
    })
}

fn machine_from_object(object: &DynamicObject) -> PoolResult<MachineShape> {
    let (object_name, spec): (String, MachineWire) = object_spec(object)?;
    Ok(MachineShape {
        name: if spec.name.is_empty() {
            object_name
        } else {
            spec.name
        },
        resources: spec.compute_resource,
    })
}

fn quantity_value(list: &BTreeMap<String, Quantity>, name: &str) -> i64 {
    list.get(name)
        .and_then(|quantity| parse_quantity(&quantity.0))
        .unwrap_or(0)
}

/// Convert a resource list to whole units: MiB for memory and disk, MBPS
/// for network.
pub fn resources_from_kube(list: &BTreeMap<String, Quantity>) -> ResourceVector {
    ResourceVector {
        cpu: quantity_value(list, RESOURCE_CPU),
        gpu: quantity_value(list, RESOURCE_GPU),
        memory_mb: quantity_value(list, RESOURCE_MEMORY) / ONE_MEGABYTE,
        disk_mb: quantity_value(list, RESOURCE_EPHEMERAL_STORAGE) / ONE_MEGABYTE,
        network_mbps: quantity_value(list, RESOURCE_NETWORK) / ONE_MBPS,
    }
}

fn epoch() -> DateTime<Utc> {
    Utc.timestamp_opt(0, 0).single().unwrap_or_default()
}

pub fn node_from_kube(node: &KubeNode) -> Node {
    let taints = node
        .spec
        .as_ref()
        .and_then(|spec| spec.taints.as_ref())
        .map(|taints| {
            taints
                .iter()
                .map(|taint| Taint {
                    key: taint.key.clone(),
                    value: taint.value.clone().unwrap_or_default(),
                    effect: TaintEffect::parse(&taint.effect),
                    time_added: taint.time_added.as_ref().map(|time| time.0),
                })
                .collect()
        })
        .unwrap_or_default();

    let allocatable = node
        .status
        .as_ref()
        .and_then(|status| status.allocatable.as_ref())
        .map(resources_from_kube)
        .unwrap_or_default();

    Node {
        id: node.metadata.name.clone().unwrap_or_default(),
        labels: node.metadata.labels.clone().unwrap_or_default(),
        taints,
        allocatable,
        created_at: node
            .metadata
            .creation_timestamp
            .as_ref()
            .map(|time| time.0)
            .unwrap_or_else(epoch),
    }
}

pub fn pod_from_kube(pod: &KubePod) -> Pod {
    let spec = pod.spec.as_ref();
    let container_requests = spec
        .map(|spec| {
            spec.containers
                .iter()
                .map(|container| {
                    container
                        .resources
                        .as_ref()
                        .and_then(|resources| resources.requests.as_ref())
                        .map(resources_from_kube)
                        .unwrap_or_default()
                })
                .collect()
        })
        .unwrap_or_default();

    Pod {
        id: pod.metadata.name.clone().unwrap_or_default(),
        labels: pod.metadata.labels.clone().unwrap_or_default(),
        annotations: pod.metadata.annotations.clone().unwrap_or_default(),
        phase: pod
            .status
            .as_ref()
            .and_then(|status| status.phase.as_deref())
            .map(PodPhase::parse)
            .unwrap_or_default(),
        node_id: spec
            .and_then(|spec| spec.node_name.clone())
            .filter(|name| !name.is_empty()),
        container_requests,
        created_at: pod
            .metadata
            .creation_timestamp
            .as_ref()
            .map(|time| time.0)
            .unwrap_or_else(epoch),
    }
}

/// Merge patch turning `original` into `updated`.
///
/// Removed labels are nulled out. Taints are sent as a whole list since
/// merge patches replace arrays.
fn node_patch(original: &Node, updated: &Node) -> Value {
    let mut labels = Map::new();
    for (key, value) in &updated.labels {
        if original.labels.get(key) != Some(value) {
            labels.insert(key.clone(), Value::String(value.clone()));
        }
    }
    for key in original.labels.keys() {
        if !updated.labels.contains_key(key) {
            labels.insert(key.clone(), Value::Null);
        }
    }

    let mut patch = Map::new();
    if !labels.is_empty() {
        patch.insert("metadata".to_string(), json!({ "labels": labels }));
    }
    if original.taints != updated.taints {
        let taints: Vec<Value> = updated.taints.iter().map(taint_to_json).collect();
        patch.insert("spec".to_string(), json!({ "taints": taints }));
    }
    Value::Object(patch)
}

fn taint_to_json(taint: &Taint) -> Value {
    let mut value = json!({
        "key": taint.key,
        "effect": taint.effect.as_str(),
    });
    if !taint.value.is_empty() {
        value["value"] = Value::String(taint.value.clone());
    }
    if let Some(time_added) = taint.time_added {
        value["timeAdded"] = Value::String(time_added.to_rfc3339_opts(SecondsFormat::Secs, true));
    }
    value
}
