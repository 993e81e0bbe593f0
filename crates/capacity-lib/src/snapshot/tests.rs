//! Aggregation scenarios over an in-memory cluster

use super::*;
use crate::cluster::{InMemoryCluster, Inventory, Operation};
use crate::fixtures::*;
use crate::keys::{LABEL_KEY_REMOVABLE, TRUE};
use crate::lifecycle::{is_node_broken, is_node_on_its_way_out, is_node_removable};
use crate::models::{Taint, TaintEffect};

const THRESHOLD: Duration = Duration::from_secs(600);

fn quarter_r5() -> ResourceVector {
    r5_metal().resources.divide(4)
}

fn cluster_with(nodes: Vec<Node>, pods: Vec<Pod>, target_count: i64) -> Arc<InMemoryCluster> {
    Arc::new(InMemoryCluster::new(Inventory {
        pools: vec![new_pool_of(TEST_POOL, quarter_r5(), target_count)],
        machines: vec![r5_metal(), m5_metal()],
        nodes,
        pods,
    }))
}

async fn load(cluster: &Arc<InMemoryCluster>) -> ResourceSnapshot {
    ResourceSnapshot::load(cluster.clone(), TEST_POOL, THRESHOLD, true)
        .await
        .unwrap()
}

fn quarter_node(name: &str, pool: &str) -> Node {
    let mut node = new_node(name, pool, &r5_metal());
    node.allocatable = quarter_r5();
    node
}

#[tokio::test]
async fn test_not_provisioned_capacity_and_count() {
    let cluster = cluster_with(vec![quarter_node("node-0", TEST_POOL)], Vec::new(), 4);
    let snapshot = load(&cluster).await;

    assert_eq!(snapshot.pool().desired_capacity().cpu, 96);
    assert_eq!(snapshot.active_capacity().cpu, 24);
    assert_eq!(snapshot.not_provisioned_capacity(), quarter_r5().multiply(3));
    assert_eq!(snapshot.not_provisioned_capacity().cpu, 72);
    assert_eq!(snapshot.not_provisioned_count(), 3);
}

#[tokio::test]
async fn test_over_provisioned_pool_needs_nothing() {
    let nodes = (0..6)
        .map(|i| quarter_node(&format!("node-{}", i), TEST_POOL))
        .collect();
    let cluster = cluster_with(nodes, Vec::new(), 4);
    let snapshot = load(&cluster).await;

    assert_eq!(snapshot.active_node_count(), 6);
    assert_eq!(snapshot.not_provisioned_capacity(), ResourceVector::ZERO);
    assert_eq!(snapshot.not_provisioned_count(), 0);
}

#[tokio::test]
async fn test_on_way_out_nodes_are_not_active() {
    let nodes = vec![
        but_node_decommissioned("test", new_node("leaving", TEST_POOL, &r5_metal())),
        new_node("staying", TEST_POOL, &r5_metal()),
        new_node("elsewhere", "otherPool", &r5_metal()),
    ];
    let cluster = cluster_with(nodes, Vec::new(), 2);
    let snapshot = load(&cluster).await;

    assert_eq!(snapshot.nodes().len(), 2);
    assert_eq!(snapshot.active_node_count(), 1);
    assert_eq!(snapshot.on_way_out_node_count(), 1);
    assert_eq!(snapshot.active_capacity(), r5_metal().resources);
    assert_eq!(snapshot.on_way_out_capacity(), r5_metal().resources);
}

#[tokio::test]
async fn test_bootstrapping_nodes_count_as_active() {
    let young = but_node_created_at(new_node("young", TEST_POOL, &r5_metal()), Utc::now());
    let mut broken = young.clone();
    broken.id = "young-broken".to_string();
    broken.allocatable.cpu = 0;

    let cluster = cluster_with(vec![young, broken], Vec::new(), 1);
    let snapshot = load(&cluster).await;

    assert_eq!(snapshot.active_node_count(), 2);
    assert_eq!(snapshot.on_way_out_node_count(), 0);
}

#[tokio::test]
async fn test_failed_pod_reload_keeps_previous_state() {
    let nodes = new_nodes(2, "node", TEST_POOL, &r5_metal());
    let pods = vec![but_pod_running_on_node(
        new_not_scheduled_pod("pod", TEST_POOL, quarter_r5(), Utc::now()),
        &nodes[0],
    )];
    let cluster = cluster_with(nodes, pods, 2);
    let mut snapshot = load(&cluster).await;
    let capacity = snapshot.active_capacity();

    cluster.set_pods(Vec::new()).await;
    cluster
        .fail_on(Operation::ListPods, PoolError::transport("connection refused"))
        .await;

    let result = snapshot.reload_pods().await;

    assert!(matches!(result, Err(PoolError::Transport(_))));
    assert_eq!(snapshot.active_capacity(), capacity);
    assert_eq!(snapshot.pods().len(), 1);
    assert_eq!(snapshot.primary_pods().len(), 1);
}

#[tokio::test]
async fn test_failed_node_reload_keeps_index() {
    let cluster = cluster_with(new_nodes(3, "node", TEST_POOL, &r5_metal()), Vec::new(), 3);
    let mut snapshot = load(&cluster).await;

    cluster.set_nodes(Vec::new()).await;
    cluster
        .fail_on(Operation::ListNodes, PoolError::transport("timeout"))
        .await;
    assert!(snapshot.reload_nodes().await.is_err());
    assert_eq!(snapshot.active_node_count(), 3);
    assert!(snapshot.node("node-2").is_some());

    cluster.clear_failures().await;
    snapshot.reload_nodes().await.unwrap();
    assert_eq!(snapshot.active_node_count(), 0);
    assert!(snapshot.node("node-2").is_none());
}

#[tokio::test]
async fn test_failed_pool_reload_keeps_previous_spec() {
    let cluster = cluster_with(vec![quarter_node("node-0", TEST_POOL)], Vec::new(), 4);
    let mut snapshot = load(&cluster).await;
    let pool = snapshot.pool().clone();

    cluster
        .set_pools(vec![new_pool_of(TEST_POOL, quarter_r5(), 9)])
        .await;
    cluster
        .fail_on(Operation::ReadPoolSpec, PoolError::transport("timeout"))
        .await;

    let result = snapshot.reload_resource_pool().await;

    assert!(matches!(result, Err(PoolError::Transport(_))));
    assert_eq!(snapshot.pool(), &pool);
    assert_eq!(snapshot.machines().len(), 2);
    assert_eq!(snapshot.not_provisioned_count(), 3);

    cluster.clear_failures().await;
    snapshot.reload_resource_pool().await.unwrap();
    assert_eq!(snapshot.pool().target_count, 9);
    assert_eq!(snapshot.not_provisioned_count(), 8);
}

#[tokio::test]
async fn test_failed_machine_reload_keeps_previous_catalog() {
    let cluster = cluster_with(vec![quarter_node("node-0", TEST_POOL)], Vec::new(), 4);
    let mut snapshot = load(&cluster).await;
    let pool = snapshot.pool().clone();

    cluster.set_machines(vec![m5_metal()]).await;
    cluster
        .fail_on(Operation::ListMachineShapes, PoolError::transport("unreachable"))
        .await;

    let result = snapshot.reload_machines().await;

    assert!(matches!(result, Err(PoolError::Transport(_))));
    assert_eq!(snapshot.pool(), &pool);
    assert_eq!(snapshot.machines(), &[r5_metal(), m5_metal()]);
    assert!(snapshot.find_machine(&r5_metal().name).is_some());
    assert_eq!(snapshot.not_provisioned_count(), 3);

    cluster.clear_failures().await;
    snapshot.reload_machines().await.unwrap();
    assert_eq!(snapshot.machines(), &[m5_metal()]);
}

#[tokio::test]
async fn test_generic_no_execute_taint_keeps_old_node_active() {
    let tainted = but_node_with_taint(
        new_node("tainted", TEST_POOL, &r5_metal()),
        Taint {
            key: "foo".to_string(),
            value: String::new(),
            effect: TaintEffect::NoExecute,
            time_added: None,
        },
    );
    assert!(is_node_broken(&tainted));
    assert!(!is_node_on_its_way_out(&tainted));

    let cluster = cluster_with(vec![tainted], Vec::new(), 4);
    let snapshot = load(&cluster).await;

    assert_eq!(snapshot.active_node_count(), 1);
    assert_eq!(snapshot.on_way_out_node_count(), 0);
    assert_eq!(snapshot.active_capacity(), r5_metal().resources);
}

#[tokio::test]
async fn test_huge_target_count_saturates() {
    let cluster = cluster_with(vec![quarter_node("node-0", TEST_POOL)], Vec::new(), 4);
    let mut snapshot = load(&cluster).await;

    snapshot.adjust_pool_size(i64::MAX / 10).await.unwrap();

    assert_eq!(snapshot.pool().desired_capacity().cpu, i64::MAX);
    assert_eq!(snapshot.not_provisioned_capacity().cpu, i64::MAX - 24);
    assert!(snapshot.not_provisioned_count() > 0);
}

#[tokio::test]
async fn test_load_fails_for_unknown_pool() {
    let cluster = cluster_with(Vec::new(), Vec::new(), 1);
    let result = ResourceSnapshot::load(cluster, "missing", THRESHOLD, true).await;
    assert!(matches!(result, Err(PoolError::NotFound(_))));
}

#[tokio::test]
async fn test_load_without_pods_skips_pod_listing() {
    let cluster = cluster_with(new_nodes(1, "node", TEST_POOL, &r5_metal()), Vec::new(), 1);
    cluster
        .fail_on(Operation::ListPods, PoolError::transport("unreachable"))
        .await;

    let snapshot = ResourceSnapshot::load(cluster.clone(), TEST_POOL, THRESHOLD, false)
        .await
        .unwrap();
    assert!(snapshot.pods().is_empty());
    assert_eq!(snapshot.machines().len(), 2);
    assert_eq!(snapshot.find_machine("m5.metal"), Some(&m5_metal()));
    assert_eq!(snapshot.find_machine("x1.metal"), None);
}

#[tokio::test]
async fn test_pods_and_primary_pods() {
    let nodes = vec![
        new_node("pool-node", TEST_POOL, &r5_metal()),
        new_node("other-node", "otherPool", &r5_metal()),
    ];
    let now = Utc::now();
    let pods = vec![
        new_not_scheduled_pod("primary", TEST_POOL, quarter_r5(), now),
        but_pod_resource_pools(
            new_not_scheduled_pod("secondary", TEST_POOL, quarter_r5(), now),
            &["otherPool", TEST_POOL],
        ),
        but_pod_running_on_node(
            new_not_scheduled_pod("moved", TEST_POOL, quarter_r5(), now),
            &nodes[1],
        ),
        new_not_scheduled_pod("foreign", "otherPool", quarter_r5(), now),
    ];
    let cluster = cluster_with(nodes, pods, 1);
    let snapshot = load(&cluster).await;

    let ids: Vec<&str> = snapshot.pods().iter().map(|pod| pod.id.as_str()).collect();
    assert_eq!(ids, vec!["primary", "secondary"]);
    let primary: Vec<&str> = snapshot
        .primary_pods()
        .iter()
        .map(|pod| pod.id.as_str())
        .collect();
    assert_eq!(primary, vec!["primary"]);

    let (groups, unscheduled) = snapshot.group_nodes_and_pods();
    assert_eq!(groups.len(), 1);
    assert!(groups["pool-node"].pods.is_empty());
    assert_eq!(unscheduled.len(), 2);
}

#[tokio::test]
async fn test_adjust_pool_size() {
    let cluster = cluster_with(Vec::new(), Vec::new(), 2);
    let mut snapshot = load(&cluster).await;
    let before = Utc::now().timestamp();

    snapshot.adjust_pool_size(5).await.unwrap();

    assert_eq!(snapshot.pool().target_count, 5);
    assert!(snapshot.pool().requested_at >= before);
    assert_eq!(cluster.inventory().await.pools[0].target_count, 5);
    assert_eq!(snapshot.not_provisioned_count(), 5);
}

#[tokio::test]
async fn test_failed_adjust_keeps_spec() {
    let cluster = cluster_with(Vec::new(), Vec::new(), 2);
    let mut snapshot = load(&cluster).await;
    cluster
        .fail_on(
            Operation::PatchPoolSpec,
            PoolError::Conflict("resource version changed".to_string()),
        )
        .await;

    let result = snapshot.adjust_pool_size(5).await;

    assert!(matches!(result, Err(PoolError::Conflict(_))));
    assert_eq!(snapshot.pool().target_count, 2);
    assert_eq!(snapshot.pool().requested_at, 0);
}

#[tokio::test]
async fn test_update_node() {
    let cluster = cluster_with(new_nodes(2, "node", TEST_POOL, &r5_metal()), Vec::new(), 2);
    let mut snapshot = load(&cluster).await;

    snapshot
        .update_node("node-1", |node| {
            node.labels
                .insert(LABEL_KEY_REMOVABLE.to_string(), TRUE.to_string());
        })
        .await
        .unwrap();

    assert!(snapshot.node("node-1").map(is_node_removable).unwrap_or(false));
    assert_eq!(snapshot.on_way_out_node_count(), 1);
    let stored = cluster.inventory().await.nodes;
    assert!(is_node_removable(&stored[1]));
    assert!(!is_node_removable(&stored[0]));
}

#[tokio::test]
async fn test_update_unknown_node() {
    let cluster = cluster_with(
        vec![new_node("foreign", "otherPool", &r5_metal())],
        Vec::new(),
        1,
    );
    let mut snapshot = load(&cluster).await;

    let result = snapshot.update_node("foreign", |node| node.taints.clear()).await;

    assert!(matches!(result, Err(PoolError::NotFound(_))));
}

#[tokio::test]
async fn test_failed_update_keeps_node() {
    let cluster = cluster_with(new_nodes(1, "node", TEST_POOL, &r5_metal()), Vec::new(), 1);
    let mut snapshot = load(&cluster).await;
    cluster
        .fail_on(Operation::PatchNode, PoolError::transport("broken pipe"))
        .await;

    let result = snapshot
        .update_node("node-0", |node| {
            node.labels
                .insert(LABEL_KEY_REMOVABLE.to_string(), TRUE.to_string());
        })
        .await;

    assert!(matches!(result, Err(PoolError::Transport(_))));
    assert_eq!(snapshot.on_way_out_node_count(), 0);
    assert!(!is_node_removable(&cluster.inventory().await.nodes[0]));
}

#[tokio::test]
async fn test_reload_picks_up_spec_changes() {
    let cluster = cluster_with(Vec::new(), Vec::new(), 1);
    let mut snapshot = load(&cluster).await;

    let mut resized = snapshot.pool().clone();
    resized.target_count = 9;
    cluster.patch_pool_spec(&resized).await.unwrap();

    snapshot.reload(true).await.unwrap();
    assert_eq!(snapshot.pool().target_count, 9);
    assert_eq!(snapshot.not_provisioned_count(), 9);
}
