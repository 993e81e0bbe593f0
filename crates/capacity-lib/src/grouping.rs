//! Inventory grouping and queries over node and pod lists

use crate::lifecycle::{
    is_pod_finished, is_pod_running, is_pod_waiting_to_be_scheduled, pod_age,
};
use crate::membership::node_belongs_to_pool;
use crate::models::{Node, NodeAndPods, Pod, ResourcePoolSpec};
use crate::resources::ResourceVector;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;

/// Map the pool's nodes to the pods scheduled on them.
///
/// Finished pods are dropped. A live pod goes under its node when that node
/// is one of the pool's; otherwise (unscheduled, or on a node outside the
/// pool) it lands in the returned overflow list. A pod running on a pool
/// node is grouped regardless of its own pool labels. Input order is kept
/// within each list.
pub fn group_nodes_and_pods<'a>(
    pool: &ResourcePoolSpec,
    all_pods: &'a [Pod],
    all_nodes: &'a [Node],
) -> (HashMap<String, NodeAndPods<'a>>, Vec<&'a Pod>) {
    let mut groups: HashMap<String, NodeAndPods<'a>> = all_nodes
        .iter()
        .filter(|node| node_belongs_to_pool(node, pool))
        .map(|node| {
            (
                node.id.clone(),
                NodeAndPods {
                    node,
                    pods: Vec::new(),
                },
            )
        })
        .collect();
    let mut pods_without_node = Vec::new();

    for pod in all_pods.iter().filter(|pod| !is_pod_finished(pod)) {
        match pod.assigned_node().and_then(|id| groups.get_mut(id)) {
            Some(group) => group.pods.push(pod),
            None => pods_without_node.push(pod),
        }
    }

    (groups, pods_without_node)
}

pub fn find_not_scheduled_pods(pods: &[Pod]) -> Vec<&Pod> {
    pods.iter()
        .filter(|pod| is_pod_waiting_to_be_scheduled(pod))
        .collect()
}

/// Unscheduled pods that have been waiting at least `young_pod_threshold`
pub fn find_old_not_scheduled_pods(
    pods: &[Pod],
    young_pod_threshold: Duration,
    now: DateTime<Utc>,
) -> Vec<&Pod> {
    pods.iter()
        .filter(|pod| {
            is_pod_waiting_to_be_scheduled(pod) && pod_age(pod, now) >= young_pod_threshold
        })
        .collect()
}

pub fn count_not_scheduled_pods(pods: &[Pod]) -> i64 {
    pods.iter()
        .filter(|pod| is_pod_waiting_to_be_scheduled(pod))
        .count() as i64
}

pub fn filter_running_pods(pods: &[Pod]) -> Vec<&Pod> {
    pods.iter().filter(|pod| is_pod_running(pod)).collect()
}

/// Oldest first; nodes created at the same instant keep their order
pub fn sort_nodes_by_age(nodes: &mut [Node]) {
    nodes.sort_by_key(|node| node.created_at);
}

pub fn sum_node_resources<'a>(nodes: impl IntoIterator<Item = &'a Node>) -> ResourceVector {
    nodes.into_iter().map(|node| node.allocatable).sum()
}

pub fn sum_pod_resources<'a>(pods: impl IntoIterator<Item = &'a Pod>) -> ResourceVector {
    pods.into_iter().map(Pod::resources).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::*;
    use std::collections::HashSet;

    const POOL: &str = "testPool";

    #[test]
    fn test_group_nodes_and_pods() {
        let pool = new_pool_of_machine(POOL, &r5_metal(), 1, 1);
        let nodes = vec![
            new_node("node1", POOL, &r5_metal()),
            new_node("node2", "someOtherResourcePool", &r5_metal()),
        ];
        let now = Utc::now();
        let pods = vec![
            but_pod_assigned_to_node(
                new_not_scheduled_pod("pod0", POOL, ResourceVector::ZERO, now),
                &nodes[0],
            ),
            but_pod_assigned_to_node(
                new_not_scheduled_pod("pod1", "otherResourcePoolSameNode", ResourceVector::ZERO, now),
                &nodes[0],
            ),
            new_not_scheduled_pod("pod2", POOL, ResourceVector::ZERO, now),
        ];

        let (groups, other_pods) = group_nodes_and_pods(&pool, &pods, &nodes);

        assert_eq!(groups.len(), 1);
        let node1 = &groups["node1"];
        assert_eq!(node1.node.id, "node1");
        assert_eq!(node1.pods.len(), 2);
        assert_eq!(node1.pods[0].id, "pod0");
        assert_eq!(node1.pods[1].id, "pod1");

        assert_eq!(other_pods.len(), 1);
        assert_eq!(other_pods[0].id, "pod2");
    }

    #[test]
    fn test_grouping_is_complete_and_exclusive() {
        let pool = new_pool_of_machine(POOL, &r5_metal(), 1, 1);
        let mut nodes = new_nodes(3, "pool-node", POOL, &r5_metal());
        nodes.push(new_node("foreign", "elsewhere", &m5_metal()));
        let now = Utc::now();

        let mut pods = Vec::new();
        for (i, node) in nodes.iter().enumerate() {
            let pod = new_not_scheduled_pod(&format!("on-{}", i), POOL, ResourceVector::ZERO, now);
            pods.push(but_pod_running_on_node(pod, node));
        }
        pods.extend(new_not_scheduled_pods(2, "waiting", POOL, ResourceVector::ZERO, now));
        pods.push(but_pod_finished(but_pod_assigned_to_node(
            new_not_scheduled_pod("done", POOL, ResourceVector::ZERO, now),
            &nodes[0],
        )));

        let (groups, overflow) = group_nodes_and_pods(&pool, &pods, &nodes);

        let mut seen = HashSet::new();
        for group in groups.values() {
            for pod in &group.pods {
                assert!(seen.insert(pod.id.clone()), "{} grouped twice", pod.id);
            }
        }
        for pod in &overflow {
            assert!(seen.insert(pod.id.clone()), "{} grouped twice", pod.id);
        }

        let live: HashSet<String> = pods
            .iter()
            .filter(|pod| !is_pod_finished(pod))
            .map(|pod| pod.id.clone())
            .collect();
        assert_eq!(seen, live);

        // The pod on the foreign node plus the two waiting ones
        assert_eq!(overflow.len(), 3);
        assert_eq!(overflow[0].id, "on-3");
        assert_eq!(overflow[1].id, "waiting#0");
    }

    #[test]
    fn test_sort_nodes_by_age() {
        let now = Utc::now();
        let hours = |h: i64| now - chrono::Duration::hours(h);
        let mut nodes = vec![
            but_node_created_at(new_node("a", POOL, &r5_metal()), hours(0)),
            but_node_created_at(new_node("b", POOL, &r5_metal()), hours(1)),
            but_node_created_at(new_node("c", POOL, &r5_metal()), hours(3)),
            but_node_created_at(new_node("d", POOL, &r5_metal()), hours(2)),
        ];

        sort_nodes_by_age(&mut nodes);

        let order: Vec<&str> = nodes.iter().map(|node| node.id.as_str()).collect();
        assert_eq!(order, vec!["c", "d", "b", "a"]);
    }

    #[test]
    fn test_not_scheduled_queries() {
        let now = Utc::now();
        let node = new_node("node1", POOL, &r5_metal());
        let mut pods = new_not_scheduled_pods(2, "fresh", POOL, ResourceVector::ZERO, now);
        pods.push(new_not_scheduled_pod(
            "stale",
            POOL,
            ResourceVector::ZERO,
            now - chrono::Duration::minutes(10),
        ));
        pods.push(but_pod_running_on_node(
            new_not_scheduled_pod("running", POOL, ResourceVector::ZERO, now),
            &node,
        ));

        assert_eq!(find_not_scheduled_pods(&pods).len(), 3);
        assert_eq!(count_not_scheduled_pods(&pods), 3);

        let old = find_old_not_scheduled_pods(&pods, Duration::from_secs(60), now);
        assert_eq!(old.len(), 1);
        assert_eq!(old[0].id, "stale");

        let running = filter_running_pods(&pods);
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].id, "running");
    }

    #[test]
    fn test_sums() {
        let nodes = new_nodes(3, "node", POOL, &r5_metal());
        assert_eq!(sum_node_resources(&nodes), r5_metal().resources.multiply(3));

        let quarter = r5_metal().resources.divide(4);
        let pods = new_not_scheduled_pods(4, "pod", POOL, quarter, Utc::now());
        assert_eq!(sum_pod_resources(&pods), quarter.multiply(4));
    }
}
