//! Read-only views of a pool snapshot

use capacity_lib::format::{format_node, format_pod, format_resource_pool, format_snapshot};
use capacity_lib::grouping::{
    count_not_scheduled_pods, find_old_not_scheduled_pods, sort_nodes_by_age,
};
use capacity_lib::lifecycle::{
    is_node_bootstrapping, is_node_on_its_way_out, is_node_removable, is_node_to_remove,
    node_age, pod_age, pod_state,
};
use capacity_lib::membership::pod_primary_pool;
use capacity_lib::{FormatLevel, Node, ResourceSnapshot, ResourceVector};
use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;
use std::time::Duration;
use tabled::Tabled;

use crate::output::{
    color_flag, color_state, format_age, format_megabytes, print_table, print_warning,
    OutputFormat,
};

/// Row for the capacity table
#[derive(Tabled, Serialize)]
struct CapacityRow {
    #[tabled(rename = "Capacity")]
    kind: String,
    #[tabled(rename = "Nodes")]
    nodes: i64,
    #[tabled(rename = "CPU")]
    cpu: i64,
    #[tabled(rename = "GPU")]
    gpu: i64,
    #[tabled(rename = "Memory")]
    memory: String,
    #[tabled(rename = "Disk")]
    disk: String,
    #[tabled(rename = "Network")]
    network: String,
}

impl CapacityRow {
    fn new(kind: &str, nodes: i64, resources: ResourceVector) -> Self {
        Self {
            kind: kind.to_string(),
            nodes,
            cpu: resources.cpu,
            gpu: resources.gpu,
            memory: format_megabytes(resources.memory_mb),
            disk: format_megabytes(resources.disk_mb),
            network: format!("{} Mbps", resources.network_mbps),
        }
    }
}

/// Row for the nodes table
#[derive(Tabled, Serialize)]
struct NodeRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "To Remove")]
    to_remove: String,
    #[tabled(rename = "Removable")]
    removable: String,
    #[tabled(rename = "Age")]
    age: String,
    #[tabled(rename = "CPU")]
    cpu: i64,
    #[tabled(rename = "Memory")]
    memory: String,
}

/// Row for the pods table
#[derive(Tabled, Serialize)]
struct PodRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Node")]
    node: String,
    #[tabled(rename = "Primary Pool")]
    primary_pool: String,
    #[tabled(rename = "Age")]
    age: String,
    #[tabled(rename = "CPU")]
    cpu: i64,
    #[tabled(rename = "Memory")]
    memory: String,
}

pub fn show_snapshot(snapshot: &ResourceSnapshot, format: OutputFormat, level: FormatLevel) {
    // One JSON document per line: aggregates, then the pool spec
    if format == OutputFormat::Json {
        println!("{}", format_snapshot(snapshot, level));
        println!("{}", format_resource_pool(snapshot.pool(), level));
        return;
    }

    let pool = snapshot.pool();
    println!("{}", "Resource Pool".bold());
    println!("{}", "=".repeat(50));
    println!("Name:                   {}", pool.name.cyan());
    println!("Target count:           {}", pool.target_count);
    println!(
        "Autoscaling:            {}",
        color_flag(pool.scaling_rules.auto_scaling_enabled, "enabled", "disabled")
    );
    println!(
        "Unit shape:             {} CPU, {} GPU, {} memory",
        pool.unit_shape.cpu,
        pool.unit_shape.gpu,
        format_megabytes(pool.unit_shape.memory_mb)
    );
    println!();

    let rows = vec![
        CapacityRow::new("Desired", pool.target_count, pool.desired_capacity()),
        CapacityRow::new(
            "Active",
            snapshot.active_node_count(),
            snapshot.active_capacity(),
        ),
        CapacityRow::new(
            "On way out",
            snapshot.on_way_out_node_count(),
            snapshot.on_way_out_capacity(),
        ),
        CapacityRow::new(
            "Not provisioned",
            snapshot.not_provisioned_count(),
            snapshot.not_provisioned_capacity(),
        ),
    ];
    print_table(&rows, format);

    let missing = snapshot.not_provisioned_count();
    if missing > 0 {
        println!(
            "\n{} {} more machine(s) needed",
            "Scale up:".bold(),
            missing.to_string().yellow()
        );
    }
}

/// Lifecycle state shown for a node, removal taking precedence
fn node_state(node: &Node, now: DateTime<Utc>, threshold: Duration) -> &'static str {
    if is_node_on_its_way_out(node) {
        "onWayOut"
    } else if is_node_bootstrapping(node, now, threshold) {
        "bootstrapping"
    } else {
        "up"
    }
}

pub fn list_nodes(snapshot: &ResourceSnapshot, format: OutputFormat, level: FormatLevel) {
    let now = Utc::now();
    let threshold = snapshot.node_bootstrap_threshold();
    let mut nodes = snapshot.nodes().to_vec();
    sort_nodes_by_age(&mut nodes);

    if format == OutputFormat::Json {
        for node in &nodes {
            println!("{}", format_node(node, now, threshold, level));
        }
        return;
    }

    if nodes.is_empty() {
        print_warning(&format!("Resource pool {} has no nodes", snapshot.pool_name()));
        return;
    }

    let rows: Vec<NodeRow> = nodes
        .iter()
        .map(|node| NodeRow {
            name: node.id.clone(),
            state: color_state(node_state(node, now, threshold)),
            to_remove: yes_no(is_node_to_remove(node)),
            removable: yes_no(is_node_removable(node)),
            age: format_age(node_age(node, now)),
            cpu: node.allocatable.cpu,
            memory: format_megabytes(node.allocatable.memory_mb),
        })
        .collect();
    print_table(&rows, format);
    println!("\nTotal: {} nodes", rows.len());
}

pub fn list_pods(
    snapshot: &ResourceSnapshot,
    primary_only: bool,
    format: OutputFormat,
    level: FormatLevel,
) {
    let pods = if primary_only {
        snapshot.primary_pods()
    } else {
        snapshot.pods()
    };

    if format == OutputFormat::Json {
        for pod in pods {
            println!("{}", format_pod(pod, level));
        }
        return;
    }

    if pods.is_empty() {
        print_warning(&format!("No pods in resource pool {}", snapshot.pool_name()));
        return;
    }

    let now = Utc::now();
    let rows: Vec<PodRow> = pods
        .iter()
        .map(|pod| {
            let resources = pod.resources();
            PodRow {
                name: pod.id.clone(),
                state: color_state(&pod_state(pod).to_string()),
                node: pod.assigned_node().unwrap_or("-").to_string(),
                primary_pool: pod_primary_pool(pod).unwrap_or_else(|| "-".to_string()),
                age: format_age(pod_age(pod, now)),
                cpu: resources.cpu,
                memory: format_megabytes(resources.memory_mb),
            }
        })
        .collect();
    print_table(&rows, format);

    let waiting = count_not_scheduled_pods(pods);
    let stuck = find_old_not_scheduled_pods(pods, snapshot.node_bootstrap_threshold(), now).len();
    println!("\nTotal: {} pods, {} not scheduled", rows.len(), waiting);
    if stuck > 0 {
        print_warning(&format!(
            "{} pod(s) waiting longer than {}",
            stuck,
            format_age(snapshot.node_bootstrap_threshold())
        ));
    }
}

fn yes_no(value: bool) -> String {
    if value { "yes" } else { "no" }.to_string()
}
