//! Commands that change the pool or its nodes

use anyhow::{bail, Context, Result};
use capacity_lib::keys::{new_decommissioning_taint, LABEL_KEY_REMOVABLE, TRUE};
use capacity_lib::lifecycle::{is_node_decommissioned, is_node_removable};
use capacity_lib::{ResourceSnapshot, StructuredLogger};
use chrono::Utc;

use crate::output::{print_success, print_warning};

pub async fn resize(snapshot: &mut ResourceSnapshot, count: i64) -> Result<()> {
    if count < 0 {
        bail!("Target count must not be negative, got {}", count);
    }

    let max_size = snapshot.pool().scaling_rules.max_size;
    if max_size > 0 && count > max_size {
        bail!(
            "Target count {} exceeds the maximum size {} of resource pool {}",
            count,
            max_size,
            snapshot.pool_name()
        );
    }

    let previous = snapshot.pool().target_count;
    if previous == count {
        print_warning(&format!(
            "Resource pool {} already targets {} machines",
            snapshot.pool_name(),
            count
        ));
        return Ok(());
    }

    snapshot
        .adjust_pool_size(count)
        .await
        .with_context(|| format!("Failed to resize resource pool {}", snapshot.pool_name()))?;
    StructuredLogger::new(snapshot.pool_name()).log_pool_resized(previous, count);

    print_success(&format!(
        "Resource pool {} resized from {} to {} ({} more machine(s) needed)",
        snapshot.pool_name(),
        previous,
        snapshot.pool().target_count,
        snapshot.not_provisioned_count()
    ));
    Ok(())
}

pub async fn mark_removable(snapshot: &mut ResourceSnapshot, node_id: &str) -> Result<()> {
    if snapshot.node(node_id).map(is_node_removable).unwrap_or(false) {
        print_warning(&format!("Node {} is already removable", node_id));
        return Ok(());
    }

    snapshot
        .update_node(node_id, |node| {
            node.labels
                .insert(LABEL_KEY_REMOVABLE.to_string(), TRUE.to_string());
        })
        .await
        .with_context(|| format!("Failed to mark node {} removable", node_id))?;
    StructuredLogger::new(snapshot.pool_name()).log_node_updated(node_id, "removable");

    print_success(&format!("Node {} marked removable", node_id));
    Ok(())
}

pub async fn decommission(
    snapshot: &mut ResourceSnapshot,
    node_id: &str,
    source: &str,
) -> Result<()> {
    if snapshot.node(node_id).map(is_node_decommissioned).unwrap_or(false) {
        print_warning(&format!("Node {} is already decommissioning", node_id));
        return Ok(());
    }

    let taint = new_decommissioning_taint(source, Utc::now());
    snapshot
        .update_node(node_id, |node| node.taints.push(taint))
        .await
        .with_context(|| format!("Failed to decommission node {}", node_id))?;
    StructuredLogger::new(snapshot.pool_name()).log_node_updated(node_id, "decommissioning");

    print_success(&format!(
        "Node {} decommissioning (source: {}), {} node(s) now on their way out",
        node_id,
        source,
        snapshot.on_way_out_node_count()
    ));
    Ok(())
}
