//! Secondary-cloud validation.
//!
//! A deployment must never leave a platform with capacity only in
//! secondary (failover) clouds. The check merges what the manifest
//! intends to deploy with what is already deployed, discards clouds
//! that are administratively offline, and aborts generation when every
//! remaining target is secondary.

use std::collections::HashMap;

use gantry_store::{CiId, CloudBinding, CmdbStore, Platform};
use tracing::info;

use crate::config::EngineConfig;
use crate::error::{GantryError, Result};

/// Validate that processing `platform`'s bindings leaves at least one
/// primary-capable cloud. `plat_ns` is the platform's BOM namespace.
pub async fn check_secondary(
    cmdb: &dyn CmdbStore,
    config: &EngineConfig,
    platform: &Platform,
    bindings: &[CloudBinding],
    plat_ns: &str,
) -> Result<()> {
    // What the manifest intends: priority per cloud over active bindings.
    let mut intended: HashMap<CiId, i32> = HashMap::new();
    for binding in bindings.iter().filter(|b| b.is_active()) {
        intended.entry(binding.cloud_id).or_insert(binding.priority);
    }

    if !intended
        .values()
        .any(|p| *p == config.secondary_priority)
    {
        return Ok(());
    }

    // What is deployed currently, read at the platform's entry point.
    let Some(entry_point) = cmdb.get_entry_point(platform.id).await? else {
        // Platforms without an entry point (schemas and the like) are
        // not subject to the check.
        info!(
            ns_path = %plat_ns,
            platform = %platform.id,
            "skipping secondary-cloud check, platform has no entry point"
        );
        return Ok(());
    };

    let mut computed: HashMap<CiId, i32> = HashMap::new();
    for binding in bindings {
        for instance in cmdb
            .get_deployed_instances(binding.cloud_id, &entry_point, plat_ns)
            .await?
        {
            computed
                .entry(instance.cloud_id)
                .and_modify(|p| *p = (*p).max(instance.priority))
                .or_insert(instance.priority);
        }
    }

    // Intended state wins per cloud; offline clouds drop out entirely.
    computed.extend(intended);
    for binding in bindings.iter().filter(|b| b.is_offline()) {
        computed.remove(&binding.cloud_id);
    }

    let secondary_count = computed
        .values()
        .filter(|p| **p == config.secondary_priority)
        .count();
    if secondary_count < computed.len() {
        return Ok(());
    }

    let inactive_primaries: Vec<&str> = bindings
        .iter()
        .filter(|b| !b.is_active() && b.priority == config.primary_priority)
        .map(|b| b.cloud_name.as_str())
        .collect();

    let message = if inactive_primaries.is_empty() {
        format!(
            "the deployment would result in no instances in primary clouds for platform {plat_ns}; check the cloud priority of its clouds"
        )
    } else {
        format!(
            "the deployment would result in no instances in primary clouds for platform {plat_ns}; primary clouds <{}> are not in active state for this platform",
            inactive_primaries.join(",")
        )
    };

    Err(GantryError::AllInstancesSecondary(message))
}
