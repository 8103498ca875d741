//! Platform execution-order computation.
//!
//! Assigns each platform an execution level from its LinksTo dependency
//! graph: a platform's level is strictly greater than the level of every
//! platform it depends on, so the deployment engine can apply levels in
//! ascending order and run platforms within one level concurrently.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use gantry_store::{CiId, Platform, PlatformLink};

use crate::error::{GantryError, Result};

/// Compute execution levels for the platforms of one environment.
///
/// Levels start at 1 (platforms with no outgoing LinksTo edge). Diamond
/// graphs resolve to the longest path. Platforms that are
/// `pending_deletion` or in the `disabled` set are moved past every
/// live platform so teardown happens last. Edges referencing unknown
/// platforms are ignored.
///
/// Fails with [`GantryError::DependencyCycle`] when the graph is cyclic.
pub fn order_platforms(
    platforms: &[Platform],
    links: &[PlatformLink],
    disabled: &HashSet<CiId>,
) -> Result<BTreeMap<u32, Vec<Platform>>> {
    let known: HashSet<CiId> = platforms.iter().map(|p| p.id).collect();

    // deps: outgoing LinksTo targets; dependents: reverse edges.
    let mut deps: HashMap<CiId, Vec<CiId>> = HashMap::new();
    let mut dependents: HashMap<CiId, Vec<CiId>> = HashMap::new();
    for link in links {
        if !known.contains(&link.from) || !known.contains(&link.to) {
            continue;
        }
        deps.entry(link.from).or_default().push(link.to);
        dependents.entry(link.to).or_default().push(link.from);
    }

    let mut remaining: HashMap<CiId, usize> = platforms
        .iter()
        .map(|p| (p.id, deps.get(&p.id).map_or(0, Vec::len)))
        .collect();

    let mut levels: HashMap<CiId, u32> = HashMap::new();
    let mut ready: VecDeque<CiId> = platforms
        .iter()
        .filter(|p| remaining[&p.id] == 0)
        .map(|p| p.id)
        .collect();

    while let Some(id) = ready.pop_front() {
        let level = deps
            .get(&id)
            .map(|ds| ds.iter().map(|d| levels[d]).max().unwrap_or(0))
            .unwrap_or(0)
            + 1;
        levels.insert(id, level);

        for dependent in dependents.get(&id).into_iter().flatten() {
            let count = remaining.get_mut(dependent).unwrap();
            *count -= 1;
            if *count == 0 {
                ready.push_back(*dependent);
            }
        }
    }

    if levels.len() < platforms.len() {
        let mut cyclic: Vec<CiId> = platforms
            .iter()
            .map(|p| p.id)
            .filter(|id| !levels.contains_key(id))
            .collect();
        cyclic.sort();
        return Err(GantryError::DependencyCycle(cyclic));
    }

    let max_level = levels.values().copied().max().unwrap_or(0);

    let mut ordered: BTreeMap<u32, Vec<Platform>> = BTreeMap::new();
    for platform in platforms {
        let level = if platform.is_pending_deletion() || disabled.contains(&platform.id) {
            max_level + 1
        } else {
            levels[&platform.id]
        };
        ordered.entry(level).or_default().push(platform.clone());
    }

    Ok(ordered)
}
