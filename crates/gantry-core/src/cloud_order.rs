//! Cloud-binding ordering.
//!
//! Bindings are processed in batches: ascending by `priority` (or
//! descending for teardown), ascending by `dpmt_order` within a
//! priority group. Bindings sharing `(priority, dpmt_order)` form one
//! batch and may be deployed to concurrently; the next batch only
//! starts once the running maximum exec order of the previous one is
//! known.

use gantry_store::CloudBinding;

/// Group a platform's cloud bindings into ordered concurrent batches.
///
/// `reverse` flips the priority ordering (secondary clouds first) for
/// offline-cloud teardown.
pub fn ordered_batches(bindings: &[CloudBinding], reverse: bool) -> Vec<Vec<CloudBinding>> {
    let mut sorted = bindings.to_vec();
    sorted.sort_by(|a, b| {
        let by_priority = if reverse {
            b.priority.cmp(&a.priority)
        } else {
            a.priority.cmp(&b.priority)
        };
        by_priority.then(a.dpmt_order.cmp(&b.dpmt_order))
    });

    let mut batches: Vec<Vec<CloudBinding>> = Vec::new();
    for binding in sorted {
        match batches.last_mut() {
            Some(batch)
                if batch[0].priority == binding.priority
                    && batch[0].dpmt_order == binding.dpmt_order =>
            {
                batch.push(binding);
            }
            _ => batches.push(vec![binding]),
        }
    }
    batches
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_store::{AdminStatus, CiId, RelationId};

    fn binding(cloud: u64, priority: i32, dpmt_order: i32) -> CloudBinding {
        CloudBinding::new(
            RelationId(cloud),
            CiId(1),
            CiId(cloud),
            format!("cloud-{cloud}"),
            priority,
            AdminStatus::Active,
        )
        .with_dpmt_order(dpmt_order)
    }

    fn keys(batches: &[Vec<CloudBinding>]) -> Vec<(i32, i32)> {
        batches
            .iter()
            .map(|b| (b[0].priority, b[0].dpmt_order))
            .collect()
    }

    #[test]
    fn orders_by_priority_then_dpmt_order() {
        // priorities [1,1,2] with dpmt_order [2,1,1]: within priority 1
        // the dpmt_order 1 batch runs first, and priority 2 runs last.
        let bindings = vec![binding(10, 1, 2), binding(11, 1, 1), binding(12, 2, 1)];
        let batches = ordered_batches(&bindings, false);

        assert_eq!(keys(&batches), vec![(1, 1), (1, 2), (2, 1)]);
        assert_eq!(batches[0][0].cloud_id, CiId(11));
        assert_eq!(batches[1][0].cloud_id, CiId(10));
        assert_eq!(batches[2][0].cloud_id, CiId(12));
    }

    #[test]
    fn reverse_flips_priority_but_not_dpmt_order() {
        let bindings = vec![binding(10, 1, 2), binding(11, 1, 1), binding(12, 2, 1)];
        let batches = ordered_batches(&bindings, true);

        assert_eq!(keys(&batches), vec![(2, 1), (1, 1), (1, 2)]);
    }

    #[test]
    fn same_key_bindings_share_a_batch() {
        let bindings = vec![binding(10, 1, 1), binding(11, 1, 1), binding(12, 1, 2)];
        let batches = ordered_batches(&bindings, false);

        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].len(), 2);
        assert_eq!(batches[1].len(), 1);
    }

    #[test]
    fn empty_input_yields_no_batches() {
        assert!(ordered_batches(&[], false).is_empty());
    }
}
