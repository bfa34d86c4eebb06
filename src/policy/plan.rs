//! Lazy per-query node sequence
//!
//! A plan yields every local node exactly once in rotated order, then every
//! remote node in partition order. Production is on-demand so a caller that
//! succeeds on its first attempt never materializes the rest.

use super::partition::Partition;
use crate::topology::Node;
use std::sync::Arc;

/// An ordered sequence of nodes to attempt for one query.
///
/// Finite and not restartable; a new call to
/// [`RegionAwarePolicy::query_plan`](super::RegionAwarePolicy::query_plan)
/// yields a new independent plan.
pub struct QueryPlan {
    partition: Option<Arc<Partition>>,
    offset: usize,
    local_pos: usize,
    remote_pos: usize,
}

impl QueryPlan {
    pub(crate) fn new(partition: Arc<Partition>, rotation: usize) -> Self {
        // Modulo is taken only when the local list is non-empty.
        let offset = match partition.local().len() {
            0 => 0,
            len => rotation % len,
        };
        Self {
            partition: Some(partition),
            offset,
            local_pos: 0,
            remote_pos: 0,
        }
    }

    /// A plan with no nodes, used when the policy cannot produce one.
    pub(crate) fn empty() -> Self {
        Self {
            partition: None,
            offset: 0,
            local_pos: 0,
            remote_pos: 0,
        }
    }
}

impl Iterator for QueryPlan {
    type Item = Arc<Node>;

    fn next(&mut self) -> Option<Arc<Node>> {
        let partition = self.partition.as_ref()?;

        let local = partition.local();
        if self.local_pos < local.len() {
            let idx = (self.offset + self.local_pos) % local.len();
            self.local_pos += 1;
            return Some(local[idx].clone());
        }

        let remote = partition.remote();
        if self.remote_pos < remote.len() {
            let node = remote[self.remote_pos].clone();
            self.remote_pos += 1;
            return Some(node);
        }

        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = match &self.partition {
            Some(p) => {
                (p.local().len() - self.local_pos) + (p.remote().len() - self.remote_pos)
            }
            None => 0,
        };
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for QueryPlan {}
