//! Region partition cache
//!
//! Splits the cluster's node list into local and remote halves against the
//! resolver's current address set, caches the split under a TTL, and is
//! invalidated early by topology-change notifications. Readers take one
//! atomic load; at most one caller rebuilds at a time.

use crate::clock::Clock;
use crate::resolver::{AddressSet, RegionResolver};
use crate::topology::{ClusterView, Node};
use crate::Result;
use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// An immutable local/remote split of one cluster snapshot.
///
/// Every node of the snapshot appears in exactly one list; membership is
/// decided solely by whether the node's IP is in the address set used to
/// build the partition.
#[derive(Debug)]
pub struct Partition {
    local: Vec<Arc<Node>>,
    remote: Vec<Arc<Node>>,
}

impl Partition {
    /// Classify a cluster snapshot against a resolved address set.
    pub(crate) fn classify(nodes: Vec<Arc<Node>>, addrs: &AddressSet) -> Self {
        let mut local = Vec::new();
        let mut remote = Vec::new();
        for node in nodes {
            if addrs.contains(node.addr().ip()) {
                local.push(node);
            } else {
                remote.push(node);
            }
        }
        Self { local, remote }
    }

    /// Nodes in the current write region, in snapshot order.
    pub fn local(&self) -> &[Arc<Node>] {
        &self.local
    }

    /// Nodes outside the current write region, in snapshot order.
    pub fn remote(&self) -> &[Arc<Node>] {
        &self.remote
    }
}

struct CachedPartition {
    partition: Arc<Partition>,
    built_at: Instant,
}

/// TTL cache over the local/remote partition of the cluster.
pub(crate) struct PartitionCache {
    cluster: Arc<dyn ClusterView>,
    resolver: Arc<RegionResolver>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    cached: ArcSwapOption<CachedPartition>,
    rebuild_lock: Mutex<()>,
}

impl PartitionCache {
    pub(crate) fn new(
        cluster: Arc<dyn ClusterView>,
        resolver: Arc<RegionResolver>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
    ) -> Self {
        Self {
            cluster,
            resolver,
            clock,
            ttl,
            cached: ArcSwapOption::const_empty(),
            rebuild_lock: Mutex::new(()),
        }
    }

    /// Returns the cached partition, rebuilding it when stale or
    /// invalidated.
    pub(crate) fn get(&self) -> Result<Arc<Partition>> {
        if let Some(cached) = self.cached.load_full() {
            if self.is_fresh(&cached) {
                return Ok(cached.partition.clone());
            }
        }

        match self.rebuild_lock.try_lock() {
            Some(_guard) => self.rebuild(),
            None => {
                // Another caller is rebuilding; serve the previous value
                // if one exists, otherwise wait for the first build.
                if let Some(cached) = self.cached.load_full() {
                    return Ok(cached.partition.clone());
                }
                let _guard = self.rebuild_lock.lock();
                if let Some(cached) = self.cached.load_full() {
                    return Ok(cached.partition.clone());
                }
                self.rebuild()
            }
        }
    }

    /// Force the next `get` to rebuild, regardless of the TTL.
    pub(crate) fn invalidate(&self) {
        debug!("Invalidating region partition cache");
        self.cached.store(None);
    }

    fn is_fresh(&self, cached: &CachedPartition) -> bool {
        self.clock.now().duration_since(cached.built_at) < self.ttl
    }

    /// Rebuilds from a fresh cluster snapshot. Caller must hold
    /// `rebuild_lock`.
    fn rebuild(&self) -> Result<Arc<Partition>> {
        // A concurrent rebuild may have published while we waited.
        if let Some(cached) = self.cached.load_full() {
            if self.is_fresh(&cached) {
                return Ok(cached.partition.clone());
            }
        }

        let nodes = self.cluster.all_nodes();
        let addrs = self.resolver.current()?;
        let partition = Arc::new(Partition::classify(nodes, &addrs));
        debug!(
            local = partition.local().len(),
            remote = partition.remote().len(),
            "Rebuilt region partition"
        );
        self.cached.store(Some(Arc::new(CachedPartition {
            partition: partition.clone(),
            built_at: self.clock.now(),
        })));
        Ok(partition)
    }
}
