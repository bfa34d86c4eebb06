//! Region-aware routing policy
//!
//! `RegionAwarePolicy` is the driver-facing surface: it wires itself to the
//! cluster topology at initialization, classifies nodes as local or remote
//! for connection-pool sizing, and produces per-query node orderings that
//! prefer the current write region and fall back to remote nodes when that
//! region changes.

pub mod partition;
pub mod plan;

pub use partition::Partition;
pub use plan::QueryPlan;

use crate::clock::{Clock, SystemClock};
use crate::resolver::{DnsRegionResolver, RegionResolver, ResolveRegion};
use crate::topology::{ClusterView, Node, TopologyListener};
use crate::{Error, PolicyConfig, Result};
use partition::PartitionCache;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use tracing::{info, warn};

/// Reset the rotation counter a little before the numeric maximum. The
/// reset is a plain store, so concurrent increments may observe values
/// near the threshold twice; rotation only needs the counter to advance,
/// not to be exact.
const ROTATION_RESET_THRESHOLD: usize = usize::MAX - 10_000;

/// Topological distance of a node, relative to the current write region.
///
/// Drivers use this to size connection pools independently of query
/// planning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeDistance {
    /// The node's address is in the region hostname's resolved set.
    Local,
    /// Any other node.
    Remote,
}

/// Per-query routing context supplied by the driver.
///
/// The region policy orders nodes by topology alone, so these fields are
/// currently informational; they are carried so statement-aware policies
/// can share the same seam.
#[derive(Debug, Clone, Copy, Default)]
pub struct Request<'a> {
    pub keyspace: Option<&'a str>,
    pub statement: Option<&'a str>,
}

/// State wired by `initialize`.
struct PolicyState {
    cache: Arc<PartitionCache>,
}

/// Invalidates the partition cache on membership changes. Holds the cache
/// weakly so a dropped policy does not keep it alive through the cluster's
/// listener list.
struct InvalidateOnTopologyChange {
    cache: Weak<PartitionCache>,
}

impl TopologyListener for InvalidateOnTopologyChange {
    fn on_node_added(&self, _node: &Node) {
        if let Some(cache) = self.cache.upgrade() {
            cache.invalidate();
        }
    }

    fn on_node_removed(&self, _node: &Node) {
        if let Some(cache) = self.cache.upgrade() {
            cache.invalidate();
        }
    }
}

/// Client-side routing policy biased toward the current write region.
pub struct RegionAwarePolicy {
    config: PolicyConfig,
    resolver: Arc<RegionResolver>,
    clock: Arc<dyn Clock>,
    rotation: AtomicUsize,
    state: OnceLock<PolicyState>,
}

impl RegionAwarePolicy {
    /// Create a policy resolving the region hostname through system DNS.
    pub fn new(config: PolicyConfig) -> Result<Self> {
        let backend = Arc::new(DnsRegionResolver::from_system_conf()?);
        Ok(Self::with_resolver(config, backend))
    }

    /// Create a policy with a custom resolution oracle.
    pub fn with_resolver(config: PolicyConfig, backend: Arc<dyn ResolveRegion>) -> Self {
        Self::with_parts(config, backend, Arc::new(SystemClock))
    }

    /// Create a policy with explicit resolution and time sources.
    pub fn with_parts(
        config: PolicyConfig,
        backend: Arc<dyn ResolveRegion>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let resolver = Arc::new(RegionResolver::with_clock(
            config.region_hostname.clone(),
            config.resolution_ttl,
            backend,
            clock.clone(),
        ));
        Self {
            config,
            resolver,
            clock,
            rotation: AtomicUsize::new(0),
            state: OnceLock::new(),
        }
    }

    /// Wire the policy to a live cluster.
    ///
    /// Performs the first resolution (fatal if it fails), verifies that at
    /// least one cluster node is in the resolved set, and subscribes to
    /// topology changes so the partition cache is invalidated early.
    pub fn initialize(&self, cluster: Arc<dyn ClusterView>) -> Result<()> {
        let addrs = self.resolver.current()?;

        let nodes = cluster.all_nodes();
        if !nodes.iter().any(|n| addrs.contains(n.addr().ip())) {
            return Err(Error::Config(format!(
                "region hostname '{}' does not resolve to any known cluster node",
                self.config.region_hostname
            )));
        }

        let cache = Arc::new(PartitionCache::new(
            cluster.clone(),
            self.resolver.clone(),
            self.clock.clone(),
            self.config.resolution_ttl,
        ));
        cluster.subscribe(Arc::new(InvalidateOnTopologyChange {
            cache: Arc::downgrade(&cache),
        }));

        self.state
            .set(PolicyState { cache })
            .map_err(|_| Error::Config("policy is already initialized".to_string()))?;

        info!(
            hostname = %self.config.region_hostname,
            nodes = nodes.len(),
            region_addresses = addrs.len(),
            "Region-aware policy initialized"
        );
        Ok(())
    }

    /// Classify one node against the current write region.
    ///
    /// Triggers a lazy resolver refresh when the cached set is stale.
    /// Never fails after the first successful resolution; an unexpected
    /// resolver error degrades to `Remote`.
    pub fn distance(&self, node: &Node) -> NodeDistance {
        match self.resolver.current() {
            Ok(addrs) if addrs.contains(node.addr().ip()) => NodeDistance::Local,
            Ok(_) => NodeDistance::Remote,
            Err(e) => {
                warn!(id = %node.id, "Classifying node as remote, no address set available: {}", e);
                NodeDistance::Remote
            }
        }
    }

    /// Produce the node ordering for one query: local nodes in rotated
    /// order, then remote nodes in cluster order.
    ///
    /// Lazy and finite; each plan is independent. A plan requested before
    /// `initialize` is empty.
    pub fn query_plan(&self, _request: Option<Request<'_>>) -> QueryPlan {
        let rotation = self.next_rotation();

        let Some(state) = self.state.get() else {
            warn!("Query plan requested before initialization, returning empty plan");
            return QueryPlan::empty();
        };

        match state.cache.get() {
            Ok(partition) => QueryPlan::new(partition, rotation),
            Err(e) => {
                // Unreachable once initialize has succeeded: the resolver
                // falls back to its last good set after the first success.
                warn!("Failed to obtain region partition: {}", e);
                QueryPlan::empty()
            }
        }
    }

    /// Advance the shared rotation counter by one.
    fn next_rotation(&self) -> usize {
        let value = self.rotation.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        if value > ROTATION_RESET_THRESHOLD {
            self.rotation.store(0, Ordering::Relaxed);
        }
        value
    }
}
