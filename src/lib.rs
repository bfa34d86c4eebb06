//! # regionroute
//!
//! A region-aware, client-side routing policy for distributed multi-region
//! database clusters.
//!
//! Given the live set of cluster nodes, the policy decides which nodes are
//! topologically local (same write region) versus remote, and in what
//! order a client should attempt nodes for a query, so that queries
//! preferentially target the current write region and transparently fail
//! over when that region changes.
//!
//! ## Key Features
//!
//! - **DNS-driven region detection**: the write region is identified by a
//!   configured hostname; its resolved addresses are re-checked lazily
//!   under a time-to-live, and transient DNS failures never break routing
//! - **Lock-free read path**: classification and planning read immutable
//!   snapshots behind atomically swappable references; only the rare
//!   refresh path takes a lock
//! - **Rotated query plans**: local nodes are tried first in round-robin
//!   rotated order, then remote nodes in cluster order
//!
//! ## Architecture
//!
//! - **Resolver**: TTL-cached region hostname resolution with
//!   last-known-good fallback
//! - **Partition cache**: local/remote split of the cluster, invalidated
//!   by topology changes
//! - **Policy**: the driver-facing surface — `initialize`, `distance`,
//!   `query_plan`
//!
//! This crate does not perform health checking, does not retry failed
//! nodes, and does not open network connections; it only orders and
//! classifies nodes the driver already knows about.

pub mod clock;
pub mod policy;
pub mod resolver;
pub mod topology;

mod error;

pub use error::{Error, Result};

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default time-to-live for cached resolutions and partitions.
pub const DEFAULT_RESOLUTION_TTL: Duration = Duration::from_secs(60);

/// Configuration for the region-aware policy.
///
/// Fixed at construction time and immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// DNS name whose resolved addresses identify the current write region.
    pub region_hostname: String,
    /// Maximum age before a cached resolution/partition is recomputed.
    pub resolution_ttl: Duration,
}

impl PolicyConfig {
    /// Configuration for the given region hostname with the default TTL.
    pub fn new(region_hostname: impl Into<String>) -> Self {
        Self {
            region_hostname: region_hostname.into(),
            resolution_ttl: DEFAULT_RESOLUTION_TTL,
        }
    }

    /// Override the resolution time-to-live.
    pub fn with_resolution_ttl(mut self, ttl: Duration) -> Self {
        self.resolution_ttl = ttl;
        self
    }
}

/// Re-exports for convenience
pub mod prelude {
    pub use crate::policy::{NodeDistance, QueryPlan, RegionAwarePolicy, Request};
    pub use crate::resolver::{AddressSet, DnsRegionResolver, ResolveRegion};
    pub use crate::topology::{ClusterView, InMemoryCluster, Node, TopologyListener};
    pub use crate::{Error, PolicyConfig, Result};
}
