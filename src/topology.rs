//! Cluster topology surface
//!
//! The policy never creates or destroys cluster members; it only reads the
//! node list the driver already maintains and classifies it. `ClusterView`
//! is the seam the driver implements, and `InMemoryCluster` is a concrete
//! registry for embedders and tests.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info};

/// A cluster member known to the driver.
///
/// Opaque to the policy beyond its identity and network address; handles
/// are shared as `Arc<Node>` and compared by address when classifying.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Node ID (unique identifier)
    pub id: String,
    /// Node address
    pub addr: SocketAddr,
}

impl Node {
    /// Create a new node handle.
    pub fn new(id: impl Into<String>, addr: SocketAddr) -> Self {
        Self {
            id: id.into(),
            addr,
        }
    }

    /// The node's network address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

/// Subscription point for topology-change notifications.
///
/// The policy registers a listener at initialization so that node
/// additions and removals invalidate its partition cache immediately
/// instead of hiding behind the TTL window.
pub trait TopologyListener: Send + Sync {
    fn on_node_added(&self, node: &Node);
    fn on_node_removed(&self, node: &Node);
}

/// Read-only view of current cluster membership.
pub trait ClusterView: Send + Sync {
    /// Snapshot of the current node list, in the driver's iteration order.
    fn all_nodes(&self) -> Vec<Arc<Node>>;

    /// Register a listener for membership changes.
    fn subscribe(&self, listener: Arc<dyn TopologyListener>);
}

/// In-memory cluster registry.
///
/// Keeps nodes in insertion order (query plans reflect snapshot order) and
/// notifies subscribed listeners synchronously on membership changes.
#[derive(Default)]
pub struct InMemoryCluster {
    nodes: RwLock<Vec<Arc<Node>>>,
    listeners: RwLock<Vec<Arc<dyn TopologyListener>>>,
}

impl InMemoryCluster {
    /// Create an empty cluster registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node, replacing any existing node with the same id.
    pub fn add_node(&self, node: Node) {
        let node = Arc::new(node);
        {
            let mut nodes = self.nodes.write();
            nodes.retain(|n| n.id != node.id);
            info!(id = %node.id, addr = %node.addr, "Adding node to cluster");
            nodes.push(node.clone());
        }
        for listener in self.listeners.read().iter() {
            listener.on_node_added(&node);
        }
    }

    /// Remove a node by id. No-op if the node is unknown.
    pub fn remove_node(&self, id: &str) {
        let removed = {
            let mut nodes = self.nodes.write();
            let removed = nodes.iter().find(|n| n.id == id).cloned();
            nodes.retain(|n| n.id != id);
            removed
        };
        if let Some(node) = removed {
            info!(id = %node.id, "Removed node from cluster");
            for listener in self.listeners.read().iter() {
                listener.on_node_removed(&node);
            }
        }
    }

    /// Number of known nodes.
    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }
}

impl ClusterView for InMemoryCluster {
    fn all_nodes(&self) -> Vec<Arc<Node>> {
        self.nodes.read().clone()
    }

    fn subscribe(&self, listener: Arc<dyn TopologyListener>) {
        debug!("Registering topology listener");
        self.listeners.write().push(listener);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingListener {
        added: Mutex<Vec<String>>,
        removed: Mutex<Vec<String>>,
    }

    impl TopologyListener for RecordingListener {
        fn on_node_added(&self, node: &Node) {
            self.added.lock().push(node.id.clone());
        }

        fn on_node_removed(&self, node: &Node) {
            self.removed.lock().push(node.id.clone());
        }
    }

    fn node(id: &str, addr: &str) -> Node {
        Node::new(id, addr.parse().unwrap())
    }

    #[test]
    fn snapshot_preserves_insertion_order() {
        let cluster = InMemoryCluster::new();
        cluster.add_node(node("a", "10.0.0.1:9042"));
        cluster.add_node(node("b", "10.0.0.2:9042"));
        cluster.add_node(node("c", "10.0.1.1:9042"));

        let ids: Vec<_> = cluster.all_nodes().iter().map(|n| n.id.clone()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn add_replaces_node_with_same_id() {
        let cluster = InMemoryCluster::new();
        cluster.add_node(node("a", "10.0.0.1:9042"));
        cluster.add_node(node("a", "10.0.0.5:9042"));

        let nodes = cluster.all_nodes();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].addr(), "10.0.0.5:9042".parse().unwrap());
    }

    #[test]
    fn listeners_observe_membership_changes() {
        let cluster = InMemoryCluster::new();
        let listener = Arc::new(RecordingListener::default());
        cluster.subscribe(listener.clone());

        cluster.add_node(node("a", "10.0.0.1:9042"));
        cluster.add_node(node("b", "10.0.0.2:9042"));
        cluster.remove_node("a");
        cluster.remove_node("unknown");

        assert_eq!(*listener.added.lock(), vec!["a", "b"]);
        assert_eq!(*listener.removed.lock(), vec!["a"]);
    }

    #[test]
    fn node_serializes_with_address() {
        let n = node("a", "10.0.0.1:9042");
        let json = serde_json::to_string(&n).unwrap();
        let back: Node = serde_json::from_str(&json).unwrap();
        assert_eq!(back, n);
    }
}
