//! Discovered nodes and the per-run registry snapshot.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::plan::MemorySize;

/// A spawnpoint as reported by discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub alias: String,
    pub uri: String,
    pub available_memory: MemorySize,
    pub available_cpu_shares: u64,
    /// Fresh metadata only; stale entries are dropped when the snapshot is built.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    /// Liveness as reported by the discovery source.
    pub good: bool,
}

/// Point-in-time view of the nodes a run may schedule onto.
///
/// Nodes are keyed by alias; iteration is alias-lexicographic, which is the
/// order first-fit placement scans them in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrySnapshot {
    nodes: BTreeMap<String, NodeInfo>,
    /// Service name → alias of the node already running it.
    running: BTreeMap<String, String>,
}

impl RegistrySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node, returning the node it replaced (same alias), if any.
    pub fn insert_node(&mut self, node: NodeInfo) -> Option<NodeInfo> {
        self.nodes.insert(node.alias.clone(), node)
    }

    pub fn mark_running(&mut self, service: impl Into<String>, alias: impl Into<String>) {
        self.running.insert(service.into(), alias.into());
    }

    pub fn node(&self, alias: &str) -> Option<&NodeInfo> {
        self.nodes.get(alias)
    }

    pub fn node_mut(&mut self, alias: &str) -> Option<&mut NodeInfo> {
        self.nodes.get_mut(alias)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &NodeInfo> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Alias of the node already running `service`, if it was seen recently.
    pub fn running_on(&self, service: &str) -> Option<&str> {
        self.running.get(service).map(String::as_str)
    }

    pub fn running(&self) -> &BTreeMap<String, String> {
        &self.running
    }
}

impl FromIterator<NodeInfo> for RegistrySnapshot {
    fn from_iter<I: IntoIterator<Item = NodeInfo>>(iter: I) -> Self {
        let mut snapshot = Self::new();
        for node in iter {
            snapshot.insert_node(node);
        }
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(alias: &str) -> NodeInfo {
        NodeInfo {
            alias: alias.to_string(),
            uri: format!("http://{alias}:2800"),
            available_memory: MemorySize::from_gib(4),
            available_cpu_shares: 2,
            metadata: BTreeMap::new(),
            good: true,
        }
    }

    #[test]
    fn iterates_in_alias_order() {
        let snapshot: RegistrySnapshot = ["zeta", "alpha", "mid"].into_iter().map(node).collect();
        let aliases: Vec<&str> = snapshot.nodes().map(|n| n.alias.as_str()).collect();
        assert_eq!(aliases, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn insert_replaces_same_alias() {
        let mut snapshot = RegistrySnapshot::new();
        assert!(snapshot.insert_node(node("a")).is_none());

        let mut updated = node("a");
        updated.available_cpu_shares = 8;
        let previous = snapshot.insert_node(updated).unwrap();

        assert_eq!(previous.available_cpu_shares, 2);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.node("a").unwrap().available_cpu_shares, 8);
    }

    #[test]
    fn tracks_running_services() {
        let mut snapshot = RegistrySnapshot::new();
        snapshot.mark_running("web", "edge-1");

        assert_eq!(snapshot.running_on("web"), Some("edge-1"));
        assert_eq!(snapshot.running_on("db"), None);
    }
}
