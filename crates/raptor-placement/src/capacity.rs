//! Remaining-capacity bookkeeping for a single scheduling call.
//!
//! A [`CapacityLedger`] starts from the snapshot's advertised capacity and
//! is decremented as services are placed. It is never shared between
//! scheduling calls.

use std::collections::BTreeMap;

use raptor_core::{NodeInfo, RegistrySnapshot, ResourceRequest};

use crate::error::Resource;

/// Remaining capacity of one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeCapacity {
    pub alias: String,
    pub metadata: BTreeMap<String, String>,
    pub free_memory_mib: u64,
    pub free_cpu_shares: u64,
}

/// Why a request does not fit on a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shortfall {
    pub resource: Resource,
    pub requested: u64,
    pub available: u64,
}

impl NodeCapacity {
    pub fn from_node(node: &NodeInfo) -> Self {
        Self {
            alias: node.alias.clone(),
            metadata: node.metadata.clone(),
            free_memory_mib: node.available_memory.as_mib(),
            free_cpu_shares: node.available_cpu_shares,
        }
    }

    /// True when every required key is present with exactly the required value.
    pub fn matches(&self, required: &BTreeMap<String, String>) -> bool {
        required
            .iter()
            .all(|(key, value)| self.metadata.get(key).is_some_and(|v| v == value))
    }

    /// Memory is checked before CPU shares.
    pub fn check(&self, req: &ResourceRequest) -> Result<(), Shortfall> {
        let memory = req.memory.as_mib();
        if memory > self.free_memory_mib {
            return Err(Shortfall {
                resource: Resource::Memory,
                requested: memory,
                available: self.free_memory_mib,
            });
        }
        if req.cpu_shares > self.free_cpu_shares {
            return Err(Shortfall {
                resource: Resource::CpuShares,
                requested: req.cpu_shares,
                available: self.free_cpu_shares,
            });
        }
        Ok(())
    }

    /// Deduct a request. Callers must `check` first.
    pub fn reserve(&mut self, req: &ResourceRequest) {
        self.free_memory_mib = self.free_memory_mib.saturating_sub(req.memory.as_mib());
        self.free_cpu_shares = self.free_cpu_shares.saturating_sub(req.cpu_shares);
    }
}

/// Per-node remaining capacity, iterated in alias order.
#[derive(Debug, Clone, Default)]
pub struct CapacityLedger {
    nodes: BTreeMap<String, NodeCapacity>,
}

impl CapacityLedger {
    pub fn from_snapshot(snapshot: &RegistrySnapshot) -> Self {
        Self {
            nodes: snapshot
                .nodes()
                .map(|n| (n.alias.clone(), NodeCapacity::from_node(n)))
                .collect(),
        }
    }

    pub fn get(&self, alias: &str) -> Option<&NodeCapacity> {
        self.nodes.get(alias)
    }

    pub fn get_mut(&mut self, alias: &str) -> Option<&mut NodeCapacity> {
        self.nodes.get_mut(alias)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeCapacity> {
        self.nodes.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut NodeCapacity> {
        self.nodes.values_mut()
    }
}
