//! Placement strategy interface and its output.

use std::collections::BTreeMap;

use raptor_core::{DeploymentPlan, RegistrySnapshot};
use serde::{Deserialize, Serialize};

use crate::error::PlacementResult;

/// Maps every service of a plan to a node alias, or fails as a whole.
///
/// Implementations must not keep capacity state between calls.
pub trait PlacementStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn schedule(&self, plan: &DeploymentPlan, snapshot: &RegistrySnapshot) -> PlacementResult<Placement>;
}

/// Service name → node alias.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    assignments: BTreeMap<String, String>,
}

impl Placement {
    pub fn assign(&mut self, service: impl Into<String>, alias: impl Into<String>) {
        self.assignments.insert(service.into(), alias.into());
    }

    pub fn node_for(&self, service: &str) -> Option<&str> {
        self.assignments.get(service).map(String::as_str)
    }

    /// Services placed on `alias`, in name order.
    pub fn services_on<'a>(&'a self, alias: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.assignments
            .iter()
            .filter(move |(_, node)| node.as_str() == alias)
            .map(|(service, _)| service.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.assignments.iter().map(|(s, n)| (s.as_str(), n.as_str()))
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}
