//! First-fit placement.
//!
//! Services are placed one at a time, in descriptor order, in a single
//! forward pass:
//! 1. A pinned service goes to its named node or the call fails.
//! 2. Otherwise the first node (alias order) whose metadata satisfies the
//!    service's constraints and whose remaining capacity covers the request
//!    wins.
//!
//! There is no backtracking and no lookahead. An early service can take
//! the only node a later service would have fit on, in which case the
//! later service fails even though a different assignment would have
//! worked. That is the documented behaviour of this strategy; strategies
//! that rebalance belong behind [`PlacementStrategy`] as separate types.

use raptor_core::{DeploymentPlan, RegistrySnapshot, ServiceSpec};
use tracing::{debug, info};

use crate::capacity::{CapacityLedger, Shortfall};
use crate::error::{PlacementError, PlacementResult};
use crate::strategy::{Placement, PlacementStrategy};

#[derive(Debug, Clone, Copy, Default)]
pub struct FirstFit;

impl PlacementStrategy for FirstFit {
    fn name(&self) -> &'static str {
        "first-fit"
    }

    fn schedule(&self, plan: &DeploymentPlan, snapshot: &RegistrySnapshot) -> PlacementResult<Placement> {
        let mut ledger = CapacityLedger::from_snapshot(snapshot);
        let mut placement = Placement::default();

        for service in &plan.services {
            let alias = match &service.pinned_node {
                Some(node) => place_pinned(&mut ledger, service, node)?,
                None => place_first_fit(&mut ledger, service)?,
            };
            debug!(
                service = %service.name,
                node = %alias,
                memory = %service.resources.memory,
                cpu_shares = service.resources.cpu_shares,
                "placed service"
            );
            placement.assign(service.name.clone(), alias);
        }

        info!(
            strategy = self.name(),
            services = placement.len(),
            nodes = snapshot.len(),
            "placement computed"
        );
        Ok(placement)
    }
}

fn place_pinned(ledger: &mut CapacityLedger, service: &ServiceSpec, node: &str) -> PlacementResult<String> {
    let capacity = ledger.get_mut(node).ok_or_else(|| PlacementError::UnknownNode {
        service: service.name.clone(),
        node: node.to_string(),
    })?;

    capacity
        .check(&service.resources)
        .map_err(|shortfall| insufficient(service, node, shortfall))?;
    capacity.reserve(&service.resources);
    Ok(node.to_string())
}

fn place_first_fit(ledger: &mut CapacityLedger, service: &ServiceSpec) -> PlacementResult<String> {
    // First capacity rejection among metadata-matching nodes, for the error.
    let mut first_shortfall: Option<(String, Shortfall)> = None;

    for capacity in ledger.iter_mut() {
        if !capacity.matches(&service.constraints) {
            continue;
        }
        match capacity.check(&service.resources) {
            Ok(()) => {
                capacity.reserve(&service.resources);
                return Ok(capacity.alias.clone());
            }
            Err(shortfall) => {
                if first_shortfall.is_none() {
                    first_shortfall = Some((capacity.alias.clone(), shortfall));
                }
            }
        }
    }

    match first_shortfall {
        Some((node, shortfall)) => Err(insufficient(service, &node, shortfall)),
        None => Err(PlacementError::UnsatisfiableConstraints {
            service: service.name.clone(),
            constraints: describe_constraints(service),
        }),
    }
}

fn insufficient(service: &ServiceSpec, node: &str, shortfall: Shortfall) -> PlacementError {
    PlacementError::InsufficientCapacity {
        service: service.name.clone(),
        node: node.to_string(),
        resource: shortfall.resource,
        requested: shortfall.requested,
        available: shortfall.available,
    }
}

fn describe_constraints(service: &ServiceSpec) -> String {
    if service.constraints.is_empty() {
        return "no candidate nodes".to_string();
    }
    service
        .constraints
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(", ")
}
