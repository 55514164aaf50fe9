//! Dependency sequencer: turns the link list into a rollout order.
//!
//! A link `src -> dest` means `src` must be running before `dest` is
//! submitted. The order is a depth-first post-order over the reversed edges
//! (each service after everything it depends on), computed with an explicit
//! stack so deep chains cannot exhaust the call stack.
//!
//! Roots are visited in descriptor order: linked services first, then link
//! endpoints that are not services of the deployment. Such endpoints still
//! constrain the order but are never emitted. Services that appear in no
//! link follow at the end, in descriptor order.

use std::collections::{HashMap, HashSet};

use raptor_core::DeploymentPlan;
use tracing::debug;

use crate::error::{RolloutError, RolloutResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

/// Compute the rollout order: every service name exactly once.
pub fn rollout_order(plan: &DeploymentPlan) -> RolloutResult<Vec<String>> {
    // dest -> the sources it waits for, in link order.
    let mut depends_on: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut endpoints: Vec<&str> = Vec::new();
    let mut seen_endpoint = HashSet::new();
    for link in &plan.links {
        depends_on.entry(link.dest.as_str()).or_default().push(link.src.as_str());
        for endpoint in [link.src.as_str(), link.dest.as_str()] {
            if seen_endpoint.insert(endpoint) {
                endpoints.push(endpoint);
            }
        }
    }

    let services: HashSet<&str> = plan.services.iter().map(|s| s.name.as_str()).collect();
    let roots = plan
        .services
        .iter()
        .map(|s| s.name.as_str())
        .filter(|name| seen_endpoint.contains(name))
        .chain(endpoints.iter().copied().filter(|e| !services.contains(e)));

    let mut marks: HashMap<&str, Mark> = HashMap::new();
    let mut order: Vec<String> = Vec::with_capacity(plan.services.len());

    for root in roots {
        if marks.contains_key(root) {
            continue;
        }
        marks.insert(root, Mark::InProgress);
        let mut stack: Vec<(&str, usize)> = vec![(root, 0)];

        while let Some(top) = stack.last_mut() {
            let node = top.0;
            let deps = depends_on.get(node).map(Vec::as_slice).unwrap_or_default();

            if let Some(&dep) = deps.get(top.1) {
                top.1 += 1;
                match marks.get(dep) {
                    None => {
                        marks.insert(dep, Mark::InProgress);
                        stack.push((dep, 0));
                    }
                    Some(Mark::InProgress) => {
                        return Err(RolloutError::CyclicDependency {
                            src: dep.to_string(),
                            dest: node.to_string(),
                        });
                    }
                    Some(Mark::Done) => {}
                }
                continue;
            }

            marks.insert(node, Mark::Done);
            if services.contains(node) {
                order.push(node.to_string());
            }
            stack.pop();
        }
    }

    let linked = order.len();
    order.extend(
        plan.services
            .iter()
            .filter(|s| !seen_endpoint.contains(s.name.as_str()))
            .map(|s| s.name.clone()),
    );

    debug!(services = order.len(), linked, "rollout order computed");
    Ok(order)
}
