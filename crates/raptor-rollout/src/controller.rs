//! Rollout controller: drives one deployment run.
//!
//! The controller moves through `Loading → Discovering → Scheduling →
//! Sequencing → RollingOut → Complete`, or stops in `Failed` at the first
//! error. Services are submitted one at a time in rollout order; each one
//! holds the sequence until its status stream reports an outcome.

use std::path::Path;
use std::sync::Arc;

use raptor_cluster::{NetworkProvisioner, NodeAgent, SnapshotBuilder};
use raptor_core::config::{DiscoveryConfig, RolloutConfig};
use raptor_core::{Deployment, DeploymentPlan, LaunchConfig, RegistrySnapshot};
use raptor_placement::{FirstFit, Placement, PlacementError, PlacementStrategy};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{RolloutError, RolloutResult};
use crate::handshake::{Handshake, await_outcome, spawn_drain};
use crate::sequencer::rollout_order;
use crate::sink::LogSink;

/// Current phase of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunPhase {
    Loading,
    Discovering,
    Scheduling,
    Sequencing,
    RollingOut,
    Complete,
    Failed { reason: String },
}

/// A service and the node it runs on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceOnNode {
    pub service: String,
    pub node: String,
}

/// Outcome of a successful run.
#[derive(Debug)]
pub struct RolloutReport {
    /// Overlay network shared by this run's launches.
    pub network: String,
    pub placement: Placement,
    pub order: Vec<String>,
    /// Submitted and reported success, in rollout order.
    pub launched: Vec<ServiceOnNode>,
    /// Already running; `node` is where discovery found them.
    pub skipped: Vec<ServiceOnNode>,
    /// Status drains for the launched services. Dropping them detaches the
    /// tasks; they stop when their stream closes or shutdown is signalled.
    pub drains: Vec<JoinHandle<()>>,
}

/// Drives a deployment from descriptor to running services.
pub struct Orchestrator {
    agent: Arc<dyn NodeAgent>,
    provisioner: Option<Arc<dyn NetworkProvisioner>>,
    strategy: Box<dyn PlacementStrategy>,
    sink: Arc<dyn LogSink>,
    discovery: DiscoveryConfig,
    rollout: RolloutConfig,
    shutdown: watch::Receiver<bool>,
    phase: RunPhase,
}

impl Orchestrator {
    /// First-fit placement, default cutoffs, no network provisioning.
    pub fn new(agent: Arc<dyn NodeAgent>, sink: Arc<dyn LogSink>, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            agent,
            provisioner: None,
            strategy: Box::new(FirstFit),
            sink,
            discovery: DiscoveryConfig::default(),
            rollout: RolloutConfig::default(),
            shutdown,
            phase: RunPhase::Loading,
        }
    }

    pub fn with_strategy(mut self, strategy: Box<dyn PlacementStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    /// Create the run's overlay network before the first launch.
    pub fn with_network_provisioner(mut self, provisioner: Arc<dyn NetworkProvisioner>) -> Self {
        self.provisioner = Some(provisioner);
        self
    }

    pub fn with_discovery_config(mut self, config: DiscoveryConfig) -> Self {
        self.discovery = config;
        self
    }

    pub fn with_rollout_config(mut self, config: RolloutConfig) -> Self {
        self.rollout = config;
        self
    }

    pub fn phase(&self) -> &RunPhase {
        &self.phase
    }

    /// Load a descriptor file and run it.
    pub async fn run_file(&mut self, path: &Path, fallback_entity: &str) -> RolloutResult<RolloutReport> {
        self.enter(RunPhase::Loading);
        let loaded = Deployment::from_file(path)
            .and_then(|deployment| DeploymentPlan::from_descriptor(&deployment, fallback_entity));
        match loaded {
            Ok(plan) => self.run_plan(&plan).await,
            Err(e) => Err(self.fail(e.into())),
        }
    }

    /// Validate a decoded descriptor and run it.
    pub async fn run(&mut self, deployment: &Deployment, fallback_entity: &str) -> RolloutResult<RolloutReport> {
        self.enter(RunPhase::Loading);
        match DeploymentPlan::from_descriptor(deployment, fallback_entity) {
            Ok(plan) => self.run_plan(&plan).await,
            Err(e) => Err(self.fail(e.into())),
        }
    }

    /// Run an already-validated plan.
    pub async fn run_plan(&mut self, plan: &DeploymentPlan) -> RolloutResult<RolloutReport> {
        match self.execute(plan).await {
            Ok(report) => {
                self.enter(RunPhase::Complete);
                info!(
                    launched = report.launched.len(),
                    skipped = report.skipped.len(),
                    "rollout complete"
                );
                Ok(report)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    async fn execute(&mut self, plan: &DeploymentPlan) -> RolloutResult<RolloutReport> {
        self.enter(RunPhase::Discovering);
        let snapshot = SnapshotBuilder::from_config(self.agent.as_ref(), &self.discovery)
            .build(&plan.sources)
            .await?;

        self.enter(RunPhase::Scheduling);
        let placement = self.strategy.schedule(plan, &snapshot)?;

        self.enter(RunPhase::Sequencing);
        let order = rollout_order(plan)?;

        self.enter(RunPhase::RollingOut);
        let network = Uuid::new_v4().to_string();
        let mut report = RolloutReport {
            network,
            placement,
            order: Vec::new(),
            launched: Vec::new(),
            skipped: Vec::new(),
            drains: Vec::new(),
        };
        let mut network_ready = false;

        for name in &order {
            let Some(spec) = plan.service(name) else {
                continue;
            };

            if let Some(running_on) = snapshot.running_on(name) {
                info!(service = %name, node = %running_on, "already running, skipping");
                report.skipped.push(ServiceOnNode {
                    service: name.clone(),
                    node: running_on.to_string(),
                });
                continue;
            }

            let (alias, uri) = target(&report.placement, &snapshot, name)?;

            if !network_ready {
                self.provision_network(&report.network).await?;
                network_ready = true;
            }

            let config = LaunchConfig::for_service(spec, &report.network);
            info!(service = %name, node = %alias, "submitting service");
            let mut stream = self
                .agent
                .deploy(&config, &uri, name)
                .await
                .map_err(|source| RolloutError::LaunchSubmission {
                    service: name.clone(),
                    node: alias.clone(),
                    source,
                })?;

            match await_outcome(&mut stream, self.sink.as_ref(), self.rollout.handshake_timeout()).await {
                Handshake::Succeeded => {
                    info!(service = %name, node = %alias, "service deployed");
                    report.drains.push(spawn_drain(
                        name.clone(),
                        stream,
                        Arc::clone(&self.sink),
                        self.shutdown.clone(),
                    ));
                    report.launched.push(ServiceOnNode {
                        service: name.clone(),
                        node: alias,
                    });
                }
                Handshake::Failed(detail) => {
                    return Err(RolloutError::DeploymentFailed {
                        service: name.clone(),
                        node: alias,
                        detail,
                    });
                }
                Handshake::Closed => {
                    return Err(RolloutError::StatusStreamClosed {
                        service: name.clone(),
                        node: alias,
                    });
                }
                Handshake::TimedOut(after) => {
                    return Err(RolloutError::DeploymentTimeout {
                        service: name.clone(),
                        node: alias,
                        after,
                    });
                }
            }
        }

        report.order = order;
        Ok(report)
    }

    async fn provision_network(&self, network: &str) -> RolloutResult<()> {
        let Some(provisioner) = &self.provisioner else {
            return Ok(());
        };
        provisioner
            .create_overlay_network(network)
            .await
            .map_err(|source| RolloutError::Network {
                network: network.to_string(),
                source,
            })?;
        info!(%network, "overlay network ready");
        Ok(())
    }

    fn enter(&mut self, phase: RunPhase) {
        info!(?phase, "rollout phase");
        self.phase = phase;
    }

    fn fail(&mut self, err: RolloutError) -> RolloutError {
        warn!(error = %err, phase = ?self.phase, "rollout failed");
        self.phase = RunPhase::Failed {
            reason: err.to_string(),
        };
        err
    }
}

/// Alias and URI of the node a service was placed on.
fn target(placement: &Placement, snapshot: &RegistrySnapshot, service: &str) -> RolloutResult<(String, String)> {
    let alias = placement.node_for(service).unwrap_or_default();
    let node = snapshot.node(alias).ok_or_else(|| PlacementError::UnknownNode {
        service: service.to_string(),
        node: alias.to_string(),
    })?;
    Ok((node.alias.clone(), node.uri.clone()))
}
