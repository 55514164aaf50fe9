//! Launch configuration submitted to a node agent.

use serde::{Deserialize, Serialize};

use crate::plan::ServiceSpec;

/// Everything a node needs to start one service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchConfig {
    pub service_name: String,
    pub entity: String,
    pub image: String,
    pub build: Vec<String>,
    pub source: Option<String>,
    pub run: Vec<String>,
    pub memory_mib: u64,
    pub cpu_shares: u64,
    pub volumes: Vec<String>,
    pub included_files: Vec<String>,
    pub included_dirs: Vec<String>,
    /// Node-side restart policy; the orchestrator never retries.
    pub auto_restart: bool,
    pub restart_interval: Option<String>,
    /// Overlay network shared by every service launched in the same run.
    pub overlay_network: String,
}

impl LaunchConfig {
    pub fn for_service(spec: &ServiceSpec, overlay_network: &str) -> Self {
        Self {
            service_name: spec.name.clone(),
            entity: spec.entity.clone(),
            image: spec.image.clone(),
            build: spec.build.clone(),
            source: spec.source.clone(),
            run: spec.run.clone(),
            memory_mib: spec.resources.memory.as_mib(),
            cpu_shares: spec.resources.cpu_shares,
            volumes: spec.volumes.clone(),
            included_files: spec.included_files.clone(),
            included_dirs: spec.included_dirs.clone(),
            auto_restart: spec.auto_restart,
            restart_interval: spec.restart_interval.clone(),
            overlay_network: overlay_network.to_string(),
        }
    }
}
