//! Overlay network provisioning.
//!
//! Every service launched in one run joins the same overlay network. The
//! provisioner is asked to create it once, before the first launch.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{ClusterError, ClusterResult};

#[async_trait]
pub trait NetworkProvisioner: Send + Sync {
    /// Create the named overlay network. An existing network is not an error.
    async fn create_overlay_network(&self, name: &str) -> ClusterResult<()>;
}

/// Creates Docker overlay networks through the `docker` CLI.
#[derive(Debug, Clone)]
pub struct DockerNetworkProvisioner {
    binary: String,
}

impl DockerNetworkProvisioner {
    pub fn new(binary: impl Into<String>) -> Self {
        Self { binary: binary.into() }
    }
}

impl Default for DockerNetworkProvisioner {
    fn default() -> Self {
        Self::new("docker")
    }
}

#[async_trait]
impl NetworkProvisioner for DockerNetworkProvisioner {
    async fn create_overlay_network(&self, name: &str) -> ClusterResult<()> {
        debug!(binary = %self.binary, network = %name, "creating overlay network");

        let output = Command::new(&self.binary)
            .args(["network", "create", "--driver", "overlay", "--attachable", name])
            .output()
            .await
            .map_err(|e| ClusterError::Network {
                network: name.to_string(),
                reason: format!("{} failed to start: {e}", self.binary),
            })?;

        if output.status.success() {
            info!(network = %name, "overlay network created");
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if already_exists(&stderr) {
            debug!(network = %name, "overlay network already exists");
            return Ok(());
        }

        Err(ClusterError::Network {
            network: name.to_string(),
            reason: match stderr.trim() {
                "" => format!("{} exited with {}", self.binary, output.status),
                msg => msg.to_string(),
            },
        })
    }
}

fn already_exists(stderr: &str) -> bool {
    stderr.to_ascii_lowercase().contains("already exists")
}
