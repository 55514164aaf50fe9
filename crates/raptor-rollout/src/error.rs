//! Rollout error types.

use std::time::Duration;

use raptor_cluster::ClusterError;
use raptor_core::DescriptorError;
use raptor_placement::PlacementError;
use thiserror::Error;

/// Result type alias for rollout operations.
pub type RolloutResult<T> = Result<T, RolloutError>;

/// Every way a run can fail. All of them abort the run.
#[derive(Debug, Error)]
pub enum RolloutError {
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    #[error(transparent)]
    Discovery(#[from] ClusterError),

    #[error(transparent)]
    Placement(#[from] PlacementError),

    #[error("dependency cycle through link {src} -> {dest}")]
    CyclicDependency { src: String, dest: String },

    #[error("failed to submit {service} to {node}: {source}")]
    LaunchSubmission {
        service: String,
        node: String,
        #[source]
        source: ClusterError,
    },

    #[error("{service} failed to deploy on {node}: {detail}")]
    DeploymentFailed {
        service: String,
        node: String,
        detail: String,
    },

    #[error("{service} on {node} reported no outcome within {after:?}")]
    DeploymentTimeout {
        service: String,
        node: String,
        after: Duration,
    },

    #[error("status stream for {service} on {node} closed before an outcome was reported")]
    StatusStreamClosed { service: String, node: String },

    #[error("overlay network {network} unavailable: {source}")]
    Network {
        network: String,
        #[source]
        source: ClusterError,
    },
}
