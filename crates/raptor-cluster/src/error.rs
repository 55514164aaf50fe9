//! Cluster error types.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for cluster operations.
pub type ClusterResult<T> = Result<T, ClusterError>;

/// Errors talking to spawnpoints or provisioning networks.
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("request to {uri} failed: {reason}")]
    Transport { uri: String, reason: String },

    #[error("{uri} returned {status}: {body}")]
    Status { uri: String, status: u16, body: String },

    #[error("invalid response from {uri}: {reason}")]
    Decode { uri: String, reason: String },

    #[error("request to {uri} timed out after {after:?}")]
    Timeout { uri: String, after: Duration },

    #[error("failed to inspect spawnpoint {node}: {source}")]
    Inspection {
        node: String,
        #[source]
        source: Box<ClusterError>,
    },

    #[error("failed to create overlay network {network}: {reason}")]
    Network { network: String, reason: String },
}
