//! Placement error types.

use std::fmt;

use thiserror::Error;

/// Result type alias for placement operations.
pub type PlacementResult<T> = Result<T, PlacementError>;

/// A node resource checked during placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// Memory, in MiB.
    Memory,
    CpuShares,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Memory => f.write_str("memory (MiB)"),
            Resource::CpuShares => f.write_str("cpu shares"),
        }
    }
}

/// Errors that abort a scheduling call. No partial placement is ever returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlacementError {
    #[error("service {service} references unknown spawnpoint {node}")]
    UnknownNode { service: String, node: String },

    #[error(
        "insufficient {resource} on spawnpoint {node} for service {service} (want {requested}, have {available})"
    )]
    InsufficientCapacity {
        service: String,
        node: String,
        resource: Resource,
        requested: u64,
        available: u64,
    },

    #[error("could not satisfy metadata constraints for service {service} ({constraints})")]
    UnsatisfiableConstraints { service: String, constraints: String },
}
