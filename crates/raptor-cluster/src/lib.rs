//! raptor-cluster: the orchestrator's window onto spawnpoints.
//!
//! # Architecture
//!
//! ```text
//! SnapshotBuilder
//!   ├── NodeAgent::scan(source)      → NodeInfo per spawnpoint (good only)
//!   └── NodeAgent::inspect(node)     → fresh metadata + running services
//!
//! Rollout
//!   ├── NetworkProvisioner           → one overlay network per run
//!   └── NodeAgent::deploy(config)    → StatusStream
//! ```
//!
//! `HttpNodeAgent` and `DockerNetworkProvisioner` are the production
//! implementations; tests substitute in-memory fakes.

pub mod agent;
pub mod error;
pub mod http;
pub mod network;
pub mod registry;

pub use agent::{MetadataEntry, NodeAgent, NodeInspection, RecentService, StatusLine, StatusStream};
pub use error::{ClusterError, ClusterResult};
pub use http::{HttpNodeAgent, LineDecoder};
pub use network::{DockerNetworkProvisioner, NetworkProvisioner};
pub use registry::SnapshotBuilder;
