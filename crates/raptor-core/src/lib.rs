//! raptor-core: shared types for Raptor.
//!
//! - **`descriptor`**: raw deployment records as emitted by the descriptor compiler
//! - **`plan`**: validated, typed services (`DeploymentPlan`, `ServiceSpec`)
//! - **`node`**: discovered nodes and the per-run `RegistrySnapshot`
//! - **`launch`**: launch configuration submitted to a node agent
//! - **`config`**: `raptor.toml`

pub mod config;
pub mod descriptor;
pub mod error;
pub mod launch;
pub mod node;
pub mod plan;

pub use config::RaptorConfig;
pub use descriptor::{Deployment, Link, Service};
pub use error::{DescriptorError, DescriptorResult};
pub use launch::LaunchConfig;
pub use node::{NodeInfo, RegistrySnapshot};
pub use plan::{DeploymentPlan, MemorySize, ResourceRequest, ServiceSpec};
