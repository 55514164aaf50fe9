//! Raptor placement: maps services onto spawnpoints.
//!
//! Placement is a pure function of a [`raptor_core::DeploymentPlan`] and a
//! [`raptor_core::RegistrySnapshot`]. It either assigns every service or
//! fails; there is no partial result.
//!
//! # Components
//!
//! - **`strategy`**: `PlacementStrategy` trait and the `Placement` result
//! - **`first_fit`**: the default strategy
//! - **`capacity`**: remaining-capacity ledger scoped to one call

pub mod capacity;
pub mod error;
pub mod first_fit;
pub mod strategy;

pub use capacity::{CapacityLedger, NodeCapacity, Shortfall};
pub use error::{PlacementError, PlacementResult, Resource};
pub use first_fit::FirstFit;
pub use strategy::{Placement, PlacementStrategy};
