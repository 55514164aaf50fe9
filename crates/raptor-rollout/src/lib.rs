//! Raptor rollout: from a validated plan to running services.
//!
//! # Components
//!
//! - **`sequencer`**: dependency order over the plan's links
//! - **`handshake`**: status-stream markers, bounded wait, drain tasks
//! - **`sink`**: where status lines go (console, tracing, memory)
//! - **`controller`**: the `Orchestrator` run state machine

pub mod controller;
pub mod error;
pub mod handshake;
pub mod sequencer;
pub mod sink;

pub use controller::{Orchestrator, RolloutReport, RunPhase, ServiceOnNode};
pub use error::{RolloutError, RolloutResult};
pub use handshake::{FAILURE_MARKER, Handshake, LineKind, SUCCESS_MARKER};
pub use sequencer::rollout_order;
pub use sink::{CollectingSink, ConsoleSink, LogSink, TracingSink};
