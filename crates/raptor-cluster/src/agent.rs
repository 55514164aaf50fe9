//! Node agent collaborator: the orchestrator's view of a spawnpoint.
//!
//! The agent scans discovery sources, inspects individual spawnpoints, and
//! submits launches. A launch returns a stream of status lines that the
//! caller consumes; the agent's own transport governs delivery.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use raptor_core::{LaunchConfig, NodeInfo};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::ClusterResult;

/// One line of a launched service's status stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusLine {
    /// Unix timestamp in nanoseconds.
    pub timestamp_ns: i64,
    pub node_alias: String,
    pub service: String,
    pub contents: String,
}

/// A metadata value with the time it was last written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub value: String,
    pub timestamp_ns: i64,
}

/// A service a spawnpoint has reported recently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentService {
    pub name: String,
    pub last_seen_ns: i64,
}

/// Result of inspecting one spawnpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInspection {
    #[serde(default)]
    pub services: Vec<RecentService>,
    #[serde(default)]
    pub metadata: HashMap<String, MetadataEntry>,
}

/// Receiving half of a launched service's status stream.
pub type StatusStream = mpsc::Receiver<StatusLine>;

#[async_trait]
pub trait NodeAgent: Send + Sync {
    /// List the spawnpoints a discovery source knows about.
    async fn scan(&self, source: &str) -> ClusterResult<Vec<NodeInfo>>;

    /// Fetch a spawnpoint's recently-seen services and metadata.
    async fn inspect(&self, node_uri: &str) -> ClusterResult<NodeInspection>;

    /// Submit a launch and return its status stream.
    async fn deploy(&self, config: &LaunchConfig, node_uri: &str, service: &str)
        -> ClusterResult<StatusStream>;
}

/// Nanoseconds since the Unix epoch, saturating at the `i64` bounds.
pub fn unix_nanos(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => i64::try_from(d.as_nanos()).unwrap_or(i64::MAX),
        Err(e) => i64::try_from(e.duration().as_nanos()).map_or(i64::MIN, |n| -n),
    }
}
