//! Registry snapshot builder: one best-effort discovery pass per run.
//!
//! Scans every discovery source, keeps spawnpoints that report themselves
//! good, then inspects each kept spawnpoint for fresh metadata and
//! recently-seen services. Scan failures only cost that source's nodes;
//! an inspection failure aborts the build.

use std::time::{Duration, SystemTime};

use raptor_core::RegistrySnapshot;
use raptor_core::config::DiscoveryConfig;
use tracing::{debug, info, warn};

use crate::agent::{NodeAgent, unix_nanos};
use crate::error::{ClusterError, ClusterResult};

/// Builds a [`RegistrySnapshot`] through a [`NodeAgent`].
pub struct SnapshotBuilder<'a> {
    agent: &'a dyn NodeAgent,
    metadata_cutoff: Duration,
    service_cutoff: Duration,
}

impl<'a> SnapshotBuilder<'a> {
    pub fn new(agent: &'a dyn NodeAgent) -> Self {
        Self::from_config(agent, &DiscoveryConfig::default())
    }

    pub fn from_config(agent: &'a dyn NodeAgent, config: &DiscoveryConfig) -> Self {
        Self {
            agent,
            metadata_cutoff: config.metadata_cutoff(),
            service_cutoff: config.service_cutoff(),
        }
    }

    /// Set the metadata freshness cutoff.
    pub fn with_metadata_cutoff(mut self, cutoff: Duration) -> Self {
        self.metadata_cutoff = cutoff;
        self
    }

    /// Set the window in which a service counts as running.
    pub fn with_service_cutoff(mut self, cutoff: Duration) -> Self {
        self.service_cutoff = cutoff;
        self
    }

    pub async fn build(&self, sources: &[String]) -> ClusterResult<RegistrySnapshot> {
        self.build_at(sources, SystemTime::now()).await
    }

    /// Build with an explicit "now" for the freshness checks.
    pub async fn build_at(&self, sources: &[String], now: SystemTime) -> ClusterResult<RegistrySnapshot> {
        let mut snapshot = RegistrySnapshot::new();

        for source in sources {
            let nodes = match self.agent.scan(source).await {
                Ok(nodes) => nodes,
                Err(e) => {
                    warn!(%source, error = %e, "discovery source unavailable, skipping");
                    continue;
                }
            };

            for node in nodes {
                if !node.good {
                    debug!(%source, alias = %node.alias, "ignoring spawnpoint that is not good");
                    continue;
                }
                let alias = node.alias.clone();
                if snapshot.insert_node(node).is_some() {
                    warn!(%source, %alias, "spawnpoint reported by more than one source, keeping the latest");
                }
            }
        }

        let now_ns = unix_nanos(now);
        let aliases: Vec<String> = snapshot.nodes().map(|n| n.alias.clone()).collect();

        for alias in aliases {
            let Some(node) = snapshot.node_mut(&alias) else {
                continue;
            };

            let inspection = self
                .agent
                .inspect(&node.uri)
                .await
                .map_err(|e| ClusterError::Inspection {
                    node: alias.clone(),
                    source: Box::new(e),
                })?;

            node.metadata = inspection
                .metadata
                .into_iter()
                .filter(|(_, entry)| is_fresh(entry.timestamp_ns, now_ns, self.metadata_cutoff))
                .map(|(key, entry)| (key, entry.value))
                .collect();
            debug!(%alias, metadata = node.metadata.len(), "inspected spawnpoint");

            for service in inspection.services {
                if is_fresh(service.last_seen_ns, now_ns, self.service_cutoff) {
                    debug!(%alias, service = %service.name, "service already running");
                    snapshot.mark_running(service.name, alias.clone());
                }
            }
        }

        info!(
            sources = sources.len(),
            spawnpoints = snapshot.len(),
            running = snapshot.running().len(),
            "registry snapshot built"
        );
        Ok(snapshot)
    }
}

/// Timestamps in the future count as fresh.
fn is_fresh(timestamp_ns: i64, now_ns: i64, cutoff: Duration) -> bool {
    let cutoff_ns = i64::try_from(cutoff.as_nanos()).unwrap_or(i64::MAX);
    now_ns.saturating_sub(timestamp_ns) < cutoff_ns
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use raptor_core::{LaunchConfig, MemorySize, NodeInfo};

    use super::*;
    use crate::agent::{MetadataEntry, NodeInspection, RecentService, StatusStream};

    const SECOND: i64 = 1_000_000_000;

    #[derive(Default)]
    struct FakeAgent {
        sources: HashMap<String, Vec<NodeInfo>>,
        inspections: HashMap<String, NodeInspection>,
        inspected: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl NodeAgent for FakeAgent {
        async fn scan(&self, source: &str) -> ClusterResult<Vec<NodeInfo>> {
            self.sources.get(source).cloned().ok_or_else(|| ClusterError::Transport {
                uri: source.to_string(),
                reason: "connection refused".to_string(),
            })
        }

        async fn inspect(&self, node_uri: &str) -> ClusterResult<NodeInspection> {
            self.inspected.lock().unwrap().push(node_uri.to_string());
            self.inspections.get(node_uri).cloned().ok_or_else(|| ClusterError::Status {
                uri: node_uri.to_string(),
                status: 503,
                body: "busy".to_string(),
            })
        }

        async fn deploy(&self, _: &LaunchConfig, node_uri: &str, _: &str) -> ClusterResult<StatusStream> {
            Err(ClusterError::Transport {
                uri: node_uri.to_string(),
                reason: "not supported".to_string(),
            })
        }
    }

    fn node(alias: &str, good: bool) -> NodeInfo {
        NodeInfo {
            alias: alias.to_string(),
            uri: uri(alias),
            available_memory: MemorySize::from_gib(4),
            available_cpu_shares: 2,
            metadata: Default::default(),
            good,
        }
    }

    fn uri(alias: &str) -> String {
        format!("http://{alias}:2800")
    }

    fn now() -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000)
    }

    fn seconds_ago(secs: i64) -> i64 {
        unix_nanos(now()) - secs * SECOND
    }

    fn sources(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn keeps_only_good_spawnpoints() {
        let mut agent = FakeAgent::default();
        agent.sources.insert("src".into(), vec![node("up", true), node("down", false)]);
        agent.inspections.insert(uri("up"), NodeInspection::default());

        let snapshot = SnapshotBuilder::new(&agent).build_at(&sources(&["src"]), now()).await.unwrap();

        assert!(snapshot.node("up").is_some());
        assert!(snapshot.node("down").is_none());
        assert_eq!(*agent.inspected.lock().unwrap(), vec![uri("up")]);
    }

    #[tokio::test]
    async fn unreachable_source_is_skipped() {
        let mut agent = FakeAgent::default();
        agent.sources.insert("good".into(), vec![node("n1", true)]);
        agent.inspections.insert(uri("n1"), NodeInspection::default());

        let snapshot = SnapshotBuilder::new(&agent)
            .build_at(&sources(&["dead", "good"]), now())
            .await
            .unwrap();

        assert_eq!(snapshot.len(), 1);
    }

    #[tokio::test]
    async fn inspection_failure_aborts() {
        let mut agent = FakeAgent::default();
        agent.sources.insert("src".into(), vec![node("n1", true)]);

        let err = SnapshotBuilder::new(&agent)
            .build_at(&sources(&["src"]), now())
            .await
            .unwrap_err();

        assert!(matches!(err, ClusterError::Inspection { ref node, .. } if node == "n1"));
    }

    #[tokio::test]
    async fn stale_metadata_is_dropped() {
        let mut agent = FakeAgent::default();
        agent.sources.insert("src".into(), vec![node("n1", true)]);
        agent.inspections.insert(
            uri("n1"),
            NodeInspection {
                services: Vec::new(),
                metadata: HashMap::from([
                    (
                        "arch".to_string(),
                        MetadataEntry { value: "arm64".into(), timestamp_ns: seconds_ago(5) },
                    ),
                    (
                        "zone".to_string(),
                        MetadataEntry { value: "lab".into(), timestamp_ns: seconds_ago(120) },
                    ),
                ]),
            },
        );

        let snapshot = SnapshotBuilder::new(&agent)
            .with_metadata_cutoff(Duration::from_secs(60))
            .build_at(&sources(&["src"]), now())
            .await
            .unwrap();

        let metadata = &snapshot.node("n1").unwrap().metadata;
        assert_eq!(metadata.get("arch").map(String::as_str), Some("arm64"));
        assert!(!metadata.contains_key("zone"));
    }

    #[tokio::test]
    async fn recently_seen_service_is_running() {
        let mut agent = FakeAgent::default();
        agent.sources.insert("src".into(), vec![node("edge-1", true)]);
        agent.inspections.insert(
            uri("edge-1"),
            NodeInspection {
                services: vec![
                    RecentService { name: "web".into(), last_seen_ns: seconds_ago(3) },
                    RecentService { name: "old".into(), last_seen_ns: seconds_ago(30) },
                ],
                metadata: HashMap::new(),
            },
        );

        let snapshot = SnapshotBuilder::new(&agent)
            .with_service_cutoff(Duration::from_secs(10))
            .build_at(&sources(&["src"]), now())
            .await
            .unwrap();

        assert_eq!(snapshot.running_on("web"), Some("edge-1"));
        assert_eq!(snapshot.running_on("old"), None);
    }

    #[tokio::test]
    async fn duplicate_alias_keeps_latest_source() {
        let mut agent = FakeAgent::default();
        let mut later = node("n1", true);
        later.available_cpu_shares = 16;
        agent.sources.insert("a".into(), vec![node("n1", true)]);
        agent.sources.insert("b".into(), vec![later]);
        agent.inspections.insert(uri("n1"), NodeInspection::default());

        let snapshot = SnapshotBuilder::new(&agent)
            .build_at(&sources(&["a", "b"]), now())
            .await
            .unwrap();

        assert_eq!(snapshot.node("n1").unwrap().available_cpu_shares, 16);
    }

    #[test]
    fn freshness_window_is_exclusive() {
        let cutoff = Duration::from_secs(10);
        assert!(is_fresh(0, 9 * SECOND, cutoff));
        assert!(!is_fresh(0, 10 * SECOND, cutoff));
        assert!(is_fresh(20 * SECOND, 10 * SECOND, cutoff));
    }
}
