//! raptor.toml configuration parser.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaptorConfig {
    pub discovery: DiscoveryConfig,
    pub rollout: RolloutConfig,
    pub agent: AgentConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Node metadata older than this is ignored.
    pub metadata_cutoff_secs: u64,
    /// Services seen within this window count as already running.
    pub service_cutoff_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RolloutConfig {
    /// How long to wait for a service's success/failure marker. 0 waits forever.
    pub handshake_timeout_secs: u64,
    /// Create the shared overlay network before the first launch.
    pub provision_network: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub request_timeout_secs: u64,
    pub docker_binary: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            metadata_cutoff_secs: 60,
            service_cutoff_secs: 10,
        }
    }
}

impl Default for RolloutConfig {
    fn default() -> Self {
        Self {
            handshake_timeout_secs: 600,
            provision_network: false,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 10,
            docker_binary: "docker".to_string(),
        }
    }
}

impl DiscoveryConfig {
    pub fn metadata_cutoff(&self) -> Duration {
        Duration::from_secs(self.metadata_cutoff_secs)
    }

    pub fn service_cutoff(&self) -> Duration {
        Duration::from_secs(self.service_cutoff_secs)
    }
}

impl RolloutConfig {
    pub fn handshake_timeout(&self) -> Option<Duration> {
        (self.handshake_timeout_secs > 0).then(|| Duration::from_secs(self.handshake_timeout_secs))
    }
}

impl AgentConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl RaptorConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: RaptorConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load `path` if given, otherwise fall back to defaults.
    pub fn load_or_default(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Self::default()),
        }
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RaptorConfig::default();
        assert_eq!(config.discovery.service_cutoff(), Duration::from_secs(10));
        assert_eq!(config.discovery.metadata_cutoff(), Duration::from_secs(60));
        assert_eq!(config.rollout.handshake_timeout(), Some(Duration::from_secs(600)));
        assert!(!config.rollout.provision_network);
        assert_eq!(config.agent.docker_binary, "docker");
    }

    #[test]
    fn test_parse_partial() {
        let toml_str = r#"
[rollout]
handshake_timeout_secs = 0
provision_network = true
"#;
        let config: RaptorConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.rollout.handshake_timeout(), None);
        assert!(config.rollout.provision_network);
        assert_eq!(config.discovery.service_cutoff_secs, 10);
    }

    #[test]
    fn test_roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raptor.toml");
        let mut config = RaptorConfig::default();
        config.discovery.metadata_cutoff_secs = 120;
        std::fs::write(&path, config.to_toml_string().unwrap()).unwrap();

        let loaded = RaptorConfig::load_or_default(Some(&path)).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_path_uses_defaults() {
        assert_eq!(RaptorConfig::load_or_default(None).unwrap(), RaptorConfig::default());
    }
}
