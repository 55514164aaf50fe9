//! Deployment descriptor records.
//!
//! These are the raw records produced by the external descriptor compiler.
//! The binary encoding keeps the compiler's field tags; the same records
//! can also be written as camelCase JSON. Nothing here validates; see
//! [`crate::plan::DeploymentPlan`] for the typed view.

use std::collections::HashMap;
use std::path::Path;

use prost::Message;
use serde::{Deserialize, Serialize};

use crate::error::{DescriptorError, DescriptorResult};

/// The whole desired state of one deployment.
#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Deployment {
    #[prost(string, tag = "1")]
    pub entity: String,
    /// Discovery sources scanned for spawnpoints.
    #[prost(string, repeated, tag = "2")]
    pub spawnpoint_uris: Vec<String>,
    /// Informational only; never scheduled.
    #[prost(string, repeated, tag = "3")]
    pub external_deps: Vec<String>,
    #[prost(message, repeated, tag = "4")]
    pub services: Vec<Service>,
    #[prost(message, repeated, tag = "5")]
    pub topology: Vec<Link>,
}

/// A single service record with untyped parameters.
#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Service {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub image_name: String,
    #[prost(map = "string, string", tag = "4")]
    pub params: HashMap<String, String>,
    /// Pinned spawnpoint alias; empty when unpinned.
    #[prost(string, tag = "5")]
    pub spawnpoint_name: String,
    #[prost(map = "string, string", tag = "6")]
    pub constraints: HashMap<String, String>,
}

/// Directed dependency edge: `src` must be running before `dest`.
#[derive(Clone, PartialEq, Eq, Message, Serialize, Deserialize)]
#[serde(default)]
pub struct Link {
    #[prost(string, tag = "1")]
    pub src: String,
    #[prost(string, tag = "2")]
    pub dest: String,
}

impl Link {
    pub fn new(src: impl Into<String>, dest: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            dest: dest.into(),
        }
    }
}

impl Deployment {
    /// Read a descriptor from disk.
    ///
    /// Files with a `.json` extension are parsed as JSON, anything else is
    /// decoded as the compiler's binary encoding.
    pub fn from_file(path: &Path) -> DescriptorResult<Self> {
        let display = path.display().to_string();
        let raw = std::fs::read(path).map_err(|source| DescriptorError::Io {
            path: display.clone(),
            source,
        })?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            serde_json::from_slice(&raw).map_err(|e| DescriptorError::Decode {
                path: display,
                reason: e.to_string(),
            })
        } else {
            Self::decode(raw.as_slice()).map_err(|e| DescriptorError::Decode {
                path: display,
                reason: e.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "entity": "deploy.ent",
        "spawnpointUris": ["http://10.0.0.1:2800"],
        "externalDeps": ["mqtt"],
        "services": [
            {
                "name": "web",
                "imageName": "jhkolb/spawnpoint:amd64",
                "params": { "memAlloc": "512M", "cpuShares": "1024" },
                "spawnpointName": "edge-1",
                "constraints": {}
            },
            { "name": "db", "imageName": "postgres" }
        ],
        "topology": [ { "src": "db", "dest": "web" } ]
    }"#;

    #[test]
    fn parses_json_descriptor() {
        let deployment: Deployment = serde_json::from_str(SAMPLE).unwrap();

        assert_eq!(deployment.entity, "deploy.ent");
        assert_eq!(deployment.spawnpoint_uris, vec!["http://10.0.0.1:2800"]);
        assert_eq!(deployment.external_deps, vec!["mqtt"]);
        assert_eq!(deployment.services.len(), 2);
        assert_eq!(deployment.services[0].spawnpoint_name, "edge-1");
        assert_eq!(deployment.services[0].params.get("memAlloc").unwrap(), "512M");
        assert!(deployment.services[1].params.is_empty());
        assert_eq!(deployment.topology, vec![Link::new("db", "web")]);
    }

    #[test]
    fn loads_json_file_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deploy.json");
        std::fs::write(&path, SAMPLE).unwrap();

        let deployment = Deployment::from_file(&path).unwrap();
        assert_eq!(deployment.services[1].name, "db");
    }

    #[test]
    fn loads_compiled_descriptor() {
        let written: Deployment = serde_json::from_str(SAMPLE).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deploy.protobuf");
        std::fs::write(&path, written.encode_to_vec()).unwrap();

        let decoded = Deployment::from_file(&path).unwrap();
        assert_eq!(decoded, written);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = Deployment::from_file(Path::new("/nonexistent/deploy.json")).unwrap_err();
        assert!(matches!(err, DescriptorError::Io { .. }));
    }

    #[test]
    fn malformed_json_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = Deployment::from_file(&path).unwrap_err();
        assert!(matches!(err, DescriptorError::Decode { .. }));
    }
}
