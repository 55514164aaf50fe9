//! Typed view of a deployment descriptor.
//!
//! [`DeploymentPlan::from_descriptor`] is the only place raw string
//! parameters are interpreted. Everything downstream (placement, rollout,
//! launch configuration) works on [`ServiceSpec`].

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::descriptor::{Deployment, Link, Service};
use crate::error::{DescriptorError, DescriptorResult};

pub const PARAM_BUILD: &str = "build";
pub const PARAM_RUN: &str = "run";
pub const PARAM_VOLUMES: &str = "volumes";
pub const PARAM_INCLUDED_FILES: &str = "includedFiles";
pub const PARAM_INCLUDED_DIRS: &str = "includedDirs";
pub const PARAM_MEM_ALLOC: &str = "memAlloc";
pub const PARAM_CPU_SHARES: &str = "cpuShares";
pub const PARAM_AUTO_RESTART: &str = "autoRestart";
pub const PARAM_RESTART_INT: &str = "restartInt";
pub const PARAM_SOURCE: &str = "source";
pub const PARAM_SPAWNPOINT: &str = "spawnpoint";
pub const PARAM_ENTITY: &str = "entity";

// A byte suffix is only accepted after a unit letter: `512B` is not 512 MiB.
static MEMORY_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(?i)(\d+)\s*(?:([mgt])(?:i?b)?)?$").ok());

static LIST_SEPARATOR: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r",\s*").ok());

/// Memory amount in mebibytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MemorySize(u64);

impl MemorySize {
    pub const fn from_mib(mib: u64) -> Self {
        Self(mib)
    }

    pub const fn from_gib(gib: u64) -> Self {
        Self(gib * 1024)
    }

    pub const fn as_mib(self) -> u64 {
        self.0
    }

    /// Parse `512`, `512M`, `512MB`, `4G`, `4GiB`, `1T`. A bare number is MiB.
    pub fn parse(raw: &str) -> Option<Self> {
        let caps = MEMORY_PATTERN.as_ref()?.captures(raw.trim())?;
        let amount: u64 = caps.get(1)?.as_str().parse().ok()?;
        let factor = match caps.get(2).map(|m| m.as_str().to_ascii_lowercase()) {
            Some(unit) if unit == "g" => 1024,
            Some(unit) if unit == "t" => 1024 * 1024,
            _ => 1,
        };
        amount.checked_mul(factor).map(Self)
    }
}

impl fmt::Display for MemorySize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}M", self.0)
    }
}

/// Resources a service asks of the node it lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequest {
    pub memory: MemorySize,
    pub cpu_shares: u64,
}

/// A validated, typed service ready for placement and launch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSpec {
    pub name: String,
    pub image: String,
    pub entity: String,
    pub build: Vec<String>,
    pub run: Vec<String>,
    pub volumes: Vec<String>,
    pub included_files: Vec<String>,
    pub included_dirs: Vec<String>,
    pub source: Option<String>,
    pub resources: ResourceRequest,
    pub auto_restart: bool,
    pub restart_interval: Option<String>,
    /// Explicit target node alias. When set, `constraints` are ignored.
    pub pinned_node: Option<String>,
    /// Required node metadata (key → exact value).
    pub constraints: BTreeMap<String, String>,
}

impl ServiceSpec {
    /// Convert a raw service record. `default_entity` fills a missing
    /// `entity` parameter.
    pub fn from_record(record: &Service, default_entity: &str) -> DescriptorResult<Self> {
        if record.name.trim().is_empty() {
            return Err(DescriptorError::EmptyServiceName);
        }
        let params = &record.params;

        let raw_mem = params.get(PARAM_MEM_ALLOC).cloned().unwrap_or_default();
        let memory = MemorySize::parse(&raw_mem).ok_or_else(|| invalid(record, PARAM_MEM_ALLOC, &raw_mem))?;

        let raw_cpu = params.get(PARAM_CPU_SHARES).cloned().unwrap_or_default();
        let cpu_shares = raw_cpu
            .trim()
            .parse::<u64>()
            .map_err(|_| invalid(record, PARAM_CPU_SHARES, &raw_cpu))?;

        let pinned_node = non_empty(&record.spawnpoint_name)
            .or_else(|| params.get(PARAM_SPAWNPOINT).and_then(|s| non_empty(s)));

        let entity = params
            .get(PARAM_ENTITY)
            .and_then(|s| non_empty(s))
            .unwrap_or_else(|| default_entity.to_string());

        Ok(Self {
            name: record.name.clone(),
            image: record.image_name.clone(),
            entity,
            build: split_list(params.get(PARAM_BUILD)),
            run: split_list(params.get(PARAM_RUN)),
            volumes: split_list(params.get(PARAM_VOLUMES)),
            included_files: split_list(params.get(PARAM_INCLUDED_FILES)),
            included_dirs: split_list(params.get(PARAM_INCLUDED_DIRS)),
            source: params.get(PARAM_SOURCE).and_then(|s| non_empty(s)),
            resources: ResourceRequest { memory, cpu_shares },
            auto_restart: params
                .get(PARAM_AUTO_RESTART)
                .is_some_and(|s| lenient_bool(s)),
            restart_interval: params.get(PARAM_RESTART_INT).and_then(|s| non_empty(s)),
            pinned_node,
            constraints: record
                .constraints
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        })
    }
}

/// Read-only desired state for a single run.
#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentPlan {
    pub entity: String,
    pub sources: Vec<String>,
    pub external_deps: Vec<String>,
    pub services: Vec<ServiceSpec>,
    pub links: Vec<Link>,
}

impl DeploymentPlan {
    /// Validate a raw descriptor.
    ///
    /// The service entity defaults to the descriptor's `entity`, or to
    /// `fallback_entity` when the descriptor leaves it empty.
    pub fn from_descriptor(deployment: &Deployment, fallback_entity: &str) -> DescriptorResult<Self> {
        let entity = non_empty(&deployment.entity).unwrap_or_else(|| fallback_entity.to_string());

        let mut seen = HashSet::new();
        let mut services = Vec::with_capacity(deployment.services.len());
        for record in &deployment.services {
            let spec = ServiceSpec::from_record(record, &entity)?;
            if !seen.insert(spec.name.clone()) {
                return Err(DescriptorError::DuplicateService(spec.name));
            }
            services.push(spec);
        }

        Ok(Self {
            entity,
            sources: deployment.spawnpoint_uris.clone(),
            external_deps: deployment.external_deps.clone(),
            services,
            links: deployment.topology.clone(),
        })
    }

    pub fn service(&self, name: &str) -> Option<&ServiceSpec> {
        self.services.iter().find(|s| s.name == name)
    }
}

fn invalid(record: &Service, param: &str, value: &str) -> DescriptorError {
    DescriptorError::InvalidResourceSpec {
        service: record.name.clone(),
        param: param.to_string(),
        value: value.to_string(),
    }
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Items are kept verbatim, empty ones included; an absent parameter is an empty list.
fn split_list(raw: Option<&String>) -> Vec<String> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    match LIST_SEPARATOR.as_ref() {
        Some(separator) => separator.split(raw).map(str::to_string).collect(),
        None => vec![raw.clone()],
    }
}

/// Unparsable values count as `false`.
fn lenient_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "t" | "true"
    )
}
