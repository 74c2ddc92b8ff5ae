//! Host and dataset configuration
//!
//! Two YAML inputs drive a run: a hosts file mapping host names to FHIR
//! endpoints, and one dataset config per study with its environment
//! shortcuts and default study tag.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

/// One endpoint entry of the hosts file
#[derive(Debug, Clone, Deserialize)]
pub struct HostEntry {
    pub url: String,
    #[serde(default)]
    pub auth_token: Option<String>,
}

/// host name → endpoint
pub type HostConfig = BTreeMap<String, HostEntry>;

pub fn load_hosts(path: &Path) -> anyhow::Result<HostConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("reading hosts file {}", path.display()))?;
    serde_yaml::from_str(&contents)
        .with_context(|| format!("parsing hosts file {}", path.display()))
}

/// Per-dataset run configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatasetConfig {
    /// Environment shortcut → host name, e.g. `local: my-local-server`
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Default study tag when none is given on the command line
    #[serde(default)]
    pub study_id: Option<String>,
}

impl DatasetConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading dataset config {}", path.display()))?;
        serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing dataset config {}", path.display()))
    }
}
