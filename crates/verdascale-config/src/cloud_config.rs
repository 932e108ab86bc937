//! Adapter document parser and per-group merge.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::merge::{merge_labels, merge_taints};

/// Smallest OS volume (GiB) the cloud accepts; also the default.
pub const MIN_OS_VOLUME_SIZE: u32 = 50;

/// Billing contract that marks instances as spot.
pub const CONTRACT_SPOT: &str = "SPOT";

/// Image identifiers per class of instance type.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageConfig {
    #[serde(default)]
    pub gpu: String,
    #[serde(default)]
    pub cpu: String,
}

impl ImageConfig {
    fn is_empty(&self) -> bool {
        self.gpu.is_empty() && self.cpu.is_empty()
    }
}

/// Kubernetes-style taint effect.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TaintEffect {
    NoSchedule,
    PreferNoSchedule,
    NoExecute,
}

/// A node taint applied to every instance of a group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Taint {
    pub key: String,
    #[serde(default)]
    pub value: String,
    pub effect: TaintEffect,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BillingConfig {
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub contract: String,
}

/// Extra data volume attached at creation. Only valid inside a group override.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdditionalVolume {
    pub name: String,
    /// Size in GiB.
    pub size: u32,
    #[serde(rename = "type")]
    pub volume_type: String,
}

/// Per-group override. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GroupConfig {
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub taints: Vec<Taint>,
    #[serde(default)]
    pub billing_config: Option<BillingConfig>,
    #[serde(default)]
    pub os_volume_size: Option<u32>,
    #[serde(default)]
    pub available_locations: Vec<String>,
    #[serde(default)]
    pub additional_volumes: Vec<AdditionalVolume>,
    #[serde(default, rename = "sshKeyIDs")]
    pub ssh_key_ids: Vec<String>,
    #[serde(default)]
    pub startup_script: String,
    #[serde(default)]
    pub startup_script_env: BTreeMap<String, String>,
}

/// The adapter document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CloudConfig {
    #[serde(default)]
    pub image: ImageConfig,
    #[serde(default, rename = "sshKeyIDs")]
    pub ssh_key_ids: Vec<String>,
    /// Base-64 encoded shell script.
    #[serde(default)]
    pub startup_script: String,
    #[serde(default)]
    pub startup_script_env: BTreeMap<String, String>,
    #[serde(default)]
    pub available_locations: Vec<String>,
    #[serde(default)]
    pub os_volume_size: u32,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub taints: Vec<Taint>,
    #[serde(default)]
    pub billing_config: BillingConfig,
    #[serde(default)]
    pub groups: BTreeMap<String, GroupConfig>,
}

/// Effective settings for one group, after merging global and override.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NodeConfig {
    pub image: ImageConfig,
    #[serde(rename = "sshKeyIDs")]
    pub ssh_key_ids: Vec<String>,
    pub startup_script: String,
    pub startup_script_env: BTreeMap<String, String>,
    pub available_locations: Vec<String>,
    pub os_volume_size: u32,
    pub labels: Vec<String>,
    pub taints: Vec<Taint>,
    pub price: String,
    pub contract: String,
    pub is_spot: bool,
    pub volumes: Vec<AdditionalVolume>,
}

impl NodeConfig {
    /// Image for the instance class.
    pub fn image_for(&self, gpu: bool) -> &str {
        if gpu { &self.image.gpu } else { &self.image.cpu }
    }
}

impl CloudConfig {
    /// Parse a JSON document without validating it.
    pub fn from_json(content: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Read, parse and validate the document at `path`.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&content)?;
        config.validate()?;
        debug!(
            path = %path.display(),
            groups = config.groups.len(),
            locations = config.available_locations.len(),
            "adapter configuration loaded"
        );
        Ok(config)
    }

    /// Check the rules the adapter needs to start. Returns the first violation.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.image.is_empty() {
            return Err(ConfigError::Invalid(
                "image: at least one of cpu or gpu must be set".to_string(),
            ));
        }
        if self.ssh_key_ids.is_empty() {
            return Err(ConfigError::Invalid("sshKeyIDs must not be empty".to_string()));
        }
        if self.startup_script.is_empty() {
            return Err(ConfigError::Invalid("startupScript must not be empty".to_string()));
        }
        if self.available_locations.is_empty() {
            return Err(ConfigError::Invalid(
                "availableLocations must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Effective configuration for `group`. Groups without an override get
    /// the global settings.
    pub fn node_config(&self, group: &str) -> NodeConfig {
        let os_volume_size = self.os_volume_size.max(MIN_OS_VOLUME_SIZE);

        let mut node = NodeConfig {
            image: self.image.clone(),
            ssh_key_ids: self.ssh_key_ids.clone(),
            startup_script: self.startup_script.clone(),
            startup_script_env: self.startup_script_env.clone(),
            available_locations: self.available_locations.clone(),
            os_volume_size,
            labels: self.labels.clone(),
            taints: self.taints.clone(),
            price: self.billing_config.price.clone(),
            contract: self.billing_config.contract.clone(),
            is_spot: false,
            volumes: Vec::new(),
        };

        if let Some(over) = self.groups.get(group) {
            node.labels = merge_labels(&self.labels, &over.labels);
            node.taints = merge_taints(&self.taints, &over.taints);

            if !over.available_locations.is_empty() {
                node.available_locations = over.available_locations.clone();
            }
            // A group size below the floor is ignored, not clamped.
            if let Some(size) = over.os_volume_size.filter(|s| *s >= MIN_OS_VOLUME_SIZE) {
                node.os_volume_size = size;
            }
            if let Some(billing) = &over.billing_config {
                node.price = billing.price.clone();
                node.contract = billing.contract.clone();
            }
            if !over.additional_volumes.is_empty() {
                node.volumes = over.additional_volumes.clone();
            }
            if !over.ssh_key_ids.is_empty() {
                node.ssh_key_ids = over.ssh_key_ids.clone();
            }
            if !over.startup_script.is_empty() {
                node.startup_script = over.startup_script.clone();
            }
            for (k, v) in &over.startup_script_env {
                node.startup_script_env.insert(k.clone(), v.clone());
            }
        }

        node.is_spot = node.contract == CONTRACT_SPOT;
        node
    }
}
