//! Node group definitions.

use std::fmt;
use std::sync::Arc;

use verdascale_config::GroupSpec;
use verdascale_naming::{hostname_belongs_to, is_gpu_instance_type};

/// A logical auto-scaling unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub name: String,
    pub min_size: u32,
    pub max_size: u32,
    pub instance_type: String,
    pub hostname_prefix: Option<String>,
    /// Tried in order on scale-up.
    pub locations: Vec<String>,
}

impl Group {
    pub fn from_spec(spec: &GroupSpec, locations: Vec<String>) -> Self {
        Self {
            name: spec.name.clone(),
            min_size: spec.min_size,
            max_size: spec.max_size,
            instance_type: spec.instance_type.clone(),
            hostname_prefix: spec.hostname_prefix.clone(),
            locations,
        }
    }

    /// Key embedded in the hostnames of this group's instances.
    pub fn prefix(&self) -> &str {
        self.hostname_prefix.as_deref().unwrap_or(&self.name)
    }

    pub fn owns_hostname(&self, hostname: &str) -> bool {
        hostname_belongs_to(hostname, self.prefix())
    }

    pub fn is_gpu(&self) -> bool {
        is_gpu_instance_type(&self.instance_type)
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.name, self.min_size, self.max_size)
    }
}

/// Registry record for a group.
#[derive(Debug)]
pub(crate) struct GroupEntry {
    pub group: Group,
    /// Desired instance count.
    pub cur_size: u32,
    /// Slots reserved by scale-ups whose creates have not settled yet.
    pub in_flight: u32,
    /// Declared through a node-group spec; size and type are then fixed.
    pub from_spec: bool,
    /// Serializes scale operations on this group.
    pub scale_lock: Arc<tokio::sync::Mutex<()>>,
}

impl GroupEntry {
    pub fn new(group: Group, from_spec: bool) -> Self {
        Self {
            group,
            cur_size: 0,
            in_flight: 0,
            from_spec,
            scale_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_defaults_to_name() {
        let spec = GroupSpec::parse("0:3:1H100.80S.22V:gpu").unwrap();
        let group = Group::from_spec(&spec, vec!["FIN-01".to_string()]);
        assert_eq!(group.prefix(), "gpu");
        assert!(group.is_gpu());
        assert!(group.owns_hostname("gpu-vm-fin-01-03"));
        assert_eq!(group.to_string(), "gpu (0:3)");
    }

    #[test]
    fn explicit_prefix_is_used_for_matching() {
        let spec = GroupSpec::parse("1:5:CPU.4V.16G:cpu-workers:cpu").unwrap();
        let group = Group::from_spec(&spec, Vec::new());
        assert!(group.owns_hostname("cpu-vm-fin-01-03"));
        assert!(!group.owns_hostname("cpu-workers-vm-fin-01-03"));
        assert!(!group.is_gpu());
    }
}
