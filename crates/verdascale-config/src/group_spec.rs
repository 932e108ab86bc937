//! Node-group spec strings: `<min>:<max>:<instanceType>:<name>[:<hostnamePrefix>]`.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{ConfigError, ConfigResult};

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9._-]*[A-Za-z0-9])?$").expect("static regex")
});

/// Whether `name` is usable as a group name or hostname prefix.
pub fn is_valid_group_name(name: &str) -> bool {
    NAME_RE.is_match(name)
}

/// A node group as declared on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSpec {
    pub min_size: u32,
    pub max_size: u32,
    pub instance_type: String,
    pub name: String,
    pub hostname_prefix: Option<String>,
}

impl GroupSpec {
    pub fn parse(spec: &str) -> ConfigResult<Self> {
        let parts: Vec<&str> = spec.split(':').collect();
        if !(4..=5).contains(&parts.len()) {
            return Err(ConfigError::group_spec(
                spec,
                format!("expected 4 or 5 ':'-separated fields, got {}", parts.len()),
            ));
        }

        let min_size: u32 = parts[0]
            .parse()
            .map_err(|_| ConfigError::group_spec(spec, "minSize must be a non-negative integer"))?;
        let max_size: u32 = parts[1]
            .parse()
            .map_err(|_| ConfigError::group_spec(spec, "maxSize must be a non-negative integer"))?;
        if min_size > max_size {
            return Err(ConfigError::group_spec(
                spec,
                format!("minSize {min_size} exceeds maxSize {max_size}"),
            ));
        }

        let instance_type = parts[2];
        if instance_type.is_empty() {
            return Err(ConfigError::group_spec(spec, "instance type must not be empty"));
        }

        let name = parts[3];
        if !is_valid_group_name(name) {
            return Err(ConfigError::group_spec(
                spec,
                format!("invalid group name {name:?}"),
            ));
        }

        let hostname_prefix = match parts.get(4) {
            Some(prefix) if is_valid_group_name(prefix) => Some(prefix.to_string()),
            Some(prefix) => {
                return Err(ConfigError::group_spec(
                    spec,
                    format!("invalid hostname prefix {prefix:?}"),
                ));
            }
            None => None,
        };

        Ok(Self {
            min_size,
            max_size,
            instance_type: instance_type.to_string(),
            name: name.to_string(),
            hostname_prefix,
        })
    }

    /// Prefix used when minting and parsing hostnames.
    pub fn effective_prefix(&self) -> &str {
        self.hostname_prefix.as_deref().unwrap_or(&self.name)
    }
}

impl FromStr for GroupSpec {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for GroupSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.min_size, self.max_size, self.instance_type, self.name
        )?;
        if let Some(prefix) = &self.hostname_prefix {
            write!(f, ":{prefix}")?;
        }
        Ok(())
    }
}
