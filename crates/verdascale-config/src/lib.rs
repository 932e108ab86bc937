//! verdascale-config — adapter configuration.
//!
//! Parses the JSON adapter document into a [`CloudConfig`], validates it
//! fail-closed, and produces the effective per-group [`NodeConfig`] by
//! merging the global settings with a group override.
//!
//! Node groups themselves arrive separately as spec strings
//! (`<min>:<max>:<instanceType>:<name>[:<hostnamePrefix>]`), parsed by
//! [`GroupSpec`]. Cloud credentials are read from the environment by
//! [`Credentials`].

pub mod cloud_config;
pub mod credentials;
pub mod error;
pub mod group_spec;
pub mod merge;

pub use cloud_config::{
    AdditionalVolume, BillingConfig, CloudConfig, GroupConfig, ImageConfig, NodeConfig, Taint,
    TaintEffect, CONTRACT_SPOT, MIN_OS_VOLUME_SIZE,
};
pub use credentials::Credentials;
pub use error::{ConfigError, ConfigResult};
pub use group_spec::{is_valid_group_name, GroupSpec};
pub use merge::{merge_labels, merge_taints};
