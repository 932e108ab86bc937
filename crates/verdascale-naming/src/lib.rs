//! verdascale-naming — how instances are named and recognised.
//!
//! The hostname is the only link between a cloud instance and the node
//! group that owns it. This crate mints hostnames, recovers the group key
//! from them, renders the `verdacloud://` providerID handed to the host,
//! and patches the startup script each new instance boots with.

pub mod error;
pub mod hostname;
pub mod labels;
pub mod provider_id;
pub mod script;

pub use error::{NamingError, NamingResult};
pub use hostname::{generate_hostname, group_key, hostname_belongs_to, MAGIC_SEPARATOR};
pub use labels::{is_gpu_instance_type, node_labels, ACCELERATOR_LABEL, NODE_GROUP_LABEL};
pub use provider_id::{InstanceRef, PROVIDER_ID_SCHEME};
pub use script::{
    inject_env_vars, instance_script_env, render_startup_script, LABELS_VAR, PROVIDER_ID_VAR,
};
