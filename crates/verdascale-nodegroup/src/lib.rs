//! verdascale-nodegroup — what the autoscaling host talks to.
//!
//! [`VerdaProvider`] builds the engine from configuration and node-group
//! specs and hands out [`NodeGroup`]s; each one maps the host's contract
//! onto engine operations and reports instances as [`HostInstance`]s.

pub mod error;
pub mod instance;
pub mod node_group;
pub mod provider;

pub use error::{NodeGroupError, NodeGroupResult};
pub use instance::{ErrorClass, ErrorInfo, HostInstance, HostInstanceState};
pub use node_group::{NodeGroup, NodeGroupFuture, VerdaNodeGroup};
pub use provider::{VerdaProvider, PROVIDER_NAME};
