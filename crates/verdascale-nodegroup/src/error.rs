use thiserror::Error;
use verdascale_cloud::CloudError;
use verdascale_config::ConfigError;
use verdascale_engine::EngineError;
use verdascale_naming::NamingError;

pub type NodeGroupResult<T> = Result<T, NodeGroupError>;

#[derive(Debug, Error)]
pub enum NodeGroupError {
    #[error("{0} is not implemented")]
    NotImplemented(&'static str),

    #[error("node {provider_id} does not belong to node group {group}")]
    ForeignNode { provider_id: String, group: String },

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Naming(#[from] NamingError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Cloud(#[from] CloudError),
}
