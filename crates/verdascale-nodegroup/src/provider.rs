//! Provider facade: builds the engine and hands out node groups.

use std::sync::Arc;

use tracing::{debug, info};
use verdascale_cloud::{CloudClient, Clock, InstanceTypeInfo};
use verdascale_config::{CloudConfig, GroupSpec};
use verdascale_engine::{Engine, EngineOptions};
use verdascale_naming::{InstanceRef, ACCELERATOR_LABEL};

use crate::error::NodeGroupResult;
use crate::node_group::{NodeGroup, VerdaNodeGroup};

/// Name the host knows this provider by.
pub const PROVIDER_NAME: &str = "verdacloud";

pub struct VerdaProvider {
    engine: Arc<Engine>,
}

impl VerdaProvider {
    /// Validate `config`, parse `specs` and register one node group per spec.
    pub fn new(
        config: CloudConfig,
        specs: &[String],
        cloud: Arc<dyn CloudClient>,
        options: EngineOptions,
    ) -> NodeGroupResult<Self> {
        Self::build(config, specs, |config| Engine::new(cloud, config, options))
    }

    pub fn with_clock(
        config: CloudConfig,
        specs: &[String],
        cloud: Arc<dyn CloudClient>,
        options: EngineOptions,
        clock: Arc<dyn Clock>,
    ) -> NodeGroupResult<Self> {
        Self::build(config, specs, |config| {
            Engine::with_clock(cloud, config, options, clock)
        })
    }

    fn build(
        config: CloudConfig,
        specs: &[String],
        engine: impl FnOnce(CloudConfig) -> Engine,
    ) -> NodeGroupResult<Self> {
        config.validate()?;
        let specs = specs
            .iter()
            .map(|s| GroupSpec::parse(s))
            .collect::<Result<Vec<_>, _>>()?;

        let engine = engine(config);
        engine.register_specs(&specs);
        info!(provider = PROVIDER_NAME, groups = specs.len(), "provider initialised");
        Ok(Self {
            engine: Arc::new(engine),
        })
    }

    pub fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    pub fn node_groups(&self) -> Vec<Arc<dyn NodeGroup>> {
        self.engine
            .groups()
            .into_iter()
            .map(|g| Arc::new(VerdaNodeGroup::new(Arc::clone(&self.engine), g)) as Arc<dyn NodeGroup>)
            .collect()
    }

    /// Group owning the node with `provider_id`. `Ok(None)` for nodes this
    /// provider does not manage.
    pub fn node_group_for_node(&self, provider_id: &str) -> NodeGroupResult<Option<Arc<dyn NodeGroup>>> {
        let r = InstanceRef::from_provider_id(provider_id)?;
        let group = self.engine.find_group_for_instance(&r).or_else(|| {
            self.engine
                .groups()
                .into_iter()
                .find(|g| g.owns_hostname(&r.hostname))
        });
        match group {
            Some(g) => {
                let group: Arc<dyn NodeGroup> = Arc::new(VerdaNodeGroup::new(Arc::clone(&self.engine), g));
                Ok(Some(group))
            }
            None => {
                debug!(%provider_id, "node not managed by any group");
                Ok(None)
            }
        }
    }

    /// Throttled reconciliation; call once per host loop.
    pub async fn refresh(&self) -> NodeGroupResult<()> {
        Ok(self.engine.refresh().await?)
    }

    /// Drop cached API state before shutdown.
    pub fn cleanup(&self) {
        self.engine.cloud().invalidate();
        info!(provider = PROVIDER_NAME, "provider cleaned up");
    }

    /// Node label carrying the accelerator type.
    pub fn gpu_label(&self) -> &'static str {
        ACCELERATOR_LABEL
    }

    pub async fn instance_type_info(&self, instance_type: &str) -> NodeGroupResult<Option<InstanceTypeInfo>> {
        let types = self.engine.cloud().list_instance_types().await?;
        Ok(types.into_iter().find(|t| t.instance_type == instance_type))
    }
}

impl std::fmt::Debug for VerdaProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerdaProvider")
            .field("groups", &self.engine.groups().len())
            .finish()
    }
}
