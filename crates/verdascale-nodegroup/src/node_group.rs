//! The host-facing node group contract.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{debug, info};
use verdascale_engine::{Engine, EngineError, Group};
use verdascale_naming::{group_key, node_labels, InstanceRef};

use crate::error::{NodeGroupError, NodeGroupResult};
use crate::instance::HostInstance;

pub type NodeGroupFuture<'a, T> = Pin<Box<dyn Future<Output = NodeGroupResult<T>> + Send + 'a>>;

/// A set of identically configured nodes the host can grow and shrink.
///
/// Nodes are identified by their providerID throughout.
pub trait NodeGroup: Send + Sync {
    fn id(&self) -> &str;

    fn min_size(&self) -> u32;

    fn max_size(&self) -> u32;

    /// Desired number of nodes.
    fn target_size(&self) -> NodeGroupResult<u32>;

    fn increase_size(&self, delta: i64) -> NodeGroupFuture<'_, ()>;

    fn atomic_increase_size(&self, _delta: i64) -> NodeGroupFuture<'_, ()> {
        Box::pin(async { Err(NodeGroupError::NotImplemented("atomic_increase_size")) })
    }

    /// Delete the given nodes, refusing up front if that would cross min size.
    fn delete_nodes<'a>(&'a self, provider_ids: &'a [String]) -> NodeGroupFuture<'a, ()>;

    fn force_delete_nodes<'a>(&'a self, _provider_ids: &'a [String]) -> NodeGroupFuture<'a, ()> {
        Box::pin(async { Err(NodeGroupError::NotImplemented("force_delete_nodes")) })
    }

    /// Shrink by `-delta` instances. Only negative deltas are accepted.
    fn decrease_target_size(&self, delta: i64) -> NodeGroupFuture<'_, ()>;

    fn nodes(&self) -> NodeGroupFuture<'_, Vec<HostInstance>>;

    fn belongs(&self, provider_id: &str) -> NodeGroupResult<bool>;

    fn exist(&self) -> bool;

    fn debug(&self) -> String;

    fn autoprovisioned(&self) -> bool {
        false
    }

    fn create(&self) -> NodeGroupResult<()> {
        Err(NodeGroupError::NotImplemented("create"))
    }

    fn delete(&self) -> NodeGroupFuture<'_, ()> {
        Box::pin(async { Err(NodeGroupError::NotImplemented("delete")) })
    }

    /// Labels a new node of this group would register with.
    fn template_labels(&self) -> Vec<String>;
}

/// [`NodeGroup`] backed by the engine.
#[derive(Debug, Clone)]
pub struct VerdaNodeGroup {
    engine: Arc<Engine>,
    group: Group,
}

impl VerdaNodeGroup {
    pub fn new(engine: Arc<Engine>, group: Group) -> Self {
        Self { engine, group }
    }

    pub fn group(&self) -> &Group {
        &self.group
    }

    /// Latest registered definition, falling back to the one captured at construction.
    fn current(&self) -> Group {
        self.engine
            .group(&self.group.name)
            .unwrap_or_else(|_| self.group.clone())
    }
}

fn positive_count(op: &'static str, count: i64) -> NodeGroupResult<u32> {
    u32::try_from(count)
        .ok()
        .filter(|c| *c > 0)
        .ok_or(NodeGroupError::Engine(EngineError::InvalidCount { op, count }))
}

impl NodeGroup for VerdaNodeGroup {
    fn id(&self) -> &str {
        &self.group.name
    }

    fn min_size(&self) -> u32 {
        self.current().min_size
    }

    fn max_size(&self) -> u32 {
        self.current().max_size
    }

    fn target_size(&self) -> NodeGroupResult<u32> {
        Ok(self.engine.target_size(&self.group.name)?)
    }

    fn increase_size(&self, delta: i64) -> NodeGroupFuture<'_, ()> {
        Box::pin(async move {
            let delta = positive_count("increase_size", delta)?;
            self.engine.increase_size(&self.group.name, delta).await?;
            Ok(())
        })
    }

    fn delete_nodes<'a>(&'a self, provider_ids: &'a [String]) -> NodeGroupFuture<'a, ()> {
        Box::pin(async move {
            let group = self.current();
            let mut refs = Vec::with_capacity(provider_ids.len());
            for provider_id in provider_ids {
                let r = InstanceRef::from_provider_id(provider_id)?;
                if !group.owns_hostname(&r.hostname) {
                    return Err(NodeGroupError::ForeignNode {
                        provider_id: provider_id.clone(),
                        group: group.name,
                    });
                }
                refs.push(r);
            }

            let target = self.engine.target_size(&group.name)?;
            let count = provider_ids.len() as u32;
            if target.saturating_sub(count) < group.min_size || count > target {
                return Err(EngineError::WouldViolateMinSize {
                    group: group.name,
                    active: target,
                    count,
                    min: group.min_size,
                }
                .into());
            }

            for r in &refs {
                debug!(group = %group.name, provider_id = %r.provider_id, "deleting node");
                self.engine.delete_instance(r).await?;
            }
            info!(group = %group.name, count, "nodes deleted");
            Ok(())
        })
    }

    fn decrease_target_size(&self, delta: i64) -> NodeGroupFuture<'_, ()> {
        Box::pin(async move {
            let count = positive_count("decrease_target_size", delta.saturating_neg())?;
            self.engine
                .decrease_target_size(&self.group.name, count)
                .await?;
            Ok(())
        })
    }

    fn nodes(&self) -> NodeGroupFuture<'_, Vec<HostInstance>> {
        Box::pin(async move {
            let instances = self.engine.instances(&self.group.name).await?;
            Ok(instances.iter().map(HostInstance::from_instance).collect())
        })
    }

    fn belongs(&self, provider_id: &str) -> NodeGroupResult<bool> {
        let r = InstanceRef::from_provider_id(provider_id)?;
        let key = group_key(&r.hostname)?;
        Ok(key.eq_ignore_ascii_case(&self.current().prefix().replace('.', "-")))
    }

    fn exist(&self) -> bool {
        self.engine.group(&self.group.name).is_ok()
    }

    fn debug(&self) -> String {
        self.current().to_string()
    }

    fn template_labels(&self) -> Vec<String> {
        let group = self.current();
        let node = self.engine.config().node_config(&group.name);
        node_labels(&node.labels, &group.name, &group.instance_type)
    }
}
