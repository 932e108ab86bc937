//! Engine registry, lookups and cache inspection.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info, warn};
use verdascale_cloud::{CachedCloud, Clock, CloudClient, Instance, InstanceStatus, SystemClock};
use verdascale_config::{CloudConfig, GroupSpec};
use verdascale_naming::InstanceRef;

use crate::error::{EngineError, EngineResult};
use crate::group::{Group, GroupEntry};
use crate::options::EngineOptions;
use crate::state::{read_state, write_state, CacheState, Snapshot};

/// The node-group state engine.
///
/// Holds the registered groups, their desired sizes and the
/// group/instance caches, and drives the cloud to converge on them.
/// Share it behind an `Arc`; all methods take `&self`.
pub struct Engine {
    pub(crate) cloud: Arc<CachedCloud>,
    pub(crate) config: Arc<CloudConfig>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) options: EngineOptions,
    pub(crate) state: RwLock<CacheState>,
    /// Serializes reconciliations.
    pub(crate) refresh_lock: tokio::sync::Mutex<()>,
}

impl Engine {
    pub fn new(cloud: Arc<dyn CloudClient>, config: CloudConfig, options: EngineOptions) -> Self {
        Self::with_clock(cloud, config, options, Arc::new(SystemClock))
    }

    pub fn with_clock(
        cloud: Arc<dyn CloudClient>,
        config: CloudConfig,
        options: EngineOptions,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let cached = CachedCloud::new(cloud, Arc::clone(&clock))
            .with_ttl(options.list_cache_ttl)
            .with_call_timeout(options.call_timeout);
        Self {
            cloud: Arc::new(cached),
            config: Arc::new(config),
            clock,
            options,
            state: RwLock::new(CacheState::default()),
            refresh_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, CacheState> {
        read_state(&self.state)
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, CacheState> {
        write_state(&self.state)
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn config(&self) -> &CloudConfig {
        &self.config
    }

    pub fn cloud(&self) -> &Arc<CachedCloud> {
        &self.cloud
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    // ── Registry ─────────────────────────────────────────────────

    /// Register every group of `specs`, taking locations from the config.
    pub fn register_specs(&self, specs: &[GroupSpec]) {
        for spec in specs {
            let locations = self.config.node_config(&spec.name).available_locations;
            self.register_entry(Group::from_spec(spec, locations), true);
        }
        info!(groups = specs.len(), "registered node groups");
    }

    /// Register a group. Returns `true` if it was not known before.
    ///
    /// Re-registering a spec-declared group only refreshes its locations;
    /// other groups also take the new size bounds and instance type.
    pub fn register(&self, group: Group) -> bool {
        self.register_entry(group, false)
    }

    fn register_entry(&self, group: Group, from_spec: bool) -> bool {
        let mut state = self.write();
        match state.groups.get_mut(&group.name) {
            Some(existing) => {
                if existing.group == group {
                    return false;
                }
                if !existing.from_spec && !from_spec {
                    existing.group.min_size = group.min_size;
                    existing.group.max_size = group.max_size;
                    existing.group.instance_type = group.instance_type;
                }
                existing.from_spec |= from_spec;
                existing.group.locations = group.locations;
                debug!(group = %existing.group.name, "group re-registered");
                false
            }
            None => {
                debug!(group = %group.name, "group registered");
                state
                    .groups
                    .insert(group.name.clone(), GroupEntry::new(group, from_spec));
                true
            }
        }
    }

    pub fn group(&self, name: &str) -> EngineResult<Group> {
        self.read()
            .groups
            .get(name)
            .map(|e| e.group.clone())
            .ok_or_else(|| EngineError::UnknownGroup(name.to_string()))
    }

    pub fn groups(&self) -> Vec<Group> {
        self.read().groups.values().map(|e| e.group.clone()).collect()
    }

    /// Desired size of `name`.
    pub fn target_size(&self, name: &str) -> EngineResult<u32> {
        self.read()
            .groups
            .get(name)
            .map(|e| e.cur_size)
            .ok_or_else(|| EngineError::UnknownGroup(name.to_string()))
    }

    /// Owning group of a cached instance, matched by ref first and then by hostname.
    pub fn find_group_for_instance(&self, r: &InstanceRef) -> Option<Group> {
        let state = self.read();
        let name = state
            .instance_to_group
            .get(r)
            .map(String::as_str)
            .or_else(|| state.find_by_hostname(&r.hostname).map(|(_, g)| g));
        match name.and_then(|n| state.groups.get(n)) {
            Some(entry) => Some(entry.group.clone()),
            None => {
                debug!(hostname = %r.hostname, "instance not found in cache");
                None
            }
        }
    }

    pub(crate) fn scale_lock(&self, name: &str) -> EngineResult<Arc<tokio::sync::Mutex<()>>> {
        self.read()
            .groups
            .get(name)
            .map(|e| Arc::clone(&e.scale_lock))
            .ok_or_else(|| EngineError::UnknownGroup(name.to_string()))
    }

    // ── Inspection ───────────────────────────────────────────────

    pub fn instance_refs(&self, name: &str) -> EngineResult<Vec<InstanceRef>> {
        let state = self.read();
        if !state.groups.contains_key(name) {
            return Err(EngineError::UnknownGroup(name.to_string()));
        }
        Ok(state.group_to_instances.get(name).cloned().unwrap_or_default())
    }

    /// Cached instances of `name`, resolved through the list cache.
    ///
    /// Refs the API has not surfaced yet come back as `ordered`
    /// placeholders, so the host never loses sight of a pending create.
    pub async fn instances(&self, name: &str) -> EngineResult<Vec<Instance>> {
        let group = self.group(name)?;
        let refs = self.instance_refs(name)?;
        if refs.is_empty() {
            return Ok(Vec::new());
        }

        let listed = match self.cloud.list_instances_cached().await {
            Ok(list) => Some(list),
            Err(e) => {
                warn!(group = %name, error = %e, "instance list unavailable, returning placeholders");
                None
            }
        };

        let now = self.clock.now();
        Ok(refs
            .into_iter()
            .map(|r| {
                listed
                    .as_ref()
                    .and_then(|list| list.iter().find(|i| i.hostname == r.hostname).cloned())
                    .unwrap_or_else(|| Instance {
                        id: r.provider_id.clone(),
                        location: r.location().unwrap_or_default().to_string(),
                        hostname: r.hostname,
                        status: InstanceStatus::Ordered,
                        instance_type: group.instance_type.clone(),
                        created_at: now,
                    })
            })
            .collect())
    }

    /// Consistent copy of the caches.
    pub fn snapshot(&self) -> Snapshot {
        self.read().snapshot()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
