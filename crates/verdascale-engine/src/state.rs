//! Cache state guarded by the engine's cache lock.
//!
//! Every method here is synchronous; callers hold the write guard only
//! for the duration of one call and never across an `.await`.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::SystemTime;

use tracing::{debug, warn};
use verdascale_naming::InstanceRef;

use crate::group::{Group, GroupEntry};

#[derive(Debug, Default)]
pub(crate) struct CacheState {
    pub groups: BTreeMap<String, GroupEntry>,
    pub group_to_instances: BTreeMap<String, Vec<InstanceRef>>,
    pub instance_to_group: HashMap<InstanceRef, String>,
    /// hostname -> first time the failure was observed.
    pub failed_instances: HashMap<String, SystemTime>,
    /// group -> start of the current backoff window.
    pub last_failure_check: HashMap<String, SystemTime>,
    pub last_refresh: Option<SystemTime>,
}

pub(crate) fn read_state(lock: &RwLock<CacheState>) -> RwLockReadGuard<'_, CacheState> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

pub(crate) fn write_state(lock: &RwLock<CacheState>) -> RwLockWriteGuard<'_, CacheState> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

impl CacheState {
    /// Cache refs just created for `group`.
    /// A reconciliation may already have cached some of them.
    pub fn insert_refs(&mut self, group: &str, refs: &[InstanceRef]) {
        let cached = self.group_to_instances.entry(group.to_string()).or_default();
        for r in refs {
            self.instance_to_group.insert(r.clone(), group.to_string());
            if !cached.contains(r) {
                cached.push(r.clone());
            }
        }
    }

    /// Settle `outstanding` reserved slots of `group`, of which `unfilled`
    /// produced no instance. The target never drops below the refs cached.
    pub fn settle_reservation(&mut self, group: &str, outstanding: u32, unfilled: u32) {
        let cached = self.group_to_instances.get(group).map_or(0, Vec::len) as u32;
        if let Some(entry) = self.groups.get_mut(group) {
            entry.in_flight = entry.in_flight.saturating_sub(outstanding);
            entry.cur_size = entry.cur_size.saturating_sub(unfilled).max(cached);
        }
    }

    /// Cached ref with `hostname`, and its group.
    pub fn find_by_hostname(&self, hostname: &str) -> Option<(&InstanceRef, &str)> {
        self.instance_to_group
            .iter()
            .find(|(r, _)| r.hostname == hostname)
            .map(|(r, g)| (r, g.as_str()))
    }

    /// Drop a confirmed-deleted instance from the caches and shrink the
    /// group. Returns false when nothing was cached under `hostname`.
    pub fn remove_hostname(&mut self, group: &str, hostname: &str) -> bool {
        let Some(r) = self.find_by_hostname(hostname).map(|(r, _)| r.clone()) else {
            return false;
        };
        self.instance_to_group.remove(&r);
        if let Some(refs) = self.group_to_instances.get_mut(group) {
            refs.retain(|x| x.hostname != hostname);
        }
        if let Some(entry) = self.groups.get_mut(group) {
            entry.cur_size = entry.cur_size.saturating_sub(1);
        }
        true
    }

    /// Apply one reconciliation observation to `group`.
    ///
    /// `active` are refs for the group's active API instances, `seen` every
    /// hostname the API reported for the group in any status.
    pub fn reconcile_group(
        &mut self,
        group: &str,
        active: Vec<InstanceRef>,
        seen: &HashSet<String>,
        failed: usize,
    ) {
        let Some(entry) = self.groups.get_mut(group) else {
            return;
        };
        let cur_size = entry.cur_size as usize;
        let active_count = active.len();
        let mut refs = active;

        // Keep refs the API has not surfaced yet, up to the desired size.
        if refs.len() < cur_size {
            let previous = self.group_to_instances.get(group).cloned().unwrap_or_default();
            for old in previous {
                if refs.len() >= cur_size {
                    break;
                }
                if !seen.contains(&old.hostname) && !refs.contains(&old) {
                    refs.push(old);
                }
            }
        }

        if active_count > cur_size {
            debug!(group, from = cur_size, to = active_count, "raising target size to observed");
            entry.cur_size = active_count as u32;
        } else if failed > 0 && cur_size > active_count {
            // Slots of creates still running are not ours to give back.
            let floor = active_count + entry.in_flight as usize;
            if cur_size > floor {
                warn!(
                    group,
                    from = cur_size,
                    to = floor,
                    failed,
                    "lowering target size after failed instances"
                );
                entry.cur_size = floor as u32;
            }
            refs.truncate(active_count);
        }

        self.group_to_instances.insert(group.to_string(), refs);
    }

    /// Rebuild the reverse index from `group_to_instances`.
    pub fn rebuild_instance_index(&mut self) {
        self.instance_to_group = self
            .group_to_instances
            .iter()
            .flat_map(|(g, refs)| refs.iter().map(move |r| (r.clone(), g.clone())))
            .collect();
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            groups: self
                .groups
                .iter()
                .map(|(name, entry)| {
                    (
                        name.clone(),
                        GroupSnapshot {
                            group: entry.group.clone(),
                            cur_size: entry.cur_size,
                            instances: self
                                .group_to_instances
                                .get(name)
                                .cloned()
                                .unwrap_or_default(),
                        },
                    )
                })
                .collect(),
            instance_to_group: self
                .instance_to_group
                .iter()
                .map(|(r, g)| (r.clone(), g.clone()))
                .collect(),
            failed_instances: self
                .failed_instances
                .iter()
                .map(|(h, t)| (h.clone(), *t))
                .collect(),
            last_failure_check: self
                .last_failure_check
                .iter()
                .map(|(g, t)| (g.clone(), *t))
                .collect(),
            last_refresh: self.last_refresh,
        }
    }
}

/// Point-in-time copy of one group's state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSnapshot {
    pub group: Group,
    pub cur_size: u32,
    pub instances: Vec<InstanceRef>,
}

/// Consistent copy of the engine caches, taken under one read lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub groups: BTreeMap<String, GroupSnapshot>,
    pub instance_to_group: BTreeMap<InstanceRef, String>,
    pub failed_instances: BTreeMap<String, SystemTime>,
    pub last_failure_check: BTreeMap<String, SystemTime>,
    pub last_refresh: Option<SystemTime>,
}

impl Snapshot {
    pub fn cur_size(&self, group: &str) -> Option<u32> {
        self.groups.get(group).map(|g| g.cur_size)
    }

    pub fn instances(&self, group: &str) -> &[InstanceRef] {
        self.groups
            .get(group)
            .map(|g| g.instances.as_slice())
            .unwrap_or(&[])
    }

    /// Cached refs never exceed the desired size, which never exceeds max,
    /// and the reverse index is exactly the inverse of the forward one.
    pub fn check_invariants(&self) -> Result<(), String> {
        for (name, g) in &self.groups {
            if g.instances.len() as u32 > g.cur_size {
                return Err(format!(
                    "{name}: {} cached refs exceed target size {}",
                    g.instances.len(),
                    g.cur_size
                ));
            }
            if g.cur_size > g.group.max_size {
                return Err(format!(
                    "{name}: target size {} exceeds max {}",
                    g.cur_size, g.group.max_size
                ));
            }
            for r in &g.instances {
                if self.instance_to_group.get(r) != Some(name) {
                    return Err(format!("{name}: {r} missing from reverse index"));
                }
            }
        }
        let forward: usize = self.groups.values().map(|g| g.instances.len()).sum();
        if forward != self.instance_to_group.len() {
            return Err(format!(
                "reverse index has {} entries, forward has {forward}",
                self.instance_to_group.len()
            ));
        }
        Ok(())
    }
}
