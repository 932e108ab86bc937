//! Scale-down, targeted deletes and group removal.

use std::cmp::Reverse;
use std::sync::Arc;

use tracing::{info, warn};
use verdascale_cloud::Instance;
use verdascale_naming::InstanceRef;

use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};
use crate::fanout::run_bounded;

/// Youngest first, hostname breaking ties.
fn pick_victims(mut active: Vec<Instance>, count: usize) -> Vec<Instance> {
    active.sort_by(|a, b| {
        Reverse(a.created_at)
            .cmp(&Reverse(b.created_at))
            .then_with(|| a.hostname.cmp(&b.hostname))
    });
    active.truncate(count);
    active
}

impl Engine {
    /// Delete `count` active instances of `name`.
    pub async fn decrease_target_size(&self, name: &str, count: u32) -> EngineResult<()> {
        if count == 0 {
            return Err(EngineError::InvalidCount {
                op: "decrease_target_size",
                count: 0,
            });
        }
        let group = self.group(name)?;
        let lock = self.scale_lock(name)?;
        let _scaling = lock.lock().await;

        let active = self.cloud.active_instances_for_group(group.prefix()).await?;
        let active_count = active.len() as u32;
        if active_count < count {
            return Err(EngineError::InsufficientInstances {
                group: group.name,
                active: active_count,
                requested: count,
            });
        }
        if active_count - count < group.min_size {
            return Err(EngineError::WouldViolateMinSize {
                group: group.name,
                active: active_count,
                count,
                min: group.min_size,
            });
        }

        let victims = pick_victims(active, count as usize);
        info!(group = %group.name, count, "scaling down");
        let errors = self.delete_all(&group.name, victims).await;

        if errors.is_empty() {
            Ok(())
        } else {
            Err(EngineError::PartialScale {
                group: group.name,
                op: "delete",
                failed: errors.len() as u32,
                requested: count,
                errors,
            })
        }
    }

    /// Delete one specific instance, keeping its group at or above min size.
    pub async fn delete_instance(&self, instance: &InstanceRef) -> EngineResult<()> {
        let group = self
            .find_group_for_instance(instance)
            .ok_or_else(|| EngineError::InstanceNotFound(instance.provider_id.clone()))?;
        let lock = self.scale_lock(&group.name)?;
        let _scaling = lock.lock().await;

        let active = self.cloud.active_instances_for_group(group.prefix()).await?;
        let active_count = active.len() as u32;
        if active_count <= group.min_size {
            return Err(EngineError::WouldViolateMinSize {
                group: group.name,
                active: active_count,
                count: 1,
                min: group.min_size,
            });
        }

        let id = match active.iter().find(|i| i.hostname == instance.hostname) {
            Some(found) => found.id.clone(),
            None => self
                .cloud
                .instance_by_hostname(&instance.hostname)
                .await?
                .map(|i| i.id)
                .ok_or_else(|| EngineError::InstanceNotFound(instance.provider_id.clone()))?,
        };

        self.cloud.delete_instance(&id).await?;
        self.write().remove_hostname(&group.name, &instance.hostname);
        info!(group = %group.name, hostname = %instance.hostname, %id, "instance deleted");
        Ok(())
    }

    /// Delete every cached instance of `name`, then forget the group.
    ///
    /// The group stays registered if any delete fails.
    pub async fn delete_group(&self, name: &str) -> EngineResult<()> {
        let lock = self.scale_lock(name)?;
        let _scaling = lock.lock().await;

        let refs = self.instance_refs(name)?;
        let mut victims = Vec::with_capacity(refs.len());
        for r in &refs {
            match self.cloud.instance_by_hostname(&r.hostname).await? {
                Some(instance) => victims.push(instance),
                None => warn!(group = name, hostname = %r.hostname, "cached instance not listed, skipping"),
            }
        }
        let errors = self.delete_all(name, victims).await;

        if !errors.is_empty() {
            return Err(EngineError::PartialScale {
                group: name.to_string(),
                op: "delete",
                failed: errors.len() as u32,
                requested: refs.len() as u32,
                errors,
            });
        }

        let mut state = self.write();
        state.groups.remove(name);
        if let Some(refs) = state.group_to_instances.remove(name) {
            for r in refs {
                state.instance_to_group.remove(&r);
            }
        }
        state.last_failure_check.remove(name);
        info!(group = name, "node group deleted");
        Ok(())
    }

    /// Delete `victims` in parallel, dropping each confirmed delete from
    /// the caches. Returns the failures.
    async fn delete_all(&self, group: &str, victims: Vec<Instance>) -> Vec<String> {
        let jobs: Vec<_> = victims
            .into_iter()
            .map(|victim| {
                let cloud = Arc::clone(&self.cloud);
                async move {
                    match cloud.delete_instance(&victim.id).await {
                        Ok(()) => Ok(victim.hostname),
                        Err(e) => Err(format!("{}: {e}", victim.hostname)),
                    }
                }
            })
            .collect();
        let outcomes = run_bounded(self.options.create_concurrency, jobs).await;

        let mut errors = Vec::new();
        let mut state = self.write();
        for outcome in outcomes {
            match outcome {
                Ok(hostname) => {
                    if !state.remove_hostname(group, &hostname) {
                        // Observed but never cached: still one fewer instance.
                        let cached = state.group_to_instances.get(group).map_or(0, Vec::len);
                        if let Some(entry) = state.groups.get_mut(group) {
                            if (entry.cur_size as usize) > cached {
                                entry.cur_size -= 1;
                            }
                        }
                    }
                    info!(group, %hostname, "instance deleted");
                }
                Err(e) => {
                    warn!(group, error = %e, "instance delete failed");
                    errors.push(e);
                }
            }
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};
    use verdascale_cloud::InstanceStatus;

    fn instance(host: &str, age_secs: u64) -> Instance {
        Instance {
            id: format!("id-{host}"),
            hostname: host.to_string(),
            location: "FIN-01".to_string(),
            status: InstanceStatus::Running,
            instance_type: "CPU.4V.16G".to_string(),
            created_at: SystemTime::UNIX_EPOCH + Duration::from_secs(1_000 - age_secs),
        }
    }

    #[test]
    fn victims_are_youngest_first() {
        let active = vec![
            instance("cpu-vm-fin-01-01", 300),
            instance("cpu-vm-fin-01-02", 10),
            instance("cpu-vm-fin-01-03", 10),
            instance("cpu-vm-fin-01-04", 100),
        ];
        let hosts: Vec<_> = pick_victims(active, 3)
            .into_iter()
            .map(|i| i.hostname)
            .collect();
        assert_eq!(hosts, vec!["cpu-vm-fin-01-02", "cpu-vm-fin-01-03", "cpu-vm-fin-01-04"]);
    }
}
