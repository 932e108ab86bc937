//! Reconciliation of the caches against the instance list.

use std::collections::HashSet;

use tracing::{debug, error, info, warn};
use verdascale_cloud::clock::elapsed_since;
use verdascale_cloud::Instance;
use verdascale_naming::InstanceRef;

use crate::engine::Engine;
use crate::error::EngineResult;
use crate::group::Group;

/// What one pass observed for a single group.
#[derive(Debug, Default)]
struct Observation {
    active: Vec<InstanceRef>,
    seen: HashSet<String>,
    failed: Vec<String>,
}

fn observe(group: &Group, all: &[Instance]) -> Observation {
    let mut obs = Observation::default();
    for instance in all.iter().filter(|i| group.owns_hostname(&i.hostname)) {
        obs.seen.insert(instance.hostname.clone());
        if instance.status.is_active() {
            obs.active
                .push(InstanceRef::new(&instance.location, &instance.hostname));
        } else if instance.status.is_provisioning_failed() {
            obs.failed.push(instance.hostname.clone());
        }
    }
    obs
}

impl Engine {
    /// Reconcile unless the last pass finished less than the refresh interval ago.
    pub async fn refresh(&self) -> EngineResult<()> {
        if self.refresh_is_recent() {
            return Ok(());
        }
        let _serial = self.refresh_lock.lock().await;
        // A concurrent caller may have reconciled while we waited.
        if self.refresh_is_recent() {
            return Ok(());
        }
        self.reconcile().await
    }

    /// Reconcile now, regardless of when the last pass ran.
    pub async fn force_refresh(&self) -> EngineResult<()> {
        let _serial = self.refresh_lock.lock().await;
        self.reconcile().await
    }

    fn refresh_is_recent(&self) -> bool {
        let Some(last) = self.read().last_refresh else {
            return false;
        };
        let elapsed = elapsed_since(self.clock.now(), last);
        if elapsed < self.options.refresh_interval {
            debug!(?elapsed, "refresh throttled");
            return true;
        }
        false
    }

    /// One reconciliation pass. Callers hold `refresh_lock`.
    async fn reconcile(&self) -> EngineResult<()> {
        let groups = self.groups();
        let all = self.cloud.list_instances_fresh(None).await?;
        let observations: Vec<(Group, Observation)> = groups
            .into_iter()
            .map(|g| {
                let obs = observe(&g, &all);
                (g, obs)
            })
            .collect();

        let now = self.clock.now();
        let mut cleanup = Vec::new();
        {
            let mut state = self.write();

            for (group, obs) in &observations {
                if !state.groups.contains_key(&group.name) {
                    continue;
                }
                state.reconcile_group(
                    &group.name,
                    obs.active.clone(),
                    &obs.seen,
                    obs.failed.len(),
                );
            }
            state.rebuild_instance_index();

            let ttl = self.options.failure_entry_ttl;
            state
                .failed_instances
                .retain(|_, first_seen| elapsed_since(now, *first_seen) < ttl);

            for (group, obs) in &observations {
                if obs.failed.is_empty() {
                    continue;
                }
                for hostname in &obs.failed {
                    let first_seen = *state
                        .failed_instances
                        .entry(hostname.clone())
                        .or_insert(now);
                    if elapsed_since(now, first_seen) >= self.options.stuck_failure_cleanup {
                        cleanup.push(hostname.clone());
                    }
                }
                state.last_failure_check.insert(group.name.clone(), now);
                warn!(
                    group = %group.name,
                    failed = obs.failed.len(),
                    "failed instances observed, scale-up backoff started"
                );
            }
        }

        for hostname in cleanup {
            let Some(instance) = all.iter().find(|i| i.hostname == hostname) else {
                continue;
            };
            match self.cloud.delete_instance(&instance.id).await {
                Ok(()) => {
                    info!(%hostname, id = %instance.id, "deleted stuck failed instance");
                    self.write().failed_instances.remove(&hostname);
                }
                Err(e) => {
                    error!(%hostname, id = %instance.id, error = %e, "failed to delete stuck instance");
                }
            }
        }

        self.write().last_refresh = Some(now);
        debug!(instances = all.len(), "refresh complete");
        Ok(())
    }
}
