//! Scale-up: capacity reservation, location selection and parallel creates.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, error, info, warn};
use verdascale_cloud::clock::elapsed_since;
use verdascale_cloud::{CachedCloud, CreateInstanceRequest, OsVolume, VolumeSpec};
use verdascale_config::NodeConfig;
use verdascale_naming::{
    generate_hostname, instance_script_env, node_labels, render_startup_script, InstanceRef,
};

use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};
use crate::fanout::run_bounded;
use crate::group::Group;

/// Everything a single create needs, shared by all workers of one scale-up.
#[derive(Debug)]
struct CreatePlan {
    group: Group,
    location: String,
    image: String,
    node: NodeConfig,
}

/// Optimistic `cur_size` increment, undone on drop for whatever was not
/// confirmed through [`Reservation::finish`].
struct Reservation<'a> {
    engine: &'a Engine,
    group: String,
    outstanding: u32,
}

impl<'a> Reservation<'a> {
    fn acquire(engine: &'a Engine, group: &str, delta: u32) -> EngineResult<Self> {
        let mut state = engine.write();
        let entry = state
            .groups
            .get_mut(group)
            .ok_or_else(|| EngineError::UnknownGroup(group.to_string()))?;
        let desired = entry.cur_size.saturating_add(delta);
        if desired > entry.group.max_size {
            return Err(EngineError::SizeExceedsMax {
                group: group.to_string(),
                desired,
                max: entry.group.max_size,
            });
        }
        entry.cur_size = desired;
        entry.in_flight += delta;
        debug!(group, target = desired, "capacity reserved");
        Ok(Self {
            engine,
            group: group.to_string(),
            outstanding: delta,
        })
    }

    /// Cache the created refs and give back the slots of failed creates.
    fn finish(mut self, created: &[InstanceRef]) {
        let mut state = self.engine.write();
        state.insert_refs(&self.group, created);
        let failed = self.outstanding.saturating_sub(created.len() as u32);
        state.settle_reservation(&self.group, self.outstanding, failed);
        self.outstanding = 0;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if self.outstanding == 0 {
            return;
        }
        let mut state = self.engine.write();
        state.settle_reservation(&self.group, self.outstanding, self.outstanding);
        if let Some(entry) = state.groups.get(&self.group) {
            warn!(
                group = %self.group,
                released = self.outstanding,
                target = entry.cur_size,
                "scale-up reservation rolled back"
            );
        }
    }
}

/// An uploaded startup script that must not outlive its create call.
///
/// [`ScriptGuard::release`] deletes it inline; a guard dropped without
/// release (cancelled worker) schedules the delete on the runtime.
struct ScriptGuard {
    cloud: Arc<CachedCloud>,
    id: Option<String>,
}

impl ScriptGuard {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    async fn release(mut self) {
        if let Some(id) = self.id.take() {
            delete_script(&self.cloud, &id).await;
        }
    }
}

impl Drop for ScriptGuard {
    fn drop(&mut self) {
        let Some(id) = self.id.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let cloud = Arc::clone(&self.cloud);
                handle.spawn(async move { delete_script(&cloud, &id).await });
            }
            Err(_) => error!(script_id = %id, "startup script leaked, no runtime to delete it"),
        }
    }
}

async fn delete_script(cloud: &CachedCloud, id: &str) {
    if let Err(e) = cloud.delete_startup_script(id).await {
        warn!(script_id = %id, error = %e, "failed to delete startup script");
    }
}

/// Mint `count` hostnames that collide neither with `taken` nor each other.
fn mint_hostnames(prefix: &str, location: &str, count: u32, taken: &HashSet<String>) -> Vec<String> {
    const ATTEMPTS: usize = 32;
    let mut minted: Vec<String> = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let mut hostname = generate_hostname(prefix, location);
        for _ in 1..ATTEMPTS {
            if !taken.contains(&hostname) && !minted.contains(&hostname) {
                break;
            }
            hostname = generate_hostname(prefix, location);
        }
        minted.push(hostname);
    }
    minted
}

async fn create_one(
    cloud: Arc<CachedCloud>,
    plan: Arc<CreatePlan>,
    hostname: String,
) -> Result<InstanceRef, String> {
    let group = &plan.group;
    let instance_ref = InstanceRef::new(&plan.location, &hostname);

    let labels = node_labels(&plan.node.labels, &group.name, &group.instance_type);
    let env = instance_script_env(&plan.node.startup_script_env, &instance_ref.provider_id, &labels);
    let body = render_startup_script(&plan.node.startup_script, &env)
        .map_err(|e| format!("{hostname}: startup script: {e}"))?;

    let script = cloud
        .create_startup_script(&format!("as-{}", group.name), &body)
        .await
        .map_err(|e| format!("{hostname}: upload startup script: {e}"))?;
    let guard = ScriptGuard {
        cloud: Arc::clone(&cloud),
        id: Some(script.id),
    };

    let request = CreateInstanceRequest {
        hostname: hostname.clone(),
        description: group.name.clone(),
        instance_type: group.instance_type.clone(),
        image: plan.image.clone(),
        ssh_key_ids: plan.node.ssh_key_ids.clone(),
        startup_script_id: guard.id().map(str::to_string),
        location_code: plan.location.clone(),
        contract: plan.node.contract.clone(),
        pricing: plan.node.price.clone(),
        is_spot: plan.node.is_spot,
        os_volume: OsVolume {
            name: format!("{hostname}-os-volume"),
            size: plan.node.os_volume_size,
        },
        volumes: plan
            .node
            .volumes
            .iter()
            .map(|v| VolumeSpec {
                name: v.name.clone(),
                size: v.size,
                volume_type: v.volume_type.clone(),
            })
            .collect(),
    };

    let created = cloud.create_instance(&request).await;
    guard.release().await;

    match created {
        Ok(instance) => {
            info!(group = %group.name, %hostname, id = %instance.id, location = %plan.location, "instance created");
            Ok(instance_ref)
        }
        Err(e) => {
            error!(group = %group.name, %hostname, error = %e, "instance create failed");
            Err(format!("{hostname}: {e}"))
        }
    }
}

impl Engine {
    /// Grow `name` by `delta` instances.
    ///
    /// The desired size is raised before any instance exists and lowered
    /// again for every create that does not succeed, including when the
    /// returned future is dropped midway.
    pub async fn increase_size(&self, name: &str, delta: u32) -> EngineResult<()> {
        if delta == 0 {
            return Err(EngineError::InvalidCount {
                op: "increase_size",
                count: 0,
            });
        }
        let group = self.group(name)?;
        let current = self.target_size(name)?;
        if current.saturating_add(delta) > group.max_size {
            return Err(EngineError::SizeExceedsMax {
                group: group.name,
                desired: current.saturating_add(delta),
                max: group.max_size,
            });
        }

        let lock = self.scale_lock(name)?;
        let _scaling = lock.lock().await;

        let last_failure = self.read().last_failure_check.get(name).copied();
        if let Some(at) = last_failure {
            let elapsed = elapsed_since(self.clock.now(), at);
            if elapsed < self.options.failure_backoff {
                return Err(EngineError::FailureBackoffActive {
                    group: name.to_string(),
                    remaining: self.options.failure_backoff - elapsed,
                });
            }
        }

        let reservation = Reservation::acquire(self, name, delta)?;
        // Re-read under the scale lock; locations may have been re-registered.
        let group = self.group(name)?;

        let location = self
            .cloud
            .first_available_location(&group.instance_type, &group.locations)
            .await?
            .ok_or_else(|| EngineError::NoCapacity {
                instance_type: group.instance_type.clone(),
                locations: group.locations.clone(),
            })?;

        let node = self.config.node_config(&group.name);
        let image = node.image_for(group.is_gpu()).to_string();
        if image.is_empty() {
            return Err(EngineError::MissingImage {
                instance_type: group.instance_type.clone(),
            });
        }

        info!(group = %group.name, delta, %location, "scaling up");
        let plan = Arc::new(CreatePlan {
            group,
            location,
            image,
            node,
        });
        let taken: HashSet<String> = self
            .read()
            .instance_to_group
            .keys()
            .map(|r| r.hostname.clone())
            .collect();
        let jobs: Vec<_> = mint_hostnames(plan.group.prefix(), &plan.location, delta, &taken)
            .into_iter()
            .map(|hostname| create_one(Arc::clone(&self.cloud), Arc::clone(&plan), hostname))
            .collect();
        let outcomes = run_bounded(self.options.create_concurrency, jobs).await;

        let mut created = Vec::new();
        let mut errors = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(r) => created.push(r),
                Err(e) => errors.push(e),
            }
        }
        reservation.finish(&created);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(EngineError::PartialScale {
                group: name.to_string(),
                op: "create",
                failed: errors.len() as u32,
                requested: delta,
                errors,
            })
        }
    }
}
