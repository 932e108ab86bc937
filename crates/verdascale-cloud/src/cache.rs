//! List cache and per-call deadline around a [`CloudClient`].
//!
//! A single host tick may ask for the nodes of every group. One list
//! call feeds all of them for `ttl`; any mutation drops the cached list.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime};

use tracing::{debug, warn};
use verdascale_naming::hostname_belongs_to;

use crate::client::CloudClient;
use crate::clock::{elapsed_since, Clock};
use crate::error::{CloudError, CloudResult};
use crate::types::{
    CreateInstanceRequest, Instance, InstanceAction, InstanceStatus, InstanceTypeInfo,
    StartupScript,
};

pub const DEFAULT_LIST_TTL: Duration = Duration::from_secs(30);
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);

struct CachedList {
    fetched_at: SystemTime,
    instances: Arc<Vec<Instance>>,
}

pub struct CachedCloud {
    inner: Arc<dyn CloudClient>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    call_timeout: Duration,
    list: Mutex<Option<CachedList>>,
    /// Bumped by every invalidation. A fetch that started under an older
    /// generation must not populate the cache.
    generation: AtomicU64,
}

impl CachedCloud {
    pub fn new(inner: Arc<dyn CloudClient>, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner,
            clock,
            ttl: DEFAULT_LIST_TTL,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            list: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// The undecorated client.
    pub fn inner(&self) -> &Arc<dyn CloudClient> {
        &self.inner
    }

    fn list_slot(&self) -> MutexGuard<'_, Option<CachedList>> {
        self.list.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn deadline<T>(&self, fut: impl Future<Output = CloudResult<T>>) -> CloudResult<T> {
        tokio::time::timeout(self.call_timeout, fut)
            .await
            .map_err(|_| CloudError::Timeout(self.call_timeout))?
    }

    /// Drop the cached list.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        *self.list_slot() = None;
    }

    /// Cache `instances` unless the cache was invalidated since `generation`.
    fn store(&self, generation: u64, instances: Arc<Vec<Instance>>) {
        let mut slot = self.list_slot();
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!("instance list went stale during fetch, not cached");
            return;
        }
        *slot = Some(CachedList {
            fetched_at: self.clock.now(),
            instances,
        });
    }

    /// All instances, served from the cache while it is fresh.
    pub async fn list_instances_cached(&self) -> CloudResult<Arc<Vec<Instance>>> {
        let now = self.clock.now();
        let fresh = self
            .list_slot()
            .as_ref()
            .filter(|c| elapsed_since(now, c.fetched_at) < self.ttl)
            .map(|c| Arc::clone(&c.instances));
        if let Some(instances) = fresh {
            return Ok(instances);
        }

        let generation = self.generation.load(Ordering::SeqCst);
        let instances = Arc::new(self.deadline(self.inner.list_instances(None)).await?);
        debug!(count = instances.len(), "instance list refreshed");
        self.store(generation, Arc::clone(&instances));
        Ok(instances)
    }

    /// Bypass the cache. An unfiltered fetch repopulates it.
    pub async fn list_instances_fresh(
        &self,
        status: Option<InstanceStatus>,
    ) -> CloudResult<Vec<Instance>> {
        let generation = self.generation.load(Ordering::SeqCst);
        let instances = self.deadline(self.inner.list_instances(status)).await?;
        if status.is_none() {
            self.store(generation, Arc::new(instances.clone()));
        }
        Ok(instances)
    }

    pub async fn instance_by_hostname(&self, hostname: &str) -> CloudResult<Option<Instance>> {
        let instances = self.list_instances_cached().await?;
        Ok(instances.iter().find(|i| i.hostname == hostname).cloned())
    }

    /// Active instances minted for the group keyed by `prefix`, uncached.
    pub async fn active_instances_for_group(&self, prefix: &str) -> CloudResult<Vec<Instance>> {
        let instances = self.list_instances_fresh(None).await?;
        Ok(instances
            .into_iter()
            .filter(|i| i.status.is_active() && hostname_belongs_to(&i.hostname, prefix))
            .collect())
    }

    /// First location, in order, that reports capacity for `instance_type`.
    pub async fn first_available_location(
        &self,
        instance_type: &str,
        locations: &[String],
    ) -> CloudResult<Option<String>> {
        for location in locations {
            match self
                .deadline(self.inner.instance_available(instance_type, location))
                .await
            {
                Ok(true) => return Ok(Some(location.clone())),
                Ok(false) => {
                    debug!(%instance_type, %location, "no capacity");
                }
                Err(e) => {
                    warn!(%instance_type, %location, error = %e, "availability check failed");
                }
            }
        }
        Ok(None)
    }

    pub async fn create_instance(&self, req: &CreateInstanceRequest) -> CloudResult<Instance> {
        let result = self.deadline(self.inner.create_instance(req)).await;
        self.invalidate();
        result
    }

    pub async fn delete_instance(&self, id: &str) -> CloudResult<()> {
        let result = self.deadline(self.inner.delete_instance(id)).await;
        self.invalidate();
        result
    }

    pub async fn instance_action(&self, ids: &[String], action: InstanceAction) -> CloudResult<()> {
        let result = self.deadline(self.inner.instance_action(ids, action)).await;
        self.invalidate();
        result
    }

    pub async fn list_instance_types(&self) -> CloudResult<Vec<InstanceTypeInfo>> {
        self.deadline(self.inner.list_instance_types()).await
    }

    pub async fn create_startup_script(&self, name: &str, body: &str) -> CloudResult<StartupScript> {
        self.deadline(self.inner.create_startup_script(name, body)).await
    }

    pub async fn delete_startup_script(&self, id: &str) -> CloudResult<()> {
        self.deadline(self.inner.delete_startup_script(id)).await
    }
}

impl std::fmt::Debug for CachedCloud {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedCloud")
            .field("ttl", &self.ttl)
            .field("call_timeout", &self.call_timeout)
            .finish_non_exhaustive()
    }
}
