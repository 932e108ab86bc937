//! An in-memory implementation of the Verdacloud API.
//!
//! Instances live in a map keyed by id. Every call is recorded, and
//! failures, capacity and latency can be scripted per test.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::debug;
use verdascale_cloud::{
    Clock, CloudClient, CloudError, CloudFuture, CreateInstanceRequest, Instance, InstanceAction,
    InstanceStatus, InstanceTypeInfo, StartupScript, SystemClock,
};

/// A recorded call against [`MemoryCloud`].
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    ListInstances(Option<InstanceStatus>),
    CreateInstance(CreateInstanceRequest),
    InstanceAction {
        ids: Vec<String>,
        action: InstanceAction,
    },
    InstanceAvailable {
        instance_type: String,
        location: String,
    },
    ListInstanceTypes,
    CreateStartupScript {
        name: String,
        body: String,
    },
    DeleteStartupScript(String),
}

struct MockState {
    instances: BTreeMap<String, Instance>,
    next_id: u64,
    default_available: bool,
    availability: HashMap<(String, String), bool>,
    create_outcomes: VecDeque<Option<CloudError>>,
    created_status: InstanceStatus,
    create_delay: Option<Duration>,
    list_delay: Option<Duration>,
    list_failure: Option<CloudError>,
    queued_list_failures: VecDeque<CloudError>,
    delete_failures: HashMap<String, CloudError>,
    scripts: BTreeMap<String, (StartupScript, String)>,
    instance_types: Vec<InstanceTypeInfo>,
    calls: Vec<Call>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            instances: BTreeMap::new(),
            next_id: 1,
            default_available: true,
            availability: HashMap::new(),
            create_outcomes: VecDeque::new(),
            created_status: InstanceStatus::Ordered,
            create_delay: None,
            list_delay: None,
            list_failure: None,
            queued_list_failures: VecDeque::new(),
            delete_failures: HashMap::new(),
            scripts: BTreeMap::new(),
            instance_types: Vec::new(),
            calls: Vec::new(),
        }
    }
}

/// In-memory cloud. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct MemoryCloud {
    state: Arc<Mutex<MockState>>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryCloud {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCloud {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Use `clock` for instance creation timestamps.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            clock,
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn next_id(state: &mut MockState) -> String {
        let id = format!("inst-{:04}", state.next_id);
        state.next_id += 1;
        id
    }

    // ── Seeding ──────────────────────────────────────────────────

    /// Add an instance as if created out of band. Returns it.
    pub fn insert_instance(
        &self,
        hostname: &str,
        location: &str,
        instance_type: &str,
        status: InstanceStatus,
    ) -> Instance {
        let mut state = self.state();
        let instance = Instance {
            id: Self::next_id(&mut state),
            hostname: hostname.to_string(),
            location: location.to_string(),
            status,
            instance_type: instance_type.to_string(),
            created_at: self.clock.now(),
        };
        state
            .instances
            .insert(instance.id.clone(), instance.clone());
        instance
    }

    /// Change the status of every instance named `hostname`.
    pub fn set_status(&self, hostname: &str, status: InstanceStatus) {
        for inst in self
            .state()
            .instances
            .values_mut()
            .filter(|i| i.hostname == hostname)
        {
            inst.status = status;
        }
    }

    /// Remove an instance without recording a call.
    pub fn remove_instance(&self, hostname: &str) {
        self.state().instances.retain(|_, i| i.hostname != hostname);
    }

    pub fn set_instance_types(&self, types: Vec<InstanceTypeInfo>) {
        self.state().instance_types = types;
    }

    // ── Scripting ────────────────────────────────────────────────

    /// Availability for pairs not set explicitly.
    pub fn set_default_available(&self, available: bool) {
        self.state().default_available = available;
    }

    pub fn set_available(&self, instance_type: &str, location: &str, available: bool) {
        self.state()
            .availability
            .insert((instance_type.to_string(), location.to_string()), available);
    }

    /// Queue outcomes for the next create calls, in call order. `None` succeeds.
    pub fn push_create_outcomes(&self, outcomes: impl IntoIterator<Item = Option<CloudError>>) {
        self.state().create_outcomes.extend(outcomes);
    }

    /// Status given to newly created instances.
    pub fn set_created_status(&self, status: InstanceStatus) {
        self.state().created_status = status;
    }

    /// Sleep this long inside every create.
    pub fn set_create_delay(&self, delay: Option<Duration>) {
        self.state().create_delay = delay;
    }

    /// Sleep this long before a list call returns. The listing itself is
    /// taken when the call starts.
    pub fn set_list_delay(&self, delay: Option<Duration>) {
        self.state().list_delay = delay;
    }

    /// Make every list call fail with `err` until cleared.
    pub fn fail_lists(&self, err: Option<CloudError>) {
        self.state().list_failure = err;
    }

    /// Fail the next list calls, one error each.
    pub fn push_list_failures(&self, errs: impl IntoIterator<Item = CloudError>) {
        self.state().queued_list_failures.extend(errs);
    }

    /// Make deletes of `hostname` fail with `err`.
    pub fn fail_delete_of(&self, hostname: &str, err: CloudError) {
        self.state()
            .delete_failures
            .insert(hostname.to_string(), err);
    }

    // ── Inspection ───────────────────────────────────────────────

    pub fn instances(&self) -> Vec<Instance> {
        self.state().instances.values().cloned().collect()
    }

    pub fn instance(&self, hostname: &str) -> Option<Instance> {
        self.state()
            .instances
            .values()
            .find(|i| i.hostname == hostname)
            .cloned()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn create_requests(&self) -> Vec<CreateInstanceRequest> {
        self.state()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::CreateInstance(req) => Some(req.clone()),
                _ => None,
            })
            .collect()
    }

    /// Ids passed to delete actions, in call order.
    pub fn deleted_ids(&self) -> Vec<String> {
        self.state()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::InstanceAction {
                    ids,
                    action: InstanceAction::Delete,
                } => Some(ids.clone()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    pub fn list_calls(&self) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| matches!(c, Call::ListInstances(_)))
            .count()
    }

    /// Startup scripts uploaded and not yet deleted.
    pub fn live_scripts(&self) -> Vec<(StartupScript, String)> {
        self.state().scripts.values().cloned().collect()
    }

    /// Bodies of every script ever uploaded.
    pub fn uploaded_script_bodies(&self) -> Vec<String> {
        self.state()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::CreateStartupScript { body, .. } => Some(body.clone()),
                _ => None,
            })
            .collect()
    }
}

impl CloudClient for MemoryCloud {
    fn list_instances(&self, status: Option<InstanceStatus>) -> CloudFuture<'_, Vec<Instance>> {
        Box::pin(async move {
            let (listed, delay) = {
                let mut state = self.state();
                state.calls.push(Call::ListInstances(status));
                if let Some(err) = state.queued_list_failures.pop_front() {
                    return Err(err);
                }
                if let Some(err) = state.list_failure.clone() {
                    return Err(err);
                }
                let listed: Vec<Instance> = state
                    .instances
                    .values()
                    .filter(|i| status.is_none_or(|s| i.status == s))
                    .cloned()
                    .collect();
                (listed, state.list_delay)
            };
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            Ok(listed)
        })
    }

    fn create_instance<'a>(&'a self, req: &'a CreateInstanceRequest) -> CloudFuture<'a, Instance> {
        Box::pin(async move {
            let delay = {
                let mut state = self.state();
                state.calls.push(Call::CreateInstance(req.clone()));
                state.create_delay
            };
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            let mut state = self.state();
            if let Some(err) = state.create_outcomes.pop_front().flatten() {
                debug!(hostname = %req.hostname, error = %err, "mock create failed");
                return Err(err);
            }
            let instance = Instance {
                id: Self::next_id(&mut state),
                hostname: req.hostname.clone(),
                location: req.location_code.clone(),
                status: state.created_status,
                instance_type: req.instance_type.clone(),
                created_at: self.clock.now(),
            };
            state
                .instances
                .insert(instance.id.clone(), instance.clone());
            Ok(instance)
        })
    }

    fn instance_action<'a>(
        &'a self,
        ids: &'a [String],
        action: InstanceAction,
    ) -> CloudFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.state();
            state.calls.push(Call::InstanceAction {
                ids: ids.to_vec(),
                action,
            });

            for id in ids {
                let hostname = state.instances.get(id).map(|i| i.hostname.clone());
                if let Some(err) = hostname.and_then(|h| state.delete_failures.get(&h).cloned()) {
                    return Err(err);
                }
            }

            let ids: HashSet<&String> = ids.iter().collect();
            match action {
                InstanceAction::Delete => state.instances.retain(|id, _| !ids.contains(id)),
                InstanceAction::Shutdown => {
                    for (_, inst) in state.instances.iter_mut().filter(|(id, _)| ids.contains(id)) {
                        inst.status = InstanceStatus::Offline;
                    }
                }
                InstanceAction::Start => {
                    for (_, inst) in state.instances.iter_mut().filter(|(id, _)| ids.contains(id)) {
                        inst.status = InstanceStatus::Running;
                    }
                }
            }
            Ok(())
        })
    }

    fn instance_available<'a>(
        &'a self,
        instance_type: &'a str,
        location: &'a str,
    ) -> CloudFuture<'a, bool> {
        Box::pin(async move {
            let mut state = self.state();
            state.calls.push(Call::InstanceAvailable {
                instance_type: instance_type.to_string(),
                location: location.to_string(),
            });
            let key = (instance_type.to_string(), location.to_string());
            Ok(state
                .availability
                .get(&key)
                .copied()
                .unwrap_or(state.default_available))
        })
    }

    fn list_instance_types(&self) -> CloudFuture<'_, Vec<InstanceTypeInfo>> {
        Box::pin(async move {
            let mut state = self.state();
            state.calls.push(Call::ListInstanceTypes);
            Ok(state.instance_types.clone())
        })
    }

    fn create_startup_script<'a>(
        &'a self,
        name: &'a str,
        body: &'a str,
    ) -> CloudFuture<'a, StartupScript> {
        Box::pin(async move {
            let mut state = self.state();
            state.calls.push(Call::CreateStartupScript {
                name: name.to_string(),
                body: body.to_string(),
            });
            let script = StartupScript {
                id: format!("script-{:04}", state.next_id),
                name: name.to_string(),
            };
            state.next_id += 1;
            state
                .scripts
                .insert(script.id.clone(), (script.clone(), body.to_string()));
            Ok(script)
        })
    }

    fn delete_startup_script<'a>(&'a self, id: &'a str) -> CloudFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.state();
            state.calls.push(Call::DeleteStartupScript(id.to_string()));
            state.scripts.remove(id);
            Ok(())
        })
    }
}
