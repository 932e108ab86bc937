//! Bounded retries for transient API failures.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::client::{CloudClient, CloudFuture};
use crate::error::CloudResult;
use crate::types::{
    CreateInstanceRequest, Instance, InstanceAction, InstanceStatus, InstanceTypeInfo,
    StartupScript,
};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Full-jitter delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(1u32 << attempt.saturating_sub(1).min(16));
        let cap = exp.min(self.max_delay);
        let millis = cap.as_millis() as u64;
        if millis == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(0..=millis))
    }
}

/// Retries [`CloudError::Transient`](crate::CloudError::Transient) and
/// timeouts; permanent errors surface on the first attempt.
pub struct RetryingCloud {
    inner: Arc<dyn CloudClient>,
    policy: RetryPolicy,
}

impl RetryingCloud {
    pub fn new(inner: Arc<dyn CloudClient>) -> Self {
        Self::with_policy(inner, RetryPolicy::default())
    }

    pub fn with_policy(inner: Arc<dyn CloudClient>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    async fn retry<T, F, Fut>(&self, op: &'static str, mut call: F) -> CloudResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = CloudResult<T>>,
    {
        let mut attempt = 1;
        loop {
            match call().await {
                Err(e) if e.is_retryable() && attempt < self.policy.max_attempts => {
                    let delay = self.policy.delay_for(attempt);
                    warn!(op, attempt, ?delay, error = %e, "retrying cloud call");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

impl CloudClient for RetryingCloud {
    fn list_instances(&self, status: Option<InstanceStatus>) -> CloudFuture<'_, Vec<Instance>> {
        Box::pin(self.retry("list_instances", move || self.inner.list_instances(status)))
    }

    fn create_instance<'a>(&'a self, req: &'a CreateInstanceRequest) -> CloudFuture<'a, Instance> {
        Box::pin(self.retry("create_instance", move || self.inner.create_instance(req)))
    }

    fn instance_action<'a>(
        &'a self,
        ids: &'a [String],
        action: InstanceAction,
    ) -> CloudFuture<'a, ()> {
        Box::pin(self.retry("instance_action", move || {
            self.inner.instance_action(ids, action)
        }))
    }

    fn instance_available<'a>(
        &'a self,
        instance_type: &'a str,
        location: &'a str,
    ) -> CloudFuture<'a, bool> {
        Box::pin(self.retry("instance_available", move || {
            self.inner.instance_available(instance_type, location)
        }))
    }

    fn list_instance_types(&self) -> CloudFuture<'_, Vec<InstanceTypeInfo>> {
        Box::pin(self.retry("list_instance_types", move || {
            self.inner.list_instance_types()
        }))
    }

    fn create_startup_script<'a>(
        &'a self,
        name: &'a str,
        body: &'a str,
    ) -> CloudFuture<'a, StartupScript> {
        Box::pin(self.retry("create_startup_script", move || {
            self.inner.create_startup_script(name, body)
        }))
    }

    fn delete_startup_script<'a>(&'a self, id: &'a str) -> CloudFuture<'a, ()> {
        Box::pin(self.retry("delete_startup_script", move || {
            self.inner.delete_startup_script(id)
        }))
    }
}
