//! The instance API as seen by the engine.

use std::future::Future;
use std::pin::Pin;

use crate::error::CloudResult;
use crate::types::{
    CreateInstanceRequest, Instance, InstanceAction, InstanceStatus, InstanceTypeInfo,
    StartupScript,
};

/// Boxed future returned by [`CloudClient`] methods.
pub type CloudFuture<'a, T> = Pin<Box<dyn Future<Output = CloudResult<T>> + Send + 'a>>;

/// Abstract Verdacloud API.
///
/// Implementations must be safe to call concurrently.
pub trait CloudClient: Send + Sync {
    /// List instances, optionally restricted to one status.
    fn list_instances(&self, status: Option<InstanceStatus>) -> CloudFuture<'_, Vec<Instance>>;

    fn create_instance<'a>(&'a self, req: &'a CreateInstanceRequest) -> CloudFuture<'a, Instance>;

    /// Apply an action to a set of instances. Deleting an instance that is
    /// already gone is not an error.
    fn instance_action<'a>(
        &'a self,
        ids: &'a [String],
        action: InstanceAction,
    ) -> CloudFuture<'a, ()>;

    /// Delete one instance.
    fn delete_instance<'a>(&'a self, id: &'a str) -> CloudFuture<'a, ()> {
        Box::pin(async move {
            let ids = [id.to_string()];
            self.instance_action(&ids, InstanceAction::Delete).await
        })
    }

    fn instance_available<'a>(
        &'a self,
        instance_type: &'a str,
        location: &'a str,
    ) -> CloudFuture<'a, bool>;

    fn list_instance_types(&self) -> CloudFuture<'_, Vec<InstanceTypeInfo>>;

    fn create_startup_script<'a>(
        &'a self,
        name: &'a str,
        body: &'a str,
    ) -> CloudFuture<'a, StartupScript>;

    fn delete_startup_script<'a>(&'a self, id: &'a str) -> CloudFuture<'a, ()>;
}

impl<T: CloudClient + ?Sized> CloudClient for std::sync::Arc<T> {
    fn list_instances(&self, status: Option<InstanceStatus>) -> CloudFuture<'_, Vec<Instance>> {
        (**self).list_instances(status)
    }

    fn create_instance<'a>(&'a self, req: &'a CreateInstanceRequest) -> CloudFuture<'a, Instance> {
        (**self).create_instance(req)
    }

    fn instance_action<'a>(
        &'a self,
        ids: &'a [String],
        action: InstanceAction,
    ) -> CloudFuture<'a, ()> {
        (**self).instance_action(ids, action)
    }

    fn instance_available<'a>(
        &'a self,
        instance_type: &'a str,
        location: &'a str,
    ) -> CloudFuture<'a, bool> {
        (**self).instance_available(instance_type, location)
    }

    fn list_instance_types(&self) -> CloudFuture<'_, Vec<InstanceTypeInfo>> {
        (**self).list_instance_types()
    }

    fn create_startup_script<'a>(
        &'a self,
        name: &'a str,
        body: &'a str,
    ) -> CloudFuture<'a, StartupScript> {
        (**self).create_startup_script(name, body)
    }

    fn delete_startup_script<'a>(&'a self, id: &'a str) -> CloudFuture<'a, ()> {
        (**self).delete_startup_script(id)
    }
}
