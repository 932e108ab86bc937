//! verdascale-cloud — the port to the Verdacloud instance API.
//!
//! The engine never talks HTTP. It consumes the [`CloudClient`] trait,
//! usually through two decorators:
//!
//! - [`RetryingCloud`] retries transient failures with jittered backoff.
//! - [`CachedCloud`] adds a short-lived list cache, invalidated on every
//!   mutation, and a deadline on every call.

pub mod cache;
pub mod client;
pub mod clock;
pub mod error;
pub mod retry;
pub mod types;

pub use cache::CachedCloud;
pub use client::{CloudClient, CloudFuture};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CloudError, CloudResult};
pub use retry::{RetryPolicy, RetryingCloud};
pub use types::{
    CreateInstanceRequest, Instance, InstanceAction, InstanceStatus, InstanceTypeInfo, OsVolume,
    StartupScript, VolumeSpec,
};
