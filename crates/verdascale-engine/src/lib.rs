//! verdascale-engine — the node-group state engine.
//!
//! Tracks registered groups, their desired sizes and the instances the
//! engine believes belong to them, and converges the cloud toward those
//! sizes:
//!
//! - [`Engine::increase_size`] reserves capacity, picks a location and
//!   creates instances in parallel, rolling back whatever did not land.
//! - [`Engine::decrease_target_size`] and [`Engine::delete_instance`]
//!   remove instances without crossing the group's min size.
//! - [`Engine::refresh`] reconciles the caches with the instance list,
//!   tracks failed instances, arms the scale-up backoff and deletes
//!   instances stuck in a failed state.
//!
//! Lock order is always group scale lock, then cache lock. The cache lock
//! is never held across an `.await`.

mod engine;
pub mod error;
mod fanout;
pub mod group;
pub mod options;
mod reconcile;
mod scale_down;
mod scale_up;
mod state;

pub use engine::Engine;
pub use error::{EngineError, EngineResult};
pub use group::Group;
pub use options::EngineOptions;
pub use state::{GroupSnapshot, Snapshot};
