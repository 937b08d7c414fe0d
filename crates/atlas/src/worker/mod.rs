mod client;
mod endpoint;
mod spawner;

pub use client::Client;
pub use endpoint::EndpointState;
pub use spawner::{Spawner, WorkerHandle};

use uuid::Uuid;

pub type WorkerId = Uuid;

/// Lifecycle of a [`WorkerHandle`] as seen by the controller.
///
/// There is no `Spawning` handle: [`Spawner::spawn`] only hands one out after
/// the worker signalled readiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Ready,
    Terminated,
}
