#![doc = include_str!("../README.md")]

pub mod compute;
pub mod config;
mod error;
pub mod protocol;
pub mod runtime;
pub mod worker;

pub use compute::{Atlas, AtlasLoader, ComputeModule, Context};
pub use config::WorkerConfig;
pub use error::{Error, Result};
pub use protocol::{Action, Event, Request, Response, Signal, Status, Surface};
pub use runtime::{ModuleLoader, ParallelRuntime, Phase, RuntimeState};
pub use worker::{Client, Spawner, WorkerHandle, WorkerId, WorkerState};
