use std::time::Duration;

use thiserror::Error;

use crate::worker::WorkerId;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("Failed to spawn worker: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Worker {worker} failed to initialize: {reason}")]
    Initialization { worker: WorkerId, reason: String },

    #[error("Worker {0} exited before signalling readiness")]
    WorkerExited(WorkerId),

    #[error("Handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),

    #[error("Module load error: {0}")]
    ModuleLoad(String),

    #[error("Thread pool error: {0}")]
    ThreadPool(String),

    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error("Invalid payload for `{action}`: {source}")]
    InvalidPayload {
        action: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Request timed out after {0:?}")]
    RequestTimeout(Duration),

    #[error("Worker disconnected")]
    Disconnected,

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Serde JSON error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),

    #[error("Generic error: {0}")]
    Generic(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
