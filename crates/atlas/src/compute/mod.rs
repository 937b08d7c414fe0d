mod atlas;

pub use self::atlas::{Atlas, AtlasLoader};

use rayon::ThreadPool;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;

use crate::protocol::{Action, Event};

/// The request executor living inside a worker.
///
/// Runs on the worker's own thread, one request at a time. Errors and panics
/// are turned into error responses by the caller.
pub trait ComputeModule: 'static {
    fn execute(&mut self, action: Action, cx: &mut Context<'_>) -> anyhow::Result<Value>;
}

/// What a module can reach while executing a request.
pub struct Context<'a> {
    pool: &'a ThreadPool,
    wire: Option<&'a UnboundedSender<Event>>,
}

impl<'a> Context<'a> {
    pub(crate) fn new(pool: &'a ThreadPool, wire: Option<&'a UnboundedSender<Event>>) -> Self {
        Self { pool, wire }
    }

    pub fn pool(&self) -> &ThreadPool {
        self.pool
    }

    /// Push an event to the subscribed controller, if any.
    /// Returns whether the event was delivered to the wire.
    pub fn emit(&self, event: Event) -> bool {
        match self.wire {
            Some(wire) => wire.send(event).is_ok(),
            None => false,
        }
    }
}
