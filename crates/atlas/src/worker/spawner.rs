use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use futures_util::future::try_join_all;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::config::WorkerConfig;
use crate::protocol::{Envelope, Signal};
use crate::runtime::ModuleLoader;
use crate::worker::endpoint;
use crate::worker::{Client, WorkerId, WorkerState};
use crate::{Error, Result};

/// Creates workers and waits for their readiness handshake.
#[derive(Debug, Clone, Default)]
pub struct Spawner {
    config: Arc<WorkerConfig>,
    spawned: Arc<AtomicUsize>,
}

impl Spawner {
    pub fn new(config: WorkerConfig) -> Self {
        Self {
            config: Arc::new(config),
            spawned: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Start a worker and resolve once it is ready.
    ///
    /// `factory` runs on the new worker thread and builds the module loader.
    /// The returned handle is always in the [`WorkerState::Ready`] state.
    pub async fn spawn<F, L>(&self, factory: F) -> Result<WorkerHandle>
    where
        F: FnOnce() -> anyhow::Result<L> + Send + 'static,
        L: ModuleLoader,
    {
        let id = WorkerId::new_v4();
        let index = self.spawned.fetch_add(1, Ordering::Relaxed);
        let name = format!("{}-{}", self.config.name_prefix, index);
        let concurrency = self.config.concurrency();

        let (signal_tx, signal_rx) = unbounded_channel();
        let (tx, rx) = unbounded_channel();

        let thread = std::thread::Builder::new()
            .name(name.clone())
            .spawn({
                let name = name.clone();
                move || endpoint::boot(name, factory, concurrency, signal_tx, rx)
            })
            .map_err(Error::Spawn)?;

        tracing::debug!(worker = %name, "Spawned worker {}", id);

        let handshake = await_ready(id, &name, signal_rx);
        match self.config.handshake_timeout() {
            Some(limit) => tokio::time::timeout(limit, handshake)
                .await
                .map_err(|_| Error::HandshakeTimeout(limit))??,
            None => handshake.await?,
        }

        Ok(WorkerHandle {
            id,
            name,
            tx,
            thread: Some(thread),
            request_timeout: self.config.request_timeout(),
        })
    }

    /// Start `count` workers concurrently. Fails as soon as one of them fails;
    /// the other workers are dropped and their threads exit.
    pub async fn spawn_all<F, L>(&self, count: usize, factory: F) -> Result<Vec<WorkerHandle>>
    where
        F: FnOnce() -> anyhow::Result<L> + Clone + Send + 'static,
        L: ModuleLoader,
    {
        let spawns = (0..count).map(|_| self.spawn(factory.clone()));
        try_join_all(spawns).await
    }
}

/// Listen on the default channel until the ready signal shows up. The
/// receiver is dropped on return so the listener never fires again.
async fn await_ready(
    id: WorkerId,
    name: &str,
    mut signals: UnboundedReceiver<Signal>,
) -> Result<()> {
    while let Some(signal) = signals.recv().await {
        match signal {
            Signal::Ready => {
                tracing::info!(worker = name, "Worker {} is ready", id);
                return Ok(());
            }
            Signal::Notice(message) => {
                tracing::warn!(
                    worker = name,
                    "Worker message posted before initialization: {}",
                    message
                );
            }
            Signal::Failed(reason) => {
                tracing::error!(worker = name, "Worker {} failed: {}", id, reason);
                return Err(Error::Initialization { worker: id, reason });
            }
        }
    }
    Err(Error::WorkerExited(id))
}

/// A worker that completed its handshake.
///
/// Dropping the handle detaches the thread; the worker stops once every
/// [`Client`] created from it is gone as well.
#[derive(Debug)]
pub struct WorkerHandle {
    id: WorkerId,
    name: String,
    tx: UnboundedSender<Envelope>,
    thread: Option<JoinHandle<()>>,
    request_timeout: Option<Duration>,
}

impl WorkerHandle {
    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> WorkerState {
        if self.tx.is_closed() {
            WorkerState::Terminated
        } else {
            WorkerState::Ready
        }
    }

    pub fn client(&self) -> Client {
        Client::new(self.id, self.tx.clone(), self.request_timeout)
    }

    /// Ask the worker to stop without waiting for it. Returns `false` if it
    /// had already stopped.
    pub fn shutdown(&self) -> bool {
        self.tx.send(Envelope::Shutdown).is_ok()
    }

    /// Ask the worker to stop and wait for its thread to finish. Requests
    /// queued behind the shutdown are answered with [`Error::Disconnected`].
    pub async fn terminate(mut self) -> Result<()> {
        if !self.shutdown() {
            tracing::debug!(worker = %self.name, "Worker already stopped");
        }

        if let Some(thread) = self.thread.take() {
            let joined = tokio::task::spawn_blocking(move || thread.join())
                .await
                .map_err(anyhow::Error::from)?;
            joined.map_err(|_| anyhow::anyhow!("worker {} panicked", self.name))?;
        }

        tracing::info!(worker = %self.name, "Worker {} terminated", self.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_await_ready_ignores_chatter() {
        let (tx, rx) = unbounded_channel();
        tx.send(Signal::Notice("still compiling".into())).unwrap();
        tx.send(Signal::Notice("almost there".into())).unwrap();
        tx.send(Signal::Ready).unwrap();

        await_ready(WorkerId::nil(), "test", rx).await.unwrap();
    }

    #[tokio::test]
    async fn test_await_ready_failed() {
        let (tx, rx) = unbounded_channel();
        tx.send(Signal::Notice("still compiling".into())).unwrap();
        tx.send(Signal::Failed("no module".into())).unwrap();
        tx.send(Signal::Ready).unwrap();

        let err = await_ready(WorkerId::nil(), "test", rx).await.unwrap_err();
        assert!(matches!(err, Error::Initialization { reason, .. } if reason == "no module"));
    }

    #[tokio::test]
    async fn test_await_ready_channel_closed() {
        let (tx, rx) = unbounded_channel();
        tx.send(Signal::Notice("still compiling".into())).unwrap();
        drop(tx);

        let err = await_ready(WorkerId::nil(), "test", rx).await.unwrap_err();
        assert!(matches!(err, Error::WorkerExited(id) if id.is_nil()));
    }
}
