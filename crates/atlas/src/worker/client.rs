use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;

use crate::protocol::{Action, Dispatch, Envelope, Event, Request, Response, Surface};
use crate::worker::WorkerId;
use crate::{Error, Result};

/// Sends requests to a ready worker and waits for their responses.
///
/// Every request gets its own reply channel, so clones of a client can have
/// any number of requests in flight at once.
#[derive(Debug, Clone)]
pub struct Client {
    worker: WorkerId,
    tx: UnboundedSender<Envelope>,
    timeout: Option<Duration>,
}

impl Client {
    pub(crate) fn new(worker: WorkerId, tx: UnboundedSender<Envelope>, timeout: Option<Duration>) -> Self {
        Self { worker, tx, timeout }
    }

    pub fn worker(&self) -> WorkerId {
        self.worker
    }

    pub fn is_connected(&self) -> bool {
        !self.tx.is_closed()
    }

    fn dispatch(&self, request: Request) -> Result<oneshot::Receiver<Response>> {
        // Create channel
        let (reply, rx) = oneshot::channel();

        // Send command
        self.tx
            .send(Envelope::Request(Dispatch::new(request, reply)))
            .map_err(|_| Error::Disconnected)?;

        Ok(rx)
    }

    /// Send a request and wait for its response, bounded by the configured
    /// request timeout if there is one.
    pub async fn send(&self, request: Request) -> Result<Response> {
        match self.timeout {
            Some(limit) => self.send_timeout(request, limit).await,
            None => self
                .dispatch(request)?
                .await
                .map_err(|_| Error::Disconnected),
        }
    }

    /// Like [`send`](Self::send) with an explicit deadline. The worker still
    /// runs a request that timed out; its response is discarded.
    pub async fn send_timeout(&self, request: Request, limit: Duration) -> Result<Response> {
        let rx = self.dispatch(request)?;
        match tokio::time::timeout(limit, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(Error::Disconnected),
            Err(_) => Err(Error::RequestTimeout(limit)),
        }
    }

    /// Send a request and turn an error response into [`Error::Rejected`].
    pub async fn call(&self, action: impl Into<String>, payload: Value) -> Result<Value> {
        self.send(Request::new(action, payload)).await?.into_result()
    }

    async fn perform(&self, action: Action) -> Result<Value> {
        self.send(action.into()).await?.into_result()
    }

    pub async fn ping(&self) -> Result<()> {
        self.perform(Action::Ping).await?;
        Ok(())
    }

    pub async fn crunch(&self, limit: u32) -> Result<u64> {
        let value = self.perform(Action::Crunch { limit }).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn attach(&self, canvas: Surface) -> Result<Surface> {
        let value = self.perform(Action::Attach { canvas }).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn query(&self) -> Result<u64> {
        let value = self.perform(Action::Query).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn inc(&self) -> Result<u64> {
        let value = self.perform(Action::Inc).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn dec(&self) -> Result<u64> {
        let value = self.perform(Action::Dec).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Subscribe to events pushed by the worker. Replaces any previous
    /// subscription on the same worker.
    pub fn observe(&self) -> Result<UnboundedReceiver<Event>> {
        let (tx, rx) = unbounded_channel();
        self.tx
            .send(Envelope::WireUp(tx))
            .map_err(|_| Error::Disconnected)?;
        Ok(rx)
    }
}
