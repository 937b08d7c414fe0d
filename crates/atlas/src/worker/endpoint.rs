use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

use crate::compute::{ComputeModule, Context};
use crate::protocol::{Action, Dispatch, Envelope, Event, Request, Response, Signal};
use crate::runtime::{ModuleLoader, ParallelRuntime};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointState {
    Booting,
    Initializing,
    Ready,
}

/// Entry point of a worker thread: builds the event loop, constructs the
/// loader and runs the endpoint until the controller lets go.
pub(crate) fn boot<F, L>(
    name: String,
    factory: F,
    concurrency: usize,
    signals: UnboundedSender<Signal>,
    inbox: UnboundedReceiver<Envelope>,
) where
    F: FnOnce() -> anyhow::Result<L>,
    L: ModuleLoader,
{
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(worker = %name, "Failed to build event loop: {e}");
            let _ = signals.send(Signal::Failed(format!("failed to build event loop: {e}")));
            return;
        }
    };

    runtime.block_on(async move {
        let loader = match factory() {
            Ok(loader) => loader,
            Err(e) => {
                tracing::error!(worker = %name, "Failed to construct worker: {e:#}");
                let _ = signals.send(Signal::Failed(format!("failed to construct worker: {e:#}")));
                return;
            }
        };

        Endpoint::new(name, loader, concurrency, signals, inbox)
            .run()
            .await
    });
}

pub(crate) struct Endpoint<L: ModuleLoader> {
    name: String,
    state: EndpointState,
    runtime: ParallelRuntime<L>,
    concurrency: usize,
    signals: UnboundedSender<Signal>,
    inbox: UnboundedReceiver<Envelope>,
    wire: Option<UnboundedSender<Event>>,
}

impl<L: ModuleLoader> Endpoint<L> {
    pub(crate) fn new(
        name: String,
        loader: L,
        concurrency: usize,
        signals: UnboundedSender<Signal>,
        inbox: UnboundedReceiver<Envelope>,
    ) -> Self {
        Self {
            name,
            state: EndpointState::Booting,
            runtime: ParallelRuntime::new(loader),
            concurrency,
            signals,
            inbox,
            wire: None,
        }
    }

    fn transition(&mut self, next: EndpointState) {
        tracing::info!(worker = %self.name, "{:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn post(&self, signal: Signal) {
        if self.signals.send(signal).is_err() {
            tracing::debug!(worker = %self.name, "Controller is no longer listening for signals");
        }
    }

    pub(crate) async fn run(mut self) {
        self.transition(EndpointState::Initializing);
        tracing::debug!(worker = %self.name, "Initializing with {} threads", self.concurrency);

        if let Err(e) = self.runtime.initialize(self.concurrency).await {
            tracing::error!(worker = %self.name, "Initialization failed: {e}");
            self.post(Signal::Failed(e.to_string()));
            return;
        }

        self.transition(EndpointState::Ready);
        self.post(Signal::Ready);

        self.listen().await;
        tracing::info!(worker = %self.name, "Stopping worker");
    }

    async fn listen(&mut self) {
        'main: while let Some(envelope) = self.inbox.recv().await {
            match envelope {
                Envelope::Request(entry) => self.dispatch(entry),
                Envelope::WireUp(wire) => {
                    tracing::debug!(worker = %self.name, "Event wire attached");
                    self.wire = Some(wire);
                }
                Envelope::Shutdown => break 'main,
            }
        }
    }

    fn dispatch(&mut self, entry: Dispatch) {
        let Dispatch {
            id,
            request,
            reply,
            queued_at,
        } = entry;

        tracing::trace!(
            "Processing request {} `{}`, queued {}ms ago",
            id,
            request.action,
            queued_at.elapsed().as_millis()
        );

        if self.wire.as_ref().is_some_and(|wire| wire.is_closed()) {
            self.wire = None;
        }

        let response = self.execute(request);

        if reply.send(response).is_ok() {
            tracing::trace!("Sent response for request {}", id)
        } else {
            tracing::warn!("Requester of {} went away before the response", id)
        }
    }

    fn execute(&mut self, request: Request) -> Response {
        let action = match Action::try_from(request) {
            Ok(action) => action,
            Err(e) => return Response::Err(e.to_string()),
        };

        let Some((module, pool)) = self.runtime.parts_mut() else {
            return Response::Err("runtime is not initialized".to_string());
        };
        let mut cx = Context::new(pool, self.wire.as_ref());

        match panic::catch_unwind(AssertUnwindSafe(|| module.execute(action, &mut cx))) {
            Ok(Ok(value)) => Response::Ok(value),
            Ok(Err(e)) => Response::Err(format!("{e:#}")),
            Err(payload) => Response::Err(format!(
                "compute module panicked: {}",
                panic_message(payload.as_ref())
            )),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}
