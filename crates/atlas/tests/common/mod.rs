#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use atlas::{Action, Atlas, ComputeModule, Context, ModuleLoader, Surface};
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Sum of squares of `0..=n`.
pub fn sum_of_squares(n: u64) -> u64 {
    n * (n + 1) * (2 * n + 1) / 6
}

/// Waits for a gate before handing out an [`Atlas`] module.
pub struct GatedLoader {
    pub gate: Option<oneshot::Receiver<()>>,
}

impl ModuleLoader for GatedLoader {
    type Module = Atlas;

    async fn init(&mut self) -> anyhow::Result<Atlas> {
        if let Some(gate) = self.gate.take() {
            gate.await?;
        }
        Ok(Atlas::default())
    }
}

/// Keeps `token` alive for as long as its worker thread runs.
pub struct TokenLoader {
    pub token: mpsc::UnboundedSender<()>,
}

impl ModuleLoader for TokenLoader {
    type Module = Atlas;

    async fn init(&mut self) -> anyhow::Result<Atlas> {
        Ok(Atlas::default())
    }
}

pub struct BrokenLoader;

impl ModuleLoader for BrokenLoader {
    type Module = Atlas;

    async fn init(&mut self) -> anyhow::Result<Atlas> {
        anyhow::bail!("failed to fetch module binary")
    }
}

/// Records every surface it is asked to attach, answers `query` with the size
/// of its pool, fails `inc`, panics on `dec` and sleeps on `crunch`.
pub struct RecordingModule {
    pub attached: Arc<Mutex<Vec<Surface>>>,
}

impl ComputeModule for RecordingModule {
    fn execute(&mut self, action: Action, cx: &mut Context<'_>) -> anyhow::Result<Value> {
        match action {
            Action::Attach { canvas } => {
                let value = serde_json::to_value(&canvas)?;
                self.attached.lock().unwrap().push(canvas);
                Ok(value)
            }
            Action::Query => Ok(json!(cx.pool().current_num_threads())),
            Action::Inc => anyhow::bail!("counter is read-only"),
            Action::Dec => panic!("counter underflow"),
            Action::Crunch { limit } => {
                std::thread::sleep(Duration::from_millis(u64::from(limit)));
                Ok(json!(limit))
            }
            Action::Ping => Ok(json!("pong")),
        }
    }
}

pub struct RecordingLoader {
    pub attached: Arc<Mutex<Vec<Surface>>>,
}

impl ModuleLoader for RecordingLoader {
    type Module = RecordingModule;

    async fn init(&mut self) -> anyhow::Result<RecordingModule> {
        Ok(RecordingModule {
            attached: self.attached.clone(),
        })
    }
}
