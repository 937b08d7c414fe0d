pub mod utils;

use std::path::PathBuf;

use anyhow::Result;
use atlas::{Action, AtlasLoader, Request, Response, Spawner, Surface, WorkerConfig, WorkerHandle};
use clap::{Args, ValueEnum};
use futures_util::future::join_all;

use utils::workers_in_range;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LaunchAction {
    Ping,
    Crunch,
    Attach,
    Query,
    Inc,
    Dec,
}

#[derive(Debug, Args)]
pub struct LaunchArgs {
    /// Number of workers to boot
    #[arg(value_parser = workers_in_range)]
    #[clap(short, long, default_value = "1")]
    pub workers: usize,

    /// Actions to run on every worker, in order
    #[clap(short, long, value_enum, num_args(1..), default_values_t = [LaunchAction::Ping, LaunchAction::Crunch])]
    pub actions: Vec<LaunchAction>,

    /// Upper bound for `crunch`
    #[clap(long, default_value = "1000")]
    pub limit: u32,

    /// Size of the surface handed to `attach`
    #[clap(long, default_value = "800")]
    pub width: u32,

    #[clap(long, default_value = "600")]
    pub height: u32,

    /// Read worker settings from a JSON file instead of the flags below
    #[clap(long)]
    pub config: Option<PathBuf>,

    #[clap(flatten)]
    pub worker: WorkerConfig,
}

impl LaunchArgs {
    pub fn worker_config(&self) -> Result<WorkerConfig> {
        match &self.config {
            Some(path) => Ok(WorkerConfig::from_json_file(path)?),
            None => Ok(self.worker.clone()),
        }
    }

    fn request(&self, action: LaunchAction) -> Request {
        let action = match action {
            LaunchAction::Ping => Action::Ping,
            LaunchAction::Crunch => Action::Crunch { limit: self.limit },
            LaunchAction::Attach => Action::Attach {
                canvas: Surface {
                    id: "launcher".to_string(),
                    width: self.width,
                    height: self.height,
                },
            },
            LaunchAction::Query => Action::Query,
            LaunchAction::Inc => Action::Inc,
            LaunchAction::Dec => Action::Dec,
        };
        action.into()
    }
}

/// Boot the workers, run the requested actions on each of them and shut them
/// down again. Returns whether every request succeeded.
pub async fn launch(args: &LaunchArgs) -> Result<bool> {
    let spawner = Spawner::new(args.worker_config()?);

    tracing::info!("Booting {} worker(s)", args.workers);
    let workers = spawner.spawn_all(args.workers, || Ok(AtlasLoader)).await?;

    let runs = workers.iter().map(|worker| run_actions(worker, args));
    let all_ok = join_all(runs).await.into_iter().all(|ok| ok);

    for worker in workers {
        worker.terminate().await?;
    }

    Ok(all_ok)
}

async fn run_actions(worker: &WorkerHandle, args: &LaunchArgs) -> bool {
    let client = worker.client();
    let mut all_ok = true;

    for &action in &args.actions {
        let request = args.request(action);
        let label = request.action.clone();

        let response = match client.send(request).await {
            Ok(response) => response,
            Err(e) => Response::Err(e.to_string()),
        };
        all_ok &= response.is_ok();

        match serde_json::to_string(&response) {
            Ok(line) => println!("{} {} {}", worker.name(), label, line),
            Err(e) => tracing::error!("Failed to encode response: {e}"),
        }
    }

    all_ok
}
