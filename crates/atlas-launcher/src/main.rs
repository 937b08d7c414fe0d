use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod launcher;
use launcher::utils;
use launcher::{launch, LaunchArgs};

#[derive(Debug, Parser)]
pub struct App {
    #[clap(flatten)]
    pub launch_args: LaunchArgs,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<ExitCode> {
    let args = App::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                eprintln!("No environment variables found that can initialize tracing_subscriber::EnvFilter. Using defaults.");
                "atlas=trace,atlas_launcher=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let all_ok = tokio::select! {
        result = launch(&args.launch_args) => result?,
        _ = utils::shutdown_signal() => {
            tracing::warn!("Interrupted before all workers finished");
            false
        }
    };

    Ok(if all_ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
