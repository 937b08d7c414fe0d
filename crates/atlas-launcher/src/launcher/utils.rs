use std::ops::RangeInclusive;
use tokio::signal;

pub async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

const WORKER_RANGE: RangeInclusive<usize> = 1..=256;

pub fn workers_in_range(s: &str) -> Result<usize, String> {
    let workers: usize = s
        .parse()
        .map_err(|_| format!("`{s}` isn't a worker count"))?;
    if WORKER_RANGE.contains(&workers) {
        Ok(workers)
    } else {
        Err(format!(
            "worker count not in range {}-{}",
            WORKER_RANGE.start(),
            WORKER_RANGE.end()
        ))
    }
}
