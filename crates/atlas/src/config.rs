use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::runtime::HOST_CONCURRENCY;
use crate::Result;

const DEFAULT_NAME_PREFIX: &str = "atlas-worker";

fn default_name_prefix() -> String {
    DEFAULT_NAME_PREFIX.to_string()
}

/// Settings shared by every worker a [`Spawner`](crate::Spawner) creates.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::Args))]
#[serde(default)]
pub struct WorkerConfig {
    /// Prefix for worker thread names
    #[cfg_attr(feature = "clap", clap(long, default_value = DEFAULT_NAME_PREFIX))]
    pub name_prefix: String,

    /// Threads in each worker's pool [default: available parallelism]
    #[cfg_attr(feature = "clap", clap(short, long))]
    pub concurrency: Option<usize>,

    /// Give up on a worker that is not ready after this many milliseconds
    #[cfg_attr(feature = "clap", clap(long))]
    pub handshake_timeout_ms: Option<u64>,

    /// Fail requests that get no response within this many milliseconds
    #[cfg_attr(feature = "clap", clap(long))]
    pub request_timeout_ms: Option<u64>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            name_prefix: default_name_prefix(),
            concurrency: None,
            handshake_timeout_ms: None,
            request_timeout_ms: None,
        }
    }
}

impl WorkerConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let config_str = fs::read_to_string(path)?;
        let config = serde_json::from_str(&config_str)?;
        Ok(config)
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency.unwrap_or(*HOST_CONCURRENCY)
    }

    pub fn handshake_timeout(&self) -> Option<Duration> {
        self.handshake_timeout_ms.map(Duration::from_millis)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = Some(concurrency);
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }
}
