//! One-time bring-up of a worker's compute module and thread pool.
//!
//! [`ParallelRuntime::initialize`] runs three strictly ordered steps: load the
//! module, install the panic hook, build the thread pool. Each step happens at
//! most once per runtime. Concurrent callers share the in-flight work and later
//! callers return immediately.
use std::panic;
use std::sync::{Mutex as StdMutex, Once};

use once_cell::sync::Lazy;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tokio::sync::{Mutex, OnceCell};

use crate::compute::ComputeModule;
use crate::{Error, Result};

/// Number of threads the host can run in parallel.
pub static HOST_CONCURRENCY: Lazy<usize> = Lazy::new(|| {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
});

static PANIC_HOOK: Once = Once::new();

/// Route panics through `tracing` before handing them to the previous hook.
/// Installing more than once is a no-op.
pub fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let thread = std::thread::current();
            tracing::error!(
                thread = thread.name().unwrap_or("<unnamed>"),
                "panic: {}",
                info
            );
            previous(info);
        }));
    });
}

/// Loads the compute module and brings up its thread pool.
///
/// Building the pool takes the loaded module by reference, so a pool cannot be
/// requested before the module exists.
#[allow(async_fn_in_trait)]
pub trait ModuleLoader: 'static {
    type Module: ComputeModule;

    async fn init(&mut self) -> anyhow::Result<Self::Module>;

    fn install_panic_hook(&mut self) {
        install_panic_hook();
    }

    fn init_thread_pool(
        &mut self,
        _module: &Self::Module,
        threads: usize,
    ) -> anyhow::Result<ThreadPool> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("atlas-pool-{i}"))
            .build()?;
        Ok(pool)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Uninitialized,
    Initializing,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RuntimeState {
    pub module: Phase,
    pub thread_pool: Phase,
}

impl RuntimeState {
    pub fn is_ready(&self) -> bool {
        self.module == Phase::Ready && self.thread_pool == Phase::Ready
    }
}

pub struct ParallelRuntime<L: ModuleLoader> {
    loader: Mutex<L>,
    module: OnceCell<L::Module>,
    pool: OnceCell<ThreadPool>,
    state: StdMutex<RuntimeState>,
}

impl<L: ModuleLoader> ParallelRuntime<L> {
    pub fn new(loader: L) -> Self {
        Self {
            loader: Mutex::new(loader),
            module: OnceCell::new(),
            pool: OnceCell::new(),
            state: StdMutex::new(RuntimeState::default()),
        }
    }

    pub fn state(&self) -> RuntimeState {
        *self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_ready(&self) -> bool {
        self.state().is_ready()
    }

    fn update(&self, f: impl FnOnce(&mut RuntimeState)) {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut state);
    }

    pub async fn initialize(&self, concurrency: usize) -> Result<()> {
        if concurrency == 0 {
            return Err(Error::InvalidArgument("concurrency must be at least 1"));
        }

        let module = self
            .module
            .get_or_try_init(|| async {
                self.update(|s| s.module = Phase::Initializing);
                let mut loader = self.loader.lock().await;

                match loader.init().await {
                    Ok(module) => {
                        loader.install_panic_hook();
                        self.update(|s| s.module = Phase::Ready);
                        tracing::debug!("Compute module initialized");
                        Ok(module)
                    }
                    Err(e) => {
                        self.update(|s| s.module = Phase::Uninitialized);
                        Err(Error::ModuleLoad(format!("{e:#}")))
                    }
                }
            })
            .await?;

        self.pool
            .get_or_try_init(|| async {
                self.update(|s| s.thread_pool = Phase::Initializing);
                let mut loader = self.loader.lock().await;

                match loader.init_thread_pool(module, concurrency) {
                    Ok(pool) => {
                        self.update(|s| s.thread_pool = Phase::Ready);
                        tracing::debug!("Thread pool initialized with {} threads", pool.current_num_threads());
                        Ok(pool)
                    }
                    Err(e) => {
                        self.update(|s| s.thread_pool = Phase::Uninitialized);
                        Err(Error::ThreadPool(format!("{e:#}")))
                    }
                }
            })
            .await?;

        Ok(())
    }

    /// The module and pool, once both are ready.
    pub fn parts_mut(&mut self) -> Option<(&mut L::Module, &ThreadPool)> {
        Some((self.module.get_mut()?, self.pool.get()?))
    }
}
