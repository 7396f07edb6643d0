//! Runtime and lifecycle orchestration
//!
//! The whole server runs on one OS thread: a current-thread tokio runtime
//! driving a `LocalSet`, which plays the role of the cooperative scheduler.

use crate::acceptor::{AcceptPool, LocalSpawner, TaskSpawner};
use crate::bootstrap::start_acceptors;
use crate::listener::{create_listeners, ListenerRecord, ListenerTable};
use crate::session::SessionSettings;
use crate::stats::report_loop;
use sparepool_core::{log_error, log_info, log_warn};
use sparepool_core::{Config, Error, Result};
use std::rc::Rc;
use tokio::signal;
use tokio::task::LocalSet;

/// A running set of listeners and their acceptor pool
pub struct Server {
    listeners: ListenerTable,
    pool: Rc<AcceptPool>,
}

impl Server {
    /// Open listeners, seed acceptors and start the status reporter
    ///
    /// Tasks are queued on `local` and run once it is driven. Must be called
    /// with a runtime entered.
    pub fn start(config: &Config, local: &Rc<LocalSet>) -> Result<Self> {
        Self::start_with(config, LocalSpawner::new(local))
    }

    /// Like [`Server::start`], spawning acceptors through `spawner`
    pub fn start_with(config: &Config, spawner: impl TaskSpawner + 'static) -> Result<Self> {
        let listeners = create_listeners(config)?;
        let pool = AcceptPool::new(
            config.pool.limits(),
            SessionSettings::from(&config.session),
            spawner,
        );

        start_acceptors(&pool, &listeners)?;

        let period = config.stats.report_interval;
        if !period.is_zero() {
            let reporter = report_loop(listeners.clone(), period);
            if let Err(e) = pool.spawn_task(Box::pin(reporter)) {
                log_error!("can't start pool status reporter: {}", e);
            }
        }

        Ok(Self { listeners, pool })
    }

    /// Listener table, indexed by listener index
    pub fn listeners(&self) -> &[Rc<ListenerRecord>] {
        &self.listeners
    }

    /// Shared acceptor pool handle
    pub fn pool(&self) -> &Rc<AcceptPool> {
        &self.pool
    }
}

/// Start serving and return once a shutdown signal arrives
///
/// `local` must be the set driving this future.
pub async fn run(config: Config, local: &Rc<LocalSet>) -> Result<()> {
    let server = Server::start(&config, local)?;
    log_info!(
        "Serving {} listener(s) with {} spare acceptors each",
        server.listeners().len(),
        server.pool().limits().max_wait_threads
    );

    shutdown_signal().await?;
    log_warn!("Received shutdown signal");

    for listener in server.listeners() {
        let stats = listener.counters().snapshot();
        log_info!(
            "Listener {} on {} served {} requests",
            listener.index(),
            listener.local_addr(),
            stats.requests
        );
    }

    log_info!("Shutdown complete");
    Ok(())
}

/// Build the single-threaded runtime and drive [`run`] to completion
pub fn serve(config: Config) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(Error::Runtime)?;

    let local = Rc::new(LocalSet::new());
    local.block_on(&runtime, run(config, &local))
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = signal::ctrl_c() => result?,
            _ = terminate.recv() => {}
        }
    }

    #[cfg(not(unix))]
    signal::ctrl_c().await?;

    Ok(())
}
