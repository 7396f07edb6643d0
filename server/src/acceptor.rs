//! Self-regulating accept loop
//!
//! Each listener is served by a pool of identical acceptor tasks, all
//! running on one thread inside a `LocalSet`. There is no supervisor: the
//! task that just accepted a connection decides whether to spawn a spare
//! sibling, and a task that just finished serving decides whether to retire.
//!
//! Counter updates between two `.await` points cannot interleave with any
//! other task, so the pool counters need no locking.

use crate::listener::ListenerRecord;
use crate::session::{handle_session, SessionSettings};
use sparepool_core::{log_debug, log_error};
use sparepool_core::{PoolLimits, SpawnError};
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use tokio::net::TcpStream;
use tokio::task::LocalSet;

/// A `!Send` task ready to be scheduled
pub type LocalTask = Pin<Box<dyn Future<Output = ()> + 'static>>;

/// Capability to launch another task on the local scheduler
pub trait TaskSpawner {
    /// Schedule `task`; it first runs once the caller yields
    fn spawn(&self, task: LocalTask) -> Result<(), SpawnError>;
}

/// Spawns onto one `LocalSet`
///
/// Works whether or not the set is currently being driven; queued tasks run
/// once it is. The set is held weakly since its own tasks own the spawner.
#[derive(Debug, Clone)]
pub struct LocalSpawner {
    set: Weak<LocalSet>,
}

impl LocalSpawner {
    /// Spawner targeting `set`
    pub fn new(set: &Rc<LocalSet>) -> Self {
        Self {
            set: Rc::downgrade(set),
        }
    }
}

impl TaskSpawner for LocalSpawner {
    fn spawn(&self, task: LocalTask) -> Result<(), SpawnError> {
        let set = self.set.upgrade().ok_or(SpawnError::SchedulerClosed)?;
        set.spawn_local(task);
        Ok(())
    }
}

/// An accepted client and its address, owned by the task that accepted it
#[derive(Debug)]
pub struct ClientConnection {
    /// Connected socket; closed when dropped
    pub stream: TcpStream,
    /// Peer address captured at accept time
    pub peer: SocketAddr,
}

/// Shared settings and spawn capability for every acceptor task
pub struct AcceptPool {
    limits: PoolLimits,
    session: SessionSettings,
    spawner: Box<dyn TaskSpawner>,
}

impl AcceptPool {
    /// Create a pool handle
    pub fn new(
        limits: PoolLimits,
        session: SessionSettings,
        spawner: impl TaskSpawner + 'static,
    ) -> Rc<Self> {
        Rc::new(Self {
            limits,
            session,
            spawner: Box::new(spawner),
        })
    }

    /// Pool thresholds
    pub fn limits(&self) -> &PoolLimits {
        &self.limits
    }

    /// Session settings handed to every connection
    pub fn session(&self) -> &SessionSettings {
        &self.session
    }

    /// Launch one acceptor task for `listener`
    ///
    /// Does not touch the counters; the caller credits the new task as
    /// waiting only when this succeeds.
    pub fn spawn_acceptor(self: &Rc<Self>, listener: &Rc<ListenerRecord>) -> Result<(), SpawnError> {
        let task = accept_loop(Rc::clone(self), Rc::clone(listener));
        self.spawn_task(Box::pin(task))
    }

    /// Launch any other task through the pool's spawner
    pub fn spawn_task(&self, task: LocalTask) -> Result<(), SpawnError> {
        self.spawner.spawn(task)
    }
}

/// Body of one acceptor task
///
/// Accepts, serves and loops until spare acceptors exceed
/// `max_wait_threads`, then retires. Accept errors are reported and
/// retried; nothing here is fatal.
pub async fn accept_loop(pool: Rc<AcceptPool>, listener: Rc<ListenerRecord>) {
    let counters = listener.counters();
    let limits = pool.limits;

    while !counters.has_surplus(&limits) {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                log_error!("can't accept connection on {}: {}", listener.local_addr(), e);
                continue;
            }
        };
        let mut client = ClientConnection { stream, peer };

        counters.begin_serving();
        if counters.needs_spare(&limits) {
            match pool.spawn_acceptor(&listener) {
                Ok(()) => counters.add_waiter(),
                Err(e) => log_error!(
                    "can't create acceptor task for listener {}: {}",
                    listener.index(),
                    e
                ),
            }
        }

        handle_session(&mut client.stream, client.peer, counters, &pool.session).await;

        drop(client);
        counters.finish_serving();
    }

    counters.retire();
    log_debug!(
        "acceptor on listener {} retired ({} waiting, {} busy)",
        listener.index(),
        counters.waiting(),
        counters.busy()
    );
}
