//! Initial acceptor tasks

use crate::acceptor::AcceptPool;
use crate::listener::ListenerRecord;
use sparepool_core::{log_error, log_info};
use sparepool_core::{Error, Result};
use std::rc::Rc;

/// Seed every listener with `max_wait_threads` acceptors
///
/// Individual spawn failures are reported and skipped. A listener left with
/// no acceptor at all is an error.
pub fn start_acceptors(pool: &Rc<AcceptPool>, listeners: &[Rc<ListenerRecord>]) -> Result<()> {
    let wanted = pool.limits().max_wait_threads;

    for listener in listeners {
        for _ in 0..wanted {
            match pool.spawn_acceptor(listener) {
                Ok(()) => listener.counters().add_waiter(),
                Err(e) => log_error!(
                    "can't create acceptor task for listener {}: {}",
                    listener.index(),
                    e
                ),
            }
        }

        let started = listener.counters().waiting();
        if started == 0 {
            return Err(Error::NoAcceptors {
                addr: listener.local_addr(),
            });
        }

        log_info!(
            "Listener {} on {}: {} acceptors started",
            listener.index(),
            listener.local_addr(),
            started
        );
    }

    Ok(())
}
