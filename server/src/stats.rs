//! Periodic pool status lines
//!
//! A read-only observer: it never touches the counters it prints.

use crate::listener::ListenerRecord;
use sparepool_core::log_info;
use sparepool_core::PoolStats;
use std::rc::Rc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};

/// Log one status line per listener and return the snapshots
pub fn report(listeners: &[Rc<ListenerRecord>]) -> Vec<PoolStats> {
    listeners
        .iter()
        .map(|listener| {
            let stats = listener.counters().snapshot();
            log_info!(
                listener = listener.index(),
                addr = %listener.local_addr(),
                waiting = stats.waiting,
                busy = stats.busy,
                total = stats.total,
                requests = stats.requests,
                "pool status"
            );
            stats
        })
        .collect()
}

/// Report every `period`, forever
pub async fn report_loop(listeners: Vec<Rc<ListenerRecord>>, period: Duration) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;
        report(&listeners);
    }
}
