//! Acceptor pool bookkeeping
//!
//! Every listener carries a [`PoolCounters`] shared by all acceptor tasks
//! bound to it. The counters use `Cell` and are deliberately `!Sync`: all
//! tasks run on one thread and only switch at `.await` points, so each
//! method below is a single uninterruptible step.
//!
//! Transitions, in the order an acceptor goes through them:
//!
//! ```text
//!   spawned ──add_waiter──► waiting ──begin_serving──► busy
//!      ▲                       ▲                         │
//!      └── needs_spare ◄───────┼──── finish_serving ◄────┘
//!                              └──── has_surplus? ──► retire
//! ```

use serde::{Deserialize, Serialize};
use std::cell::Cell;

/// Thresholds that bound the pool of one listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolLimits {
    /// Hard cap on waiting + busy tasks
    pub max_threads: usize,
    /// Spare tasks above which a task that finished serving retires
    pub max_wait_threads: usize,
    /// Spare tasks below which a task that just accepted spawns a sibling
    pub min_wait_threads: usize,
}

/// Live task counters for one listener
#[derive(Debug, Default)]
pub struct PoolCounters {
    waiting: Cell<usize>,
    busy: Cell<usize>,
    requests: Cell<u64>,
}

/// Point-in-time copy of [`PoolCounters`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Tasks blocked in accept
    pub waiting: usize,
    /// Tasks serving a connection
    pub busy: usize,
    /// waiting + busy
    pub total: usize,
    /// Requests served to completion
    pub requests: u64,
}

impl PoolCounters {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Tasks currently blocked in accept
    pub fn waiting(&self) -> usize {
        self.waiting.get()
    }

    /// Tasks currently serving a connection
    pub fn busy(&self) -> usize {
        self.busy.get()
    }

    /// All live tasks
    pub fn total(&self) -> usize {
        self.waiting.get() + self.busy.get()
    }

    /// Requests served to completion
    pub fn requests(&self) -> u64 {
        self.requests.get()
    }

    /// Credit a task that was just spawned and will start in accept
    pub fn add_waiter(&self) {
        self.waiting.set(self.waiting.get() + 1);
    }

    /// A waiting task accepted a connection
    pub fn begin_serving(&self) {
        decrement(&self.waiting);
        self.busy.set(self.busy.get() + 1);
    }

    /// Whether a task that just accepted should spawn a spare sibling
    pub fn needs_spare(&self, limits: &PoolLimits) -> bool {
        self.waiting() < limits.min_wait_threads && self.total() < limits.max_threads
    }

    /// A busy task finished with its connection and is idle again
    pub fn finish_serving(&self) {
        self.waiting.set(self.waiting.get() + 1);
        decrement(&self.busy);
    }

    /// Whether an idle task should retire instead of accepting again
    pub fn has_surplus(&self, limits: &PoolLimits) -> bool {
        self.waiting() > limits.max_wait_threads
    }

    /// An idle task terminates
    pub fn retire(&self) {
        decrement(&self.waiting);
    }

    /// One request-response cycle completed
    pub fn record_request(&self) {
        self.requests.set(self.requests.get() + 1);
    }

    /// Copy the current values
    pub fn snapshot(&self) -> PoolStats {
        PoolStats {
            waiting: self.waiting(),
            busy: self.busy(),
            total: self.total(),
            requests: self.requests(),
        }
    }
}

fn decrement(cell: &Cell<usize>) {
    let value = cell.get();
    debug_assert!(value > 0, "pool counter underflow");
    cell.set(value.saturating_sub(1));
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const LIMITS: PoolLimits = PoolLimits {
        max_threads: 8,
        max_wait_threads: 4,
        min_wait_threads: 2,
    };

    fn bootstrap(limits: &PoolLimits) -> PoolCounters {
        let counters = PoolCounters::new();
        for _ in 0..limits.max_wait_threads {
            counters.add_waiter();
        }
        counters
    }

    #[test]
    fn test_bootstrap_counts() {
        let counters = bootstrap(&LIMITS);
        assert_eq!(counters.waiting(), 4);
        assert_eq!(counters.busy(), 0);
        assert_eq!(counters.requests(), 0);
    }

    #[test]
    fn test_accept_without_spawn() {
        let counters = bootstrap(&LIMITS);
        counters.begin_serving();
        assert_eq!((counters.waiting(), counters.busy()), (3, 1));
        assert!(!counters.needs_spare(&LIMITS));
    }

    #[test]
    fn test_accept_with_spawn_when_floor_raised() {
        let limits = PoolLimits {
            min_wait_threads: 4,
            ..LIMITS
        };
        let counters = bootstrap(&limits);
        counters.begin_serving();
        assert!(counters.needs_spare(&limits));
        counters.add_waiter();
        assert_eq!((counters.waiting(), counters.busy()), (4, 1));
    }

    #[test]
    fn test_spawn_blocked_at_cap() {
        let limits = PoolLimits {
            max_threads: 4,
            max_wait_threads: 4,
            min_wait_threads: 4,
        };
        let counters = bootstrap(&limits);
        counters.begin_serving();
        assert!(!counters.needs_spare(&limits));
    }

    #[test]
    fn test_surplus_retires_without_touching_busy() {
        let counters = bootstrap(&LIMITS);
        counters.begin_serving();
        counters.add_waiter();
        counters.begin_serving();
        counters.add_waiter();
        assert_eq!((counters.waiting(), counters.busy()), (4, 2));

        counters.finish_serving();
        assert!(counters.has_surplus(&LIMITS));
        counters.retire();
        assert_eq!((counters.waiting(), counters.busy()), (4, 1));
        assert!(!counters.has_surplus(&LIMITS));
    }

    #[test]
    fn test_snapshot() {
        let counters = bootstrap(&LIMITS);
        counters.begin_serving();
        counters.record_request();
        assert_eq!(
            counters.snapshot(),
            PoolStats {
                waiting: 3,
                busy: 1,
                total: 4,
                requests: 1
            }
        );
    }

    /// Drives the counters the way acceptor tasks do, tracking each task's
    /// state independently so the counters can be checked against reality.
    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Task {
        Waiting,
        Busy,
    }

    fn limits_strategy() -> impl Strategy<Value = PoolLimits> {
        (1usize..10).prop_flat_map(|max_threads| {
            (1..=max_threads).prop_flat_map(move |max_wait| {
                (0..=max_wait).prop_map(move |min_wait| PoolLimits {
                    max_threads,
                    max_wait_threads: max_wait,
                    min_wait_threads: min_wait,
                })
            })
        })
    }

    proptest! {
        #[test]
        fn prop_counters_track_live_tasks(
            limits in limits_strategy(),
            events in proptest::collection::vec((any::<bool>(), any::<prop::sample::Index>()), 0..200),
        ) {
            let counters = PoolCounters::new();
            let mut tasks = Vec::new();
            for _ in 0..limits.max_wait_threads {
                counters.add_waiter();
                tasks.push(Task::Waiting);
            }
            let mut served = 0u64;

            for (accept, pick) in events {
                let state = if accept { Task::Waiting } else { Task::Busy };
                let candidates: Vec<usize> = tasks
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| **t == state)
                    .map(|(i, _)| i)
                    .collect();
                if candidates.is_empty() {
                    continue;
                }
                let i = candidates[pick.index(candidates.len())];

                if accept {
                    counters.begin_serving();
                    tasks[i] = Task::Busy;
                    if counters.needs_spare(&limits) {
                        counters.add_waiter();
                        tasks.push(Task::Waiting);
                    }
                } else {
                    counters.record_request();
                    served += 1;
                    counters.finish_serving();
                    if counters.has_surplus(&limits) {
                        counters.retire();
                        tasks.swap_remove(i);
                    } else {
                        tasks[i] = Task::Waiting;
                    }
                }

                let waiting = tasks.iter().filter(|t| **t == Task::Waiting).count();
                let busy = tasks.len() - waiting;
                prop_assert_eq!(counters.waiting(), waiting);
                prop_assert_eq!(counters.busy(), busy);
                prop_assert!(counters.total() <= limits.max_threads.max(limits.max_wait_threads));
                prop_assert!(counters.waiting() <= limits.max_wait_threads);
            }
            prop_assert_eq!(counters.requests(), served);
        }
    }
}
