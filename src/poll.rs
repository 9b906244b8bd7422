//! Bounded retry-poll primitive and the render completion coordinator
//!
//! Cooperative single-threaded polling: a producer is re-evaluated every
//! `interval` until it yields a value or the retry budget runs out. Used to
//! await cache population by a concurrent fetch, and as a cross-component
//! completion barrier.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Bounded polling parameters.
///
/// The default mirrors a 5s ceiling: 50 retries at 100ms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 50,
            interval: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// Single non-blocking probe: one evaluation, no sleeps.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            interval: Duration::ZERO,
        }
    }

    pub fn new(max_retries: u32, interval: Duration) -> Self {
        Self {
            max_retries,
            interval,
        }
    }
}

/// Re-invoke `producer` until it yields `Some` or the budget is exhausted.
///
/// Evaluates the producer exactly `max_retries + 1` times in the worst case
/// and resolves with the last result. Never fails.
pub async fn wait_for<T, F>(mut producer: F, policy: RetryPolicy) -> Option<T>
where
    F: FnMut() -> Option<T>,
{
    let mut retries = 0;
    loop {
        if let Some(value) = producer() {
            return Some(value);
        }
        if retries >= policy.max_retries {
            return None;
        }
        retries += 1;
        tokio::time::sleep(policy.interval).await;
    }
}

/// Barrier over a set of declarative render requests.
///
/// Replaces ambient mutable render state with an injected collaborator: the
/// host declares how many renders it expects, each render marks itself ready,
/// and late work (deferred scripts, meta injection) polls for completion.
#[derive(Debug, Default)]
pub struct CompletionCoordinator {
    expected: AtomicUsize,
    observed: AtomicUsize,
}

impl CompletionCoordinator {
    pub fn new(expected: usize) -> Self {
        Self {
            expected: AtomicUsize::new(expected),
            observed: AtomicUsize::new(0),
        }
    }

    pub fn set_expected(&self, expected: usize) {
        self.expected.store(expected, Ordering::SeqCst);
    }

    /// Register one more pending render request.
    pub fn expect_one(&self) {
        self.expected.fetch_add(1, Ordering::SeqCst);
    }

    pub fn expected_count(&self) -> usize {
        self.expected.load(Ordering::SeqCst)
    }

    pub fn observed_count(&self) -> usize {
        self.observed.load(Ordering::SeqCst)
    }

    /// Signal that one render request finished.
    pub fn mark_ready(&self) {
        self.observed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn is_complete(&self) -> bool {
        self.observed_count() >= self.expected_count()
    }

    /// Poll until every expected render has signalled ready.
    ///
    /// Returns `false` when the retry budget ran out first; callers proceed
    /// anyway, matching the barrier's best-effort contract.
    pub async fn wait_complete(&self, policy: RetryPolicy) -> bool {
        wait_for(|| self.is_complete().then_some(()), policy)
            .await
            .is_some()
    }
}
