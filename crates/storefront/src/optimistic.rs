//! Optimistic mutations with debounce and rollback.
//!
//! An update is applied to the in-memory value right away and committed to
//! the backend once no newer update for the same key arrived within the
//! debounce window. Each key moves through
//!
//! ```text
//! Clean -> Pending(desired) -> commit ok  -> Clean
//!                           -> commit err -> revert to previous -> Clean
//! ```
//!
//! The revert runs under the slot lock, so readers see either the pending
//! value or a clean key, never a half-reverted one.
//!
//! A newer update for a pending key replaces the desired value and restarts
//! the timer; the earlier timer never fires. Keys are independent.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;

use crate::error::{AppError, Result};

/// The value an optimistic updater edits and commits.
#[async_trait]
pub trait OptimisticTarget<K, V>: Send + Sync + 'static {
    /// Apply `value` locally and return the value it replaced, or `None` if
    /// `key` does not exist.
    fn apply(&self, key: &K, value: &V) -> Option<V>;

    /// Send `value` to the backend.
    async fn commit(&self, key: &K, value: &V) -> Result<()>;

    /// Make the committed `value` durable locally.
    fn settle(&self, key: &K, value: &V);

    /// Put `previous` back if the local value is still `applied`.
    fn revert(&self, key: &K, applied: &V, previous: &V);

    /// Forget local state so the next read trusts the backend.
    fn invalidate(&self);
}

/// How a pending commit ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The value reached the backend.
    Committed,
    /// A newer update for the same key replaced this one.
    Superseded,
    /// Pending updates were dropped, e.g. on logout.
    Cancelled,
}

/// Observable state of one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationState<V> {
    Clean,
    /// Waiting for the debounce or for the backend.
    Pending(V),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Debouncing,
    InFlight,
}

struct Slot<V> {
    desired: V,
    /// Last value the backend is known to hold.
    previous: V,
    generation: u64,
    phase: Phase,
    timer: Option<AbortHandle>,
    waiter: Option<oneshot::Sender<Result<CommitOutcome>>>,
}

/// Resolves when the update is committed, superseded or rolled back.
///
/// Dropping it does not cancel the commit.
#[must_use = "the commit result is only observable through this future"]
pub struct PendingCommit {
    rx: oneshot::Receiver<Result<CommitOutcome>>,
}

impl Future for PendingCommit {
    type Output = Result<CommitOutcome>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|r| r.unwrap_or(Ok(CommitOutcome::Cancelled)))
    }
}

/// Debounced optimistic updates keyed by `K`.
pub struct OptimisticUpdater<K, V> {
    inner: Arc<UpdaterInner<K, V>>,
}

impl<K, V> Clone for OptimisticUpdater<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct UpdaterInner<K, V> {
    target: Arc<dyn OptimisticTarget<K, V>>,
    debounce: Duration,
    slots: Mutex<HashMap<K, Slot<V>>>,
    generation: AtomicU64,
}

impl<K, V> OptimisticUpdater<K, V>
where
    K: Clone + Eq + Hash + std::fmt::Debug + Send + Sync + 'static,
    V: Clone + PartialEq + std::fmt::Debug + Send + Sync + 'static,
{
    #[must_use]
    pub fn new(target: Arc<dyn OptimisticTarget<K, V>>, debounce: Duration) -> Self {
        Self {
            inner: Arc::new(UpdaterInner {
                target,
                debounce,
                slots: Mutex::new(HashMap::new()),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Apply `value` now and schedule its commit.
    ///
    /// Must be called inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if `key` does not exist locally.
    pub fn update(&self, key: K, value: V) -> Result<PendingCommit> {
        let inner = &self.inner;
        let mut slots = inner.lock();

        let Some(replaced) = inner.target.apply(&key, &value) else {
            return Err(AppError::NotFound(format!("{key:?}")));
        };

        let previous = match slots.remove(&key) {
            Some(mut old) => {
                if old.phase == Phase::Debouncing
                    && let Some(timer) = old.timer.take()
                {
                    timer.abort();
                }
                if let Some(waiter) = old.waiter.take() {
                    let _ = waiter.send(Ok(CommitOutcome::Superseded));
                }
                old.previous
            }
            None => replaced,
        };

        let generation = inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (tx, rx) = oneshot::channel();
        let task = {
            let inner = Arc::clone(inner);
            let key = key.clone();
            tokio::spawn(async move {
                tokio::time::sleep(inner.debounce).await;
                inner.fire(key, generation).await;
            })
        };

        tracing::debug!(?key, ?value, generation, "Optimistic update scheduled");
        slots.insert(
            key,
            Slot {
                desired: value,
                previous,
                generation,
                phase: Phase::Debouncing,
                timer: Some(task.abort_handle()),
                waiter: Some(tx),
            },
        );
        Ok(PendingCommit { rx })
    }

    /// Current state of `key`.
    #[must_use]
    pub fn state(&self, key: &K) -> MutationState<V> {
        self.inner
            .lock()
            .get(key)
            .map_or(MutationState::Clean, |slot| {
                MutationState::Pending(slot.desired.clone())
            })
    }

    /// Whether any key has an uncommitted update.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.inner.lock().is_empty()
    }

    /// Drop every pending update. Timers that have not fired never will;
    /// in-flight commits complete but no longer touch local state.
    pub fn cancel_all(&self) {
        let drained: Vec<Slot<V>> = self.inner.lock().drain().map(|(_, s)| s).collect();
        for mut slot in drained {
            if slot.phase == Phase::Debouncing
                && let Some(timer) = slot.timer.take()
            {
                timer.abort();
            }
            if let Some(waiter) = slot.waiter.take() {
                let _ = waiter.send(Ok(CommitOutcome::Cancelled));
            }
        }
    }
}

impl<K, V> UpdaterInner<K, V>
where
    K: Clone + Eq + Hash + std::fmt::Debug + Send + Sync + 'static,
    V: Clone + PartialEq + std::fmt::Debug + Send + Sync + 'static,
{
    fn lock(&self) -> MutexGuard<'_, HashMap<K, Slot<V>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn fire(&self, key: K, generation: u64) {
        let desired = {
            let mut slots = self.lock();
            let Some(slot) = slots.get_mut(&key) else {
                return;
            };
            if slot.generation != generation {
                return;
            }
            slot.phase = Phase::InFlight;
            slot.timer = None;
            slot.desired.clone()
        };

        let result = self.target.commit(&key, &desired).await;

        let mut slots = self.lock();
        let Some(slot) = slots.get_mut(&key) else {
            // Cancelled while in flight.
            return;
        };

        if slot.generation != generation {
            // A newer update owns the key now.
            match result {
                Ok(()) => slot.previous = desired,
                Err(e) => {
                    tracing::debug!(?key, error = %e, "Superseded commit failed");
                }
            }
            return;
        }

        match result {
            Ok(()) => {
                let waiter = slots.remove(&key).and_then(|mut s| s.waiter.take());
                drop(slots);
                self.target.settle(&key, &desired);
                tracing::debug!(?key, generation, "Optimistic update committed");
                if let Some(waiter) = waiter {
                    let _ = waiter.send(Ok(CommitOutcome::Committed));
                }
            }
            Err(e) => {
                tracing::warn!(?key, error = %e, "Optimistic update failed, reverting");
                let waiter = slots.remove(&key).and_then(|mut s| {
                    self.target.revert(&key, &s.desired, &s.previous);
                    s.waiter.take()
                });
                self.target.invalidate();
                drop(slots);
                if let Some(waiter) = waiter {
                    let _ = waiter.send(Err(e));
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::VecDeque;

    use super::*;
    use crate::api::ApiError;

    #[derive(Default)]
    struct Counter {
        values: Mutex<HashMap<u32, i32>>,
        commits: Mutex<Vec<(u32, i32)>>,
        failures: Mutex<VecDeque<bool>>,
        settled: Mutex<Vec<(u32, i32)>>,
        invalidated: AtomicU64,
    }

    impl Counter {
        fn with(values: &[(u32, i32)]) -> Arc<Self> {
            let counter = Self::default();
            counter.values.lock().unwrap().extend(values.iter().copied());
            Arc::new(counter)
        }

        fn fail_next(&self) {
            self.failures.lock().unwrap().push_back(true);
        }

        fn value(&self, key: u32) -> i32 {
            self.values.lock().unwrap()[&key]
        }

        fn commits(&self) -> Vec<(u32, i32)> {
            self.commits.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl OptimisticTarget<u32, i32> for Counter {
        fn apply(&self, key: &u32, value: &i32) -> Option<i32> {
            self.values
                .lock()
                .unwrap()
                .get_mut(key)
                .map(|v| std::mem::replace(v, *value))
        }

        async fn commit(&self, key: &u32, value: &i32) -> Result<()> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.commits.lock().unwrap().push((*key, *value));
            if self.failures.lock().unwrap().pop_front().unwrap_or(false) {
                return Err(AppError::Api(ApiError::Rejected("Out of stock".to_string())));
            }
            Ok(())
        }

        fn settle(&self, key: &u32, value: &i32) {
            self.settled.lock().unwrap().push((*key, *value));
        }

        fn revert(&self, key: &u32, applied: &i32, previous: &i32) {
            let mut values = self.values.lock().unwrap();
            if let Some(v) = values.get_mut(key) {
                if v == applied {
                    *v = *previous;
                }
            }
        }

        fn invalidate(&self) {
            self.invalidated.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn updater(counter: &Arc<Counter>) -> OptimisticUpdater<u32, i32> {
        OptimisticUpdater::new(counter.clone(), Duration::from_millis(500))
    }

    #[tokio::test(start_paused = true)]
    async fn test_applies_immediately_and_commits() {
        let counter = Counter::with(&[(1, 1)]);
        let updater = updater(&counter);

        let pending = updater.update(1, 4).unwrap();
        assert_eq!(counter.value(1), 4);
        assert_eq!(updater.state(&1), MutationState::Pending(4));
        assert!(counter.commits().is_empty());

        assert_eq!(pending.await.unwrap(), CommitOutcome::Committed);
        assert_eq!(counter.commits(), vec![(1, 4)]);
        assert_eq!(*counter.settled.lock().unwrap(), vec![(1, 4)]);
        assert_eq!(updater.state(&1), MutationState::Clean);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_reverts_and_rejects() {
        let counter = Counter::with(&[(1, 1)]);
        counter.fail_next();
        let updater = updater(&counter);

        let pending = updater.update(1, 4).unwrap();
        assert_eq!(counter.value(1), 4);

        let err = pending.await.unwrap_err();
        assert_eq!(err.to_string(), "Out of stock");
        assert_eq!(counter.value(1), 1);
        assert_eq!(counter.invalidated.load(Ordering::SeqCst), 1);
        assert_eq!(updater.state(&1), MutationState::Clean);
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_is_pending_until_the_backend_answers() {
        let counter = Counter::with(&[(1, 1)]);
        counter.fail_next();
        let updater = updater(&counter);

        let pending = updater.update(1, 4).unwrap();
        // Past the debounce, inside the commit.
        tokio::time::sleep(Duration::from_millis(520)).await;
        assert_eq!(updater.state(&1), MutationState::Pending(4));
        assert_eq!(counter.value(1), 4);

        assert!(pending.await.is_err());
        assert_eq!(updater.state(&1), MutationState::Clean);
        assert_eq!(counter.value(1), 1);
        assert!(!updater.has_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_key_collapses_to_latest() {
        let counter = Counter::with(&[(1, 1)]);
        let updater = updater(&counter);

        let first = updater.update(1, 2).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        let second = updater.update(1, 3).unwrap();

        assert_eq!(first.await.unwrap(), CommitOutcome::Superseded);
        assert_eq!(second.await.unwrap(), CommitOutcome::Committed);
        assert_eq!(counter.commits(), vec![(1, 3)]);
        assert_eq!(counter.value(1), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_collapsed_failure_restores_original() {
        let counter = Counter::with(&[(1, 1)]);
        counter.fail_next();
        let updater = updater(&counter);

        let _first = updater.update(1, 2).unwrap();
        let second = updater.update(1, 3).unwrap();

        assert!(second.await.is_err());
        assert_eq!(counter.value(1), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_independent() {
        let counter = Counter::with(&[(1, 1), (2, 1)]);
        let updater = updater(&counter);

        let a = updater.update(1, 5).unwrap();
        let b = updater.update(2, 7).unwrap();

        assert_eq!(a.await.unwrap(), CommitOutcome::Committed);
        assert_eq!(b.await.unwrap(), CommitOutcome::Committed);
        let mut commits = counter.commits();
        commits.sort_unstable();
        assert_eq!(commits, vec![(1, 5), (2, 7)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_while_in_flight() {
        let counter = Counter::with(&[(1, 1)]);
        counter.fail_next();
        counter.failures.lock().unwrap().push_back(true);
        let updater = updater(&counter);

        let first = updater.update(1, 2).unwrap();
        // Past the debounce, inside the commit.
        tokio::time::sleep(Duration::from_millis(520)).await;
        let second = updater.update(1, 3).unwrap();

        assert_eq!(first.await.unwrap(), CommitOutcome::Superseded);
        assert!(second.await.is_err());
        assert_eq!(counter.commits(), vec![(1, 2), (1, 3)]);
        assert_eq!(counter.value(1), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_key_is_rejected() {
        let counter = Counter::with(&[(1, 1)]);
        let updater = updater(&counter);
        assert!(matches!(updater.update(9, 1), Err(AppError::NotFound(_))));
        assert!(!updater.has_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all_stops_timers() {
        let counter = Counter::with(&[(1, 1)]);
        let updater = updater(&counter);

        let pending = updater.update(1, 2).unwrap();
        updater.cancel_all();

        assert_eq!(pending.await.unwrap(), CommitOutcome::Cancelled);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(counter.commits().is_empty());
    }
}
