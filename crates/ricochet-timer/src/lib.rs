//! Cancellable per-key delayed actions for Ricochet.
//!
//! When a player's connection drops they are not removed straight away.
//! Instead a *grace timer* is armed for them; if they reconnect the timer
//! is cancelled, otherwise it fires and the expiry action runs.
//!
//! [`GraceTimers`] owns at most one pending timer per key:
//!
//! ```text
//! arm(k) ──→ [pending] ──(after `d`)──→ on_expire() runs, entry removed
//!                │
//!                ├──(cancel(k))──→ aborted, entry removed
//!                └──(arm(k) again)──→ old aborted, new one pending
//! ```
//!
//! # Concurrency
//!
//! The timer table has its own small `std::sync::Mutex`, held only while
//! inserting or removing an entry, never across an `.await`. Expiry
//! actions run on their own Tokio task; anything they touch (room state)
//! has to be locked by the action itself.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// A pending timer. `generation` tells a firing task whether it is still
/// the timer on record for its key.
struct Armed {
    generation: u64,
    task: JoinHandle<()>,
}

type Table<K> = Arc<Mutex<HashMap<K, Armed>>>;

/// A table of cancellable delayed actions, one per key.
///
/// Arming a key that already has a pending timer replaces it, so a
/// key can never fire twice for overlapping arms. Dropping the table
/// aborts everything still pending.
pub struct GraceTimers<K> {
    entries: Table<K>,
    next_generation: AtomicU64,
}

impl<K> GraceTimers<K>
where
    K: Eq + Hash + Clone + fmt::Display + Send + Sync + 'static,
{
    /// Creates an empty timer table.
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(1),
        }
    }

    /// Arms a timer for `key` that runs `on_expire` after `after`.
    ///
    /// Any timer already pending for `key` is aborted first. Must be
    /// called from within a Tokio runtime.
    pub fn arm<F, Fut>(&self, key: K, after: Duration, on_expire: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let entries = Arc::clone(&self.entries);
        let task_key = key.clone();

        // Spawn and insert under the table lock so a zero-length timer
        // can't look itself up before its entry exists.
        let mut table = lock(&self.entries);
        let task = tokio::spawn(async move {
            tokio::time::sleep(after).await;

            let current = {
                let mut table = lock(&entries);
                match table.get(&task_key) {
                    Some(armed) if armed.generation == generation => {
                        table.remove(&task_key);
                        true
                    }
                    _ => false,
                }
            };

            if current {
                debug!(key = %task_key, "grace timer expired");
                on_expire().await;
            } else {
                trace!(key = %task_key, "superseded grace timer woke, ignoring");
            }
        });

        if let Some(previous) = table.insert(key.clone(), Armed { generation, task })
        {
            previous.task.abort();
            debug!(%key, "grace timer re-armed, previous timer aborted");
        } else {
            debug!(%key, after_ms = after.as_millis() as u64, "grace timer armed");
        }
    }

    /// Cancels the pending timer for `key`.
    ///
    /// Returns `true` if a timer was pending. Cancelling an unknown key
    /// is a no-op.
    pub fn cancel(&self, key: &K) -> bool {
        match lock(&self.entries).remove(key) {
            Some(armed) => {
                armed.task.abort();
                debug!(%key, "grace timer cancelled");
                true
            }
            None => false,
        }
    }

    /// Returns `true` if a timer is pending for `key`.
    pub fn is_armed(&self, key: &K) -> bool {
        lock(&self.entries).contains_key(key)
    }

    /// Number of pending timers.
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    /// Returns `true` if no timers are pending.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Aborts every pending timer.
    pub fn cancel_all(&self) {
        let drained: Vec<Armed> = lock(&self.entries).drain().map(|(_, a)| a).collect();
        for armed in drained {
            armed.task.abort();
        }
    }
}

impl<K> Default for GraceTimers<K>
where
    K: Eq + Hash + Clone + fmt::Display + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Drop for GraceTimers<K> {
    fn drop(&mut self) {
        let mut table = lock(&self.entries);
        for (_, armed) in table.drain() {
            armed.task.abort();
        }
    }
}

/// Locks the table. A panic inside an expiry action can't leave the map
/// half-updated, so a poisoned lock is safe to reuse.
fn lock<K>(entries: &Mutex<HashMap<K, Armed>>) -> MutexGuard<'_, HashMap<K, Armed>> {
    entries.lock().unwrap_or_else(PoisonError::into_inner)
}
