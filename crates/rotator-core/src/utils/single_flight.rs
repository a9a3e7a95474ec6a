//! Per-key single-flight execution.
//!
//! The first caller for a key starts the operation; callers arriving while it is in
//! flight await the same shared result. The entry is removed by the operation itself
//! once it settles, success or failure, so the next call starts fresh.

use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};

type SharedResult<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;

/// Map of in-flight operations keyed by `K`.
pub struct SingleFlight<K, T, E>
where
    K: Eq + Hash,
{
    inflight: Arc<DashMap<K, SharedResult<T, E>>>,
}

impl<K, T, E> Clone for SingleFlight<K, T, E>
where
    K: Eq + Hash,
{
    fn clone(&self) -> Self {
        Self { inflight: Arc::clone(&self.inflight) }
    }
}

impl<K, T, E> Default for SingleFlight<K, T, E>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self { inflight: Arc::new(DashMap::new()) }
    }
}

impl<K, T, E> SingleFlight<K, T, E>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `make()` for `key` unless an operation for `key` is already in flight,
    /// in which case its result is awaited instead and `make` is never called.
    pub async fn run<F, Fut>(&self, key: K, make: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let shared = match self.inflight.entry(key.clone()) {
            Entry::Occupied(existing) => existing.get().clone(),
            Entry::Vacant(slot) => {
                let map = Arc::clone(&self.inflight);
                let operation = make();
                let shared = async move {
                    let result = operation.await;
                    let _ = map.remove(&key);
                    result
                }
                .boxed()
                .shared();
                let _ = slot.insert(shared.clone());
                shared
            },
        };
        shared.await
    }

    /// Whether an operation for `key` is currently in flight.
    pub fn is_in_flight(&self, key: &K) -> bool {
        self.inflight.contains_key(key)
    }

    pub fn in_flight_count(&self) -> usize {
        self.inflight.len()
    }
}
