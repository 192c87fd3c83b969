//! Single-flight de-duplication of concurrent generations.
//!
//! Two callers asking for the same missing key at the same time share one
//! generation: the first caller spawns it as a task, later callers await
//! the same [`Shared`] join handle. The task removes its own map entry
//! when it settles, whether or not anyone is still waiting, so a failed
//! key can be retried by the next caller and a dropped caller never
//! strands a half-run generation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use tracing::debug;

use crate::telemetry;
use crate::types::CacheKey;
use crate::{Result, ScaffdiffError};

type SharedGeneration =
    Shared<BoxFuture<'static, std::result::Result<Arc<str>, Arc<ScaffdiffError>>>>;

type PendingMap = HashMap<CacheKey, (u64, SharedGeneration)>;

/// Map from cache key to the generation currently running for it.
#[derive(Default)]
pub struct InFlight {
    pending: Arc<Mutex<PendingMap>>,
    next_id: AtomicU64,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys with a generation in progress.
    pub fn len(&self) -> usize {
        lock(&self.pending).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Await the generation for `key`, spawning it with `start` if none is running.
    ///
    /// `start` is called at most once per settled generation. Every waiter
    /// receives the same patch or the same error. The spawned generation
    /// runs to completion even if every waiter is dropped.
    pub async fn run<F>(&self, key: &CacheKey, start: F) -> Result<Arc<str>>
    where
        F: FnOnce() -> BoxFuture<'static, Result<Arc<str>>>,
    {
        let generation = {
            let mut pending = lock(&self.pending);
            match pending.get(key) {
                Some((_, existing)) => {
                    metrics::counter!(telemetry::INFLIGHT_JOINS_TOTAL).increment(1);
                    debug!(key = %key, "joining generation already in flight");
                    existing.clone()
                }
                None => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let generation = self.spawn(key.clone(), id, start());
                    pending.insert(key.clone(), (id, generation.clone()));
                    generation
                }
            }
        };

        generation
            .await
            .map_err(|e| Arc::try_unwrap(e).unwrap_or_else(ScaffdiffError::Shared))
    }

    fn spawn(
        &self,
        key: CacheKey,
        id: u64,
        work: BoxFuture<'static, Result<Arc<str>>>,
    ) -> SharedGeneration {
        let pending = Arc::clone(&self.pending);
        let handle = tokio::spawn(async move {
            let result = work.await.map_err(Arc::new);
            {
                // Only this generation's entry; a later one may already own the key.
                let mut map = lock(&pending);
                if map.get(&key).is_some_and(|(current, _)| *current == id) {
                    map.remove(&key);
                }
            }
            result
        });
        handle
            .map(|joined| match joined {
                Ok(result) => result,
                Err(e) => Err(Arc::new(ScaffdiffError::DiffGeneration(format!(
                    "generation task failed: {e}"
                )))),
            })
            .boxed()
            .shared()
    }
}

fn lock(pending: &Mutex<PendingMap>) -> MutexGuard<'_, PendingMap> {
    // The map holds no invariants a panicking holder could break.
    pending
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DiffLocation, FeatureSet};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn key() -> CacheKey {
        DiffLocation::parse("7.0.0", "7.5.0", FeatureSet::empty())
            .unwrap()
            .cache_key()
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_generation() {
        let inflight = Arc::new(InFlight::new());
        let starts = Arc::new(AtomicUsize::new(0));
        let key = key();

        let call = || {
            let inflight = Arc::clone(&inflight);
            let starts = Arc::clone(&starts);
            let key = key.clone();
            async move {
                inflight
                    .run(&key, move || {
                        starts.fetch_add(1, Ordering::SeqCst);
                        async {
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            Ok::<_, ScaffdiffError>(Arc::<str>::from("patch"))
                        }
                        .boxed()
                    })
                    .await
            }
        };

        let (a, b, c) = tokio::join!(call(), call(), call());
        assert_eq!(&*a.unwrap(), "patch");
        assert_eq!(&*b.unwrap(), "patch");
        assert_eq!(&*c.unwrap(), "patch");
        assert_eq!(starts.load(Ordering::SeqCst), 1);
        assert!(inflight.is_empty());
    }

    #[tokio::test]
    async fn failure_is_not_remembered() {
        let inflight = InFlight::new();
        let key = key();

        let err = inflight
            .run(&key, || {
                async { Err::<Arc<str>, _>(ScaffdiffError::DiffGeneration("boom".into())) }.boxed()
            })
            .await
            .unwrap_err();
        // Sole waiter gets the original error back, not a shared wrapper.
        assert!(matches!(err, ScaffdiffError::DiffGeneration(_)));

        let ok = inflight
            .run(&key, || async { Ok::<_, ScaffdiffError>(Arc::<str>::from("second")) }.boxed())
            .await
            .unwrap();
        assert_eq!(&*ok, "second");
    }

    #[tokio::test]
    async fn generation_finishes_after_every_waiter_is_dropped() {
        let inflight = InFlight::new();
        let key = key();
        let done = Arc::new(AtomicUsize::new(0));

        let finished = Arc::clone(&done);
        let waited = tokio::time::timeout(
            Duration::from_millis(20),
            inflight.run(&key, move || {
                async move {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    finished.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ScaffdiffError>(Arc::<str>::from("late"))
                }
                .boxed()
            }),
        )
        .await;
        assert!(waited.is_err());
        assert_eq!(inflight.len(), 1);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(done.load(Ordering::SeqCst), 1);
        assert!(inflight.is_empty());
    }
}
