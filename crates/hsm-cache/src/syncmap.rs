use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

/// After a miss forces a rebuild, how many times the caller retries the
/// lookup before giving up. Covers the race where another task rebuilds the
/// map just after this task's read but before its point query returned.
const MAX_LOOKUP_RETRIES: usize = 3;

struct Inner<K, V> {
    map: HashMap<K, V>,
    sync_num: u64,
}

/// Generic sync-on-miss two-level cache (§4.4).
///
/// Readers take a shared lock and capture the current `sync_num` alongside
/// their lookup. On a miss the caller performs a cheap point-query against
/// persistence; if that finds the key, it calls [`SyncMap::try_sync`] with
/// the captured `sync_num`. `try_sync` takes the exclusive lock and only
/// rebuilds the whole map if `sync_num` still matches what was captured —
/// collapsing a thundering herd of concurrent misses into a single rebuild.
pub struct SyncMap<K, V> {
    inner: Arc<RwLock<Inner<K, V>>>,
}

impl<K, V> Default for SyncMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Clone for SyncMap<K, V> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<K, V> SyncMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self { inner: Arc::new(RwLock::new(Inner { map: HashMap::new(), sync_num: 0 })) }
    }

    /// Pure in-memory lookup with no sync-on-miss behavior. Used by callers
    /// that already know the map is warm (e.g. right after an explicit
    /// `force_sync`).
    pub async fn peek(&self, key: &K) -> Option<V> {
        self.inner.read().await.map.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.map.len()
    }

    pub async fn current_sync_num(&self) -> u64 {
        self.inner.read().await.sync_num
    }

    /// Look up `key`, syncing from persistence on a miss.
    ///
    /// `point_query` is a cheap existence check scoped to `key` alone
    /// (e.g. a single-row query); `load_fn` rebuilds the entire map and is
    /// only invoked when this call wins the race to rebuild.
    pub async fn get_or_sync<PQ, PQFut, LF, LFFut, E>(
        &self,
        key: &K,
        point_query: PQ,
        load_fn: LF,
    ) -> Result<Option<V>, E>
    where
        PQ: Fn() -> PQFut,
        PQFut: Future<Output = Result<bool, E>>,
        LF: Fn() -> LFFut,
        LFFut: Future<Output = Result<HashMap<K, V>, E>>,
    {
        for _ in 0..MAX_LOOKUP_RETRIES {
            let (hit, captured) = {
                let guard = self.inner.read().await;
                (guard.map.get(key).cloned(), guard.sync_num)
            };
            if hit.is_some() {
                return Ok(hit);
            }
            if !point_query().await? {
                return Ok(None);
            }
            self.try_sync(captured, &load_fn).await?;
        }
        // One last look after exhausting retries; if still missing the
        // caller's point query disagrees with what the rebuild saw, which
        // we treat as a miss rather than looping forever.
        Ok(self.inner.read().await.map.get(key).cloned())
    }

    /// Upgrade to the exclusive lock and, only if the stored `sync_num`
    /// still equals `captured`, reload the whole map and bump `sync_num`.
    /// Returns whether this call performed the rebuild.
    pub async fn try_sync<LF, LFFut, E>(&self, captured: u64, load_fn: LF) -> Result<bool, E>
    where
        LF: Fn() -> LFFut,
        LFFut: Future<Output = Result<HashMap<K, V>, E>>,
    {
        let mut guard = self.inner.write().await;
        if guard.sync_num != captured {
            return Ok(false);
        }
        let fresh = load_fn().await?;
        let n = fresh.len();
        guard.map = fresh;
        guard.sync_num += 1;
        debug!(entries = n, sync_num = guard.sync_num, "sync cache rebuilt");
        Ok(true)
    }

    /// Force a rebuild regardless of the current `sync_num`. Used by
    /// explicit cache-invalidation callers (e.g. after a discovery commit).
    pub async fn force_sync<LF, LFFut, E>(&self, load_fn: LF) -> Result<(), E>
    where
        LF: Fn() -> LFFut,
        LFFut: Future<Output = Result<HashMap<K, V>, E>>,
    {
        let mut guard = self.inner.write().await;
        let fresh = load_fn().await?;
        guard.map = fresh;
        guard.sync_num += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn miss_with_absent_key_returns_none_without_rebuild() {
        let cache: SyncMap<String, String> = SyncMap::new();
        let load_calls = AtomicUsize::new(0);
        let result = cache
            .get_or_sync(
                &"missing".to_string(),
                || async { Ok::<_, std::convert::Infallible>(false) },
                || async {
                    load_calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, std::convert::Infallible>(HashMap::new())
                },
            )
            .await
            .unwrap();
        assert!(result.is_none());
        assert_eq!(load_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn miss_then_point_query_hit_triggers_one_rebuild() {
        let cache: SyncMap<String, String> = SyncMap::new();
        let load_calls = AtomicUsize::new(0);
        let result = cache
            .get_or_sync(
                &"k".to_string(),
                || async { Ok::<_, std::convert::Infallible>(true) },
                || async {
                    load_calls.fetch_add(1, Ordering::SeqCst);
                    let mut m = HashMap::new();
                    m.insert("k".to_string(), "v".to_string());
                    Ok::<_, std::convert::Infallible>(m)
                },
            )
            .await
            .unwrap();
        assert_eq!(result, Some("v".to_string()));
        assert_eq!(load_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn thundering_herd_collapses_to_one_rebuild() {
        let cache: Arc<SyncMap<u32, u32>> = Arc::new(SyncMap::new());
        let load_calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for i in 0..50u32 {
            let cache = cache.clone();
            let load_calls = load_calls.clone();
            handles.push(tokio::spawn(async move {
                let v = cache
                    .get_or_sync(
                        &i,
                        || async { Ok::<_, std::convert::Infallible>(true) },
                        || {
                            let load_calls = load_calls.clone();
                            async move {
                                load_calls.fetch_add(1, Ordering::SeqCst);
                                let m: HashMap<u32, u32> = (0..50).map(|n| (n, n * 10)).collect();
                                Ok::<_, std::convert::Infallible>(m)
                            }
                        },
                    )
                    .await
                    .unwrap();
                (i, v)
            }));
        }

        for h in handles {
            let (i, v) = h.await.unwrap();
            assert_eq!(v, Some(i * 10));
        }
        // Some thundering-herd overlap is expected, but far fewer than 50
        // independent rebuilds — the collapsing protocol must engage.
        assert!(load_calls.load(Ordering::SeqCst) < 50);
        assert!(load_calls.load(Ordering::SeqCst) >= 1);
    }
}
