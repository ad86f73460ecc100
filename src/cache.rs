//! Expiring cache for currency lists and exchange rate tables.
//!
//! [`RateCache`] keeps one entry per [`CacheKind`] in memory and mirrors it to
//! an injected [`CacheStore`], so entries survive process restarts. Entries
//! are never evicted; a stale entry is replaced the next time it is asked for.

use crate::error::ConvertResult;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheKind {
    CurrencyList,
    RateTable,
}

impl CacheKind {
    fn file_name(self) -> &'static str {
        match self {
            Self::CurrencyList => "cache_currencies.json",
            Self::RateTable => "cache_rates.json",
        }
    }
}

impl fmt::Display for CacheKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CurrencyList => f.write_str("currency list"),
            Self::RateTable => f.write_str("exchange rates"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub kind: CacheKind,
    pub payload: serde_json::Value,
    pub fetched_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn is_fresh(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.fetched_at) <= ttl
    }
}

/// Durable backing for [`RateCache`]. One record per kind.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn load(&self, kind: CacheKind) -> Result<Option<CacheEntry>>;
    async fn save(&self, entry: &CacheEntry) -> Result<()>;
}

/// Stores each kind as a JSON file in `dir`.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, kind: CacheKind) -> PathBuf {
        self.dir.join(kind.file_name())
    }
}

#[async_trait]
impl CacheStore for FileStore {
    async fn load(&self, kind: CacheKind) -> Result<Option<CacheEntry>> {
        let path = self.path(kind);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
        };
        let entry: CacheEntry = serde_json::from_str(&contents)
            .with_context(|| format!("parsing {}", path.display()))?;
        if entry.kind != kind {
            anyhow::bail!(
                "{} holds a {} entry, expected {}",
                path.display(),
                entry.kind,
                kind
            );
        }
        Ok(Some(entry))
    }

    async fn save(&self, entry: &CacheEntry) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("creating {}", self.dir.display()))?;

        let path = self.path(entry.kind);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_vec(entry).context("serializing cache entry")?;
        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("replacing {}", path.display()))?;
        Ok(())
    }
}

/// Process-local store; nothing outlives the process.
#[derive(Default)]
pub struct MemoryStore {
    entries: std::sync::Mutex<HashMap<CacheKind, CacheEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(self, entry: CacheEntry) -> Self {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(entry.kind, entry);
        }
        self
    }

    pub fn get(&self, kind: CacheKind) -> Option<CacheEntry> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(&kind).cloned())
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn load(&self, kind: CacheKind) -> Result<Option<CacheEntry>> {
        Ok(self.get(kind))
    }

    async fn save(&self, entry: &CacheEntry) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        entries.insert(entry.kind, entry.clone());
        Ok(())
    }
}

#[derive(Default)]
struct Slot {
    loaded: bool,
    entry: Option<CacheEntry>,
}

/// Get-or-refresh cache shared by the registry and the OER converter.
///
/// Each kind sits behind its own async mutex held for the whole
/// check-fetch-store sequence, so concurrent callers wait for one refresh and
/// then read its result instead of fetching again.
pub struct RateCache {
    store: Arc<dyn CacheStore>,
    currencies: Mutex<Slot>,
    rates: Mutex<Slot>,
}

impl RateCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            currencies: Mutex::new(Slot::default()),
            rates: Mutex::new(Slot::default()),
        }
    }

    fn slot(&self, kind: CacheKind) -> &Mutex<Slot> {
        match kind {
            CacheKind::CurrencyList => &self.currencies,
            CacheKind::RateTable => &self.rates,
        }
    }

    async fn ensure_loaded(&self, kind: CacheKind, slot: &mut Slot) {
        if slot.loaded {
            return;
        }
        slot.entry = match self.store.load(kind).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!("{} cache is corrupted, ignoring it: {:#}", kind, e);
                None
            }
        };
        slot.loaded = true;
    }

    /// Return the cached payload if it is younger than `ttl`, otherwise call
    /// `fetch` once and store what it returns. A failed fetch leaves the old
    /// entry untouched.
    pub async fn get_or_refresh<T, F, Fut>(
        &self,
        kind: CacheKind,
        ttl: Duration,
        fetch: F,
    ) -> ConvertResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = ConvertResult<T>>,
    {
        let mut slot = self.slot(kind).lock().await;
        self.ensure_loaded(kind, &mut slot).await;

        match slot.entry.as_ref() {
            Some(entry) if entry.is_fresh(ttl, Utc::now()) => {
                match serde_json::from_value::<T>(entry.payload.clone()) {
                    Ok(value) => {
                        debug!("using cached {} from {}", kind, entry.fetched_at);
                        return Ok(value);
                    }
                    Err(e) => warn!("cached {} is unreadable, refreshing: {}", kind, e),
                }
            }
            Some(entry) => info!(
                "cached {} from {} is outdated, refreshing",
                kind, entry.fetched_at
            ),
            None => info!("no cached {}, fetching", kind),
        }

        let value = fetch().await?;

        match serde_json::to_value(&value) {
            Ok(payload) => {
                let entry = CacheEntry {
                    kind,
                    payload,
                    fetched_at: Utc::now(),
                };
                if let Err(e) = self.store.save(&entry).await {
                    warn!("failed to persist {}: {:#}", kind, e);
                }
                slot.entry = Some(entry);
            }
            Err(e) => warn!("failed to serialize {} for caching: {}", kind, e),
        }

        Ok(value)
    }

    /// The current entry for `kind`, however old, with its fetch time.
    pub async fn peek<T: DeserializeOwned>(&self, kind: CacheKind) -> Option<(T, DateTime<Utc>)> {
        let mut slot = self.slot(kind).lock().await;
        self.ensure_loaded(kind, &mut slot).await;
        let entry = slot.entry.as_ref()?;
        serde_json::from_value(entry.payload.clone())
            .ok()
            .map(|value| (value, entry.fetched_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConvertError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn entry(kind: CacheKind, payload: serde_json::Value, age: Duration) -> CacheEntry {
        CacheEntry {
            kind,
            payload,
            fetched_at: Utc::now() - age,
        }
    }

    #[tokio::test]
    async fn test_stale_entry_fetches_exactly_once() {
        let store = MemoryStore::new().with_entry(entry(
            CacheKind::CurrencyList,
            serde_json::json!(["OLD"]),
            Duration::hours(2),
        ));
        let cache = RateCache::new(Arc::new(store));
        let calls = AtomicUsize::new(0);

        let value: Vec<String> = cache
            .get_or_refresh(CacheKind::CurrencyList, Duration::hours(1), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(vec!["NEW".to_string()])
            })
            .await
            .unwrap();

        assert_eq!(value, vec!["NEW".to_string()]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fresh_entry_does_not_fetch() {
        let store = MemoryStore::new().with_entry(entry(
            CacheKind::CurrencyList,
            serde_json::json!(["CACHED"]),
            Duration::minutes(5),
        ));
        let cache = RateCache::new(Arc::new(store));
        let calls = AtomicUsize::new(0);

        let value: Vec<String> = cache
            .get_or_refresh(CacheKind::CurrencyList, Duration::hours(1), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(vec!["NEW".to_string()])
            })
            .await
            .unwrap();

        assert_eq!(value, vec!["CACHED".to_string()]);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_refreshed_entry_is_reused() {
        let cache = RateCache::new(Arc::new(MemoryStore::new()));
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let _: u32 = cache
                .get_or_refresh(CacheKind::RateTable, Duration::hours(1), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(7)
                })
                .await
                .unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_stale_entry() {
        let store = Arc::new(MemoryStore::new().with_entry(entry(
            CacheKind::RateTable,
            serde_json::json!(41),
            Duration::hours(3),
        )));
        let cache = RateCache::new(store.clone());

        let result: ConvertResult<u32> = cache
            .get_or_refresh(CacheKind::RateTable, Duration::hours(1), || async {
                Err(ConvertError::RateFetchFailed("offline".into()))
            })
            .await;

        assert!(matches!(result, Err(ConvertError::RateFetchFailed(_))));
        let (stale, _) = cache.peek::<u32>(CacheKind::RateTable).await.unwrap();
        assert_eq!(stale, 41);
        assert_eq!(
            store.get(CacheKind::RateTable).unwrap().payload,
            serde_json::json!(41)
        );
    }

    #[tokio::test]
    async fn test_unreadable_payload_is_refreshed() {
        let store = MemoryStore::new().with_entry(entry(
            CacheKind::CurrencyList,
            serde_json::json!({"not": "a list"}),
            Duration::zero(),
        ));
        let cache = RateCache::new(Arc::new(store));

        let value: Vec<String> = cache
            .get_or_refresh(CacheKind::CurrencyList, Duration::hours(1), || async {
                Ok(vec!["USD".to_string()])
            })
            .await
            .unwrap();

        assert_eq!(value, vec!["USD".to_string()]);
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_are_coalesced() {
        let cache = Arc::new(RateCache::new(Arc::new(MemoryStore::new())));
        let calls = Arc::new(AtomicUsize::new(0));

        let fetch = |cache: Arc<RateCache>, calls: Arc<AtomicUsize>| async move {
            cache
                .get_or_refresh(CacheKind::RateTable, Duration::hours(1), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                    Ok(99u32)
                })
                .await
        };

        let (a, b) = tokio::join!(
            fetch(cache.clone(), calls.clone()),
            fetch(cache.clone(), calls.clone())
        );

        assert_eq!(a.unwrap(), 99);
        assert_eq!(b.unwrap(), 99);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_file_store_survives_restart() {
        let dir = tempfile::tempdir().unwrap();

        let cache = RateCache::new(Arc::new(FileStore::new(dir.path())));
        let _: Vec<String> = cache
            .get_or_refresh(CacheKind::CurrencyList, Duration::hours(1), || async {
                Ok(vec!["EUR".to_string(), "USD".to_string()])
            })
            .await
            .unwrap();
        assert!(dir.path().join("cache_currencies.json").exists());
        assert!(!dir.path().join("cache_currencies.json.tmp").exists());

        let restarted = RateCache::new(Arc::new(FileStore::new(dir.path())));
        let value: Vec<String> = restarted
            .get_or_refresh(CacheKind::CurrencyList, Duration::hours(1), || async {
                Err(ConvertError::RateFetchFailed("should not be called".into()))
            })
            .await
            .unwrap();
        assert_eq!(value, vec!["EUR".to_string(), "USD".to_string()]);
    }

    #[tokio::test]
    async fn test_corrupted_file_is_treated_as_missing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("cache_rates.json"), "{ not json").unwrap();

        let store = FileStore::new(dir.path());
        assert!(store.load(CacheKind::RateTable).await.is_err());
        assert!(store.load(CacheKind::CurrencyList).await.unwrap().is_none());

        let cache = RateCache::new(Arc::new(store));
        let calls = AtomicUsize::new(0);
        let value: u32 = cache
            .get_or_refresh(CacheKind::RateTable, Duration::hours(1), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(5)
            })
            .await
            .unwrap();
        assert_eq!(value, 5);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
