use crate::clock::Clock;
use crate::clock::SystemClock;
use crate::store::KeyValueStore;
use crate::store::MemoryStore;
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use tracing::warn;

pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

const STORE_KEY_PREFIX: &str = "opsdesk.cache.";

/// Serialized form of a cached value together with the time it was stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub key: String,
    pub value: T,
    pub stored_at_ms: u64,
}

impl<T> CacheEntry<T> {
    pub fn is_fresh(&self, now_ms: u64, ttl: Duration) -> bool {
        is_fresh(now_ms, self.stored_at_ms, ttl)
    }
}

/// `now - stored_at < ttl`. An entry stamped in the future counts as fresh.
pub fn is_fresh(now_ms: u64, stored_at_ms: u64, ttl: Duration) -> bool {
    let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
    now_ms.saturating_sub(stored_at_ms) < ttl_ms
}

/// Key → value cache with a fixed time-to-live over a [`KeyValueStore`].
///
/// Stale entries are never served but are not deleted either; the next
/// `set` for the same key overwrites them. Handles are cheap to clone and
/// share the same backing store.
pub struct TtlCache<T> {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    _value: PhantomData<fn() -> T>,
}

impl<T> Clone for TtlCache<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
            ttl: self.ttl,
            _value: PhantomData,
        }
    }
}

impl<T> fmt::Debug for TtlCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TtlCache").field("ttl", &self.ttl).finish()
    }
}

impl<T> TtlCache<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            store,
            clock,
            ttl,
            _value: PhantomData,
        }
    }

    /// In-memory cache with the system clock and the default TTL.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryStore::new()),
            Arc::new(SystemClock),
            DEFAULT_TTL,
        )
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, key: &str) -> Option<T> {
        let raw = match self.store.get_item(&store_key(key)) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!("cache read failed for {key}: {err}");
                return None;
            }
        };
        let entry: CacheEntry<T> = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(err) => {
                warn!("discarding unreadable cache entry for {key}: {err}");
                return None;
            }
        };
        if entry.key != key {
            debug!("cache entry key mismatch for {key}; treating as miss");
            return None;
        }
        let now = self.clock.now_ms();
        if !entry.is_fresh(now, self.ttl) {
            debug!(
                "cache entry for {key} expired ({} ms old)",
                now.saturating_sub(entry.stored_at_ms)
            );
            return None;
        }
        Some(entry.value)
    }

    pub fn set(&self, key: &str, value: &T) {
        let entry = CacheEntry {
            key: key.to_string(),
            value,
            stored_at_ms: self.clock.now_ms(),
        };
        let raw = match serde_json::to_string(&entry) {
            Ok(raw) => raw,
            Err(err) => {
                warn!("failed to serialize cache entry for {key}: {err}");
                return;
            }
        };
        if let Err(err) = self.store.set_item(&store_key(key), &raw) {
            warn!("cache write failed for {key}: {err}");
        }
    }

    pub fn invalidate(&self, key: &str) {
        if let Err(err) = self.store.remove_item(&store_key(key)) {
            warn!("cache invalidation failed for {key}: {err}");
        }
    }
}

fn store_key(key: &str) -> String {
    format!("{STORE_KEY_PREFIX}{key}")
}
