use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde_json::Value;

struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

/// Short-TTL read cache keyed by request path. Entries live
/// `absent -> fresh -> stale -> evicted on next access or on any
/// successful write`. Invalidation is whole-cache only; the lock is never
/// held across an await point.
pub(crate) struct ReadCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl ReadCache {
    pub(crate) fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn get(&self, path: &str) -> Option<Value> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.get(path) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(path);
                None
            }
            None => None,
        }
    }

    pub(crate) fn put(&self, path: &str, value: Value) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(
            path.to_string(),
            CacheEntry {
                value,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    pub(crate) fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::ReadCache;

    #[test]
    fn fresh_entry_is_returned() {
        let cache = ReadCache::new(Duration::from_secs(5));
        cache.put("/api/health", json!({"ok": true}));
        assert_eq!(cache.get("/api/health"), Some(json!({"ok": true})));
    }

    #[test]
    fn stale_entry_is_evicted_on_access() {
        let cache = ReadCache::new(Duration::from_millis(20));
        cache.put("/api/health", json!({"ok": true}));
        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(cache.get("/api/health"), None);
        // A second access sees a truly absent entry, not a stale one.
        assert_eq!(cache.get("/api/health"), None);
    }

    #[test]
    fn clear_drops_every_entry() {
        let cache = ReadCache::new(Duration::from_secs(5));
        cache.put("/api/receipts", json!([]));
        cache.put("/api/mandates", json!([]));
        cache.clear();
        assert_eq!(cache.get("/api/receipts"), None);
        assert_eq!(cache.get("/api/mandates"), None);
    }
}
