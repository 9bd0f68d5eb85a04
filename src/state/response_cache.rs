use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Longest TTL honoured (about ten years). Larger values are clamped.
const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    data: V,
    expires_at: Instant,
}

// ---------------------------------------------------------------------------
// ResponseCache
// ---------------------------------------------------------------------------

/// TTL-keyed store for upstream responses.
///
/// No capacity bound and no sweeper: an expired entry is treated as absent and
/// dropped the next time its key is read, or replaced by the next `set`.
#[derive(Debug)]
pub struct ResponseCache<V> {
    entries: DashMap<String, CacheEntry<V>>,
}

impl<V: Clone> ResponseCache<V> {
    pub fn new() -> Self {
        Self { entries: DashMap::new() }
    }

    /// Returns a copy of the cached value, or None if missing or `now >= expires_at`.
    pub fn get(&self, key: &str) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    fn get_at(&self, key: &str, now: Instant) -> Option<V> {
        let entry = self.entries.get(key)?;
        if now < entry.expires_at {
            return Some(entry.data.clone());
        }
        drop(entry);
        self.entries.remove_if(key, |_, e| now >= e.expires_at);
        None
    }

    /// Overwrites unconditionally.
    pub fn set(&self, key: impl Into<String>, data: V, ttl_secs: u64) {
        let now = Instant::now();
        let expires_at = now
            .checked_add(Duration::from_secs(ttl_secs.min(MAX_TTL_SECS)))
            .unwrap_or(now);
        self.entries.insert(key.into(), CacheEntry { data, expires_at });
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Stored entries, expired ones included until they are next touched.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V: Clone> Default for ResponseCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_after_set_returns_value() {
        let cache = ResponseCache::new();
        cache.set("k", 42u32, 1);
        assert_eq!(cache.get("k"), Some(42));
    }

    #[test]
    fn missing_key_is_absent() {
        let cache: ResponseCache<u32> = ResponseCache::new();
        assert_eq!(cache.get("nope"), None);
    }

    #[test]
    fn entry_expires_after_ttl() {
        let cache = ResponseCache::new();
        cache.set("k", "v".to_string(), 1);
        assert_eq!(cache.get("k").as_deref(), Some("v"));

        std::thread::sleep(Duration::from_millis(1100));
        assert_eq!(cache.get("k"), None);
        assert!(cache.is_empty(), "expired entry should be dropped on read");
    }

    #[test]
    fn zero_ttl_is_expired_immediately() {
        let cache = ResponseCache::new();
        cache.set("k", 1u8, 0);
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn expiry_boundary_is_inclusive() {
        let cache = ResponseCache::new();
        cache.set("k", 1u8, 5);
        let expires_at = cache.entries.get("k").unwrap().expires_at;
        assert_eq!(cache.get_at("k", expires_at - Duration::from_millis(1)), Some(1));
        assert_eq!(cache.get_at("k", expires_at), None);
    }

    #[test]
    fn huge_ttl_is_clamped_not_overflowed() {
        let cache = ResponseCache::new();
        cache.set("k", 1u8, u64::MAX);
        assert_eq!(cache.get("k"), Some(1));
    }

    #[test]
    fn set_overwrites_and_clear_empties() {
        let cache = ResponseCache::new();
        cache.set("k", 1u8, 60);
        cache.set("k", 2u8, 60);
        cache.set("other", 3u8, 60);
        assert_eq!(cache.get("k"), Some(2));
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.get("other"), None);
    }
}
