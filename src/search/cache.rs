//! `SearchCache` - TTL-keyed cache of ranked result pages.
//!
//! Maps a query fingerprint to a previously computed page. Entries older
//! than the TTL stop being served immediately, but physical removal
//! happens only in `sweep()`, which runs periodically off the request
//! path.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::constants::{SEARCH_CACHE_ENTRIES_COUNT_MAX, SEARCH_CACHE_TTL_MS_DEFAULT};
use crate::dst::SimClock;
use crate::search::SearchPage;

#[derive(Debug, Clone)]
struct CacheEntry {
    page: SearchPage,
    inserted_at_ms: u64,
}

/// Fingerprint-keyed page cache with simulated-time TTL.
pub struct SearchCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl_ms: u64,
    max_entries: usize,
    clock: SimClock,
}

impl SearchCache {
    #[must_use]
    pub fn new(clock: SimClock) -> Self {
        Self::with_ttl_ms(SEARCH_CACHE_TTL_MS_DEFAULT, clock)
    }

    /// # Panics
    /// Panics if `ttl_ms` is zero.
    #[must_use]
    pub fn with_ttl_ms(ttl_ms: u64, clock: SimClock) -> Self {
        assert!(ttl_ms > 0, "ttl must be positive");
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl_ms,
            max_entries: SEARCH_CACHE_ENTRIES_COUNT_MAX,
            clock,
        }
    }

    #[must_use]
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        assert!(max_entries > 0, "max_entries must be positive");
        self.max_entries = max_entries;
        self
    }

    /// Fetch a live entry. Expired entries read as absent but are left in
    /// place for `sweep()` to reclaim.
    #[must_use]
    pub fn get(&self, fingerprint: &str) -> Option<SearchPage> {
        let now_ms = self.clock.now_ms();
        let entries = self.entries.read().unwrap();
        let entry = entries.get(fingerprint)?;
        if now_ms.saturating_sub(entry.inserted_at_ms) >= self.ttl_ms {
            return None;
        }
        Some(entry.page.clone())
    }

    /// Insert a page, evicting the oldest entry when full.
    pub fn put(&self, page: SearchPage) {
        let now_ms = self.clock.now_ms();
        let fingerprint = page.fingerprint.clone();
        let mut entries = self.entries.write().unwrap();

        if entries.len() >= self.max_entries && !entries.contains_key(&fingerprint) {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.inserted_at_ms)
                .map(|(k, _)| k.clone());
            if let Some(key) = oldest {
                entries.remove(&key);
            }
        }
        entries.insert(
            fingerprint,
            CacheEntry {
                page,
                inserted_at_ms: now_ms,
            },
        );
        debug_assert!(entries.len() <= self.max_entries);
    }

    /// Remove entries whose age exceeds the TTL. The only place entries
    /// are reclaimed early. Returns the number removed.
    pub fn sweep(&self) -> usize {
        let now_ms = self.clock.now_ms();
        let mut entries = self.entries.write().unwrap();
        let before = entries.len();
        entries.retain(|_, e| now_ms.saturating_sub(e.inserted_at_ms) < self.ttl_ms);
        let removed = before - entries.len();
        if removed > 0 {
            tracing::debug!(removed, remaining = entries.len(), "search cache swept");
        }
        removed
    }

    /// Drop every entry, live or not.
    pub fn invalidate(&self) {
        self.entries.write().unwrap().clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(fingerprint: &str) -> SearchPage {
        SearchPage {
            results: Vec::new(),
            fingerprint: fingerprint.to_string(),
            degraded: false,
        }
    }

    #[test]
    fn test_put_get() {
        let clock = SimClock::new();
        let cache = SearchCache::new(clock);
        cache.put(page("fp1"));
        assert!(cache.get("fp1").is_some());
        assert!(cache.get("fp2").is_none());
    }

    #[test]
    fn test_expired_entry_not_served() {
        let clock = SimClock::new();
        let cache = SearchCache::with_ttl_ms(1000, clock.clone());
        cache.put(page("fp"));
        clock.advance_ms(999);
        assert!(cache.get("fp").is_some());
        clock.advance_ms(1);
        assert!(cache.get("fp").is_none());
        // Still physically present until sweep.
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_sweep_reclaims_expired() {
        let clock = SimClock::new();
        let cache = SearchCache::with_ttl_ms(1000, clock.clone());
        cache.put(page("old"));
        clock.advance_ms(500);
        cache.put(page("new"));
        clock.advance_ms(600);

        assert_eq!(cache.sweep(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("new").is_some());
    }

    #[test]
    fn test_eviction_at_capacity() {
        let clock = SimClock::new();
        let cache = SearchCache::with_ttl_ms(60_000, clock.clone()).with_max_entries(2);
        cache.put(page("a"));
        clock.advance_ms(10);
        cache.put(page("b"));
        clock.advance_ms(10);
        cache.put(page("c"));

        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn test_reinsert_refreshes_age() {
        let clock = SimClock::new();
        let cache = SearchCache::with_ttl_ms(1000, clock.clone());
        cache.put(page("fp"));
        clock.advance_ms(800);
        cache.put(page("fp"));
        clock.advance_ms(800);
        // Refreshed at t=800, so still live at t=1600.
        assert!(cache.get("fp").is_some());
    }

    #[test]
    fn test_invalidate_clears() {
        let clock = SimClock::new();
        let cache = SearchCache::new(clock);
        cache.put(page("a"));
        cache.put(page("b"));
        cache.invalidate();
        assert!(cache.is_empty());
    }
}
