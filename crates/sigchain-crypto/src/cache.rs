//! Time-bounded cache for resolved key material.

use std::time::{Duration, Instant};

/// A single cached value with the instant it was fetched.
///
/// The caller supplies `now` on every access, so tests can move time
/// forward without sleeping. A zero TTL disables caching.
///
/// # Example
///
/// ```
/// use std::time::{Duration, Instant};
/// use sigchain_crypto::KeyCache;
///
/// let start = Instant::now();
/// let mut cache = KeyCache::new(Duration::from_secs(300));
/// cache.put("key", start);
/// assert_eq!(cache.get(start + Duration::from_secs(10)), Some(&"key"));
/// assert_eq!(cache.get(start + Duration::from_secs(300)), None);
/// ```
#[derive(Debug, Clone)]
pub struct KeyCache<T> {
    ttl: Duration,
    entry: Option<(T, Instant)>,
}

impl<T> KeyCache<T> {
    /// Empty cache with the given TTL.
    #[must_use]
    pub const fn new(ttl: Duration) -> Self {
        Self { ttl, entry: None }
    }

    /// Configured TTL.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The cached value, if it was fetched less than `ttl` before `now`.
    #[must_use]
    pub fn get(&self, now: Instant) -> Option<&T> {
        let (value, fetched_at) = self.entry.as_ref()?;
        (now.saturating_duration_since(*fetched_at) < self.ttl).then_some(value)
    }

    /// The cached value regardless of age, for serving stale material when a
    /// refresh fails.
    #[must_use]
    pub fn peek(&self) -> Option<&T> {
        self.entry.as_ref().map(|(value, _)| value)
    }

    /// Store `value` as fetched at `now`.
    pub fn put(&mut self, value: T, now: Instant) {
        self.entry = Some((value, now));
    }

    /// Drop the cached value.
    pub fn invalidate(&mut self) {
        self.entry = None;
    }

    /// When the current value was fetched.
    #[must_use]
    pub fn fetched_at(&self) -> Option<Instant> {
        self.entry.as_ref().map(|(_, at)| *at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expires_at_ttl() {
        let t0 = Instant::now();
        let mut cache = KeyCache::new(Duration::from_secs(5));
        assert!(cache.get(t0).is_none());
        cache.put(1u8, t0);
        assert_eq!(cache.get(t0 + Duration::from_millis(4999)), Some(&1));
        assert!(cache.get(t0 + Duration::from_secs(5)).is_none());
        assert_eq!(cache.peek(), Some(&1));
        assert_eq!(cache.fetched_at(), Some(t0));
    }

    #[test]
    fn zero_ttl_never_hits() {
        let t0 = Instant::now();
        let mut cache = KeyCache::new(Duration::ZERO);
        cache.put("v", t0);
        assert!(cache.get(t0).is_none());
    }

    #[test]
    fn invalidate_clears() {
        let t0 = Instant::now();
        let mut cache = KeyCache::new(Duration::from_secs(60));
        cache.put("v", t0);
        cache.invalidate();
        assert!(cache.get(t0).is_none());
        assert!(cache.fetched_at().is_none());
    }
}
