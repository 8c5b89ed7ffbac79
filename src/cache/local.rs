//! Time-limited memo of the last accepted image

use std::sync::Arc;

use chrono::Utc;

use super::persistence::Persistence;
use super::{CacheTtl, IMAGE_KEY, TIMESTAMP_KEY};
use crate::error::CacheError;

type Result<T> = std::result::Result<T, CacheError>;

/// Source of the current time in epoch milliseconds
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

/// Wall-clock time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// A cached image and when it was captured
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub image: String,
    pub captured_at_epoch_millis: i64,
}

impl CacheEntry {
    /// Age relative to `now`, in milliseconds
    pub fn age_millis(&self, now: i64) -> i64 {
        now.saturating_sub(self.captured_at_epoch_millis)
    }

    pub fn is_expired(&self, now: i64) -> bool {
        self.age_millis(now) >= CacheTtl::IMAGE.as_millis() as i64
    }
}

/// Image cache over an injected [`Persistence`].
///
/// Both keys are written together; an entry missing either key is treated as
/// absent and purged on read.
#[derive(Clone)]
pub struct LocalCache {
    store: Arc<dyn Persistence>,
    clock: Arc<dyn Clock>,
}

impl LocalCache {
    pub fn new(store: Arc<dyn Persistence>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn Persistence>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Store `image` stamped with the current time, replacing any prior entry
    pub fn write(&self, image: &str) -> Result<CacheEntry> {
        let entry = CacheEntry {
            image: image.to_string(),
            captured_at_epoch_millis: self.clock.now_millis(),
        };
        self.store.write(IMAGE_KEY, &entry.image)?;
        if let Err(e) = self
            .store
            .write(TIMESTAMP_KEY, &entry.captured_at_epoch_millis.to_string())
        {
            // Don't leave an image without its timestamp
            let _ = self.store.clear(IMAGE_KEY);
            return Err(e);
        }
        log::debug!("Cached image ({} bytes)", entry.image.len());
        Ok(entry)
    }

    /// Return the cached entry if it is younger than 24 hours.
    ///
    /// Expired, partial or unreadable entries are cleared and reported as absent.
    pub fn read(&self) -> Result<Option<CacheEntry>> {
        let image = self.store.read(IMAGE_KEY)?;
        let timestamp = self.store.read(TIMESTAMP_KEY)?;

        let entry = match (image, timestamp) {
            (None, None) => return Ok(None),
            (Some(image), Some(ts)) => match ts.trim().parse::<i64>() {
                Ok(captured_at_epoch_millis) => CacheEntry {
                    image,
                    captured_at_epoch_millis,
                },
                Err(_) => {
                    log::warn!("Discarding cached image with unreadable timestamp {:?}", ts);
                    self.clear()?;
                    return Ok(None);
                }
            },
            _ => {
                log::warn!("Discarding partial cache entry");
                self.clear()?;
                return Ok(None);
            }
        };

        let now = self.clock.now_millis();
        if entry.is_expired(now) {
            log::info!(
                "Cached image expired ({} ms old), clearing",
                entry.age_millis(now)
            );
            self.clear()?;
            return Ok(None);
        }

        Ok(Some(entry))
    }

    /// Remove both keys
    pub fn clear(&self) -> Result<()> {
        self.store.clear(IMAGE_KEY)?;
        self.store.clear(TIMESTAMP_KEY)?;
        Ok(())
    }
}

/// Clock that only moves when told to
#[cfg(test)]
#[derive(Debug, Default)]
pub struct ManualClock {
    now: std::sync::atomic::AtomicI64,
}

#[cfg(test)]
impl ManualClock {
    pub fn at(millis: i64) -> Self {
        Self {
            now: std::sync::atomic::AtomicI64::new(millis),
        }
    }

    pub fn advance(&self, millis: i64) {
        self.now
            .fetch_add(millis, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;

    const DAY_MS: i64 = 86_400_000;
    const T0: i64 = 1_700_000_000_000;

    fn cache_at(t: i64) -> (LocalCache, Arc<MemoryStore>, Arc<ManualClock>) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::at(t));
        let cache = LocalCache::with_clock(store.clone(), clock.clone());
        (cache, store, clock)
    }

    #[test]
    fn test_write_then_read_returns_same_image() {
        let (cache, _store, _clock) = cache_at(T0);
        cache.write("data:image/jpeg;base64,/9j/").unwrap();

        let entry = cache.read().unwrap().unwrap();
        assert_eq!(entry.image, "data:image/jpeg;base64,/9j/");
        assert_eq!(entry.captured_at_epoch_millis, T0);
    }

    #[test]
    fn test_uses_expected_storage_keys() {
        let (cache, store, _clock) = cache_at(T0);
        cache.write("data:image/png;base64,AA==").unwrap();

        assert_eq!(
            store.read("cachedImage").unwrap().as_deref(),
            Some("data:image/png;base64,AA==")
        );
        assert_eq!(
            store.read("cachedImageTimestamp").unwrap(),
            Some(T0.to_string())
        );
    }

    #[test]
    fn test_entry_just_under_a_day_is_kept() {
        let (cache, _store, clock) = cache_at(T0);
        cache.write("img").unwrap();
        clock.advance(DAY_MS - 1);
        assert!(cache.read().unwrap().is_some());
    }

    #[test]
    fn test_entry_past_a_day_is_purged() {
        let (cache, store, clock) = cache_at(T0);
        cache.write("img").unwrap();
        clock.advance(DAY_MS + 1);

        assert!(cache.read().unwrap().is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_missing_timestamp_is_treated_as_absent() {
        let (cache, store, _clock) = cache_at(T0);
        store.write("cachedImage", "img").unwrap();

        assert!(cache.read().unwrap().is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_orphan_timestamp_is_purged() {
        let (cache, store, _clock) = cache_at(T0);
        store.write("cachedImageTimestamp", &T0.to_string()).unwrap();

        assert!(cache.read().unwrap().is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_garbage_timestamp_is_purged() {
        let (cache, store, _clock) = cache_at(T0);
        store.write("cachedImage", "img").unwrap();
        store.write("cachedImageTimestamp", "yesterday").unwrap();

        assert!(cache.read().unwrap().is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_extreme_timestamp_is_purged_without_overflow() {
        let (cache, store, _clock) = cache_at(T0);
        store.write("cachedImage", "img").unwrap();
        store
            .write("cachedImageTimestamp", &i64::MIN.to_string())
            .unwrap();

        assert!(cache.read().unwrap().is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_age_saturates() {
        let entry = CacheEntry {
            image: "img".to_string(),
            captured_at_epoch_millis: i64::MIN,
        };
        assert_eq!(entry.age_millis(T0), i64::MAX);
        assert!(entry.is_expired(T0));
    }

    #[test]
    fn test_write_overwrites_and_restamps() {
        let (cache, _store, clock) = cache_at(T0);
        cache.write("first").unwrap();
        clock.advance(1_000);
        cache.write("second").unwrap();

        let entry = cache.read().unwrap().unwrap();
        assert_eq!(entry.image, "second");
        assert_eq!(entry.captured_at_epoch_millis, T0 + 1_000);
    }

    #[test]
    fn test_clear_is_idempotent() {
        let (cache, store, _clock) = cache_at(T0);
        cache.write("img").unwrap();
        cache.clear().unwrap();
        cache.clear().unwrap();
        assert!(store.is_empty());
        assert!(cache.read().unwrap().is_none());
    }
}
