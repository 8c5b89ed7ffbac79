//! Local image cache
//!
//! Remembers the most recently accepted image across runs so it can be
//! restored on the next start. Storage is injected through [`persistence::Persistence`]:
//! SQLite for the CLI, an in-memory map for tests.

pub mod local;
pub mod persistence;
pub mod storage;

use std::time::Duration;

/// Cache TTL configuration
pub struct CacheTtl;

impl CacheTtl {
    /// Cached images older than this are purged instead of restored
    pub const IMAGE: Duration = Duration::from_secs(24 * 60 * 60); // 24 hr
}

/// Storage key holding the cached data URL
pub const IMAGE_KEY: &str = "cachedImage";

/// Storage key holding the capture time in epoch milliseconds
pub const TIMESTAMP_KEY: &str = "cachedImageTimestamp";

// Re-export main types
pub use local::{CacheEntry, LocalCache};
#[cfg(test)]
pub use persistence::{MemoryStore, Persistence};
pub use storage::SqliteStore;
