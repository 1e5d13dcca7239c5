//! Durable cache for crystallised route whitelists.
//!
//! The cache is a single JSON document mapping a route identifier to the
//! whitelist learned for it. It is read once, synchronously, when opened;
//! afterwards every newly crystallised route is merged into the document by
//! a background writer so callers never wait on disk I/O.

mod cache;
mod errors;
mod file_store;
mod mem_store;

pub use cache::{CacheMode, WhitelistCache};
pub use errors::{CacheError, CacheResult};
pub use file_store::FileWhitelistStore;
pub use mem_store::MemWhitelistStore;

/// Raw storage for the cache document.
pub trait WhitelistStore: Send + Sync {
    /// Current document bytes, `None` if nothing has been stored yet.
    fn load(&self) -> CacheResult<Option<Vec<u8>>>;

    /// Replace the whole document.
    fn store(&self, bytes: &[u8]) -> CacheResult<()>;

    /// Human-readable location, used in logs.
    fn describe(&self) -> String {
        "whitelist store".into()
    }
}
