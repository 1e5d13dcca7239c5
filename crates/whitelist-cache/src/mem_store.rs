use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::RwLock;

use super::{CacheError, CacheResult, WhitelistStore};

/// In-memory whitelist document, for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemWhitelistStore {
    doc: RwLock<Option<Vec<u8>>>,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MemWhitelistStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with an existing document.
    pub fn with_document(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            doc: RwLock::new(Some(bytes.into())),
            ..Default::default()
        }
    }

    /// Make every subsequent `store` call fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of `store` calls attempted, failed ones included.
    pub fn write_attempts(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn document(&self) -> Option<Vec<u8>> {
        self.doc.read().clone()
    }
}

impl WhitelistStore for MemWhitelistStore {
    fn load(&self) -> CacheResult<Option<Vec<u8>>> {
        Ok(self.doc.read().clone())
    }

    fn store(&self, bytes: &[u8]) -> CacheResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CacheError::Store("injected write failure".into()));
        }
        *self.doc.write() = Some(bytes.to_vec());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".into()
    }
}
