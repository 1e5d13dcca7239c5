use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::thread;

use metrics::counter;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace, warn};

use crate::{CacheResult, FileWhitelistStore, WhitelistStore};

/// Lifecycle of a cache. Transitions only move forward:
/// `EnabledButUnloaded -> Enabled -> Disabled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CacheMode {
    /// Opened, startup load not finished yet.
    EnabledButUnloaded = 0,
    /// Accepting writes.
    Enabled = 1,
    /// A write failed; nothing is read or written any more.
    Disabled = 2,
}

impl CacheMode {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => CacheMode::EnabledButUnloaded,
            1 => CacheMode::Enabled,
            _ => CacheMode::Disabled,
        }
    }
}

#[derive(Debug)]
struct ModeCell(AtomicU8);

impl ModeCell {
    fn new() -> Self {
        Self(AtomicU8::new(CacheMode::EnabledButUnloaded as u8))
    }

    fn get(&self) -> CacheMode {
        CacheMode::from_u8(self.0.load(Ordering::SeqCst))
    }

    fn advance(&self, from: CacheMode, to: CacheMode) -> bool {
        if to as u8 <= from as u8 {
            return false;
        }
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

enum Command {
    Persist { route: String, entry: Value },
    Flush(oneshot::Sender<()>),
}

/// Whitelist cache with a startup preload and fire-and-forget persistence.
///
/// `T` is the per-route entry type; it is serialized on the caller's thread
/// and merged into the stored document by a dedicated writer thread, one
/// request at a time.
pub struct WhitelistCache<T> {
    mode: Arc<ModeCell>,
    tx: mpsc::UnboundedSender<Command>,
    preloaded: BTreeMap<String, T>,
    store_name: String,
    _entry: PhantomData<fn(T)>,
}

impl<T> WhitelistCache<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Open a cache over `store`, loading existing entries synchronously.
    ///
    /// A missing, unreadable or malformed document yields an empty preload;
    /// nothing is written back to repair it.
    pub fn open(store: Arc<dyn WhitelistStore>) -> Self {
        let mode = Arc::new(ModeCell::new());
        let store_name = store.describe();
        let preloaded = load_entries::<T>(store.as_ref());
        mode.advance(CacheMode::EnabledButUnloaded, CacheMode::Enabled);

        let (tx, rx) = mpsc::unbounded_channel();
        let writer_mode = Arc::clone(&mode);
        let spawned = thread::Builder::new()
            .name("whitelist-cache-writer".into())
            .spawn(move || run_writer(store, writer_mode, rx));
        if let Err(e) = spawned {
            warn!(store = %store_name, error = %e, "failed to start whitelist cache writer; caching disabled");
            mode.advance(CacheMode::Enabled, CacheMode::Disabled);
        }

        Self {
            mode,
            tx,
            preloaded,
            store_name,
            _entry: PhantomData,
        }
    }

    /// Open a cache backed by a JSON file.
    pub fn file<P: AsRef<Path>>(path: P) -> Self {
        Self::open(Arc::new(FileWhitelistStore::new(path)))
    }

    pub fn mode(&self) -> CacheMode {
        self.mode.get()
    }

    /// Entries read at startup. Returns them once; later calls are empty.
    pub fn take_preloaded(&mut self) -> BTreeMap<String, T> {
        std::mem::take(&mut self.preloaded)
    }

    /// Queue `entry` to be merged into the stored document under `route`.
    ///
    /// Returns immediately. Ignored once the cache is disabled.
    pub fn persist(&self, route: &str, entry: &T) {
        if self.mode.get() != CacheMode::Enabled {
            trace!(route = %route, "whitelist cache disabled; not persisting");
            return;
        }
        let entry = match serde_json::to_value(entry) {
            Ok(v) => v,
            Err(e) => {
                warn!(route = %route, error = %e, "failed to serialize whitelist for cache");
                return;
            }
        };
        let cmd = Command::Persist {
            route: route.to_owned(),
            entry,
        };
        if self.tx.send(cmd).is_err() {
            warn!(store = %self.store_name, route = %route, "whitelist cache writer is gone");
        }
    }

    /// Wait until every write queued before this call has been handled.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.tx.send(Command::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }

    /// Blocking variant of [`flush`](Self::flush). Must not be called from
    /// inside an async runtime.
    pub fn flush_blocking(&self) {
        let (done, wait) = oneshot::channel();
        if self.tx.send(Command::Flush(done)).is_ok() {
            let _ = wait.blocking_recv();
        }
    }
}

fn load_entries<T: DeserializeOwned>(
    store: &dyn WhitelistStore,
) -> BTreeMap<String, T> {
    let bytes = match store.load() {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            debug!(store = %store.describe(), "no whitelist cache found");
            return BTreeMap::new();
        }
        Err(e) => {
            warn!(store = %store.describe(), error = %e, "failed to read whitelist cache; starting empty");
            return BTreeMap::new();
        }
    };

    match serde_json::from_slice::<BTreeMap<String, T>>(&bytes) {
        Ok(entries) => {
            info!(store = %store.describe(), routes = entries.len(), "whitelist cache loaded");
            entries
        }
        Err(e) => {
            warn!(store = %store.describe(), error = %e, "whitelist cache is malformed; starting empty");
            BTreeMap::new()
        }
    }
}

fn run_writer(
    store: Arc<dyn WhitelistStore>,
    mode: Arc<ModeCell>,
    mut rx: mpsc::UnboundedReceiver<Command>,
) {
    while let Some(cmd) = rx.blocking_recv() {
        match cmd {
            Command::Persist { route, entry } => {
                if mode.get() != CacheMode::Enabled {
                    trace!(route = %route, "whitelist cache disabled; dropping queued write");
                    continue;
                }
                match merge_into(store.as_ref(), &route, entry) {
                    Ok(()) => {
                        counter!("route_schema_cache_writes_total", "outcome" => "ok")
                            .increment(1);
                        debug!(store = %store.describe(), route = %route, "whitelist persisted");
                    }
                    Err(e) => {
                        counter!("route_schema_cache_writes_total", "outcome" => "error")
                            .increment(1);
                        mode.advance(CacheMode::Enabled, CacheMode::Disabled);
                        warn!(
                            store = %store.describe(),
                            route = %route,
                            error = %e,
                            "whitelist cache write failed; caching disabled"
                        );
                    }
                }
            }
            Command::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("whitelist cache writer stopped");
}

/// Read-merge-write of one route entry. An unreadable current document is
/// replaced rather than treated as an error.
fn merge_into(
    store: &dyn WhitelistStore,
    route: &str,
    entry: Value,
) -> CacheResult<()> {
    let mut doc: BTreeMap<String, Value> = match store.load() {
        Ok(Some(bytes)) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
            debug!(error = %e, "existing whitelist cache unreadable; rewriting");
            BTreeMap::new()
        }),
        Ok(None) => BTreeMap::new(),
        Err(e) => {
            debug!(error = %e, "existing whitelist cache unreadable; rewriting");
            BTreeMap::new()
        }
    };
    doc.insert(route.to_owned(), entry);
    let bytes = serde_json::to_vec_pretty(&doc)?;
    store.store(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_only_moves_forward() {
        let cell = ModeCell::new();
        assert_eq!(cell.get(), CacheMode::EnabledButUnloaded);
        assert!(!cell.advance(CacheMode::Enabled, CacheMode::Disabled));
        assert!(cell.advance(CacheMode::EnabledButUnloaded, CacheMode::Enabled));
        assert!(cell.advance(CacheMode::Enabled, CacheMode::Disabled));
        assert!(!cell.advance(CacheMode::Disabled, CacheMode::Enabled));
        assert_eq!(cell.get(), CacheMode::Disabled);
    }
}
