//! Deferred-sync scopes
//!
//! A scope groups writes to many proxies and syncs them together when it is
//! committed. Rollback is client-local: records synced before a failure stay
//! synced on the server.

use super::handle::Proxy;
use super::registry::{RecordEntry, Registry};
use super::state::{ProxyState, Snapshot};
use crate::error::{Error, Result, SyncFailure};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

static NEXT_SCOPE: AtomicU64 = AtomicU64::new(1);

/// Records touched inside one open scope, in touch order
#[derive(Default)]
pub(crate) struct ScopeFrame {
    token: u64,
    pub(crate) touched: Vec<(Arc<RecordEntry>, Snapshot)>,
}

impl ScopeFrame {
    pub(crate) fn contains(&self, entry: &Arc<RecordEntry>) -> bool {
        self.touched.iter().any(|(e, _)| Arc::ptr_eq(e, entry))
    }

    /// Fold an inner frame into this one; snapshots already held here win
    fn absorb(&mut self, inner: ScopeFrame) {
        for (entry, snapshot) in inner.touched {
            if !self.contains(&entry) {
                self.touched.push((entry, snapshot));
            }
        }
    }
}

/// Guard for an open deferred-sync scope.
///
/// While any scope is open, writes through the registry do not auto-sync.
/// [`commit`](Self::commit) syncs every touched DIRTY record when this is
/// the outermost scope, and hands the records to the enclosing scope
/// otherwise. Dropping the guard without committing restores every touched
/// record to its state at first touch, without any network call.
#[must_use = "dropping a deferred-sync scope without commit() discards its edits"]
pub struct DeferredSync {
    registry: Arc<Registry>,
    token: u64,
    depth: usize,
    closed: bool,
}

impl DeferredSync {
    pub(crate) fn open(registry: Arc<Registry>) -> Self {
        let token = NEXT_SCOPE.fetch_add(1, Ordering::Relaxed);
        let depth = {
            let mut scopes = registry.scopes.lock();
            scopes.push(ScopeFrame {
                token,
                touched: Vec::new(),
            });
            scopes.len()
        };
        debug!("Opened deferred-sync scope at depth {}", depth);
        Self {
            registry,
            token,
            depth,
            closed: false,
        }
    }

    /// Nesting depth of this scope (1 for the outermost)
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Close the scope normally.
    ///
    /// On failure the sync stops at the first failing record; it and every
    /// not-yet-synced record are restored, and [`Error::Transaction`] lists
    /// the failure and the ids already synced.
    pub async fn commit(mut self) -> Result<()> {
        self.closed = true;
        let Some((frame, nested)) = self.take_frame() else {
            return Ok(());
        };

        if nested {
            let mut scopes = self.registry.scopes.lock();
            if let Some(parent) = scopes.last_mut() {
                parent.absorb(frame);
                return Ok(());
            }
        }

        sync_touched(&self.registry, frame).await
    }

    /// Close the scope discarding its edits
    pub fn rollback(mut self) {
        self.discard();
    }

    /// Pop this scope's frame, folding in any inner frames left open.
    ///
    /// Returns `None` once the frame is gone, e.g. drained by an enclosing
    /// scope that closed first. The flag tells whether a parent remains.
    fn take_frame(&self) -> Option<(ScopeFrame, bool)> {
        let mut scopes = self.registry.scopes.lock();
        let position = scopes.iter().position(|f| f.token == self.token)?;
        let mut frame = ScopeFrame::default();
        for inner in scopes.drain(position..) {
            frame.absorb(inner);
        }
        Some((frame, position > 0))
    }

    fn discard(&mut self) {
        self.closed = true;
        let Some((frame, _)) = self.take_frame() else {
            return;
        };
        let restored = frame.touched.len();
        for (entry, snapshot) in frame.touched.into_iter().rev() {
            entry.record.lock().restore(snapshot);
        }
        if restored > 0 {
            info!(
                "Deferred-sync scope at depth {} abandoned, {} record(s) restored",
                self.depth, restored
            );
        }
    }
}

impl Drop for DeferredSync {
    fn drop(&mut self) {
        if !self.closed {
            self.discard();
        }
    }
}

impl std::fmt::Debug for DeferredSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredSync")
            .field("depth", &self.depth)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

async fn sync_touched(registry: &Arc<Registry>, frame: ScopeFrame) -> Result<()> {
    let mut synced = Vec::new();
    let mut pending = frame.touched.into_iter();

    while let Some((entry, snapshot)) = pending.next() {
        let proxy = Proxy::new(Arc::clone(registry), Arc::clone(&entry));
        if proxy.state() != ProxyState::Dirty {
            continue;
        }

        if let Err(error) = proxy.sync().await {
            warn!(
                "Deferred sync of {} {} failed: {}; restoring {} record(s)",
                entry.kind,
                entry.id,
                error,
                pending.len() + 1
            );
            entry.record.lock().restore(snapshot);
            for (rest, rest_snapshot) in pending {
                rest.record.lock().restore(rest_snapshot);
            }
            return Err(Error::Transaction {
                failures: vec![SyncFailure {
                    kind: entry.kind,
                    id: entry.id,
                    error: Box::new(error),
                }],
                synced,
            });
        }
        synced.push(entry.id);
    }

    info!("Deferred sync committed {} record(s)", synced.len());
    Ok(())
}
