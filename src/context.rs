//! Shared runtime context
//!
//! Every folder and file holds an `Arc<FsContext>` handed down by the manager
//! that created it. The context owns the started flag, the type binder
//! registry and the pending-flush set, so independent managers never share
//! state.

use crate::binder::BinderRegistry;
use crate::error::{FsError, Result};
use crate::fs::File;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

/// Opaque flush registration id held by a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlushHandle(u64);

impl FlushHandle {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Outcome of draining the pending-flush set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Files whose cached value was serialized
    pub flushed: usize,
    /// Registrations that had nothing left to do
    pub skipped: usize,
    /// Files whose serialization failed
    pub failed: usize,
}

pub struct FsContext {
    started: AtomicBool,
    registry: BinderRegistry,
    next_handle: AtomicU64,
    pending: Mutex<HashMap<FlushHandle, Weak<File>>>,
}

impl FsContext {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            started: AtomicBool::new(false),
            registry: BinderRegistry::new(),
            next_handle: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
        })
    }

    pub fn registry(&self) -> &BinderRegistry {
        &self.registry
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    pub(crate) fn set_started(&self, started: bool) {
        self.started.store(started, Ordering::Release);
    }

    /// Fail fast when the owning manager is not running.
    pub fn ensure_started(&self) -> Result<()> {
        if self.is_started() {
            Ok(())
        } else {
            Err(FsError::NotBooted)
        }
    }

    pub(crate) fn next_handle(&self) -> FlushHandle {
        FlushHandle(self.next_handle.fetch_add(1, Ordering::Relaxed))
    }

    /// Queue a file for the next flush. Registering twice is a no-op.
    pub(crate) fn register_flush(&self, handle: FlushHandle, file: Weak<File>) {
        self.pending.lock().entry(handle).or_insert(file);
    }

    pub(crate) fn deregister_flush(&self, handle: FlushHandle) {
        self.pending.lock().remove(&handle);
    }

    pub fn pending_flushes(&self) -> usize {
        self.pending.lock().len()
    }

    /// Serialize every queued file's cached value into its document node.
    ///
    /// The pending set is swapped out under the lock and executed outside it;
    /// registrations made while this runs land in the next flush. A failing
    /// file is logged and does not stop the rest.
    pub fn flush(&self) -> FlushReport {
        let batch = std::mem::take(&mut *self.pending.lock());
        let mut report = FlushReport::default();

        for (handle, weak) in batch {
            let Some(file) = weak.upgrade() else {
                report.skipped += 1;
                continue;
            };
            match file.flush() {
                Ok(true) => report.flushed += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(
                        handle = handle.as_u64(),
                        path = %file.path(),
                        error = %e,
                        "Failed to flush file"
                    );
                }
            }
        }

        debug!(
            flushed = report.flushed,
            skipped = report.skipped,
            failed = report.failed,
            "Flush completed"
        );
        report
    }
}
