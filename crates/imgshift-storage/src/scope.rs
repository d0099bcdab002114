use crate::error::StorageResult;
use crate::store::{ReleaseReport, ScratchHandle, ScratchKind, ScratchStore, UploadedAsset};
use bytes::Bytes;
use futures::Stream;
use std::fmt;

/// Per-request owner of scratch files.
///
/// Every handle is recorded before any byte is written, so whatever happens to the
/// request its files are known here. `close` releases them; if the scope is dropped
/// without closing (a cancelled request future), `Drop` removes the leftovers
/// synchronously.
pub struct ScratchScope {
    store: ScratchStore,
    handles: Vec<ScratchHandle>,
}

impl ScratchScope {
    pub fn new(store: ScratchStore) -> Self {
        Self {
            store,
            handles: Vec::new(),
        }
    }

    pub fn store(&self) -> &ScratchStore {
        &self.store
    }

    pub fn handles(&self) -> &[ScratchHandle] {
        &self.handles
    }

    pub fn allocate(&mut self, kind: ScratchKind) -> ScratchHandle {
        let handle = self.store.allocate(kind);
        self.handles.push(handle.clone());
        handle
    }

    pub async fn receive<S, E>(&mut self, original_name: &str, stream: S) -> StorageResult<UploadedAsset>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: fmt::Display,
    {
        let handle = self.allocate(ScratchKind::Upload);
        self.store.receive(&handle, original_name, stream).await
    }

    pub async fn stage(&mut self, asset: &UploadedAsset) -> StorageResult<ScratchHandle> {
        let handle = self.allocate(ScratchKind::Staged);
        self.store.stage(&handle, asset).await?;
        Ok(handle)
    }

    pub async fn read(&self, handle: &ScratchHandle) -> StorageResult<Bytes> {
        self.store.read(handle).await
    }

    /// Release every file this scope allocated.
    pub async fn close(mut self) -> ReleaseReport {
        let report = self.store.release(&self.handles).await;
        self.handles.clear();
        report
    }
}

impl Drop for ScratchScope {
    fn drop(&mut self) {
        for handle in self.handles.drain(..) {
            match std::fs::remove_file(handle.path()) {
                Ok(()) => {
                    tracing::warn!(handle = %handle, "Scratch file removed by scope drop");
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(
                        handle = %handle,
                        error = %e,
                        "Failed to remove scratch file on scope drop"
                    );
                }
            }
        }
    }
}
