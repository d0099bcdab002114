use crate::error::{StorageError, StorageResult};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};
use uuid::Uuid;

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// What a scratch file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScratchKind {
    /// Raw bytes spooled from the request body.
    Upload,
    /// The private copy handed to the transcoder.
    Staged,
}

impl ScratchKind {
    fn extension(self) -> &'static str {
        match self {
            ScratchKind::Upload => "upload",
            ScratchKind::Staged => "staged",
        }
    }
}

/// Identifies one scratch file. Names are random, so two requests never collide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScratchHandle {
    pub id: Uuid,
    pub kind: ScratchKind,
    path: PathBuf,
}

impl ScratchHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Display for ScratchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.id, self.kind.extension())
    }
}

/// An upload that has been received into the scratch directory.
#[derive(Debug, Clone)]
pub struct UploadedAsset {
    pub handle: ScratchHandle,
    pub original_name: String,
    pub declared_size: u64,
}

/// Outcome of a best-effort release.
#[derive(Debug, Default)]
pub struct ReleaseReport {
    pub released: usize,
    pub failures: Vec<(ScratchHandle, String)>,
}

impl ReleaseReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

struct Inner {
    dir: PathBuf,
    max_file_size: u64,
}

/// Request-scoped file storage in a single scratch directory.
///
/// Nothing in here outlives a request: callers pair every allocation with a
/// [`release`](ScratchStore::release), usually through a
/// [`ScratchScope`](crate::ScratchScope).
#[derive(Clone)]
pub struct ScratchStore {
    inner: Arc<Inner>,
}

impl ScratchStore {
    /// Create a new ScratchStore rooted at `dir`
    ///
    /// # Arguments
    /// * `dir` - Scratch directory, created if missing (e.g., "./tmp")
    /// * `max_file_size` - Per-file byte cap enforced on receive and stage
    pub async fn new(dir: impl Into<PathBuf>, max_file_size: u64) -> StorageResult<Self> {
        let dir = dir.into();

        fs::create_dir_all(&dir).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create scratch directory {}: {}",
                dir.display(),
                e
            ))
        })?;

        Ok(Self {
            inner: Arc::new(Inner { dir, max_file_size }),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.inner.dir
    }

    pub fn max_file_size(&self) -> u64 {
        self.inner.max_file_size
    }

    /// Reserve a fresh scratch name. No I/O happens until the handle is written.
    pub fn allocate(&self, kind: ScratchKind) -> ScratchHandle {
        let id = Uuid::new_v4();
        let path = self.inner.dir.join(format!("{}.{}", id, kind.extension()));
        ScratchHandle { id, kind, path }
    }

    /// Spool an inbound byte stream to `handle`, enforcing the size cap before
    /// each chunk is written. A rejected or failed upload leaves no file behind.
    pub async fn receive<S, E>(
        &self,
        handle: &ScratchHandle,
        original_name: &str,
        stream: S,
    ) -> StorageResult<UploadedAsset>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: fmt::Display,
    {
        let start = std::time::Instant::now();
        match self.spool(handle, stream).await {
            Ok(size) => {
                tracing::info!(
                    handle = %handle,
                    original_name = %original_name,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Upload received"
                );
                Ok(UploadedAsset {
                    handle: handle.clone(),
                    original_name: original_name.to_string(),
                    declared_size: size,
                })
            }
            Err(e) => {
                self.remove_partial(handle).await;
                Err(e)
            }
        }
    }

    async fn spool<S, E>(&self, handle: &ScratchHandle, stream: S) -> StorageResult<u64>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: fmt::Display,
    {
        let max = self.inner.max_file_size;
        let mut stream = std::pin::pin!(stream);

        let file = fs::File::create(&handle.path).await.map_err(|e| {
            StorageError::WriteFailed(format!(
                "Failed to create file {}: {}",
                handle.path.display(),
                e
            ))
        })?;
        let mut writer = BufWriter::with_capacity(COPY_BUFFER_SIZE, file);
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| StorageError::SourceFailed(e.to_string()))?;
            let size = written + chunk.len() as u64;
            if size > max {
                return Err(StorageError::TooLarge { size, max });
            }
            writer.write_all(&chunk).await.map_err(|e| {
                StorageError::WriteFailed(format!(
                    "Failed to write file {}: {}",
                    handle.path.display(),
                    e
                ))
            })?;
            written = size;
        }

        writer.flush().await.map_err(|e| {
            StorageError::WriteFailed(format!(
                "Failed to flush file {}: {}",
                handle.path.display(),
                e
            ))
        })?;

        Ok(written)
    }

    /// Copy a received upload into `handle` with bounded buffers.
    ///
    /// Oversized assets are refused from their declared size before the
    /// destination is created.
    pub async fn stage(&self, handle: &ScratchHandle, asset: &UploadedAsset) -> StorageResult<()> {
        let max = self.inner.max_file_size;
        if asset.declared_size > max {
            return Err(StorageError::TooLarge {
                size: asset.declared_size,
                max,
            });
        }

        let start = std::time::Instant::now();
        match self.copy_capped(&asset.handle, handle, max).await {
            Ok(copied) => {
                tracing::info!(
                    from = %asset.handle,
                    to = %handle,
                    size_bytes = copied,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Asset staged"
                );
                Ok(())
            }
            Err(e) => {
                self.remove_partial(handle).await;
                Err(e)
            }
        }
    }

    async fn copy_capped(
        &self,
        from: &ScratchHandle,
        to: &ScratchHandle,
        max: u64,
    ) -> StorageResult<u64> {
        let source = fs::File::open(&from.path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => StorageError::NotFound(from.to_string()),
            _ => StorageError::ReadFailed(format!(
                "Failed to open file {}: {}",
                from.path.display(),
                e
            )),
        })?;
        // One byte past the cap is enough to notice a file that grew after receipt.
        let mut reader = BufReader::with_capacity(COPY_BUFFER_SIZE, source).take(max + 1);

        let dest = fs::File::create(&to.path).await.map_err(|e| {
            StorageError::WriteFailed(format!(
                "Failed to create file {}: {}",
                to.path.display(),
                e
            ))
        })?;
        let mut writer = BufWriter::with_capacity(COPY_BUFFER_SIZE, dest);

        let copied = tokio::io::copy(&mut reader, &mut writer)
            .await
            .map_err(|e| {
                StorageError::WriteFailed(format!(
                    "Failed to copy {} to {}: {}",
                    from.path.display(),
                    to.path.display(),
                    e
                ))
            })?;
        if copied > max {
            return Err(StorageError::TooLarge { size: copied, max });
        }

        writer.flush().await.map_err(|e| {
            StorageError::WriteFailed(format!(
                "Failed to flush file {}: {}",
                to.path.display(),
                e
            ))
        })?;

        Ok(copied)
    }

    /// Read a scratch file back into memory.
    pub async fn read(&self, handle: &ScratchHandle) -> StorageResult<Bytes> {
        let data = fs::read(&handle.path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => StorageError::NotFound(handle.to_string()),
            _ => StorageError::ReadFailed(format!(
                "Failed to read file {}: {}",
                handle.path.display(),
                e
            )),
        })?;
        Ok(Bytes::from(data))
    }

    /// Delete every handle, independently and concurrently.
    ///
    /// A file that is already gone counts as released. Other failures are logged and
    /// collected; they never stop the remaining deletions.
    pub async fn release(&self, handles: &[ScratchHandle]) -> ReleaseReport {
        let attempts = handles.iter().map(|handle| async move {
            match fs::remove_file(&handle.path).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(e) => Err((handle.clone(), e.to_string())),
            }
        });

        let mut report = ReleaseReport::default();
        for outcome in futures::future::join_all(attempts).await {
            match outcome {
                Ok(()) => report.released += 1,
                Err((handle, reason)) => {
                    tracing::warn!(
                        handle = %handle,
                        path = %handle.path.display(),
                        error = %reason,
                        "Failed to release scratch file"
                    );
                    report.failures.push((handle, reason));
                }
            }
        }

        tracing::debug!(
            released = report.released,
            failed = report.failures.len(),
            "Scratch files released"
        );
        report
    }

    /// Number of files currently in the scratch directory.
    pub async fn staged_file_count(&self) -> StorageResult<usize> {
        let mut entries = fs::read_dir(&self.inner.dir).await?;
        let mut count = 0;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Write and remove a small probe file to prove the directory is usable.
    ///
    /// Write and removal share one blocking task, which runs to completion even when
    /// the caller stops waiting, so an abandoned probe never strands its file.
    pub async fn probe(&self) -> StorageResult<()> {
        let handle = self.allocate(ScratchKind::Staged);
        tokio::task::spawn_blocking(move || {
            let written = std::fs::write(&handle.path, b"probe");
            let removed = match std::fs::remove_file(&handle.path) {
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                other => other,
            };
            written?;
            removed.map_err(|e| {
                StorageError::WriteFailed(format!("Failed to remove probe {}: {}", handle, e))
            })
        })
        .await
        .map_err(|e| StorageError::WriteFailed(format!("Probe task failed: {}", e)))?
    }

    async fn remove_partial(&self, handle: &ScratchHandle) {
        if let Err(e) = fs::remove_file(&handle.path).await {
            if e.kind() != ErrorKind::NotFound {
                tracing::warn!(
                    handle = %handle,
                    error = %e,
                    "Failed to remove partial scratch file"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use tempfile::tempdir;

    fn chunks(parts: &[&[u8]]) -> impl Stream<Item = Result<Bytes, std::io::Error>> {
        let items: Vec<Result<Bytes, std::io::Error>> = parts
            .iter()
            .map(|p| Ok(Bytes::copy_from_slice(p)))
            .collect();
        stream::iter(items)
    }

    #[tokio::test]
    async fn test_new_creates_directory() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a/b/scratch");
        let store = ScratchStore::new(&nested, 1024).await.unwrap();
        assert!(nested.is_dir());
        assert_eq!(store.staged_file_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_allocate_is_unique_and_lazy() {
        let dir = tempdir().unwrap();
        let store = ScratchStore::new(dir.path(), 1024).await.unwrap();
        let a = store.allocate(ScratchKind::Upload);
        let b = store.allocate(ScratchKind::Upload);
        assert_ne!(a.id, b.id);
        assert_ne!(a.path(), b.path());
        assert_eq!(store.staged_file_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_receive_stage_read_release() {
        let dir = tempdir().unwrap();
        let store = ScratchStore::new(dir.path(), 1024).await.unwrap();

        let upload = store.allocate(ScratchKind::Upload);
        let asset = store
            .receive(&upload, "photo.png", chunks(&[b"hello ", b"world"]))
            .await
            .unwrap();
        assert_eq!(asset.declared_size, 11);
        assert_eq!(asset.original_name, "photo.png");

        let staged = store.allocate(ScratchKind::Staged);
        store.stage(&staged, &asset).await.unwrap();
        assert_eq!(store.read(&staged).await.unwrap(), Bytes::from_static(b"hello world"));
        assert_eq!(store.staged_file_count().await.unwrap(), 2);

        let report = store.release(&[upload, staged]).await;
        assert!(report.is_clean());
        assert_eq!(report.released, 2);
        assert_eq!(store.staged_file_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_receive_rejects_oversized_and_removes_partial() {
        let dir = tempdir().unwrap();
        let store = ScratchStore::new(dir.path(), 8).await.unwrap();
        let upload = store.allocate(ScratchKind::Upload);

        let err = store
            .receive(&upload, "big.png", chunks(&[b"12345", b"67890"]))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::TooLarge { size: 10, max: 8 }));
        assert!(!upload.path().exists());
        assert_eq!(store.staged_file_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_receive_accepts_exact_limit() {
        let dir = tempdir().unwrap();
        let store = ScratchStore::new(dir.path(), 8).await.unwrap();
        let upload = store.allocate(ScratchKind::Upload);
        let asset = store
            .receive(&upload, "x", chunks(&[b"1234", b"5678"]))
            .await
            .unwrap();
        assert_eq!(asset.declared_size, 8);
    }

    #[tokio::test]
    async fn test_receive_stream_error_removes_partial() {
        let dir = tempdir().unwrap();
        let store = ScratchStore::new(dir.path(), 1024).await.unwrap();
        let upload = store.allocate(ScratchKind::Upload);

        let items: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"partial")),
            Err(std::io::Error::new(ErrorKind::ConnectionReset, "client went away")),
        ];
        let err = store
            .receive(&upload, "x", stream::iter(items))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::SourceFailed(_)));
        assert!(!upload.path().exists());
    }

    #[tokio::test]
    async fn test_stage_checks_declared_size_before_writing() {
        let dir = tempdir().unwrap();
        let store = ScratchStore::new(dir.path(), 8).await.unwrap();
        let upload = store.allocate(ScratchKind::Upload);
        let asset = UploadedAsset {
            handle: upload,
            original_name: "x".to_string(),
            declared_size: 9,
        };

        let staged = store.allocate(ScratchKind::Staged);
        let err = store.stage(&staged, &asset).await.unwrap_err();
        assert!(matches!(err, StorageError::TooLarge { size: 9, max: 8 }));
        assert!(!staged.path().exists());
    }

    #[tokio::test]
    async fn test_stage_catches_file_larger_than_declared() {
        let dir = tempdir().unwrap();
        let store = ScratchStore::new(dir.path(), 8).await.unwrap();
        let upload = store.allocate(ScratchKind::Upload);
        std::fs::write(upload.path(), b"0123456789").unwrap();
        let asset = UploadedAsset {
            handle: upload.clone(),
            original_name: "x".to_string(),
            declared_size: 4,
        };

        let staged = store.allocate(ScratchKind::Staged);
        let err = store.stage(&staged, &asset).await.unwrap_err();
        assert!(matches!(err, StorageError::TooLarge { .. }));
        assert!(!staged.path().exists());
        store.release(&[upload]).await;
    }

    #[tokio::test]
    async fn test_stage_missing_source() {
        let dir = tempdir().unwrap();
        let store = ScratchStore::new(dir.path(), 1024).await.unwrap();
        let asset = UploadedAsset {
            handle: store.allocate(ScratchKind::Upload),
            original_name: "x".to_string(),
            declared_size: 4,
        };
        let staged = store.allocate(ScratchKind::Staged);
        let err = store.stage(&staged, &asset).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
        assert!(!staged.path().exists());
    }

    #[tokio::test]
    async fn test_release_missing_files_is_not_an_error() {
        let dir = tempdir().unwrap();
        let store = ScratchStore::new(dir.path(), 1024).await.unwrap();
        let never_written = store.allocate(ScratchKind::Upload);
        let report = store.release(&[never_written.clone(), never_written]).await;
        assert!(report.is_clean());
        assert_eq!(report.released, 2);
    }

    #[tokio::test]
    async fn test_release_attempts_every_handle_after_failure() {
        let dir = tempdir().unwrap();
        let store = ScratchStore::new(dir.path(), 1024).await.unwrap();

        // A directory in place of a file cannot be removed with remove_file.
        let blocked = store.allocate(ScratchKind::Upload);
        std::fs::create_dir(blocked.path()).unwrap();
        let ok = store.allocate(ScratchKind::Staged);
        std::fs::write(ok.path(), b"data").unwrap();

        let report = store.release(&[blocked.clone(), ok.clone()]).await;
        assert_eq!(report.released, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, blocked);
        assert!(!ok.path().exists());
        std::fs::remove_dir(blocked.path()).unwrap();
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let dir = tempdir().unwrap();
        let store = ScratchStore::new(dir.path(), 1024).await.unwrap();
        let handle = store.allocate(ScratchKind::Staged);
        assert!(matches!(
            store.read(&handle).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_abandoned_probe_leaves_nothing_behind() {
        let dir = tempdir().unwrap();
        let store = ScratchStore::new(dir.path(), 1024).await.unwrap();

        for _ in 0..20 {
            // Dropped after its first poll, like a health check that timed out.
            let _ = tokio::time::timeout(std::time::Duration::ZERO, store.probe()).await;
        }

        let mut remaining = store.staged_file_count().await.unwrap();
        for _ in 0..100 {
            if remaining == 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            remaining = store.staged_file_count().await.unwrap();
        }
        assert_eq!(remaining, 0);
    }

    #[tokio::test]
    async fn test_probe_leaves_nothing_behind() {
        let dir = tempdir().unwrap();
        let store = ScratchStore::new(dir.path(), 1024).await.unwrap();
        store.probe().await.unwrap();
        assert_eq!(store.staged_file_count().await.unwrap(), 0);
    }
}
