//! Offset writes into staging files, verification and atomic commit

use hubcas_errors::{Error, StorageError};
use hubcas_hash::{ContentHash, HashAlgorithm};
use hubcas_types::ContentDescriptor;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::sweep::STAGING_SUFFIX;

/// Removes a staging file on drop unless it was handed off
#[derive(Debug)]
struct StagingGuard {
    path: Option<PathBuf>,
}

impl StagingGuard {
    fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    fn path(&self) -> &Path {
        self.path.as_deref().unwrap_or_else(|| Path::new(""))
    }

    fn disarm(&mut self) {
        self.path = None;
    }
}

impl Drop for StagingGuard {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "failed to remove staging file"
                    );
                }
            }
        }
    }
}

/// Opens staging files for descriptors.
///
/// Staging files live in the destination directory so the final rename
/// never crosses a filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReassemblyWriter {
    default_algorithm: HashAlgorithm,
}

impl ReassemblyWriter {
    #[must_use]
    pub fn new(default_algorithm: HashAlgorithm) -> Self {
        Self { default_algorithm }
    }

    /// Open a staging file for `descriptor` under `dir`
    ///
    /// # Errors
    ///
    /// Returns an error if the descriptor hash cannot be parsed or the
    /// staging file cannot be created and sized.
    pub async fn open(
        &self,
        dir: &Path,
        descriptor: &ContentDescriptor,
    ) -> Result<WriteHandle, Error> {
        let expected = ContentHash::parse(&descriptor.hash, self.default_algorithm)?;
        self.open_hash(dir, expected, descriptor.size).await
    }

    /// Open a staging file for an already-parsed hash
    ///
    /// # Errors
    ///
    /// Returns an error if the staging file cannot be created and sized.
    pub async fn open_hash(
        &self,
        dir: &Path,
        expected: ContentHash,
        size: u64,
    ) -> Result<WriteHandle, Error> {
        let digest = expected.to_hex();
        let staging = dir.join(format!(
            ".{digest}.{}{STAGING_SUFFIX}",
            Uuid::new_v4().simple()
        ));

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&staging)
            .await
            .map_err(|e| Error::io_with_path(&e, &staging))?;
        let guard = StagingGuard::new(staging);

        file.set_len(size)
            .await
            .map_err(|e| Error::io_with_path(&e, guard.path()))?;

        Ok(WriteHandle {
            expected,
            size,
            final_path: dir.join(digest),
            file: Mutex::new(file),
            written: AtomicU64::new(0),
            guard,
        })
    }
}

/// An open, pre-sized staging file accepting writes at arbitrary offsets.
///
/// Dropping the handle deletes the staging file.
#[derive(Debug)]
pub struct WriteHandle {
    expected: ContentHash,
    size: u64,
    final_path: PathBuf,
    file: Mutex<File>,
    written: AtomicU64,
    guard: StagingGuard,
}

impl WriteHandle {
    /// Write `bytes` at `offset`
    ///
    /// # Errors
    ///
    /// Returns an error if the range extends past the descriptor size or the
    /// write fails.
    pub async fn write_at(&self, offset: u64, bytes: &[u8]) -> Result<(), Error> {
        let len = bytes.len() as u64;
        let in_bounds = offset.checked_add(len).is_some_and(|end| end <= self.size);
        if !in_bounds {
            return Err(StorageError::CorruptedData {
                message: format!(
                    "write of {len} bytes at offset {offset} exceeds size {}",
                    self.size
                ),
            }
            .into());
        }

        let mut file = self.file.lock().await;
        file.seek(SeekFrom::Start(offset))
            .await
            .map_err(|e| Error::io_with_path(&e, self.guard.path()))?;
        file.write_all(bytes)
            .await
            .map_err(|e| Error::io_with_path(&e, self.guard.path()))?;
        drop(file);

        self.written.fetch_add(len, Ordering::Relaxed);
        Ok(())
    }

    /// Bytes written so far
    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn expected_hash(&self) -> &ContentHash {
        &self.expected
    }

    #[must_use]
    pub fn staging_path(&self) -> &Path {
        self.guard.path()
    }

    #[must_use]
    pub fn final_path(&self) -> &Path {
        &self.final_path
    }

    /// Flush, then check length and hash of the staged bytes.
    ///
    /// On failure the staging file is removed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::CorruptedData` when bytes are missing or the
    /// digest differs, or an I/O error from flushing or hashing.
    pub async fn verify(self) -> Result<VerifiedFile, Error> {
        let Self {
            expected,
            size,
            final_path,
            file,
            written,
            guard,
        } = self;

        let mut file = file.into_inner();
        file.flush()
            .await
            .map_err(|e| Error::io_with_path(&e, guard.path()))?;
        file.sync_all()
            .await
            .map_err(|e| Error::io_with_path(&e, guard.path()))?;
        drop(file);

        let written = written.into_inner();
        if written != size {
            return Err(StorageError::CorruptedData {
                message: format!("only {written} of {size} bytes written for {expected}"),
            }
            .into());
        }

        let (actual, len) = ContentHash::hash_file(guard.path(), expected.algorithm()).await?;
        if len != size {
            return Err(StorageError::CorruptedData {
                message: format!("staged length {len} differs from descriptor size {size}"),
            }
            .into());
        }
        if actual != expected {
            return Err(StorageError::CorruptedData {
                message: format!("hash mismatch: expected {expected}, got {actual}"),
            }
            .into());
        }

        Ok(VerifiedFile {
            hash: expected,
            final_path,
            guard,
        })
    }

    /// Verify and rename into place in one step
    ///
    /// # Errors
    ///
    /// See [`WriteHandle::verify`] and [`VerifiedFile::commit`].
    pub async fn finalize(self) -> Result<PathBuf, Error> {
        self.verify().await?.commit().await
    }
}

/// Staged bytes that passed verification and await their rename.
///
/// Dropping without committing deletes the staging file.
#[derive(Debug)]
pub struct VerifiedFile {
    hash: ContentHash,
    final_path: PathBuf,
    guard: StagingGuard,
}

impl VerifiedFile {
    #[must_use]
    pub fn hash(&self) -> &ContentHash {
        &self.hash
    }

    #[must_use]
    pub fn final_path(&self) -> &Path {
        &self.final_path
    }

    /// Atomically rename the staging file to its final path
    ///
    /// # Errors
    ///
    /// Returns `StorageError::AtomicRenameFailed` if the rename fails; the
    /// staging file is removed in that case.
    pub async fn commit(mut self) -> Result<PathBuf, Error> {
        tokio::fs::rename(self.guard.path(), &self.final_path)
            .await
            .map_err(|e| StorageError::AtomicRenameFailed {
                message: format!(
                    "{} -> {}: {e}",
                    self.guard.path().display(),
                    self.final_path.display()
                ),
            })?;
        self.guard.disarm();
        Ok(self.final_path)
    }
}
