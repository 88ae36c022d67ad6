//! Batch download orchestration

use bytes::Bytes;
use futures::stream::{self, StreamExt};
use hubcas_config::Config;
use hubcas_errors::{ChunkError, Error, TransferError, TransferErrorKind};
use hubcas_events::{
    AppEvent, EventEmitter, EventMeta, EventSender, FailureContext, TransferEvent,
};
use hubcas_hash::{ContentHash, HashAlgorithm};
use hubcas_net::{ChunkSource, RetryPolicy};
use hubcas_types::{
    AccessCredential, ChunkHandle, ContentDescriptor, Direction, PartialTransferResult,
    TransferRequest, TransferResult,
};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    sweep_orphaned_staging, ChunkState, ProgressTracker, ReassemblyWriter, VerifiedFile,
    WorkerPool,
};

/// Tunables of the download engine
#[derive(Debug, Clone)]
pub struct TransferOptions {
    pub chunk_size: u32,
    pub max_concurrent_fetches: usize,
    pub max_in_flight_per_file: usize,
    pub max_parallel_files: usize,
    pub chunk_attempt_timeout: Duration,
    /// Applies to fetching and verification; committing is never interrupted
    pub request_timeout: Option<Duration>,
    pub staging_grace: Duration,
    pub retry: RetryPolicy,
    pub default_hash_algorithm: HashAlgorithm,
}

impl TransferOptions {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let transfer = &config.transfer;
        Self {
            chunk_size: transfer.chunk_length(),
            max_concurrent_fetches: transfer.max_concurrent_fetches.max(1),
            max_in_flight_per_file: transfer.max_in_flight_per_file.max(1),
            max_parallel_files: transfer.max_parallel_files.max(1),
            chunk_attempt_timeout: transfer.chunk_attempt_timeout(),
            request_timeout: transfer.request_timeout(),
            staging_grace: transfer.staging_grace(),
            retry: RetryPolicy::from(&config.retry),
            default_hash_algorithm: transfer.default_hash_algorithm,
        }
    }
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Whether one failure aborts the whole request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransferMode {
    /// All files land or none do
    Atomic,
    /// Every descriptor gets its own outcome
    Partial,
}

/// Distinct content to fetch, with every request index that names it
#[derive(Debug)]
struct FileJob {
    hash: ContentHash,
    descriptor: ContentDescriptor,
    primary: usize,
    indices: Vec<usize>,
}

/// State shared by every file of one request
struct Batch<'a> {
    id: &'a str,
    dest: &'a Path,
    credential: &'a AccessCredential,
    pool: WorkerPool,
    progress: ProgressTracker,
}

type Outcomes = Vec<Result<PathBuf, TransferError>>;

/// Downloads batches of content descriptors into local directories.
///
/// Chunks of all files of a request are fetched concurrently through one
/// [`WorkerPool`]. Each file is reassembled in a staging file, verified
/// against its hash and renamed to `<destination>/<hex digest>`.
pub struct TransferOrchestrator {
    source: Arc<dyn ChunkSource>,
    options: TransferOptions,
    writer: ReassemblyWriter,
    shared_pool: Option<WorkerPool>,
    tx: Option<EventSender>,
}

impl EventEmitter for TransferOrchestrator {
    fn event_sender(&self) -> Option<&EventSender> {
        self.tx.as_ref()
    }
}

impl TransferOrchestrator {
    #[must_use]
    pub fn new(source: Arc<dyn ChunkSource>, options: TransferOptions) -> Self {
        let writer = ReassemblyWriter::new(options.default_hash_algorithm);
        Self {
            source,
            options,
            writer,
            shared_pool: None,
            tx: None,
        }
    }

    /// Draw fetch slots from `pool` instead of a fresh pool per request
    #[must_use]
    pub fn with_pool(mut self, pool: WorkerPool) -> Self {
        self.shared_pool = Some(pool);
        self
    }

    #[must_use]
    pub fn with_events(mut self, tx: EventSender) -> Self {
        self.tx = Some(tx);
        self
    }

    #[must_use]
    pub fn options(&self) -> &TransferOptions {
        &self.options
    }

    /// Download every descriptor or none.
    ///
    /// Paths are index-aligned with `request.descriptors`; descriptors
    /// sharing a hash share a path.
    ///
    /// # Errors
    ///
    /// Returns the first `TransferError` observed, `Error::Cancelled` or
    /// `Error::DeadlineExceeded`. No final file of the request remains.
    pub async fn download(&self, request: TransferRequest) -> Result<TransferResult, Error> {
        self.download_with_cancel(request, CancellationToken::new())
            .await
    }

    /// [`Self::download`] that stops when `cancel` fires
    ///
    /// # Errors
    ///
    /// See [`Self::download`].
    pub async fn download_with_cancel(
        &self,
        request: TransferRequest,
        cancel: CancellationToken,
    ) -> Result<TransferResult, Error> {
        let outcomes = self.execute(request, TransferMode::Atomic, &cancel).await?;
        let paths = outcomes
            .into_iter()
            .collect::<Result<Vec<_>, _>>()
            .map_err(Error::Transfer)?;
        Ok(TransferResult { paths })
    }

    /// Download with an independent outcome per descriptor
    ///
    /// # Errors
    ///
    /// Returns `Error::Cancelled` or `Error::DeadlineExceeded`; per-file
    /// failures are reported in the result.
    pub async fn download_partial(
        &self,
        request: TransferRequest,
    ) -> Result<PartialTransferResult, Error> {
        self.download_partial_with_cancel(request, CancellationToken::new())
            .await
    }

    /// [`Self::download_partial`] that stops when `cancel` fires
    ///
    /// # Errors
    ///
    /// See [`Self::download_partial`].
    pub async fn download_partial_with_cancel(
        &self,
        request: TransferRequest,
        cancel: CancellationToken,
    ) -> Result<PartialTransferResult, Error> {
        let outcomes = self
            .execute(request, TransferMode::Partial, &cancel)
            .await?;
        Ok(PartialTransferResult { outcomes })
    }

    async fn execute(
        &self,
        request: TransferRequest,
        mode: TransferMode,
        cancel: &CancellationToken,
    ) -> Result<Outcomes, Error> {
        let batch_id = Uuid::new_v4().to_string();
        let started = Instant::now();

        let result = self.run(&batch_id, request, mode, cancel).await;

        match &result {
            Ok(outcomes) => {
                let succeeded = outcomes.iter().filter(|o| o.is_ok()).count();
                self.emit_batch(
                    &batch_id,
                    TransferEvent::BatchCompleted {
                        batch_id: batch_id.clone(),
                        succeeded,
                        failed: outcomes.len() - succeeded,
                        duration_ms: u64::try_from(started.elapsed().as_millis())
                            .unwrap_or(u64::MAX),
                    },
                );
            }
            Err(err) => self.emit_batch(
                &batch_id,
                TransferEvent::BatchFailed {
                    batch_id: batch_id.clone(),
                    failure: FailureContext::from_error(err),
                },
            ),
        }

        result
    }

    async fn run(
        &self,
        batch_id: &str,
        request: TransferRequest,
        mode: TransferMode,
        cancel: &CancellationToken,
    ) -> Result<Outcomes, Error> {
        let TransferRequest {
            descriptors,
            destination_dir,
            credential,
        } = request;

        if descriptors.is_empty() {
            return Ok(Vec::new());
        }

        let (jobs, invalid) = self.plan(&descriptors);
        let total_bytes = jobs.iter().map(|job| job.descriptor.size).sum();

        self.emit_batch(
            batch_id,
            TransferEvent::BatchStarted {
                batch_id: batch_id.to_string(),
                descriptors: descriptors.len(),
                unique_files: jobs.len(),
                total_bytes,
            },
        );

        if let Err(auth) = credential.authorize_for(Direction::Download) {
            let message = auth.to_string();
            return fail_all(descriptors.len(), TransferErrorKind::Auth, &message, mode);
        }

        let mut outcomes: Vec<Option<Result<PathBuf, TransferError>>> =
            (0..descriptors.len()).map(|_| None).collect();

        if let Some(first) = invalid.first() {
            if mode == TransferMode::Atomic {
                return Err(first.clone().into());
            }
        }
        for err in invalid {
            let index = err.index;
            outcomes[index] = Some(Err(err));
        }

        if let Err(e) = tokio::fs::create_dir_all(&destination_dir).await {
            let message = Error::io_with_path(&e, &destination_dir).to_string();
            return fail_all(descriptors.len(), TransferErrorKind::Io, &message, mode);
        }
        self.sweep(&destination_dir).await;

        let batch = Batch {
            id: batch_id,
            dest: &destination_dir,
            credential: &credential,
            pool: self
                .shared_pool
                .clone()
                .unwrap_or_else(|| WorkerPool::new(self.options.max_concurrent_fetches)),
            progress: ProgressTracker::new(total_bytes),
        };

        let fetched = self
            .bounded(self.fetch_all(&jobs, &batch, mode), cancel)
            .await?
            .map_err(Error::Transfer)?;

        match mode {
            TransferMode::Atomic => {
                let paths = self.commit_all(&jobs, fetched).await?;
                for (job, path) in jobs.iter().zip(paths) {
                    for &index in &job.indices {
                        outcomes[index] = Some(Ok(path.clone()));
                    }
                }
            }
            TransferMode::Partial => {
                for (j, result) in fetched.into_iter().enumerate() {
                    let job = &jobs[j];
                    let result = match result {
                        Ok(file) => file
                            .commit()
                            .await
                            .map_err(|e| transfer_error(job.primary, &e)),
                        Err(err) => Err(err),
                    };
                    for &index in &job.indices {
                        outcomes[index] = Some(match &result {
                            Ok(path) => Ok(path.clone()),
                            Err(err) => Err(err.with_index(index)),
                        });
                    }
                }
            }
        }

        let outcomes: Outcomes = outcomes
            .into_iter()
            .enumerate()
            .map(|(index, outcome)| {
                outcome.unwrap_or_else(|| {
                    Err(TransferError::new(
                        index,
                        TransferErrorKind::Cancelled,
                        "descriptor was never scheduled",
                    ))
                })
            })
            .collect();

        for (index, outcome) in outcomes.iter().enumerate() {
            if let Ok(path) = outcome {
                self.emit_batch(
                    batch_id,
                    TransferEvent::FileCommitted {
                        index,
                        path: path.clone(),
                    },
                );
            }
        }

        Ok(outcomes)
    }

    /// Parse hashes and collapse descriptors naming the same content
    fn plan(&self, descriptors: &[ContentDescriptor]) -> (Vec<FileJob>, Vec<TransferError>) {
        let mut jobs: Vec<FileJob> = Vec::new();
        let mut by_hash: HashMap<ContentHash, usize> = HashMap::new();
        let mut invalid = Vec::new();

        for (index, descriptor) in descriptors.iter().enumerate() {
            let parsed = ContentHash::parse(&descriptor.hash, self.options.default_hash_algorithm);
            let hash = match parsed {
                Ok(hash) => hash,
                Err(e) => {
                    invalid.push(TransferError::new(
                        index,
                        TransferErrorKind::InvalidDescriptor,
                        e.to_string(),
                    ));
                    continue;
                }
            };

            match by_hash.entry(hash) {
                Entry::Occupied(slot) => jobs[*slot.get()].indices.push(index),
                Entry::Vacant(slot) => {
                    slot.insert(jobs.len());
                    jobs.push(FileJob {
                        hash,
                        descriptor: descriptor.clone(),
                        primary: index,
                        indices: vec![index],
                    });
                }
            }
        }

        (jobs, invalid)
    }

    async fn sweep(&self, dir: &Path) {
        match sweep_orphaned_staging(dir, self.options.staging_grace).await {
            Ok(0) => {}
            Ok(removed) => self.emit_transfer(TransferEvent::StagingSwept {
                dir: dir.to_path_buf(),
                removed,
            }),
            Err(e) => self.emit_warning(format!("staging sweep of {} failed: {e}", dir.display())),
        }
    }

    /// Race `work` against cancellation and the request deadline
    async fn bounded<T>(
        &self,
        work: impl Future<Output = T>,
        cancel: &CancellationToken,
    ) -> Result<T, Error> {
        let limited = async {
            match self.options.request_timeout {
                Some(limit) => tokio::time::timeout(limit, work)
                    .await
                    .map_err(|_| Error::DeadlineExceeded {
                        seconds: limit.as_secs(),
                    }),
                None => Ok(work.await),
            }
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Error::Cancelled),
            result = limited => result,
        }
    }

    /// Fetch and verify every job.
    ///
    /// Results are job-aligned. In atomic mode the first failure is
    /// returned and all other work is dropped, deleting its staging files.
    async fn fetch_all(
        &self,
        jobs: &[FileJob],
        batch: &Batch<'_>,
        mode: TransferMode,
    ) -> Result<Vec<Result<VerifiedFile, TransferError>>, TransferError> {
        let mut results: Vec<Option<Result<VerifiedFile, TransferError>>> =
            (0..jobs.len()).map(|_| None).collect();

        let mut files = stream::iter(jobs.iter().enumerate())
            .map(|(j, job)| async move { (j, self.fetch_file(job, batch).await) })
            .buffer_unordered(self.options.max_parallel_files);

        while let Some((j, result)) = files.next().await {
            if let Err(err) = &result {
                let job = &jobs[j];
                for &index in &job.indices {
                    let failure = err.with_index(index);
                    self.emit_batch(
                        batch.id,
                        TransferEvent::FileFailed {
                            index,
                            hash: job.descriptor.hash.clone(),
                            failure: FailureContext::from_error(&failure),
                        },
                    );
                }
                if mode == TransferMode::Atomic {
                    return Err(err.clone());
                }
            }
            results[j] = Some(result);
        }

        Ok(results
            .into_iter()
            .zip(jobs)
            .map(|(result, job)| {
                result.unwrap_or_else(|| {
                    Err(TransferError::new(
                        job.primary,
                        TransferErrorKind::Cancelled,
                        "file was never scheduled",
                    ))
                })
            })
            .collect())
    }

    async fn fetch_file(
        &self,
        job: &FileJob,
        batch: &Batch<'_>,
    ) -> Result<VerifiedFile, TransferError> {
        let index = job.primary;
        let chunks = ChunkHandle::partition(&job.descriptor, self.options.chunk_size);

        self.emit_batch(
            batch.id,
            TransferEvent::FileStarted {
                index,
                hash: job.descriptor.hash.clone(),
                size: job.descriptor.size,
                chunks: chunks.len(),
            },
        );

        let staged = self
            .writer
            .open_hash(batch.dest, job.hash, job.descriptor.size)
            .await
            .map_err(|e| transfer_error(index, &e))?;

        {
            let handle = &staged;
            let mut writes = stream::iter(chunks)
                .map(|chunk| async move {
                    let bytes = self.fetch_chunk(&chunk, batch, index).await?;
                    handle
                        .write_at(chunk.offset, &bytes)
                        .await
                        .map_err(|e| transfer_error(index, &e))?;

                    let written = bytes.len() as u64;
                    let batch_bytes = batch.progress.record(written);
                    self.emit_batch(
                        batch.id,
                        TransferEvent::Progress {
                            hash: chunk.descriptor.hash.clone(),
                            file_bytes: handle.bytes_written(),
                            file_total: chunk.descriptor.size,
                            batch_bytes,
                            batch_total: batch.progress.batch_total(),
                        },
                    );
                    Ok::<(), TransferError>(())
                })
                .buffer_unordered(self.options.max_in_flight_per_file);

            while let Some(result) = writes.next().await {
                result?;
            }
        }

        let verified = staged
            .verify()
            .await
            .map_err(|e| transfer_error(index, &e))?;

        self.emit_batch(
            batch.id,
            TransferEvent::FileVerified {
                index,
                hash: job.descriptor.hash.clone(),
            },
        );
        Ok(verified)
    }

    /// Drive one chunk through its retry state machine
    async fn fetch_chunk(
        &self,
        chunk: &ChunkHandle,
        batch: &Batch<'_>,
        index: usize,
    ) -> Result<Bytes, TransferError> {
        let mut state = ChunkState::Pending;
        loop {
            state = state.begin_attempt();

            let permit = batch
                .pool
                .acquire()
                .await
                .map_err(|e| transfer_error(index, &e))?;
            let result = self.attempt(chunk, batch.credential).await;
            drop(permit);

            state = state.complete(
                result.as_ref().map(|_| ()),
                &self.options.retry,
                rand::random::<f64>(),
            );

            match (state, result) {
                (_, Ok(bytes)) => return Ok(bytes),
                (ChunkState::RetryScheduled { attempt, delay }, Err(err)) => {
                    self.emit_batch(
                        batch.id,
                        TransferEvent::ChunkRetrying {
                            hash: chunk.descriptor.hash.clone(),
                            offset: chunk.offset,
                            attempt,
                            delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            reason: err.to_string(),
                        },
                    );
                    tokio::time::sleep(delay).await;
                }
                (_, Err(err)) => return Err(TransferError::from_chunk(index, &err)),
            }
        }
    }

    async fn attempt(
        &self,
        chunk: &ChunkHandle,
        credential: &AccessCredential,
    ) -> Result<Bytes, ChunkError> {
        let limit = self.options.chunk_attempt_timeout;
        tokio::time::timeout(limit, self.source.fetch(chunk, credential))
            .await
            .unwrap_or_else(|_| {
                Err(ChunkError::Transient {
                    message: format!("no response within {}s", limit.as_secs()),
                })
            })
    }

    /// Rename every verified file into place, undoing earlier renames if a
    /// later one fails. Paths are job-aligned.
    async fn commit_all(
        &self,
        jobs: &[FileJob],
        fetched: Vec<Result<VerifiedFile, TransferError>>,
    ) -> Result<Vec<PathBuf>, Error> {
        let mut verified = Vec::with_capacity(fetched.len());
        for result in fetched {
            verified.push(result?);
        }

        let mut committed: Vec<PathBuf> = Vec::with_capacity(verified.len());
        let mut pending = verified.into_iter().zip(jobs);
        while let Some((file, job)) = pending.next() {
            match file.commit().await {
                Ok(path) => committed.push(path),
                Err(e) => {
                    drop(pending);
                    let removed = rollback(&committed).await;
                    self.emit_transfer(TransferEvent::RolledBack { removed });
                    return Err(transfer_error(job.primary, &e).into());
                }
            }
        }
        Ok(committed)
    }

    fn emit_batch(&self, batch_id: &str, event: TransferEvent) {
        let event = AppEvent::Transfer(event);
        let meta =
            EventMeta::new(event.log_level(), event.event_source()).with_correlation_id(batch_id);
        self.emit_with_meta(meta, event);
    }
}

/// Remove already-renamed files; returns how many were removed
async fn rollback(paths: &[PathBuf]) -> usize {
    let mut removed = 0;
    for path in paths {
        match tokio::fs::remove_file(path).await {
            Ok(()) => removed += 1,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "rollback could not remove file"
                );
            }
        }
    }
    removed
}

fn fail_all(
    count: usize,
    kind: TransferErrorKind,
    message: &str,
    mode: TransferMode,
) -> Result<Outcomes, Error> {
    let mut errors = (0..count).map(|index| TransferError::new(index, kind, message));
    match mode {
        TransferMode::Atomic => match errors.next() {
            Some(first) => Err(first.into()),
            None => Ok(Vec::new()),
        },
        TransferMode::Partial => Ok(errors.map(Err).collect()),
    }
}

/// Attribute a storage or pool failure to a descriptor
fn transfer_error(index: usize, err: &Error) -> TransferError {
    let kind = match err {
        Error::Transfer(inner) => return inner.with_index(index),
        Error::Auth(_) => TransferErrorKind::Auth,
        Error::Cancelled => TransferErrorKind::Cancelled,
        Error::Storage(inner) if inner.is_integrity() => TransferErrorKind::Integrity,
        Error::Network(_) => TransferErrorKind::TransientNetwork,
        _ => TransferErrorKind::Io,
    };
    TransferError::new(index, kind, err.to_string())
}
