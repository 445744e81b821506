//! Publishing a file drop into an encrypted folder.
//!
//! The server offers no transaction spanning the steps, so the run is an
//! explicit state machine: resolve the folder id, lock the folder, fetch the
//! metadata, merge the drop, upload the metadata and release the lock. Once
//! the lock is taken every path ends in exactly one release attempt.
//!
//! A run is a single task and every step is awaited on `&mut self`, so the
//! lock-state flags never see concurrent access and need no mutex. Callers
//! that fan out runs must give each one its own [`PublishDropOperation::run`]
//! call.

use super::folder_lock::{FolderLockOperation, NO_RESPONSE_STATUS};
use super::folder_metadata::FolderMetadataOperation;
use super::resolve_folder::{ResolveFolderOperation, ResolveFolderOperationRequest};
use crate::codec::{MergeOutcome, MetadataCodec};
use crate::transport::E2eeTransport;
use crate::{FolderHandle, FolderId, JobEvent, JobStatus, LockToken, MetadataDocument, Result};
use bytes::Bytes;
use futures_util::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::Instrument;
use ulid::Ulid;

#[derive(Clone)]
pub struct PublishDropOperation {
    resolver: ResolveFolderOperation,
    folder_lock: FolderLockOperation,
    folder_metadata: FolderMetadataOperation,
    codec: Arc<dyn MetadataCodec>,
}

#[derive(Debug, Clone)]
pub struct PublishDropOperationRequest {
    pub path: String,
    /// Receives the unlock notification.
    pub events: Option<UnboundedSender<JobEvent>>,
    /// Span every log line of the run is recorded under.
    pub span: Option<tracing::Span>,
}

impl PublishDropOperationRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            events: None,
            span: None,
        }
    }

    pub fn with_events(mut self, events: UnboundedSender<JobEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = Some(span);
        self
    }
}

/// Why a run ended in [`JobStatus::NormalError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SagaFailure {
    ResolutionFailed,
    LockError,
    MergeRejected,
    UpdateError,
    UnlockError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnlockReport {
    pub folder_id: FolderId,
    pub http_status: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishDropOperationResult {
    pub status: JobStatus,
    pub folder_id: Option<FolderId>,
    /// First failure of the run; later ones are only logged.
    pub failure: Option<SagaFailure>,
    /// Status of a failed metadata fetch that was replaced by empty metadata.
    pub fetch_fallback_status: Option<u16>,
    pub unlock: Option<UnlockReport>,
}

enum Step {
    ResolveFolder(String),
    AcquireLock(FolderHandle),
    FetchMetadata(LockToken),
    MergeDrop(LockToken, MetadataDocument),
    UpdateMetadata(LockToken, Bytes),
    ReleaseLock(Option<LockToken>, JobStatus),
    Finished(JobStatus),
}

#[derive(Debug, Default)]
struct LockState {
    held: bool,
    unlock_in_flight: bool,
}

struct SagaRun<'a> {
    operation: &'a PublishDropOperation,
    events: Option<UnboundedSender<JobEvent>>,
    lock_state: LockState,
    folder_id: Option<FolderId>,
    failure: Option<SagaFailure>,
    fetch_fallback_status: Option<u16>,
    unlock: Option<UnlockReport>,
}

impl PublishDropOperation {
    pub fn new(transport: Arc<dyn E2eeTransport>, codec: Arc<dyn MetadataCodec>) -> Self {
        Self {
            resolver: ResolveFolderOperation::new(transport.clone()),
            folder_lock: FolderLockOperation::new(transport.clone()),
            folder_metadata: FolderMetadataOperation::new(transport),
            codec,
        }
    }

    /// Runs the saga to its single terminal outcome. Never fails: every
    /// error is folded into [`JobStatus::NormalError`].
    pub async fn run(&self, request: PublishDropOperationRequest) -> PublishDropOperationResult {
        let PublishDropOperationRequest { path, events, span } = request;
        let span = span.unwrap_or_else(|| {
            tracing::info_span!("publish_drop", path = %path, run_id = %Ulid::new())
        });

        let run = SagaRun {
            operation: self,
            events,
            lock_state: LockState::default(),
            folder_id: None,
            failure: None,
            fetch_fallback_status: None,
            unlock: None,
        };

        run.drive(path).instrument(span).await
    }
}

impl SagaRun<'_> {
    async fn drive(mut self, path: String) -> PublishDropOperationResult {
        let mut step = Step::ResolveFolder(path);

        let status = loop {
            step = match step {
                Step::ResolveFolder(path) => self.resolve_folder(path).await,
                Step::AcquireLock(folder) => self.acquire_lock(folder).await,
                Step::FetchMetadata(lock) => self.fetch_metadata(lock).await,
                Step::MergeDrop(lock, document) => self.merge_drop(lock, document),
                Step::UpdateMetadata(lock, document) => self.update_metadata(lock, document).await,
                Step::ReleaseLock(lock, pending) => match self.unlock_folder(lock, pending).await {
                    Some(status) => Step::Finished(status),
                    None => {
                        tracing::error!("unlock requested while another unlock is in flight");
                        Step::Finished(JobStatus::NormalError)
                    }
                },
                Step::Finished(status) => break status,
            };
        };

        tracing::info!("drop publish finished status={}", status);
        PublishDropOperationResult {
            status,
            folder_id: self.folder_id,
            failure: self.failure,
            fetch_fallback_status: self.fetch_fallback_status,
            unlock: self.unlock,
        }
    }

    fn fail(&mut self, failure: SagaFailure) {
        if self.failure.is_none() {
            self.failure = Some(failure);
        }
    }

    async fn resolve_folder(&mut self, path: String) -> Step {
        tracing::debug!("folder is encrypted, resolving its id");
        let request = ResolveFolderOperationRequest { path };

        match self.operation.resolver.run(request).await {
            Ok(folder) => {
                self.folder_id = Some(folder.folder_id.clone());
                Step::AcquireLock(folder)
            }
            Err(error) => {
                tracing::warn!("failed to resolve encrypted folder id: {}", error);
                self.fail(SagaFailure::ResolutionFailed);
                Step::Finished(JobStatus::NormalError)
            }
        }
    }

    async fn acquire_lock(&mut self, folder: FolderHandle) -> Step {
        match self.operation.folder_lock.run_acquire(&folder).await {
            Ok(lock) => {
                self.lock_state.held = true;
                tracing::debug!("folder {} locked, fetching metadata", folder.folder_id);
                Step::FetchMetadata(lock)
            }
            Err(error) => {
                tracing::warn!(
                    "folder {} could not be locked: {}",
                    folder.folder_id,
                    error
                );
                self.fail(SagaFailure::LockError);
                Step::Finished(JobStatus::NormalError)
            }
        }
    }

    async fn fetch_metadata(&mut self, lock: LockToken) -> Step {
        let fetched = guarded(self.operation.folder_metadata.run_fetch(lock.folder_id())).await;

        let document = match fetched {
            Ok(document) => document,
            // TODO: distinguish a 404 from transport failures once the server
            // exposes a dedicated "no metadata yet" signal.
            Err(error) => {
                let status = error.http_status().unwrap_or(NO_RESPONSE_STATUS);
                tracing::warn!(
                    "fetching metadata of folder {} failed (status={}), continuing with empty metadata: {}",
                    lock.folder_id(),
                    status,
                    error
                );
                self.fetch_fallback_status = Some(status);
                MetadataDocument::new(self.operation.codec.empty_metadata(), status)
            }
        };

        Step::MergeDrop(lock, document)
    }

    fn merge_drop(&mut self, lock: LockToken, document: MetadataDocument) -> Step {
        let codec = self.operation.codec.as_ref();
        let merged = std::panic::catch_unwind(AssertUnwindSafe(|| codec.merge_drop(&document)));

        match merged {
            Ok(MergeOutcome { document, ok: true }) => Step::UpdateMetadata(lock, document),
            Ok(MergeOutcome { ok: false, .. }) => {
                tracing::warn!(
                    "file drop could not be merged into metadata of folder {}",
                    lock.folder_id()
                );
                self.fail(SagaFailure::MergeRejected);
                Step::ReleaseLock(Some(lock), JobStatus::NormalError)
            }
            Err(panic) => {
                tracing::error!(
                    "merging file drop panicked for folder {}: {}",
                    lock.folder_id(),
                    panic_message(panic.as_ref())
                );
                self.fail(SagaFailure::MergeRejected);
                Step::ReleaseLock(Some(lock), JobStatus::NormalError)
            }
        }
    }

    async fn update_metadata(&mut self, lock: LockToken, document: Bytes) -> Step {
        let updated = guarded(self.operation.folder_metadata.run_update(&lock, document)).await;

        match updated {
            Ok(()) => {
                tracing::debug!("metadata of folder {} uploaded", lock.folder_id());
                Step::ReleaseLock(Some(lock), JobStatus::Success)
            }
            Err(error) => {
                tracing::warn!(
                    "updating metadata of folder {} failed, unlocking: {}",
                    lock.folder_id(),
                    error
                );
                self.fail(SagaFailure::UpdateError);
                Step::ReleaseLock(Some(lock), JobStatus::NormalError)
            }
        }
    }

    /// Releases the folder lock at most once per run.
    ///
    /// Returns the terminal status, or `None` when another unlock is already
    /// in flight and this call was ignored.
    async fn unlock_folder(
        &mut self,
        lock: Option<LockToken>,
        pending: JobStatus,
    ) -> Option<JobStatus> {
        if !self.lock_state.held {
            tracing::debug!("folder is not locked, nothing to unlock");
            return Some(pending);
        }

        if self.lock_state.unlock_in_flight {
            tracing::warn!("double call to unlock_folder ignored");
            return None;
        }

        let Some(lock) = lock else {
            tracing::error!("folder marked locked but no lock token is available");
            self.lock_state.held = false;
            self.fail(SagaFailure::UnlockError);
            return Some(JobStatus::NormalError);
        };

        self.lock_state.unlock_in_flight = true;
        let folder_id = lock.folder_id().clone();
        tracing::debug!("unlocking folder {}", folder_id);

        let released = self.operation.folder_lock.run_release(lock).await;

        self.lock_state.held = false;
        self.lock_state.unlock_in_flight = false;

        let (report, status) = match released {
            Ok(released) => {
                tracing::debug!("folder {} unlocked", released.folder_id);
                let report = UnlockReport {
                    folder_id: released.folder_id,
                    http_status: released.http_status,
                };
                (report, pending)
            }
            Err(error) => {
                let http_status = error.http_status().unwrap_or(NO_RESPONSE_STATUS);
                tracing::warn!(
                    "unlocking folder {} failed (status={}): {}",
                    folder_id,
                    http_status,
                    error
                );
                self.fail(SagaFailure::UnlockError);
                (
                    UnlockReport {
                        folder_id,
                        http_status,
                    },
                    JobStatus::NormalError,
                )
            }
        };

        if let Some(events) = &self.events {
            let _ = events.send(JobEvent::FolderUnlocked {
                folder_id: report.folder_id.clone(),
                http_status: report.http_status,
            });
        }
        self.unlock = Some(report);

        Some(status)
    }
}

/// Turns a panic inside a remote step into that step's error.
async fn guarded<T>(step: impl Future<Output = Result<T>>) -> Result<T> {
    match AssertUnwindSafe(step).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(crate::DropError::Internal(format!(
            "step panicked: {}",
            panic_message(panic.as_ref())
        ))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        return message.to_string();
    }
    if let Some(message) = panic.downcast_ref::<String>() {
        return message.clone();
    }
    "unknown panic".to_string()
}
