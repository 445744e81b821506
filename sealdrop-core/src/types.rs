use bytes::Bytes;
use std::fmt;

/// Server-side identifier of a folder (the `oc:fileid` property).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FolderId(Bytes);

impl FolderId {
    pub fn new(id: impl Into<Bytes>) -> Self {
        Self(id.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for FolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

impl From<&str> for FolderId {
    fn from(value: &str) -> Self {
        Self(Bytes::copy_from_slice(value.as_bytes()))
    }
}

/// A path whose server-side folder id has been resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderHandle {
    pub path: String,
    pub folder_id: FolderId,
}

/// Proof of a held folder lock.
///
/// Deliberately not `Clone`: releasing consumes the token, so one token can
/// only ever be released once.
#[derive(Debug, PartialEq, Eq)]
pub struct LockToken {
    folder_id: FolderId,
    token: Bytes,
}

impl LockToken {
    pub fn new(folder_id: FolderId, token: impl Into<Bytes>) -> Self {
        Self {
            folder_id,
            token: token.into(),
        }
    }

    pub fn folder_id(&self) -> &FolderId {
        &self.folder_id
    }

    pub fn token(&self) -> &[u8] {
        &self.token
    }
}

/// Encrypted metadata document together with the status of the fetch that
/// produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataDocument {
    pub bytes: Bytes,
    pub status: u16,
}

impl MetadataDocument {
    pub fn new(bytes: impl Into<Bytes>, status: u16) -> Self {
        Self {
            bytes: bytes.into(),
            status,
        }
    }
}

/// Terminal outcome reported to the caller of a drop publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Success,
    NormalError,
}

impl JobStatus {
    pub fn is_success(self) -> bool {
        matches!(self, JobStatus::Success)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Success => write!(f, "success"),
            JobStatus::NormalError => write!(f, "normal_error"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SagaState {
    NotStarted,
    Running,
    Finished,
}

/// Scheduling hint for the parent propagator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobParallelism {
    /// Siblings touching the same folder must wait until this job finishes.
    WaitForFinished,
}

/// Notifications emitted by a running publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    /// Result of the unlock attempt, 200 when the release succeeded.
    FolderUnlocked { folder_id: FolderId, http_status: u16 },
    Finished(JobStatus),
}
