//! Sealdrop Core - publishes file drops into end-to-end encrypted folders
//!
//! A drop is published by a saga over a remote server without transactions:
//! - resolve the folder id with a WebDAV listing
//! - take the folder's advisory lock
//! - fetch, merge and re-upload the encrypted metadata under the lock token
//! - release the lock on every path that acquired it

pub mod codec;
pub mod error;
pub mod job;
pub mod operations;
pub mod transport;
pub mod types;

#[cfg(test)]
mod testing;

pub use codec::{JsonDropMerger, MergeOutcome, MetadataCodec};
pub use error::{DropError, Result};
pub use job::DropPublishJob;
pub use operations::{
    FolderLockOperation, FolderMetadataOperation, PublishDropOperation,
    PublishDropOperationRequest, PublishDropOperationResult, ResolveFolderOperation,
    ResolveFolderOperationRequest, SagaFailure, UnlockReport,
};
pub use transport::{E2eeTransport, OcsClient, OcsClientBuilder};
pub use types::{
    FolderHandle, FolderId, JobEvent, JobParallelism, JobStatus, LockToken, MetadataDocument,
    SagaState,
};
