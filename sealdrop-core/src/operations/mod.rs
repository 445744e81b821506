pub mod folder_lock;
pub mod folder_metadata;
pub mod publish_drop;
pub mod resolve_folder;

pub use folder_lock::{
    FolderLockOperation, NO_RESPONSE_STATUS, RELEASE_OK_STATUS, ReleaseLockOperationResult,
};
pub use folder_metadata::FolderMetadataOperation;
pub use publish_drop::{
    PublishDropOperation, PublishDropOperationRequest, PublishDropOperationResult, SagaFailure,
    UnlockReport,
};
pub use resolve_folder::{ResolveFolderOperation, ResolveFolderOperationRequest};
