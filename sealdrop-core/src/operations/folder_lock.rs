use crate::transport::E2eeTransport;
use crate::{FolderHandle, FolderId, LockToken, Result};
use std::sync::Arc;

/// Status reported for a release that succeeded.
pub const RELEASE_OK_STATUS: u16 = 200;

/// Status reported when the server never answered.
pub const NO_RESPONSE_STATUS: u16 = 0;

#[derive(Clone)]
pub struct FolderLockOperation {
    transport: Arc<dyn E2eeTransport>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseLockOperationResult {
    pub folder_id: FolderId,
    pub http_status: u16,
}

impl FolderLockOperation {
    pub fn new(transport: Arc<dyn E2eeTransport>) -> Self {
        Self { transport }
    }

    /// Single attempt; a folder locked by someone else is an error, not a
    /// reason to wait.
    pub async fn run_acquire(&self, folder: &FolderHandle) -> Result<LockToken> {
        let response = self.transport.lock_folder(&folder.folder_id).await?;
        tracing::debug!(
            "locked folder path={} folder_id={}",
            folder.path,
            response.folder_id
        );
        Ok(LockToken::new(response.folder_id, response.token))
    }

    /// Consumes the token: whatever the server answers, this token is done.
    pub async fn run_release(&self, lock: LockToken) -> Result<ReleaseLockOperationResult> {
        let folder_id = self
            .transport
            .unlock_folder(lock.folder_id(), lock.token())
            .await?;

        Ok(ReleaseLockOperationResult {
            folder_id,
            http_status: RELEASE_OK_STATUS,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DropError;
    use crate::testing::{Call, Script, ScriptedTransport};
    use tokio_test::{assert_err, assert_ok};

    fn handle(id: &str) -> FolderHandle {
        FolderHandle {
            path: "drop".to_string(),
            folder_id: FolderId::from(id),
        }
    }

    #[tokio::test]
    async fn test_acquire_and_release() {
        let transport = Arc::new(ScriptedTransport::new(Script::happy("F1", "T1")));
        let operation = FolderLockOperation::new(transport.clone());

        let lock = assert_ok!(operation.run_acquire(&handle("F1")).await);
        assert_eq!(lock.folder_id(), &FolderId::from("F1"));
        assert_eq!(lock.token(), b"T1");

        let released = assert_ok!(operation.run_release(lock).await);
        assert_eq!(released.folder_id, FolderId::from("F1"));
        assert_eq!(released.http_status, RELEASE_OK_STATUS);

        assert_eq!(
            transport.calls(),
            vec![
                Call::Lock(FolderId::from("F1")),
                Call::Unlock(FolderId::from("F1"), b"T1".to_vec()),
            ]
        );
    }

    #[tokio::test]
    async fn test_acquire_contended() {
        let mut script = Script::happy("F2", "T2");
        script.lock = Err(423);
        let operation = FolderLockOperation::new(Arc::new(ScriptedTransport::new(script)));

        let error = assert_err!(operation.run_acquire(&handle("F2")).await);
        assert_eq!(error.http_status(), Some(423));
    }

    #[tokio::test]
    async fn test_release_error_keeps_status() {
        let mut script = Script::happy("F3", "T3");
        script.unlock = Err(500);
        let operation = FolderLockOperation::new(Arc::new(ScriptedTransport::new(script)));

        let lock = LockToken::new(FolderId::from("F3"), "T3");
        let error = assert_err!(operation.run_release(lock).await);
        assert!(matches!(error, DropError::Http { status: 500, .. }));
    }
}
