use crate::transport::{E2eeTransport, FolderProperty};
use crate::{DropError, FolderHandle, Result};
use std::sync::Arc;

const RESOLVE_PROPERTIES: [FolderProperty; 2] = [FolderProperty::ResourceType, FolderProperty::FileId];

#[derive(Clone)]
pub struct ResolveFolderOperation {
    transport: Arc<dyn E2eeTransport>,
}

#[derive(Debug, Clone)]
pub struct ResolveFolderOperationRequest {
    pub path: String,
}

impl ResolveFolderOperationRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    /// Path relative to the account root, as WebDAV addresses it. Empty and
    /// `.` segments are dropped; `..` would leave the user's files and is
    /// rejected along with the account root itself.
    pub fn normalized_path(&self) -> Result<String> {
        let mut segments = Vec::new();
        for segment in self.path.split('/') {
            match segment {
                "" | "." => continue,
                ".." => {
                    return Err(DropError::InvalidRequest(format!(
                        "folder path escapes the account root: {}",
                        self.path
                    )));
                }
                segment if segment.chars().any(char::is_control) => {
                    return Err(DropError::InvalidRequest(format!(
                        "folder path has control characters: {:?}",
                        self.path
                    )));
                }
                segment => segments.push(segment),
            }
        }

        if segments.is_empty() {
            return Err(DropError::InvalidRequest(format!(
                "folder path names the account root, not a folder: '{}'",
                self.path
            )));
        }
        Ok(segments.join("/"))
    }
}

impl ResolveFolderOperation {
    pub fn new(transport: Arc<dyn E2eeTransport>) -> Self {
        Self { transport }
    }

    pub async fn run(&self, request: ResolveFolderOperationRequest) -> Result<FolderHandle> {
        let path = request.normalized_path()?;

        let entries = self
            .transport
            .list_folder(&path, &RESOLVE_PROPERTIES)
            .await
            .map_err(|error| {
                DropError::ResolutionFailed(format!("listing failed. path={} error={}", path, error))
            })?;

        let folder_id = entries
            .into_iter()
            .find_map(|entry| entry.file_id.filter(|id| !id.is_empty()))
            .ok_or_else(|| {
                DropError::ResolutionFailed(format!("no file id returned. path={}", path))
            })?;

        tracing::debug!("resolved folder path={} folder_id={}", path, folder_id);
        Ok(FolderHandle { path, folder_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FolderId;
    use crate::testing::{Call, Script, ScriptedTransport};

    fn normalized(path: &str) -> Result<String> {
        ResolveFolderOperationRequest::new(path).normalized_path()
    }

    #[test]
    fn test_normalized_path() {
        assert_eq!(normalized("/Drop Box/").unwrap(), "Drop Box");
        assert_eq!(normalized("a/b/c").unwrap(), "a/b/c");
        assert_eq!(normalized("a//./b/").unwrap(), "a/b");
    }

    #[test]
    fn test_normalized_path_rejects_root_and_escapes() {
        for path in ["", "/", "./", "a/../b", "..", "drop\nbox"] {
            let error = normalized(path).unwrap_err();
            assert!(
                matches!(error, DropError::InvalidRequest(_)),
                "path {:?} gave {:?}",
                path,
                error
            );
        }
    }

    #[tokio::test]
    async fn test_resolve_first_entry_with_id() {
        let transport = Arc::new(ScriptedTransport::new(Script::happy("F1", "T1")));
        let operation = ResolveFolderOperation::new(transport.clone());

        let handle = operation
            .run(ResolveFolderOperationRequest::new("/shared/drop/"))
            .await
            .unwrap();

        assert_eq!(handle.path, "shared/drop");
        assert_eq!(handle.folder_id, FolderId::from("F1"));
        assert_eq!(
            transport.calls(),
            vec![Call::ListFolder("shared/drop".to_string())]
        );
    }

    #[tokio::test]
    async fn test_resolve_empty_listing_fails() {
        let mut script = Script::happy("F1", "T1");
        script.folder_id = None;
        let operation = ResolveFolderOperation::new(Arc::new(ScriptedTransport::new(script)));

        let error = operation
            .run(ResolveFolderOperationRequest::new("drop"))
            .await
            .unwrap_err();
        assert!(matches!(error, DropError::ResolutionFailed(_)));
    }

    #[tokio::test]
    async fn test_resolve_transport_error_fails() {
        let mut script = Script::happy("F1", "T1");
        script.list = Err(404);
        let operation = ResolveFolderOperation::new(Arc::new(ScriptedTransport::new(script)));

        let error = operation
            .run(ResolveFolderOperationRequest::new("drop"))
            .await
            .unwrap_err();
        assert!(matches!(error, DropError::ResolutionFailed(_)));
    }
}
