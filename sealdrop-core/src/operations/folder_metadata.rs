use crate::transport::E2eeTransport;
use crate::{FolderId, LockToken, MetadataDocument, Result};
use bytes::Bytes;
use std::sync::Arc;

#[derive(Clone)]
pub struct FolderMetadataOperation {
    transport: Arc<dyn E2eeTransport>,
}

impl FolderMetadataOperation {
    pub fn new(transport: Arc<dyn E2eeTransport>) -> Self {
        Self { transport }
    }

    pub async fn run_fetch(&self, folder_id: &FolderId) -> Result<MetadataDocument> {
        let response = self.transport.get_metadata(folder_id).await?;
        tracing::debug!(
            "fetched metadata folder_id={} status={} bytes={}",
            folder_id,
            response.status,
            response.document.len()
        );
        Ok(MetadataDocument::new(response.document, response.status))
    }

    /// The server rejects the write unless `lock` is the token it handed out.
    pub async fn run_update(&self, lock: &LockToken, document: Bytes) -> Result<()> {
        let folder_id = self
            .transport
            .update_metadata(lock.folder_id(), &document, lock.token())
            .await?;
        tracing::debug!(
            "updated metadata folder_id={} bytes={}",
            folder_id,
            document.len()
        );
        Ok(())
    }
}
