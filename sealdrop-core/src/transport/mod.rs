//! Remote side of a drop publish.
//!
//! Everything the saga needs from the server goes through [`E2eeTransport`];
//! [`OcsClient`] is the HTTP implementation.

pub mod factory;
pub mod ocs;
pub mod propfind;

pub use factory::OcsClientBuilder;
pub use ocs::OcsClient;
pub use propfind::parse_multistatus;

use crate::{FolderId, Result};
use async_trait::async_trait;
use bytes::Bytes;

/// Properties requested from a directory listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderProperty {
    ResourceType,
    FileId,
}

impl FolderProperty {
    pub fn xml_element(self) -> &'static str {
        match self {
            FolderProperty::ResourceType => "<d:resourcetype/>",
            FolderProperty::FileId => "<oc:fileid/>",
        }
    }
}

/// One `<d:response>` of a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderEntry {
    pub href: String,
    pub file_id: Option<FolderId>,
    pub is_collection: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockResponse {
    pub folder_id: FolderId,
    pub token: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataResponse {
    pub document: Bytes,
    pub status: u16,
}

#[async_trait]
pub trait E2eeTransport: Send + Sync {
    async fn list_folder(
        &self,
        path: &str,
        properties: &[FolderProperty],
    ) -> Result<Vec<FolderEntry>>;

    async fn lock_folder(&self, folder_id: &FolderId) -> Result<LockResponse>;

    /// Returns the id of the folder that was unlocked.
    async fn unlock_folder(&self, folder_id: &FolderId, token: &[u8]) -> Result<FolderId>;

    async fn get_metadata(&self, folder_id: &FolderId) -> Result<MetadataResponse>;

    async fn update_metadata(
        &self,
        folder_id: &FolderId,
        document: &Bytes,
        token: &[u8],
    ) -> Result<FolderId>;
}
