//! Scripted collaborators shared by the unit tests.

use crate::codec::{MergeOutcome, MetadataCodec};
use crate::transport::{E2eeTransport, FolderEntry, FolderProperty, LockResponse, MetadataResponse};
use crate::{DropError, FolderId, MetadataDocument, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListFolder(String),
    Lock(FolderId),
    Unlock(FolderId, Vec<u8>),
    GetMetadata(FolderId),
    UpdateMetadata(FolderId, Bytes, Vec<u8>),
}

/// Canned answers, `Err(status)` fails the call with that HTTP status and a
/// status of 0 fails it as a network error.
#[derive(Debug, Clone)]
pub struct Script {
    pub folder_id: Option<&'static str>,
    pub list: std::result::Result<(), u16>,
    pub lock: std::result::Result<&'static str, u16>,
    pub fetch: std::result::Result<(&'static str, u16), u16>,
    pub update: std::result::Result<(), u16>,
    pub unlock: std::result::Result<(), u16>,
    pub panic_on_fetch: bool,
    pub panic_on_update: bool,
}

impl Script {
    pub fn happy(folder_id: &'static str, token: &'static str) -> Self {
        Self {
            folder_id: Some(folder_id),
            list: Ok(()),
            lock: Ok(token),
            fetch: Ok(("D0", 200)),
            update: Ok(()),
            unlock: Ok(()),
            panic_on_fetch: false,
            panic_on_update: false,
        }
    }
}

fn scripted_error(status: u16) -> DropError {
    if status == 0 {
        return DropError::Network("connection reset".to_string());
    }
    DropError::Http {
        status,
        message: "scripted failure".to_string(),
    }
}

pub struct ScriptedTransport {
    script: Script,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedTransport {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn unlock_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Unlock(..)))
            .count()
    }

    pub fn update_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::UpdateMetadata(..)))
            .count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl E2eeTransport for ScriptedTransport {
    async fn list_folder(
        &self,
        path: &str,
        _properties: &[FolderProperty],
    ) -> Result<Vec<FolderEntry>> {
        self.record(Call::ListFolder(path.to_string()));
        self.script.list.map_err(scripted_error)?;

        Ok(self
            .script
            .folder_id
            .map(|id| FolderEntry {
                href: format!("/remote.php/dav/files/alice/{}/", path),
                file_id: Some(FolderId::from(id)),
                is_collection: true,
            })
            .into_iter()
            .collect())
    }

    async fn lock_folder(&self, folder_id: &FolderId) -> Result<LockResponse> {
        self.record(Call::Lock(folder_id.clone()));
        let token = self.script.lock.map_err(scripted_error)?;
        Ok(LockResponse {
            folder_id: folder_id.clone(),
            token: Bytes::from_static(token.as_bytes()),
        })
    }

    async fn unlock_folder(&self, folder_id: &FolderId, token: &[u8]) -> Result<FolderId> {
        self.record(Call::Unlock(folder_id.clone(), token.to_vec()));
        self.script.unlock.map_err(scripted_error)?;
        Ok(folder_id.clone())
    }

    async fn get_metadata(&self, folder_id: &FolderId) -> Result<MetadataResponse> {
        self.record(Call::GetMetadata(folder_id.clone()));
        if self.script.panic_on_fetch {
            panic!("metadata fetch blew up");
        }
        let (document, status) = self.script.fetch.map_err(scripted_error)?;
        Ok(MetadataResponse {
            document: Bytes::from_static(document.as_bytes()),
            status,
        })
    }

    async fn update_metadata(
        &self,
        folder_id: &FolderId,
        document: &Bytes,
        token: &[u8],
    ) -> Result<FolderId> {
        self.record(Call::UpdateMetadata(
            folder_id.clone(),
            document.clone(),
            token.to_vec(),
        ));
        if self.script.panic_on_update {
            panic!("metadata update blew up");
        }
        self.script.update.map_err(scripted_error)?;
        Ok(folder_id.clone())
    }
}

pub const EMPTY_DOCUMENT: &[u8] = b"EMPTY";

/// Codec that records every document it is asked to merge.
pub struct ScriptedCodec {
    pub merge_ok: bool,
    pub merged: &'static [u8],
    pub panic_on_merge: bool,
    seen: Mutex<Vec<MetadataDocument>>,
}

impl ScriptedCodec {
    pub fn accepting(merged: &'static [u8]) -> Self {
        Self {
            merge_ok: true,
            merged,
            panic_on_merge: false,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn rejecting() -> Self {
        Self {
            merge_ok: false,
            ..Self::accepting(b"")
        }
    }

    pub fn seen(&self) -> Vec<MetadataDocument> {
        self.seen.lock().unwrap().clone()
    }
}

impl MetadataCodec for ScriptedCodec {
    fn empty_metadata(&self) -> Bytes {
        Bytes::from_static(EMPTY_DOCUMENT)
    }

    fn merge_drop(&self, document: &MetadataDocument) -> MergeOutcome {
        self.seen.lock().unwrap().push(document.clone());
        if self.panic_on_merge {
            panic!("merge blew up");
        }
        if self.merge_ok {
            MergeOutcome::merged(Bytes::from_static(self.merged))
        } else {
            MergeOutcome::rejected(document.bytes.clone())
        }
    }
}
