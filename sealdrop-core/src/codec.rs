//! Metadata transform consumed by the publish saga.

use crate::MetadataDocument;
use bytes::Bytes;
use serde_json::{Map, Value, json};

pub const METADATA_VERSION: &str = "1.2";

/// Result of merging pending drop entries into the canonical file list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub document: Bytes,
    pub ok: bool,
}

impl MergeOutcome {
    pub fn merged(document: impl Into<Bytes>) -> Self {
        Self {
            document: document.into(),
            ok: true,
        }
    }

    pub fn rejected(document: impl Into<Bytes>) -> Self {
        Self {
            document: document.into(),
            ok: false,
        }
    }
}

pub trait MetadataCodec: Send + Sync {
    /// Document used when the folder has no metadata yet. Built locally.
    fn empty_metadata(&self) -> Bytes;

    fn merge_drop(&self, document: &MetadataDocument) -> MergeOutcome;
}

/// Moves every `filedrop` entry into `files` without touching the encrypted
/// payloads of the entries.
#[derive(Debug, Clone, Default)]
pub struct JsonDropMerger;

impl JsonDropMerger {
    pub fn new() -> Self {
        Self
    }
}

impl MetadataCodec for JsonDropMerger {
    fn empty_metadata(&self) -> Bytes {
        let document = json!({
            "metadata": { "version": METADATA_VERSION },
            "files": {},
            "filedrop": {},
        });
        Bytes::from(document.to_string())
    }

    fn merge_drop(&self, document: &MetadataDocument) -> MergeOutcome {
        let mut root: Value = match serde_json::from_slice(&document.bytes) {
            Ok(value) => value,
            Err(error) => {
                tracing::warn!("metadata is not valid json: {}", error);
                return MergeOutcome::rejected(document.bytes.clone());
            }
        };

        let Some(root_object) = root.as_object_mut() else {
            tracing::warn!("metadata root is not an object");
            return MergeOutcome::rejected(document.bytes.clone());
        };

        let drops = match root_object.get_mut("filedrop") {
            Some(Value::Object(drops)) if !drops.is_empty() => std::mem::take(drops),
            Some(Value::Object(_)) | None => {
                tracing::debug!("metadata has no pending file drops");
                return MergeOutcome::rejected(document.bytes.clone());
            }
            Some(_) => {
                tracing::warn!("metadata filedrop is not an object");
                return MergeOutcome::rejected(document.bytes.clone());
            }
        };

        let files = root_object
            .entry("files")
            .or_insert_with(|| Value::Object(Map::new()));
        let Some(files) = files.as_object_mut() else {
            tracing::warn!("metadata files is not an object");
            return MergeOutcome::rejected(document.bytes.clone());
        };

        let moved = drops.len();
        for (name, entry) in drops {
            if files.insert(name.clone(), entry).is_some() {
                tracing::debug!("file drop {} replaced an existing entry", name);
            }
        }

        tracing::debug!("moved {} file drops into files", moved);
        MergeOutcome::merged(root.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(value: Value) -> MetadataDocument {
        MetadataDocument::new(value.to_string(), 200)
    }

    #[test]
    fn test_empty_metadata_shape() {
        let empty: Value = serde_json::from_slice(&JsonDropMerger::new().empty_metadata()).unwrap();
        assert_eq!(empty["metadata"]["version"], METADATA_VERSION);
        assert_eq!(empty["files"], json!({}));
        assert_eq!(empty["filedrop"], json!({}));
    }

    #[test]
    fn test_merge_moves_drops_into_files() {
        let merger = JsonDropMerger::new();
        let input = document(json!({
            "metadata": { "version": "1.2" },
            "files": { "a": { "encrypted": "old" } },
            "filedrop": { "b": { "encrypted": "new" } },
        }));

        let outcome = merger.merge_drop(&input);
        assert!(outcome.ok);

        let merged: Value = serde_json::from_slice(&outcome.document).unwrap();
        assert_eq!(merged["files"]["a"]["encrypted"], "old");
        assert_eq!(merged["files"]["b"]["encrypted"], "new");
        assert_eq!(merged["filedrop"], json!({}));
    }

    #[test]
    fn test_merge_creates_missing_files_object() {
        let outcome = JsonDropMerger::new().merge_drop(&document(json!({
            "filedrop": { "b": { "encrypted": "new" } },
        })));
        assert!(outcome.ok);

        let merged: Value = serde_json::from_slice(&outcome.document).unwrap();
        assert_eq!(merged["files"]["b"]["encrypted"], "new");
    }

    #[test]
    fn test_merge_rejects_without_drops() {
        let merger = JsonDropMerger::new();
        let empty = MetadataDocument::new(merger.empty_metadata(), 404);

        let outcome = merger.merge_drop(&empty);
        assert!(!outcome.ok);
        assert_eq!(outcome.document, empty.bytes);
    }

    #[test]
    fn test_merge_rejects_malformed_documents() {
        let merger = JsonDropMerger::new();

        assert!(!merger.merge_drop(&MetadataDocument::new("not json", 200)).ok);
        assert!(!merger.merge_drop(&document(json!([1, 2]))).ok);
        assert!(!merger.merge_drop(&document(json!({ "filedrop": "x" }))).ok);
        assert!(
            !merger
                .merge_drop(&document(json!({ "files": [], "filedrop": { "b": {} } })))
                .ok
        );
    }
}
