//! Document node shapes
//!
//! ```text
//! FolderNode: { "folders": { "<name>": FolderNode, .. }, "files": { "<identify>.<type>": FileNode, .. } }
//! FileNode:   { "type": "<tag>", "empty": bool, "data": <json>|null }
//! ```

use crate::error::FsError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const FOLDERS_KEY: &str = "folders";
pub const FILES_KEY: &str = "files";

/// Backing document of one file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileNode {
    #[serde(rename = "type")]
    pub type_tag: String,
    pub empty: bool,
    pub data: Value,
}

impl FileNode {
    pub fn empty(type_tag: &str) -> Self {
        Self {
            type_tag: type_tag.to_string(),
            empty: true,
            data: Value::Null,
        }
    }

    /// Parse and check a stored file node.
    pub fn from_json(key: &str, value: &Value) -> Result<Self, FsError> {
        let node: FileNode = serde_json::from_value(value.clone()).map_err(|e| {
            FsError::BrokenDocumentStructure(format!("file node '{}': {}", key, e))
        })?;
        if node.empty != node.data.is_null() {
            return Err(FsError::BrokenDocumentStructure(format!(
                "file node '{}' has empty={} but data is {}",
                key,
                node.empty,
                if node.data.is_null() { "null" } else { "set" }
            )));
        }
        Ok(node)
    }
}

/// Borrowed view over a stored folder node's two member objects
pub struct FolderNodeRef<'a> {
    pub folders: &'a Map<String, Value>,
    pub files: &'a Map<String, Value>,
}

impl<'a> FolderNodeRef<'a> {
    pub fn from_json(value: &'a Value) -> Result<Self, FsError> {
        let object = value.as_object().ok_or_else(|| {
            FsError::BrokenDocumentStructure(format!("folder node is not an object: {}", value))
        })?;
        let folders = object
            .get(FOLDERS_KEY)
            .and_then(Value::as_object)
            .ok_or_else(|| {
                FsError::BrokenDocumentStructure(format!(
                    "folder node is missing a '{}' object",
                    FOLDERS_KEY
                ))
            })?;
        let files = object
            .get(FILES_KEY)
            .and_then(Value::as_object)
            .ok_or_else(|| {
                FsError::BrokenDocumentStructure(format!(
                    "folder node is missing a '{}' object",
                    FILES_KEY
                ))
            })?;
        Ok(Self { folders, files })
    }
}

/// Split a `files` member key into `(identify, type)`.
pub fn split_file_key(key: &str) -> Result<(&str, &str), FsError> {
    key.rsplit_once('.')
        .filter(|(_, tag)| !tag.is_empty())
        .ok_or_else(|| {
            FsError::BrokenDocumentStructure(format!(
                "file key '{}' is not 'identify.type'",
                key
            ))
        })
}

/// An empty `{ "folders": {}, "files": {} }` node.
pub fn empty_folder_node() -> Value {
    let mut object = Map::new();
    object.insert(FOLDERS_KEY.to_string(), Value::Object(Map::new()));
    object.insert(FILES_KEY.to_string(), Value::Object(Map::new()));
    Value::Object(object)
}
