//! Disk tickets
//!
//! A [`DiskTicket`] is the on-disk side of one container: an id, the file the
//! container's document lives in, and the document itself.
//!
//! ```text
//! { "Description": "...", "CreateTime": "<rfc3339>", "SaveTime": "<rfc3339>", "FS": <folder node>|null }
//! ```

use crate::container::Container;
use crate::context::FsContext;
use crate::error::{Result, StorageError};
use crate::path::Path as FsPath;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Id of the static document's ticket.
pub const STATIC_TICKET_ID: i64 = -1;

/// Stored ticket document. Every member is optional on read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TicketDocument {
    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub create_time: Option<DateTime<Utc>>,

    #[serde(default)]
    pub save_time: Option<DateTime<Utc>>,

    #[serde(rename = "FS", default)]
    pub fs: Option<Value>,
}

impl TicketDocument {
    fn fresh() -> Self {
        let now = Utc::now();
        Self {
            description: Some(String::new()),
            create_time: Some(now),
            save_time: Some(now),
            fs: None,
        }
    }
}

struct TicketState {
    disposed: bool,
    document: TicketDocument,
}

/// Persistence handle for one container document
pub struct DiskTicket {
    id: i64,
    file_path: PathBuf,
    pretty: bool,
    state: Mutex<TicketState>,
}

impl DiskTicket {
    /// Ticket for `file_path`, loading the document if the file exists.
    pub fn open(id: i64, file_path: PathBuf, pretty: bool) -> Result<DiskTicket, StorageError> {
        let document = if file_path.exists() {
            let bytes = fs::read(&file_path)?;
            serde_json::from_slice(&bytes).map_err(|e| {
                StorageError::BrokenDocument(format!("{}: {}", file_path.display(), e))
            })?
        } else {
            TicketDocument::fresh()
        };
        Ok(DiskTicket::with_document(id, file_path, pretty, document))
    }

    /// Ticket for a slot that has never been written.
    pub fn fresh(id: i64, file_path: PathBuf, pretty: bool) -> DiskTicket {
        DiskTicket::with_document(id, file_path, pretty, TicketDocument::fresh())
    }

    fn with_document(
        id: i64,
        file_path: PathBuf,
        pretty: bool,
        document: TicketDocument,
    ) -> DiskTicket {
        DiskTicket {
            id,
            file_path,
            pretty,
            state: Mutex::new(TicketState {
                disposed: false,
                document,
            }),
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn is_static(&self) -> bool {
        self.id < 0
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }

    pub fn description(&self) -> String {
        self.state
            .lock()
            .document
            .description
            .clone()
            .unwrap_or_default()
    }

    pub fn create_time(&self) -> Option<DateTime<Utc>> {
        self.state.lock().document.create_time
    }

    pub fn save_time(&self) -> Option<DateTime<Utc>> {
        self.state.lock().document.save_time
    }

    /// Copy of the in-memory document.
    pub fn document(&self) -> TicketDocument {
        self.state.lock().document.clone()
    }

    /// Build the container this ticket holds, or an empty one.
    pub fn construct(&self, ctx: &Arc<FsContext>) -> Result<Container> {
        let root = if self.is_static() {
            FsPath::static_root()
        } else {
            FsPath::current_root()
        };
        let state = self.state.lock();
        if state.disposed {
            return Err(StorageError::TicketDisposed(self.id).into());
        }
        match &state.document.fs {
            Some(document @ Value::Object(_)) => Container::from_json(ctx, root, document),
            _ => Ok(Container::new_empty(ctx, root)),
        }
    }

    /// Snapshot `container` into the document and replace the file on disk.
    pub fn write(&self, container: &Container, description: &str) -> Result<()> {
        let fs_node = container.root_json()?;
        let mut state = self.state.lock();
        if state.disposed {
            return Err(StorageError::TicketDisposed(self.id).into());
        }

        let now = Utc::now();
        let mut next = state.document.clone();
        next.description = Some(description.to_string());
        next.save_time = Some(now);
        next.create_time.get_or_insert(now);
        next.fs = Some(fs_node);

        let bytes = if self.pretty {
            serde_json::to_vec_pretty(&next)
        } else {
            serde_json::to_vec(&next)
        }
        .map_err(StorageError::from)?;
        write_atomic(&self.file_path, &bytes)?;
        state.document = next;

        info!(
            ticket = self.id,
            path = %self.file_path.display(),
            bytes = bytes.len(),
            "Disk ticket written"
        );
        Ok(())
    }

    /// Remove the backing file and dispose the ticket.
    ///
    /// A static ticket is left alone when `ignore_static` is set.
    pub fn delete(&self, ignore_static: bool) -> Result<bool> {
        let mut state = self.state.lock();
        if state.disposed {
            return Err(StorageError::TicketDisposed(self.id).into());
        }
        if self.is_static() && ignore_static {
            return Ok(false);
        }
        if self.file_path.exists() {
            fs::remove_file(&self.file_path).map_err(StorageError::from)?;
        }
        state.disposed = true;
        state.document = TicketDocument::default();
        info!(ticket = self.id, path = %self.file_path.display(), "Disk ticket deleted");
        Ok(true)
    }

    /// Release the document. The file on disk is kept.
    pub fn dispose(&self) {
        let mut state = self.state.lock();
        state.disposed = true;
        state.document = TicketDocument::default();
    }
}

impl std::fmt::Debug for DiskTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskTicket")
            .field("id", &self.id)
            .field("file_path", &self.file_path)
            .finish()
    }
}

/// Write to a sibling `.tmp` file, then rename over `path`.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut temp_name = path.as_os_str().to_os_string();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);

    fs::write(&temp_path, bytes).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        StorageError::IoError(e)
    })?;
    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        StorageError::IoError(e)
    })?;
    Ok(())
}
