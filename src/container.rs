//! Containers
//!
//! A container pairs a root [`Folder`] with the well-known root path it lives
//! under (`static://` or `current://`). Disposal tears the whole tree down and
//! leaves the container permanently unusable.

use crate::context::FsContext;
use crate::error::{FsError, Result};
use crate::fs::{Folder, ParentRef};
use crate::path::Path;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

pub struct Container {
    root_path: Path,
    root: RwLock<Option<Arc<Folder>>>,
}

impl Container {
    /// Fresh container with an empty root folder.
    pub fn new_empty(ctx: &Arc<FsContext>, root_path: Path) -> Container {
        let root = Folder::new_root(ctx, root_path.clone());
        Container {
            root_path,
            root: RwLock::new(Some(root)),
        }
    }

    /// Rebuild a container from a stored root folder node.
    pub fn from_json(ctx: &Arc<FsContext>, root_path: Path, document: &Value) -> Result<Container> {
        let root = Folder::from_json(ctx, root_path.clone(), ParentRef::Root, document)?;
        Ok(Container {
            root_path,
            root: RwLock::new(Some(root)),
        })
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    pub fn is_static(&self) -> bool {
        self.root_path.is_static()
    }

    pub fn is_disposed(&self) -> bool {
        self.root.read().is_none()
    }

    pub fn root(&self) -> Result<Arc<Folder>> {
        self.root
            .read()
            .clone()
            .ok_or_else(|| FsError::Disposed(self.root_path.full_path().to_string()))
    }

    /// Deep snapshot of the root folder node.
    pub fn root_json(&self) -> Result<Value> {
        Ok(self.root()?.to_json())
    }

    /// Delete every file, then every folder, then release the root.
    pub fn dispose(&self) {
        let Some(root) = self.root.write().take() else {
            return;
        };
        root.teardown();
        debug!(root = %self.root_path, "Container disposed");
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("root_path", &self.root_path)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
