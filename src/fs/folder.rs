//! Folder nodes
//!
//! A folder owns ordered lists of child folders and files under one mutex.
//! The `folders`/`files` document objects are projected from those lists, so
//! a structural change is visible in [`Folder::to_json`] as soon as the call
//! that made it returns.

use crate::context::FsContext;
use crate::error::{FsError, PathError, Result};
use crate::fs::file::File;
use crate::fs::node::{FolderNodeRef, FILES_KEY, FOLDERS_KEY};
use crate::path::{validate_file_parts, validate_folder_name, Path};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::sync::{Arc, Weak};
use tracing::debug;

/// Link from a folder to its parent
#[derive(Debug, Clone)]
pub enum ParentRef {
    Root,
    Child(Weak<Folder>),
}

struct FolderState {
    removed: bool,
    folders: Vec<Arc<Folder>>,
    files: Vec<Arc<File>>,
}

/// Internal tree node
pub struct Folder {
    ctx: Arc<FsContext>,
    path: Path,
    parent: ParentRef,
    this: Weak<Folder>,
    state: Mutex<FolderState>,
}

impl Folder {
    /// Empty root folder of a container.
    pub(crate) fn new_root(ctx: &Arc<FsContext>, path: Path) -> Arc<Folder> {
        Folder::build(ctx, path, ParentRef::Root)
    }

    fn build(ctx: &Arc<FsContext>, path: Path, parent: ParentRef) -> Arc<Folder> {
        Arc::new_cyclic(|this| Folder {
            ctx: ctx.clone(),
            path,
            parent,
            this: this.clone(),
            state: Mutex::new(FolderState {
                removed: false,
                folders: Vec::new(),
                files: Vec::new(),
            }),
        })
    }

    /// Materialize a stored folder node and everything beneath it.
    pub(crate) fn from_json(
        ctx: &Arc<FsContext>,
        path: Path,
        parent: ParentRef,
        value: &Value,
    ) -> Result<Arc<Folder>> {
        let node = FolderNodeRef::from_json(value)?;
        let folder = Folder::build(ctx, path, parent);

        let mut folders = Vec::with_capacity(node.folders.len());
        for (name, child) in node.folders {
            let child_path = folder
                .path
                .join_folder(name)
                .map_err(|e| FsError::BrokenDocumentStructure(e.to_string()))?;
            folders.push(Folder::from_json(
                ctx,
                child_path,
                ParentRef::Child(Arc::downgrade(&folder)),
                child,
            )?);
        }

        let mut files = Vec::with_capacity(node.files.len());
        for (key, child) in node.files {
            files.push(File::from_json(
                ctx,
                Arc::downgrade(&folder),
                &folder.path,
                key,
                child,
            )?);
        }

        {
            let mut state = folder.state.lock();
            state.folders = folders;
            state.files = files;
        }
        Ok(folder)
    }

    /// Walk `path`'s directory segments down from `root`.
    ///
    /// Returns `None` at the first missing segment.
    pub fn get_at(root: &Arc<Folder>, path: &Path) -> Result<Option<Arc<Folder>>> {
        ensure_directory(path)?;
        let mut current = root.clone();
        for name in path.directory_vector() {
            match current.get_folder(name)? {
                Some(next) => current = next,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    /// Walk `path`'s directory segments down from `root`, creating missing folders.
    pub fn create_or_get_at(root: &Arc<Folder>, path: &Path) -> Result<Arc<Folder>> {
        ensure_directory(path)?;
        let mut current = root.clone();
        for name in path.directory_vector() {
            current = current.create_or_get_folder(name)?;
        }
        Ok(current)
    }

    pub fn exists_at(root: &Arc<Folder>, path: &Path) -> Result<bool> {
        Ok(Folder::get_at(root, path)?.is_some())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last path segment, or the container name for a root.
    pub fn folder_name(&self) -> &str {
        self.path.directory_name()
    }

    pub fn is_root(&self) -> bool {
        matches!(self.parent, ParentRef::Root)
    }

    /// `None` for a root folder or a parent that is gone.
    pub fn parent(&self) -> Option<Arc<Folder>> {
        match &self.parent {
            ParentRef::Root => None,
            ParentRef::Child(parent) => parent.upgrade(),
        }
    }

    pub fn is_removed(&self) -> bool {
        self.state.lock().removed
    }

    /// `true` when the folder has neither files nor subfolders.
    pub fn is_empty(&self) -> Result<bool> {
        self.ctx.ensure_started()?;
        let state = self.state.lock();
        self.check_alive(&state)?;
        Ok(state.files.is_empty() && state.folders.is_empty())
    }

    // Files

    pub fn create_or_get_file(&self, identify: &str, type_tag: &str) -> Result<Arc<File>> {
        self.ctx.ensure_started()?;
        validate_file_parts(identify, type_tag)?;
        let mut state = self.state.lock();
        self.check_alive(&state)?;

        if let Some(file) = find_file(&state, identify, type_tag) {
            return Ok(file.clone());
        }
        let file = File::create(&self.ctx, self.this.clone(), &self.path, identify, type_tag)?;
        state.files.push(file.clone());
        debug!(path = %file.path(), "Created file");
        Ok(file)
    }

    pub fn get_file(&self, identify: &str, type_tag: &str) -> Result<Option<Arc<File>>> {
        self.ctx.ensure_started()?;
        let state = self.state.lock();
        self.check_alive(&state)?;
        Ok(find_file(&state, identify, type_tag).cloned())
    }

    pub fn exists_file(&self, identify: &str, type_tag: &str) -> Result<bool> {
        Ok(self.get_file(identify, type_tag)?.is_some())
    }

    /// Files matching `predicate`, in insertion order.
    pub fn get_files<P>(&self, predicate: P) -> Result<Vec<Arc<File>>>
    where
        P: Fn(&File) -> bool,
    {
        self.ctx.ensure_started()?;
        let state = self.state.lock();
        self.check_alive(&state)?;
        let mut out = Vec::new();
        for file in &state.files {
            if predicate(file) {
                out.push(file.clone());
            }
        }
        Ok(out)
    }

    pub fn files(&self) -> Result<Vec<Arc<File>>> {
        self.get_files(|_| true)
    }

    /// Remove one file. Returns `false` when it does not exist.
    pub fn delete_file(&self, identify: &str, type_tag: &str) -> Result<bool> {
        self.ctx.ensure_started()?;
        let mut state = self.state.lock();
        self.check_alive(&state)?;
        let Some(idx) = state
            .files
            .iter()
            .position(|f| f.identify() == identify && f.type_tag() == type_tag)
        else {
            return Ok(false);
        };
        let file = state.files.remove(idx);
        file.mark_removed();
        debug!(path = %file.path(), "Deleted file");
        Ok(true)
    }

    pub fn delete_all_files(&self) -> Result<()> {
        self.ctx.ensure_started()?;
        let mut state = self.state.lock();
        self.check_alive(&state)?;
        for file in state.files.drain(..) {
            file.mark_removed();
        }
        Ok(())
    }

    // Folders

    pub fn create_or_get_folder(&self, name: &str) -> Result<Arc<Folder>> {
        self.ctx.ensure_started()?;
        validate_folder_name(name)?;
        let mut state = self.state.lock();
        self.check_alive(&state)?;

        if let Some(folder) = find_folder(&state, name) {
            return Ok(folder.clone());
        }
        let folder = Folder::build(
            &self.ctx,
            self.path.join_folder(name)?,
            ParentRef::Child(self.this.clone()),
        );
        state.folders.push(folder.clone());
        debug!(path = %folder.path(), "Created folder");
        Ok(folder)
    }

    pub fn get_folder(&self, name: &str) -> Result<Option<Arc<Folder>>> {
        self.ctx.ensure_started()?;
        let state = self.state.lock();
        self.check_alive(&state)?;
        Ok(find_folder(&state, name).cloned())
    }

    pub fn exists_folder(&self, name: &str) -> Result<bool> {
        Ok(self.get_folder(name)?.is_some())
    }

    /// Subfolders matching `predicate`, in insertion order.
    pub fn get_folders<P>(&self, predicate: P) -> Result<Vec<Arc<Folder>>>
    where
        P: Fn(&Folder) -> bool,
    {
        self.ctx.ensure_started()?;
        let state = self.state.lock();
        self.check_alive(&state)?;
        let mut out = Vec::new();
        for folder in &state.folders {
            if predicate(folder) {
                out.push(folder.clone());
            }
        }
        Ok(out)
    }

    pub fn folders(&self) -> Result<Vec<Arc<Folder>>> {
        self.get_folders(|_| true)
    }

    /// Remove a subfolder and tear down everything beneath it.
    pub fn delete_folder(&self, name: &str) -> Result<bool> {
        self.ctx.ensure_started()?;
        let mut state = self.state.lock();
        self.check_alive(&state)?;
        let Some(idx) = state
            .folders
            .iter()
            .position(|f| f.folder_name() == name)
        else {
            return Ok(false);
        };
        let folder = state.folders.remove(idx);
        folder.teardown();
        debug!(path = %folder.path(), "Deleted folder");
        Ok(true)
    }

    pub fn delete_all_folders(&self) -> Result<()> {
        self.ctx.ensure_started()?;
        let mut state = self.state.lock();
        self.check_alive(&state)?;
        for folder in state.folders.drain(..) {
            folder.teardown();
        }
        Ok(())
    }

    /// Depth-first removal: files first, then subfolders, then self.
    pub(crate) fn teardown(&self) {
        let mut state = self.state.lock();
        if state.removed {
            return;
        }
        for file in state.files.drain(..) {
            file.mark_removed();
        }
        for folder in state.folders.drain(..) {
            folder.teardown();
        }
        state.removed = true;
    }

    /// Current document form of this folder and its subtree.
    pub fn to_json(&self) -> Value {
        let state = self.state.lock();
        let mut folders = Map::new();
        for folder in &state.folders {
            folders.insert(folder.folder_name().to_string(), folder.to_json());
        }
        let mut files = Map::new();
        for file in &state.files {
            files.insert(file.file_name(), file.to_json());
        }
        let mut node = Map::new();
        node.insert(FOLDERS_KEY.to_string(), Value::Object(folders));
        node.insert(FILES_KEY.to_string(), Value::Object(files));
        Value::Object(node)
    }

    fn check_alive(&self, state: &FolderState) -> Result<()> {
        if state.removed {
            Err(FsError::Removed(self.path.full_path().to_string()))
        } else {
            Ok(())
        }
    }
}

impl std::fmt::Debug for Folder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Folder").field("path", &self.path).finish()
    }
}

fn find_file<'a>(state: &'a FolderState, identify: &str, type_tag: &str) -> Option<&'a Arc<File>> {
    state
        .files
        .iter()
        .find(|f| f.identify() == identify && f.type_tag() == type_tag)
}

fn find_folder<'a>(state: &'a FolderState, name: &str) -> Option<&'a Arc<Folder>> {
    state.folders.iter().find(|f| f.folder_name() == name)
}

fn ensure_directory(path: &Path) -> Result<()> {
    if path.is_file_path() {
        return Err(PathError::NotAFolderPath(path.full_path().to_string()).into());
    }
    Ok(())
}
