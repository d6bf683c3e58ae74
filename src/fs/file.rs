//! File nodes and typed operators
//!
//! A [`File`] owns its [`FileNode`] document plus an optional typed cache.
//! Writes only touch the cache and queue the file for the next flush; the
//! document `data` member is refreshed when the context flushes.

use crate::binder::{FileValue, TypeBinder};
use crate::context::{FlushHandle, FsContext};
use crate::error::{FsError, PathError, Result};
use crate::fs::folder::Folder;
use crate::fs::node::{split_file_key, FileNode};
use crate::path::Path;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::any::Any;
use std::marker::PhantomData;
use std::sync::{Arc, Weak};

struct FileState {
    removed: bool,
    dirty: bool,
    node: FileNode,
    cached: Option<Box<dyn Any + Send + Sync>>,
}

impl FileState {
    fn is_empty(&self) -> bool {
        self.cached.is_none() && self.node.empty
    }

    fn clear(&mut self) {
        self.cached = None;
        self.dirty = false;
        self.node.empty = true;
        self.node.data = Value::Null;
    }
}

/// Leaf node holding one typed value
pub struct File {
    ctx: Arc<FsContext>,
    path: Path,
    parent: Weak<Folder>,
    binder: Arc<TypeBinder>,
    handle: FlushHandle,
    this: Weak<File>,
    state: Mutex<FileState>,
}

impl File {
    /// New empty file under `parent`.
    pub(crate) fn create(
        ctx: &Arc<FsContext>,
        parent: Weak<Folder>,
        folder_path: &Path,
        identify: &str,
        type_tag: &str,
    ) -> Result<Arc<File>> {
        let path = folder_path.join_file(identify, type_tag)?;
        let binder = resolve_binder(ctx, type_tag)?;
        Ok(File::build(ctx, parent, path, binder, FileNode::empty(type_tag)))
    }

    /// Materialize a stored `files` member.
    pub(crate) fn from_json(
        ctx: &Arc<FsContext>,
        parent: Weak<Folder>,
        folder_path: &Path,
        key: &str,
        value: &Value,
    ) -> Result<Arc<File>> {
        let (identify, key_tag) = split_file_key(key)?;
        let node = FileNode::from_json(key, value)?;
        if node.type_tag != key_tag {
            return Err(FsError::BrokenDocumentStructure(format!(
                "file '{}' declares type '{}'",
                key, node.type_tag
            )));
        }
        let path = folder_path
            .join_file(identify, key_tag)
            .map_err(|e| FsError::BrokenDocumentStructure(e.to_string()))?;
        let binder = resolve_binder(ctx, key_tag)?;
        Ok(File::build(ctx, parent, path, binder, node))
    }

    fn build(
        ctx: &Arc<FsContext>,
        parent: Weak<Folder>,
        path: Path,
        binder: Arc<TypeBinder>,
        node: FileNode,
    ) -> Arc<File> {
        Arc::new_cyclic(|this| File {
            ctx: ctx.clone(),
            path,
            parent,
            binder,
            handle: ctx.next_handle(),
            this: this.clone(),
            state: Mutex::new(FileState {
                removed: false,
                dirty: false,
                node,
                cached: None,
            }),
        })
    }

    /// Look up the file a file path points at.
    pub fn get_at(root: &Arc<Folder>, path: &Path) -> Result<Option<Arc<File>>> {
        let folder_path = file_parent(path)?;
        match Folder::get_at(root, &folder_path)? {
            Some(folder) => folder.get_file(path.file_identify(), path.file_type()),
            None => Ok(None),
        }
    }

    /// Look up or create the file a file path points at, creating folders on the way.
    pub fn create_or_get_at(root: &Arc<Folder>, path: &Path) -> Result<Arc<File>> {
        let folder_path = file_parent(path)?;
        Folder::create_or_get_at(root, &folder_path)?
            .create_or_get_file(path.file_identify(), path.file_type())
    }

    pub fn exists_at(root: &Arc<Folder>, path: &Path) -> Result<bool> {
        Ok(File::get_at(root, path)?.is_some())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn identify(&self) -> &str {
        self.path.file_identify()
    }

    pub fn type_tag(&self) -> &str {
        self.binder.tag()
    }

    /// `identify.type`
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.identify(), self.type_tag())
    }

    /// Rust type name of the bound value type.
    pub fn object_type_name(&self) -> &'static str {
        self.binder.type_name()
    }

    pub fn binder(&self) -> &Arc<TypeBinder> {
        &self.binder
    }

    pub fn is_static(&self) -> bool {
        self.path.is_static()
    }

    pub fn parent(&self) -> Option<Arc<Folder>> {
        self.parent.upgrade()
    }

    pub fn is_removed(&self) -> bool {
        self.state.lock().removed
    }

    pub fn is_dirty(&self) -> bool {
        self.state.lock().dirty
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().is_empty()
    }

    /// Open a typed operator on this file.
    ///
    /// Returns the operator and whether the file held a value. When the file
    /// is empty and `default` is given, the default is written straight into
    /// the document so the file is populated from here on.
    pub fn operate_as<T: FileValue>(&self, default: Option<T>) -> Result<(Operator<T>, bool)> {
        self.ctx.ensure_started()?;
        if !self.binder.is::<T>() {
            return Err(FsError::InvalidCast {
                path: self.path.full_path().to_string(),
                expected: std::any::type_name::<T>(),
                actual: self.binder.type_name(),
            });
        }

        let mut state = self.state.lock();
        self.check_alive(&state)?;
        let populated = !state.is_empty();
        if !populated {
            if let Some(value) = default {
                let data = serde_json::to_value(&value)?;
                if !data.is_null() {
                    state.node.data = data;
                    state.node.empty = false;
                    state.cached = Some(Box::new(value));
                }
            }
        }
        drop(state);

        let file = self.this.upgrade().ok_or_else(|| self.removed_error())?;
        Ok((
            Operator {
                file,
                _marker: PhantomData,
            },
            populated,
        ))
    }

    /// Current document form of this file.
    pub fn to_json(&self) -> Value {
        let state = self.state.lock();
        json!({
            "type": state.node.type_tag,
            "empty": state.node.empty,
            "data": state.node.data,
        })
    }

    /// Serialize the cached value into the document if the file is dirty.
    ///
    /// Returns `Ok(false)` when there was nothing to do.
    pub(crate) fn flush(&self) -> Result<bool> {
        let mut state = self.state.lock();
        if state.removed || !state.dirty {
            return Ok(false);
        }
        let Some(cached) = state.cached.as_deref() else {
            state.dirty = false;
            return Ok(false);
        };

        let data = self.binder.encode(cached)?;
        if data.is_null() {
            state.clear();
        } else {
            state.node.data = data;
            state.node.empty = false;
            state.dirty = false;
        }
        Ok(true)
    }

    /// Mark removed and drop the cache and any pending flush.
    pub(crate) fn mark_removed(&self) {
        let mut state = self.state.lock();
        state.removed = true;
        state.cached = None;
        state.dirty = false;
        self.ctx.deregister_flush(self.handle);
    }

    fn check_alive(&self, state: &FileState) -> Result<()> {
        if state.removed {
            Err(self.removed_error())
        } else {
            Ok(())
        }
    }

    fn removed_error(&self) -> FsError {
        FsError::Removed(self.path.full_path().to_string())
    }

    /// Callers hold the state lock so the pending set always agrees with `dirty`.
    fn register_flush(&self) {
        self.ctx.register_flush(self.handle, self.this.clone());
    }
}

impl std::fmt::Debug for File {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("File")
            .field("path", &self.path)
            .field("type", &self.binder.type_name())
            .finish()
    }
}

fn resolve_binder(ctx: &FsContext, type_tag: &str) -> Result<Arc<TypeBinder>> {
    ctx.registry()
        .get_binder(type_tag)?
        .ok_or_else(|| FsError::NoMatchingTypeBinder(type_tag.to_string()))
}

fn file_parent(path: &Path) -> Result<Path> {
    if !path.is_file_path() {
        return Err(PathError::NotAFilePath(path.full_path().to_string()).into());
    }
    Ok(path.parent()?)
}

/// Typed handle on a [`File`]
pub struct Operator<T: FileValue> {
    file: Arc<File>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: FileValue> Clone for Operator<T> {
    fn clone(&self) -> Self {
        Operator {
            file: self.file.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: FileValue> Operator<T> {
    /// Cached value, hydrated from the document on first read.
    ///
    /// An empty file reads as `T::default()`.
    pub fn read(&self) -> Result<T> {
        self.file.ctx.ensure_started()?;
        let mut state = self.file.state.lock();
        self.file.check_alive(&state)?;

        if state.is_empty() {
            return Ok(T::default());
        }
        if let Some(cached) = state.cached.as_ref() {
            if let Some(value) = cached.downcast_ref::<T>() {
                return Ok(value.clone());
            }
        }

        let value: T = serde_json::from_value(state.node.data.clone()).map_err(|e| {
            FsError::BrokenDocumentStructure(format!("{}: {}", self.file.path, e))
        })?;
        state.cached = Some(Box::new(value.clone()));
        Ok(value)
    }

    /// Replace the cached value and queue the file for flushing.
    ///
    /// A value that serializes to `null` empties the file instead.
    pub fn write(&self, value: T) -> Result<()> {
        self.file.ctx.ensure_started()?;
        if serde_json::to_value(&value)?.is_null() {
            return self.empty();
        }
        let mut state = self.file.state.lock();
        self.file.check_alive(&state)?;
        state.cached = Some(Box::new(value));
        state.dirty = true;
        self.file.register_flush();
        Ok(())
    }

    /// `None` empties the file.
    pub fn write_opt(&self, value: Option<T>) -> Result<()> {
        match value {
            Some(value) => self.write(value),
            None => self.empty(),
        }
    }

    /// Drop the value, the cache and any pending flush.
    pub fn empty(&self) -> Result<()> {
        self.file.ctx.ensure_started()?;
        let mut state = self.file.state.lock();
        self.file.check_alive(&state)?;
        state.clear();
        self.file.ctx.deregister_flush(self.file.handle);
        Ok(())
    }

    pub fn dirty(&self) -> Result<()> {
        self.file.ctx.ensure_started()?;
        let mut state = self.file.state.lock();
        self.file.check_alive(&state)?;
        state.dirty = true;
        self.file.register_flush();
        Ok(())
    }

    pub fn not_dirty(&self) -> Result<()> {
        self.file.ctx.ensure_started()?;
        let mut state = self.file.state.lock();
        self.file.check_alive(&state)?;
        state.dirty = false;
        self.file.ctx.deregister_flush(self.file.handle);
        Ok(())
    }

    pub fn is_dirty(&self) -> bool {
        self.file.is_dirty()
    }

    pub fn is_removed(&self) -> bool {
        self.file.is_removed()
    }

    pub fn is_empty(&self) -> bool {
        self.file.is_empty()
    }

    pub fn file(&self) -> &Arc<File> {
        &self.file
    }
}
