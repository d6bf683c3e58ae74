//! Type Binders
//!
//! Maps the short type tag stored in every file node (`"int"`, `"vec3"`, ...)
//! to a concrete Rust value type. Files resolve their binder once at
//! construction and use it to validate casts and to serialize cached values
//! on flush.

use crate::error::{FsError, Result};
use crate::path::is_valid_type_tag;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Values that can live in a file.
pub trait FileValue: Serialize + DeserializeOwned + Default + Clone + Send + Sync + 'static {}

impl<T> FileValue for T where T: Serialize + DeserializeOwned + Default + Clone + Send + Sync + 'static
{}

type EncodeFn = fn(&(dyn Any + Send + Sync)) -> std::result::Result<Value, serde_json::Error>;

/// Registry entry binding a type tag to a concrete value type
pub struct TypeBinder {
    tag: String,
    type_id: TypeId,
    type_name: &'static str,
    encode: EncodeFn,
}

impl TypeBinder {
    /// Declare `T` under `tag`.
    pub fn of<T: FileValue>(tag: &str) -> TypeBinder {
        TypeBinder {
            tag: tag.trim().to_string(),
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            encode: encode_any::<T>,
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    pub fn is_valid_type_tag(&self, tag: &str) -> bool {
        self.tag == tag
    }

    /// Serialize a value previously boxed for this binder's type.
    pub(crate) fn encode(
        &self,
        value: &(dyn Any + Send + Sync),
    ) -> std::result::Result<Value, serde_json::Error> {
        (self.encode)(value)
    }
}

impl fmt::Debug for TypeBinder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeBinder")
            .field("tag", &self.tag)
            .field("type_name", &self.type_name)
            .finish()
    }
}

fn encode_any<T: FileValue>(
    value: &(dyn Any + Send + Sync),
) -> std::result::Result<Value, serde_json::Error> {
    match value.downcast_ref::<T>() {
        Some(v) => serde_json::to_value(v),
        None => Err(<serde_json::Error as serde::ser::Error>::custom(format!(
            "cached value is not a {}",
            std::any::type_name::<T>()
        ))),
    }
}

struct RegistrySnapshot {
    binders: Vec<Arc<TypeBinder>>,
    by_tag: HashMap<String, usize>,
}

impl RegistrySnapshot {
    fn insert(&mut self, binder: TypeBinder) -> Arc<TypeBinder> {
        let binder = Arc::new(binder);
        self.by_tag
            .insert(binder.tag.clone(), self.binders.len());
        self.binders.push(binder.clone());
        binder
    }
}

/// Tag -> binder lookup table.
///
/// Unusable until [`BinderRegistry::scan`] has installed a snapshot.
pub struct BinderRegistry {
    snapshot: RwLock<Option<RegistrySnapshot>>,
}

impl Default for BinderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BinderRegistry {
    pub fn new() -> Self {
        Self {
            snapshot: RwLock::new(None),
        }
    }

    pub fn is_scanned(&self) -> bool {
        self.snapshot.read().is_some()
    }

    /// Replace the registry with the given declarations.
    ///
    /// A tag declared twice for the same type is kept once; a tag declared
    /// for two different types is rejected and the previous snapshot stays.
    pub fn scan<I>(&self, declarations: I) -> Result<usize>
    where
        I: IntoIterator<Item = TypeBinder>,
    {
        let mut snapshot = RegistrySnapshot {
            binders: Vec::new(),
            by_tag: HashMap::new(),
        };

        for binder in declarations {
            if !is_valid_type_tag(&binder.tag) {
                return Err(FsError::InvalidName(format!(
                    "invalid type tag '{}' declared for {}",
                    binder.tag, binder.type_name
                )));
            }
            if let Some(&idx) = snapshot.by_tag.get(&binder.tag) {
                if snapshot.binders[idx].type_id == binder.type_id {
                    continue;
                }
                return Err(FsError::InvalidName(format!(
                    "type tag '{}' declared for both {} and {}",
                    binder.tag, snapshot.binders[idx].type_name, binder.type_name
                )));
            }
            snapshot.insert(binder);
        }

        let count = snapshot.binders.len();
        *self.snapshot.write() = Some(snapshot);
        tracing::debug!(binders = count, "Type binder registry scanned");
        Ok(count)
    }

    /// Look up a binder by tag.
    pub fn get_binder(&self, tag: &str) -> Result<Option<Arc<TypeBinder>>> {
        let guard = self.snapshot.read();
        let snapshot = guard.as_ref().ok_or(FsError::NotScanned)?;
        Ok(snapshot
            .by_tag
            .get(tag)
            .map(|&idx| snapshot.binders[idx].clone()))
    }

    /// Register `T` under `tag` at runtime.
    ///
    /// Returns `None` for a tag that is not a single word or is already bound
    /// to another type.
    /// Re-registering the same type under its tag returns the existing binder.
    pub fn add_binder<T: FileValue>(&self, tag: &str) -> Result<Option<Arc<TypeBinder>>> {
        self.add(TypeBinder::of::<T>(tag))
    }

    pub fn add(&self, binder: TypeBinder) -> Result<Option<Arc<TypeBinder>>> {
        if !is_valid_type_tag(&binder.tag) {
            return Ok(None);
        }
        let mut guard = self.snapshot.write();
        let snapshot = guard.as_mut().ok_or(FsError::NotScanned)?;
        if let Some(&idx) = snapshot.by_tag.get(&binder.tag) {
            let existing = &snapshot.binders[idx];
            if existing.type_id == binder.type_id {
                return Ok(Some(existing.clone()));
            }
            return Ok(None);
        }
        Ok(Some(snapshot.insert(binder)))
    }

    /// All binders, optionally filtered.
    pub fn binders<P>(&self, predicate: Option<P>) -> Result<Vec<Arc<TypeBinder>>>
    where
        P: Fn(&TypeBinder) -> bool,
    {
        let guard = self.snapshot.read();
        let snapshot = guard.as_ref().ok_or(FsError::NotScanned)?;
        Ok(match predicate {
            Some(p) => snapshot
                .binders
                .iter()
                .filter(|b| p(b))
                .cloned()
                .collect(),
            None => snapshot.binders.clone(),
        })
    }
}

/// Two-component vector
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

/// Three-component vector
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Four-component vector
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec4 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

/// Rotation quaternion
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quat {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Default for Quat {
    fn default() -> Self {
        Quat {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        }
    }
}

/// Built-in declarations: scalars, strings and the vector types.
pub fn default_binders() -> Vec<TypeBinder> {
    vec![
        TypeBinder::of::<i64>("int"),
        TypeBinder::of::<f64>("float"),
        TypeBinder::of::<bool>("bool"),
        TypeBinder::of::<String>("str"),
        TypeBinder::of::<Vec2>("vec2"),
        TypeBinder::of::<Vec3>("vec3"),
        TypeBinder::of::<Vec4>("vec4"),
        TypeBinder::of::<Quat>("quat"),
    ]
}
