//! jsonfs: Path-Addressed JSON Virtual Filesystem
//!
//! An in-process tree of typed values addressed by paths such as
//! `static://settings/audio/volume.float`, persisted as whole JSON documents
//! ("containers") through numbered disk tickets.

pub mod binder;
pub mod config;
pub mod container;
pub mod context;
pub mod disk;
pub mod error;
pub mod fs;
pub mod logging;
pub mod manager;
pub mod naming;
pub mod path;

pub use binder::{default_binders, BinderRegistry, FileValue, Quat, TypeBinder, Vec2, Vec3, Vec4};
pub use config::{ConfigLoader, ManagerConfig, NamingConfig};
pub use container::Container;
pub use context::{FlushReport, FsContext};
pub use disk::{DiskTicket, TicketDocument};
pub use error::{FsError, PathError, Result, StorageError};
pub use fs::{File, Folder, Operator};
pub use manager::{HookTiming, LifecycleHook, Manager, ManagerBuilder};
pub use naming::{NamingRule, PatternNamingRule};
pub use path::Path;
