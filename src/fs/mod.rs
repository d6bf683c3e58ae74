//! In-memory folder/file tree

pub mod file;
pub mod folder;
pub mod node;

pub use file::{File, Operator};
pub use folder::{Folder, ParentRef};
pub use node::FileNode;
