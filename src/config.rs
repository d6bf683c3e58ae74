//! Configuration System
//!
//! Layered manager configuration: built-in defaults, an optional
//! `jsonfs.toml` next to the application, then `JSONFS_` environment
//! variables (`JSONFS_MAX_SLOTS`, `JSONFS_NAMING__PREFIX`, ...).

use crate::error::{FsError, Result};
use crate::logging::LoggingConfig;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the optional configuration file looked up by [`ConfigLoader::load`].
pub const CONFIG_FILE_NAME: &str = "jsonfs.toml";

/// Slot ids available when `max_slots` is 0.
pub const UNLIMITED_SLOTS: u32 = (i32::MAX - 1) as u32;

/// Save file naming
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingConfig {
    /// Stem of the static document
    #[serde(default = "default_global_name")]
    pub global_name: String,

    #[serde(default = "default_prefix")]
    pub prefix: String,

    #[serde(default)]
    pub postfix: String,

    #[serde(default = "default_extension")]
    pub extension: String,
}

fn default_global_name() -> String {
    "SaveData_Global".to_string()
}

fn default_prefix() -> String {
    "SaveData_".to_string()
}

fn default_extension() -> String {
    "json".to_string()
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            global_name: default_global_name(),
            prefix: default_prefix(),
            postfix: String::new(),
            extension: default_extension(),
        }
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Directory the save subdirectory lives in
    #[serde(default = "default_save_root")]
    pub save_root: PathBuf,

    /// Save directory, relative to `save_root`
    #[serde(default = "default_save_subdir")]
    pub save_subdir: String,

    /// Maximum numbered slots (0 = unlimited)
    #[serde(default)]
    pub max_slots: u32,

    #[serde(default)]
    pub naming: NamingConfig,

    /// Write indented documents
    #[serde(default)]
    pub pretty: bool,

    /// Worker pool permits for disk and tree offloading
    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_save_root() -> PathBuf {
    directories::ProjectDirs::from("", "", "jsonfs")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

fn default_save_subdir() -> String {
    "save".to_string()
}

fn default_workers() -> usize {
    4
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            save_root: default_save_root(),
            save_subdir: default_save_subdir(),
            max_slots: 0,
            naming: NamingConfig::default(),
            pretty: false,
            workers: default_workers(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    Storage(String),
    Naming(String),
    Workers(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Storage(msg) => write!(f, "Storage: {}", msg),
            ValidationError::Naming(msg) => write!(f, "Naming: {}", msg),
            ValidationError::Workers(msg) => write!(f, "Workers: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl ManagerConfig {
    /// Config saving under `dir` directly, with everything else defaulted.
    pub fn with_save_dir<P: Into<PathBuf>>(dir: P) -> Self {
        Self {
            save_root: dir.into(),
            save_subdir: ".".to_string(),
            ..Self::default()
        }
    }

    /// `save_root/save_subdir`
    pub fn save_dir(&self) -> PathBuf {
        self.save_root.join(&self.save_subdir)
    }

    /// Exclusive upper bound of slot ids.
    pub fn slot_limit(&self) -> u32 {
        if self.max_slots == 0 {
            UNLIMITED_SLOTS
        } else {
            self.max_slots
        }
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> std::result::Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.save_subdir.trim().is_empty() {
            errors.push(ValidationError::Storage(
                "Save subdirectory cannot be empty".to_string(),
            ));
        }
        if self.naming.extension.trim().is_empty() {
            errors.push(ValidationError::Naming(
                "File extension cannot be empty".to_string(),
            ));
        }
        if self.naming.global_name.trim().is_empty() {
            errors.push(ValidationError::Naming(
                "Global document name cannot be empty".to_string(),
            ));
        }
        if self.workers == 0 {
            errors.push(ValidationError::Workers(
                "Worker pool needs at least one permit".to_string(),
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// [`ManagerConfig::validate`] folded into a single [`FsError::Config`].
    pub fn validated(self) -> Result<Self> {
        self.validate().map_err(|errors| {
            let msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            FsError::Config(format!(
                "Configuration validation failed:\n{}",
                msgs.join("\n")
            ))
        })?;
        Ok(self)
    }
}

/// Builds a [`ManagerConfig`] from layered sources
pub struct ConfigLoader;

impl ConfigLoader {
    /// Defaults, then `{dir}/jsonfs.toml` if present, then `JSONFS_` env vars.
    pub fn load(dir: &Path) -> Result<ManagerConfig> {
        Self::load_layers(Some(dir.join(CONFIG_FILE_NAME)), true)
    }

    /// Load a single configuration file on top of the defaults, ignoring the environment.
    pub fn load_from_file(path: &Path) -> Result<ManagerConfig> {
        if !path.exists() {
            return Err(FsError::Config(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }
        Self::load_layers(Some(path.to_path_buf()), false)
    }

    fn load_layers(file: Option<PathBuf>, with_env: bool) -> Result<ManagerConfig> {
        let mut builder = Config::builder()
            .set_default("save_root", default_save_root().to_string_lossy().to_string())?
            .set_default("save_subdir", default_save_subdir())?
            .set_default("max_slots", 0i64)?
            .set_default("pretty", false)?
            .set_default("workers", default_workers() as i64)?;

        if let Some(file) = file {
            builder = builder.add_source(File::from(file).required(false));
        }
        if with_env {
            builder = builder.add_source(
                Environment::with_prefix("JSONFS")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );
        }

        let config: ManagerConfig = builder.build()?.try_deserialize()?;
        config.validated()
    }
}
