//! Save file naming
//!
//! Slot documents are named `{prefix}{id}{postfix}.{extension}`; the static
//! document has one fixed global name.

use crate::config::NamingConfig;
use crate::error::{FsError, Result};
use regex::Regex;

/// Maps ticket ids to file names and back.
pub trait NamingRule: Send + Sync {
    /// File name of numbered slot `id`.
    fn slot_file_name(&self, id: u32) -> String;

    /// File name of the static document.
    fn global_file_name(&self) -> String;

    /// Slot id encoded in `file_name`, if it is a slot document.
    fn match_slot_id(&self, file_name: &str) -> Option<u32>;
}

/// [`NamingRule`] driven by [`NamingConfig`]
#[derive(Debug, Clone)]
pub struct PatternNamingRule {
    config: NamingConfig,
    pattern: Regex,
}

impl PatternNamingRule {
    pub fn new(config: NamingConfig) -> Result<Self> {
        let pattern = format!(
            r"^{}(\d+){}\.{}$",
            regex::escape(&config.prefix),
            regex::escape(&config.postfix),
            regex::escape(&config.extension)
        );
        let pattern = Regex::new(&pattern)
            .map_err(|e| FsError::Config(format!("Invalid naming pattern: {}", e)))?;
        Ok(Self { config, pattern })
    }
}

impl NamingRule for PatternNamingRule {
    fn slot_file_name(&self, id: u32) -> String {
        format!(
            "{}{}{}.{}",
            self.config.prefix, id, self.config.postfix, self.config.extension
        )
    }

    fn global_file_name(&self) -> String {
        format!("{}.{}", self.config.global_name, self.config.extension)
    }

    fn match_slot_id(&self, file_name: &str) -> Option<u32> {
        let caps = self.pattern.captures(file_name)?;
        caps[1].parse().ok()
    }
}
