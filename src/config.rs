//! VFS configuration
//!
//! Loaded from TOML (or built in code) once, before registration. Every field
//! has a default sized for a small flash device, so an empty document is a
//! valid configuration:
//!
//! ```toml
//! name = "flash"
//! journal = "sector-cached"
//! journal_pages = 8
//! page_size = 1024
//! sector_size = 4096
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default VFS name
pub const DEFAULT_VFS_NAME: &str = "flash";

/// Longest VFS name accepted (names end up in the engine's registry)
pub const MAX_VFS_NAME_LEN: usize = 32;

/// Where the engine's main rollback journal lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum JournalMode {
    /// On the device, like every other file
    Direct,
    /// In a heap buffer
    #[default]
    Memory,
    /// In a heap buffer fronted by a flash-sector write cache
    SectorCached,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VfsConfig {
    /// Name the VFS is registered under
    pub name: String,

    /// Longest path the engine may hand us (`mxPathname`)
    pub max_pathname: usize,

    /// Install as the engine's default VFS
    pub make_default: bool,

    /// Journal placement
    pub journal: JournalMode,

    /// Initial journal buffer size, in pages
    pub journal_pages: usize,

    /// Page size used to size the initial journal buffer
    pub page_size: usize,

    /// Flash sector size (erase/program granularity)
    pub sector_size: usize,

    /// Stage journal writes per sector instead of only detecting crossings
    pub coalesce: bool,

    /// Cap on heap bytes the journals of this VFS may hold at once
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heap_limit: Option<usize>,
}

impl Default for VfsConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_VFS_NAME.to_string(),
            max_pathname: 64,
            make_default: false,
            journal: JournalMode::Memory,
            journal_pages: 8,
            page_size: 1024,
            sector_size: 4096,
            coalesce: true,
            heap_limit: None,
        }
    }
}

impl VfsConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: VfsConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() || self.name.len() > MAX_VFS_NAME_LEN {
            return Err(invalid(
                "name",
                format!("must be 1..={MAX_VFS_NAME_LEN} bytes, got {}", self.name.len()),
            ));
        }
        if self.name.contains('\0') {
            return Err(invalid("name", "must not contain NUL".to_string()));
        }
        if !(16..=4096).contains(&self.max_pathname) {
            return Err(invalid(
                "max_pathname",
                format!("must be in 16..=4096, got {}", self.max_pathname),
            ));
        }
        if !is_power_of_two_in(self.page_size, 512, 65536) {
            return Err(invalid(
                "page_size",
                format!("must be a power of two in 512..=65536, got {}", self.page_size),
            ));
        }
        if !is_power_of_two_in(self.sector_size, 256, 65536) {
            return Err(invalid(
                "sector_size",
                format!(
                    "must be a power of two in 256..=65536, got {}",
                    self.sector_size
                ),
            ));
        }
        if self.journal_pages == 0 {
            return Err(invalid("journal_pages", "must be at least 1".to_string()));
        }
        let initial = self.initial_journal_capacity();
        if initial > crate::strategy::MAX_JOURNAL_SIZE {
            return Err(invalid(
                "journal_pages",
                format!(
                    "initial journal of {initial} bytes exceeds the {} byte journal cap",
                    crate::strategy::MAX_JOURNAL_SIZE
                ),
            ));
        }
        Ok(())
    }

    /// Bytes allocated for a fresh memory journal
    pub fn initial_journal_capacity(&self) -> usize {
        self.journal_pages.saturating_mul(self.page_size)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_journal(mut self, journal: JournalMode) -> Self {
        self.journal = journal;
        self
    }

    pub fn with_coalesce(mut self, coalesce: bool) -> Self {
        self.coalesce = coalesce;
        self
    }

    pub fn with_heap_limit(mut self, limit: usize) -> Self {
        self.heap_limit = Some(limit);
        self
    }

    pub fn with_sector_size(mut self, sector_size: usize) -> Self {
        self.sector_size = sector_size;
        self
    }

    pub fn as_default(mut self) -> Self {
        self.make_default = true;
        self
    }
}

fn invalid(field: &'static str, reason: String) -> ConfigError {
    ConfigError::Invalid { field, reason }
}

fn is_power_of_two_in(value: usize, min: usize, max: usize) -> bool {
    value.is_power_of_two() && (min..=max).contains(&value)
}
