//! Archive options
//!
//! Options can be built in code or loaded from TOML:
//!
//! ```
//! use psarc_rs::{ArchiveOptions, StorageMode};
//!
//! let options = ArchiveOptions::from_toml_str(
//!     r#"
//!     block_size = 65536
//!     storage = "memory"
//!     "#,
//! )?;
//! assert_eq!(options.storage, StorageMode::Memory);
//! # Ok::<(), psarc_rs::PsarcError>(())
//! ```

use crate::archive::{block_width, DEFAULT_BLOCK_SIZE, FORMAT_VERSION};
use crate::error::{PsarcError, Result};
use crate::storage::StorageMode;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// Default zlib level
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 9;

/// zlib levels whose streams start with the `78 DA` block marker
pub const COMPRESSION_LEVELS: RangeInclusive<u32> = 7..=9;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveOptions {
    /// Uncompressed size of one block; must be a power of 256
    pub block_size: u32,

    /// Where inflated entries are kept
    pub storage: StorageMode,

    /// zlib level used when deflating blocks (7-9)
    pub compression_level: u32,

    /// Version written into the header
    pub version: u32,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            storage: StorageMode::default(),
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            version: FORMAT_VERSION,
        }
    }
}

impl ArchiveOptions {
    pub fn with_block_size(mut self, block_size: u32) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_storage(mut self, storage: StorageMode) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression_level = level;
        self
    }

    /// Check that the options describe a writable archive
    pub fn validate(&self) -> Result<()> {
        block_width(self.block_size)?;
        if !COMPRESSION_LEVELS.contains(&self.compression_level) {
            return Err(PsarcError::Config(format!(
                "compression level {} out of range {}-{}",
                self.compression_level,
                COMPRESSION_LEVELS.start(),
                COMPRESSION_LEVELS.end()
            )));
        }
        Ok(())
    }

    /// Parse and validate options from a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let options: Self = toml::from_str(text)?;
        options.validate()?;
        Ok(options)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string(self)?)
    }
}
