use std::io;
use thiserror::Error;

/// Result type for psarc operations
pub type Result<T> = std::result::Result<T, PsarcError>;

/// Unified error type for all psarc operations
///
/// Corruption inside a single entry's data is not represented here; it is
/// recorded on the entry itself (see [`crate::Entry::error`]).
#[derive(Debug, Error)]
pub enum PsarcError {
    // Archive errors
    #[error("Invalid archive format: {0}")]
    InvalidFormat(String),

    #[error("Unknown compression method: {0:#010x}")]
    UnknownCompression(u32),

    #[error("Unsupported compression method: {0}")]
    UnsupportedCompression(&'static str),

    #[error("Invalid block size {0}: must be a power of 256 such as 65536 or 16777216")]
    InvalidBlockSize(u32),

    // Entry errors
    #[error("Entry name is reserved for the archive manifest: {0}")]
    ReservedName(String),

    #[error("Entry not found in archive: {0}")]
    EntryNotFound(String),

    #[error("Entry has no data and cannot be inflated: {0}")]
    MissingData(String),

    #[error("Archive was not read from a source stream")]
    NoSource,

    // Crypto errors
    #[error("Cryptography error: {0}")]
    Crypto(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<toml::de::Error> for PsarcError {
    fn from(err: toml::de::Error) -> Self {
        PsarcError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for PsarcError {
    fn from(err: toml::ser::Error) -> Self {
        PsarcError::Config(err.to_string())
    }
}
