//! psarc-rs: reader and writer for PSARC ("PlayStation archive") files
//!
//! A PSARC archive is a 32-byte header, a table of contents (one 30-byte
//! record per entry plus a table of block sizes) and the entries' data split
//! into independently zlib-compressed blocks. Entry names live in a manifest
//! stored as the first entry. This crate provides:
//! - Reading, with optional lazy inflation of entry payloads
//! - Writing, with optional AES-CFB encryption of the table of contents
//! - Backing stores in memory or in auto-deleting temporary files
//! - A standalone AES file cipher ([`crypto::encrypt_file`])
//!
//! # Example
//!
//! ```no_run
//! use psarc_rs::Psarc;
//!
//! // Create an archive
//! let mut archive = Psarc::in_memory();
//! archive.add_bytes("songs/intro.xml", b"<song/>")?;
//! archive.save("example.psarc", true)?;
//!
//! // Read it back
//! let mut archive = Psarc::open("example.psarc", true)?;
//! let index = archive.inflate_by_name("intro.xml")?;
//! let data = archive.entries_mut()[index].read_data()?;
//! # Ok::<(), psarc_rs::PsarcError>(())
//! ```

pub mod archive;
pub mod binary;
pub mod config;
pub mod crypto;
pub mod error;
pub mod storage;

// Re-export commonly used types
pub use archive::{
    CompressionMethod, Entry, Header, Psarc, TocRecord, DEFAULT_BLOCK_SIZE, FORMAT_VERSION,
    HEADER_SIZE, MAGIC_NUMBER, MANIFEST_NAME, TOC_ENTRY_SIZE,
};
pub use config::ArchiveOptions;
pub use error::{PsarcError, Result};
pub use storage::{BackingStore, MemoryStore, StorageMode, TempFileStore};
