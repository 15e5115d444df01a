mod block;
mod entry;
mod format;
mod manifest;
mod psarc;
mod reader;
mod writer;

pub use block::{
    compress_entry, deflate, has_zlib_header, inflate_blocks, BlockKind, BlockSizeTable,
    BlockSpan, CompressedEntry, InflateReport, ZLIB_MARKER,
};
pub use entry::{name_digest, Entry, MANIFEST_NAME};
pub use format::{
    block_width, CompressionMethod, Header, TocRecord, DEFAULT_BLOCK_SIZE, DIGEST_SIZE,
    FLAG_TOC_ENCRYPTED, FORMAT_VERSION, HEADER_SIZE, MAGIC_NUMBER, TOC_ENTRY_SIZE,
};
pub use manifest::{assign_names, build_manifest, parse_manifest};
pub use psarc::{ArchiveSource, Psarc};
