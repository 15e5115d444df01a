//! Block compression engine
//!
//! Every entry payload is cut into `block_size` chunks that are stored
//! independently. The archive-wide block-size table holds one value per stored
//! block:
//!
//! - `0`: a full, uncompressed block of exactly `block_size` bytes
//! - anything else: the stored length of the block, which is either a zlib
//!   stream (recognized by the `78 DA` marker) or raw data shorter than a block
//!
//! An entry owns the contiguous table slice starting at its block index and
//! spanning `ceil(length / block_size)` slots.

use crate::binary::{read_full, ReadBigEndian, WriteBigEndian};
use crate::error::{PsarcError, Result};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{self, Read, Write};
use std::ops::Range;
use tracing::{trace, warn};

/// zlib stream header written at compression levels 7 to 9
///
/// Only this header marks a compressed block. Short raw blocks starting with
/// any other zlib header are read back verbatim.
pub const ZLIB_MARKER: u16 = 0x78DA;

/// How a stored block is encoded, inferred from its table value and head bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// Table value 0: `block_size` raw bytes
    FullRaw,
    /// Stored bytes start with [`ZLIB_MARKER`]
    Zlib,
    /// Raw bytes shorter than a block
    ShortRaw,
}

impl BlockKind {
    pub fn classify(table_value: u32, stored: &[u8]) -> Self {
        if table_value == 0 {
            Self::FullRaw
        } else if has_zlib_header(stored) {
            Self::Zlib
        } else {
            Self::ShortRaw
        }
    }
}

/// Whether `data` begins with the big-endian [`ZLIB_MARKER`]
pub fn has_zlib_header(data: &[u8]) -> bool {
    match data {
        [a, b, ..] => u16::from_be_bytes([*a, *b]) == ZLIB_MARKER,
        _ => false,
    }
}

/// Archive-wide list of stored block lengths
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockSizeTable {
    sizes: Vec<u32>,
}

impl BlockSizeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_sizes(sizes: Vec<u32>) -> Self {
        Self { sizes }
    }

    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<u32> {
        self.sizes.get(index).copied()
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.sizes
    }

    /// Append one entry's block values, returning the index of the first one
    pub fn append(&mut self, sizes: &[u32]) -> Result<u32> {
        let start = u32::try_from(self.sizes.len()).map_err(|_| {
            PsarcError::InvalidFormat("block-size table exceeds u32 indices".to_string())
        })?;
        self.sizes.extend_from_slice(sizes);
        Ok(start)
    }

    /// Bytes a block occupies in the data section
    pub fn stored_len(&self, index: usize, block_size: u32) -> Option<u64> {
        self.get(index).map(|value| match value {
            0 => u64::from(block_size),
            n => u64::from(n),
        })
    }

    /// Table slots owned by an entry of `length` bytes starting at `block_index`
    pub fn entry_range(block_index: u32, length: u64, block_size: u32) -> Range<usize> {
        let start = block_index as usize;
        let count = length.div_ceil(u64::from(block_size)) as usize;
        start..start + count
    }

    pub fn read_from<R: Read>(mut reader: R, count: usize, width: usize) -> Result<Self> {
        let mut sizes = Vec::with_capacity(count);
        for _ in 0..count {
            sizes.push(reader.read_uint_be(width)?);
        }
        Ok(Self { sizes })
    }

    pub fn write_to<W: Write>(&self, mut writer: W, width: usize) -> Result<()> {
        for &size in &self.sizes {
            writer.write_uint_be(size, width)?;
        }
        Ok(())
    }
}

/// One entry's stored blocks, concatenated, plus their table values
#[derive(Debug, Clone, Default)]
pub struct CompressedEntry {
    pub data: Vec<u8>,
    pub block_sizes: Vec<u32>,
    pub plain_len: u64,
}

/// Split `reader` into blocks and store each one compressed or raw
///
/// Per block: raw when deflating does not shrink it, compressed when the
/// deflated form is shorter than `block_size - 1`, raw otherwise. A full raw
/// block is recorded as `0`. A deflated block is only kept when it starts with
/// [`ZLIB_MARKER`], so `level` should be one of 7 to 9.
pub fn compress_entry<R: Read + ?Sized>(
    reader: &mut R,
    block_size: u32,
    level: u32,
) -> Result<CompressedEntry> {
    let block_len = block_size as usize;
    let mut plain = vec![0u8; block_len];
    let mut out = CompressedEntry::default();

    loop {
        let plain_len = read_full(reader, &mut plain)?;
        if plain_len == 0 {
            break;
        }
        let chunk = &plain[..plain_len];
        let packed = deflate(chunk, level)?;

        let store_packed = if !has_zlib_header(&packed) {
            false
        } else if packed.len() >= plain_len {
            // Short raw data that looks like a zlib stream would be misread,
            // keep the deflated form instead when it fits
            plain_len < block_len && has_zlib_header(chunk) && packed.len() < block_len - 1
        } else {
            packed.len() < block_len - 1
        };

        if store_packed {
            trace!("block {}: {} -> {} bytes", out.block_sizes.len(), plain_len, packed.len());
            out.block_sizes.push(packed.len() as u32);
            out.data.extend_from_slice(&packed);
        } else {
            if plain_len < block_len && has_zlib_header(chunk) {
                warn!(
                    "raw block {} starts with a zlib header and will not read back",
                    out.block_sizes.len()
                );
            }
            trace!("block {}: {} bytes stored raw", out.block_sizes.len(), plain_len);
            let value = if plain_len == block_len { 0 } else { plain_len as u32 };
            out.block_sizes.push(value);
            out.data.extend_from_slice(chunk);
        }
        out.plain_len += plain_len as u64;

        if plain_len < block_len {
            break;
        }
    }

    Ok(out)
}

/// Outcome of inflating one entry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InflateReport {
    /// Bytes written to the destination
    pub written: u64,
    /// Corruption met along the way; empty when the entry decoded cleanly
    pub errors: Vec<String>,
}

impl InflateReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// All errors joined into one message
    pub fn message(&self) -> Option<String> {
        if self.errors.is_empty() {
            None
        } else {
            Some(self.errors.join("\n"))
        }
    }
}

/// Location of one entry's blocks
#[derive(Debug, Clone, Copy)]
pub struct BlockSpan<'a> {
    /// Name used in diagnostics; may be empty before the manifest is read
    pub name: &'a str,
    pub block_index: u32,
    pub length: u64,
}

/// Decode one entry's blocks from `source` into `dest`
///
/// `source` must be positioned at the entry's data offset. Corrupt blocks,
/// short reads and a block index past the end of the table are recorded in
/// the returned report and never abort the decode; whatever was written up to
/// that point stays in `dest`. Errors writing to `dest` are returned.
pub fn inflate_blocks<R, W>(
    source: &mut R,
    dest: &mut W,
    table: &BlockSizeTable,
    block_size: u32,
    span: BlockSpan<'_>,
) -> Result<InflateReport>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut report = InflateReport::default();
    if span.length == 0 {
        return Ok(report);
    }

    let range = BlockSizeTable::entry_range(span.block_index, span.length, block_size);
    let mut stored = Vec::with_capacity(block_size as usize);

    for index in range {
        if report.written >= span.length {
            break;
        }
        let Some(value) = table.get(index) else {
            report.errors.push(describe(
                span.name,
                &format!("block index {} is outside the block table ({} blocks)", index, table.len()),
            ));
            break;
        };

        let stored_len = if value == 0 { block_size } else { value } as usize;
        stored.resize(stored_len, 0);
        if let Err(e) = source.read_exact(&mut stored) {
            report.errors.push(describe(span.name, &format!("block {}: {}", index, e)));
            break;
        }

        match BlockKind::classify(value, &stored) {
            BlockKind::FullRaw | BlockKind::ShortRaw => {
                dest.write_all(&stored)?;
                report.written += stored.len() as u64;
            }
            BlockKind::Zlib => {
                let (written, failure) = inflate_block(&stored, dest, u64::from(block_size))?;
                report.written += written;
                if let Some(e) = failure {
                    report.errors.push(describe(span.name, &format!("block {}: {}", index, e)));
                }
            }
        }
    }

    if report.is_clean() && report.written < span.length {
        report.errors.push(describe(
            span.name,
            &format!("decoded {} of {} bytes", report.written, span.length),
        ));
    }
    for message in &report.errors {
        warn!("{}", message);
    }

    Ok(report)
}

/// Inflate one zlib block into `dest`, writing at most `limit` bytes
///
/// Returns the bytes written and the decoder failure, if any. Only write
/// errors are propagated.
fn inflate_block<W: Write + ?Sized>(
    stored: &[u8],
    dest: &mut W,
    limit: u64,
) -> Result<(u64, Option<io::Error>)> {
    let mut decoder = ZlibDecoder::new(stored);
    let mut buffer = [0u8; 16384];
    let mut written = 0u64;

    loop {
        let n = match decoder.read(&mut buffer) {
            Ok(0) => return Ok((written, None)),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Ok((written, Some(e))),
        };
        if written + n as u64 > limit {
            let n = (limit - written) as usize;
            dest.write_all(&buffer[..n])?;
            let overflow = io::Error::new(
                io::ErrorKind::InvalidData,
                format!("block inflates past {} bytes", limit),
            );
            return Ok((limit, Some(overflow)));
        }
        dest.write_all(&buffer[..n])?;
        written += n as u64;
    }
}

fn describe(name: &str, cause: &str) -> String {
    if name.is_empty() {
        format!("Archive contains a zlib error: {}", cause)
    } else {
        let short = name.rsplit('/').next().unwrap_or(name);
        format!("Archive contains a broken data block in file '{}': {}", short, cause)
    }
}

/// Deflate one block with zlib framing
pub fn deflate(data: &[u8], level: u32) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2), Compression::new(level));
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}
