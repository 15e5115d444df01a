use crate::binary::{ReadBigEndian, WriteBigEndian};
use crate::error::{PsarcError, Result};
use std::io::{Read, Write};

/// Magic number: "PSAR" read as a big-endian u32
pub const MAGIC_NUMBER: u32 = 0x5053_4152;

/// Format version 1.4 (major in the high half, minor in the low half)
pub const FORMAT_VERSION: u32 = 0x0001_0004;

/// Header size in bytes
pub const HEADER_SIZE: usize = 32;

/// TOC record size in bytes
pub const TOC_ENTRY_SIZE: usize = 30;

/// Default block size (64KB)
pub const DEFAULT_BLOCK_SIZE: u32 = 65536;

/// Archive flag: the TOC region is encrypted
pub const FLAG_TOC_ENCRYPTED: u32 = 0x4;

/// Name digest size in bytes
pub const DIGEST_SIZE: usize = 16;

/// Compression methods known to the format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum CompressionMethod {
    /// "zlib"
    Zlib = 0x7A6C_6962,
    /// "lzma", recognized but not implemented
    Lzma = 0x6C7A_6D61,
}

impl CompressionMethod {
    pub fn from_tag(tag: u32) -> Result<Self> {
        match tag {
            0x7A6C_6962 => Ok(Self::Zlib),
            0x6C7A_6D61 => Ok(Self::Lzma),
            _ => Err(PsarcError::UnknownCompression(tag)),
        }
    }

    pub fn tag(self) -> u32 {
        self as u32
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Zlib => "zlib",
            Self::Lzma => "lzma",
        }
    }
}

/// Byte width of one block-size table value for a given block size
///
/// The width is `log256(block_size)`: 2 bytes for 64KB blocks, 3 for 16MB and
/// 4 for 4GB. Anything that is not such a power of 256 is rejected.
pub fn block_width(block_size: u32) -> Result<usize> {
    match block_size.checked_ilog(256) {
        Some(width @ 2..=4) if 256u64.pow(width) == u64::from(block_size) => Ok(width as usize),
        _ => Err(PsarcError::InvalidBlockSize(block_size)),
    }
}

/// File header at the beginning of the archive
///
/// Structure (32 bytes, big-endian):
/// - Magic: "PSAR" (4 bytes)
/// - Version: uint32
/// - Compression method tag: uint32
/// - Total TOC size, header included: uint32
/// - TOC entry size: uint32 (always 30)
/// - Number of entries, manifest included: uint32
/// - Block size: uint32
/// - Archive flags: uint32
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub magic: u32,
    pub version: u32,
    pub compression: u32,
    pub total_toc_size: u32,
    pub toc_entry_size: u32,
    pub num_files: u32,
    pub block_size: u32,
    pub flags: u32,
}

impl Header {
    pub fn new() -> Self {
        Self {
            magic: MAGIC_NUMBER,
            version: FORMAT_VERSION,
            compression: CompressionMethod::Zlib.tag(),
            total_toc_size: 0,
            toc_entry_size: TOC_ENTRY_SIZE as u32,
            num_files: 0,
            block_size: DEFAULT_BLOCK_SIZE,
            flags: 0,
        }
    }

    /// Whether the magic number identifies a PSARC archive
    pub fn has_valid_magic(&self) -> bool {
        self.magic == MAGIC_NUMBER
    }

    pub fn toc_encrypted(&self) -> bool {
        self.flags & FLAG_TOC_ENCRYPTED != 0
    }

    pub fn set_toc_encrypted(&mut self, encrypted: bool) {
        if encrypted {
            self.flags |= FLAG_TOC_ENCRYPTED;
        } else {
            self.flags &= !FLAG_TOC_ENCRYPTED;
        }
    }

    /// Decode the compression tag
    pub fn compression_method(&self) -> Result<CompressionMethod> {
        CompressionMethod::from_tag(self.compression)
    }

    /// Width in bytes of each block-size table value
    pub fn block_width(&self) -> Result<usize> {
        block_width(self.block_size)
    }

    /// Size of the TOC region after the header (records + block-size table)
    pub fn toc_region_size(&self) -> Result<usize> {
        (self.total_toc_size as usize)
            .checked_sub(HEADER_SIZE)
            .ok_or_else(|| {
                PsarcError::InvalidFormat(format!(
                    "TOC size {} is smaller than the header",
                    self.total_toc_size
                ))
            })
    }

    /// Number of block-size table values implied by the header
    ///
    /// `(TotalTOCSize - 32 - NumFiles * TOCEntrySize) / width`
    pub fn block_count(&self) -> Result<usize> {
        let records = self.num_files as usize * self.toc_entry_size as usize;
        let table_bytes = self.toc_region_size()?.checked_sub(records).ok_or_else(|| {
            PsarcError::InvalidFormat(format!(
                "TOC size {} cannot hold {} records of {} bytes",
                self.total_toc_size, self.num_files, self.toc_entry_size
            ))
        })?;
        Ok(table_bytes / self.block_width()?)
    }

    /// Write header to a writer
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_u32_be(self.magic)?;
        writer.write_u32_be(self.version)?;
        writer.write_u32_be(self.compression)?;
        writer.write_u32_be(self.total_toc_size)?;
        writer.write_u32_be(self.toc_entry_size)?;
        writer.write_u32_be(self.num_files)?;
        writer.write_u32_be(self.block_size)?;
        writer.write_u32_be(self.flags)?;
        Ok(())
    }

    /// Read header from a reader
    ///
    /// The magic number is not checked here; see [`Header::has_valid_magic`].
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let magic = reader.read_u32_be()?;
        Self::read_after_magic(magic, reader)
    }

    /// Read the 28 header bytes that follow an already consumed magic number
    pub fn read_after_magic<R: Read>(magic: u32, mut reader: R) -> Result<Self> {
        Ok(Self {
            magic,
            version: reader.read_u32_be()?,
            compression: reader.read_u32_be()?,
            total_toc_size: reader.read_u32_be()?,
            toc_entry_size: reader.read_u32_be()?,
            num_files: reader.read_u32_be()?,
            block_size: reader.read_u32_be()?,
            flags: reader.read_u32_be()?,
        })
    }
}

impl Default for Header {
    fn default() -> Self {
        Self::new()
    }
}

/// One fixed-size TOC record
///
/// Structure (30 bytes):
/// - Name digest (16 bytes)
/// - Index of the entry's first block in the block-size table: uint32
/// - Uncompressed length: uint40
/// - Offset of the entry's data: uint40
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TocRecord {
    pub digest: [u8; DIGEST_SIZE],
    pub block_index: u32,
    pub length: u64,
    pub offset: u64,
}

impl TocRecord {
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(&self.digest)?;
        writer.write_u32_be(self.block_index)?;
        writer.write_u40_be(self.length)?;
        writer.write_u40_be(self.offset)?;
        Ok(())
    }

    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let mut digest = [0u8; DIGEST_SIZE];
        reader.read_exact(&mut digest)?;

        Ok(Self {
            digest,
            block_index: reader.read_u32_be()?,
            length: reader.read_u40_be()?,
            offset: reader.read_u40_be()?,
        })
    }
}
