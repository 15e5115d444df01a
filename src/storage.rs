//! Backing stores for entry payloads
//!
//! Every entry keeps its decompressed bytes in a [`BackingStore`]. Two
//! implementations are provided and chosen through [`StorageMode`]:
//!
//! - [`MemoryStore`]: a list of fixed-size blocks, so that very large entries
//!   never need one huge contiguous allocation
//! - [`TempFileStore`]: a uniquely named temporary file that is deleted as soon
//!   as the store is dropped
//!
//! Caller-supplied [`File`]s and `Cursor<Vec<u8>>`s are also accepted as stores
//! when adding entries to an archive.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Block size used by [`MemoryStore`] (64KB)
pub const MEMORY_BLOCK_SIZE: usize = 65536;

/// Byte-addressable random-access store holding one entry's payload
pub trait BackingStore: Read + Write + Seek + Send {
    /// Total number of bytes in the store
    fn len(&self) -> io::Result<u64>;

    /// Grow or shrink the store; new bytes read as zero
    fn set_len(&mut self, len: u64) -> io::Result<()>;

    fn is_empty(&self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// Where inflated entry payloads are kept
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageMode {
    /// Block-list memory store
    Memory,
    /// Auto-deleting temporary file
    #[default]
    TempFile,
}

impl StorageMode {
    /// Create an empty store of this kind
    pub fn create(self) -> io::Result<Box<dyn BackingStore>> {
        Ok(match self {
            StorageMode::Memory => Box::new(MemoryStore::new()),
            StorageMode::TempFile => Box::new(TempFileStore::new()?),
        })
    }
}

/// In-memory store built from a list of fixed-size blocks
///
/// Position maps to `block = position / block_size` and
/// `offset = position % block_size`. Blocks are allocated on first write;
/// reading an unallocated block inside the logical length yields zeros.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    blocks: Vec<Box<[u8]>>,
    block_size: usize,
    length: u64,
    position: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_block_size(MEMORY_BLOCK_SIZE)
    }

    /// Create a store with a custom block size (mostly useful for tests)
    pub fn with_block_size(block_size: usize) -> Self {
        Self {
            blocks: Vec::new(),
            block_size: block_size.max(1),
            length: 0,
            position: 0,
        }
    }

    /// Create a store holding a copy of `data`, positioned at the start
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut store = Self::new();
        store.write_block_data(data);
        store.position = 0;
        store
    }

    /// Number of blocks currently allocated
    pub fn allocated_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Copy the whole content into one contiguous buffer
    ///
    /// The current position is left unchanged.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = vec![0u8; self.length as usize];
        for (id, block) in self.blocks.iter().enumerate() {
            let start = id * self.block_size;
            if start >= out.len() {
                break;
            }
            let end = (start + self.block_size).min(out.len());
            out[start..end].copy_from_slice(&block[..end - start]);
        }
        out
    }

    /// Copy `len` bytes from `source` into the store at the current position
    ///
    /// Returns the number of bytes copied, which is smaller than `len` when
    /// `source` ends early.
    pub fn read_from<R: Read>(&mut self, source: &mut R, len: u64) -> io::Result<u64> {
        let copied = io::copy(&mut source.take(len), self)?;
        Ok(copied)
    }

    /// Write the whole content to `dest`, regardless of the current position
    pub fn write_to<W: Write>(&self, dest: &mut W) -> io::Result<()> {
        let mut remaining = self.length;
        for block in &self.blocks {
            if remaining == 0 {
                break;
            }
            let n = (block.len() as u64).min(remaining) as usize;
            dest.write_all(&block[..n])?;
            remaining -= n as u64;
        }
        // Logical length may extend past the allocated blocks after set_len
        let zeros = [0u8; 4096];
        while remaining > 0 {
            let n = (zeros.len() as u64).min(remaining) as usize;
            dest.write_all(&zeros[..n])?;
            remaining -= n as u64;
        }
        Ok(())
    }

    fn locate(&self, position: u64) -> (usize, usize) {
        let block_size = self.block_size as u64;
        ((position / block_size) as usize, (position % block_size) as usize)
    }

    fn write_block_data(&mut self, buf: &[u8]) -> usize {
        let mut written = 0;
        while written < buf.len() {
            let (id, offset) = self.locate(self.position);
            let n = (buf.len() - written).min(self.block_size - offset);

            while self.blocks.len() <= id {
                self.blocks.push(vec![0u8; self.block_size].into_boxed_slice());
            }
            self.blocks[id][offset..offset + n].copy_from_slice(&buf[written..written + n]);

            written += n;
            self.position += n as u64;
        }
        self.length = self.length.max(self.position);
        written
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Read for MemoryStore {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.position >= self.length {
            return Ok(0);
        }
        let count = (buf.len() as u64).min(self.length - self.position) as usize;

        let mut done = 0;
        while done < count {
            let (id, offset) = self.locate(self.position);
            let n = (count - done).min(self.block_size - offset);
            match self.blocks.get(id) {
                Some(block) => buf[done..done + n].copy_from_slice(&block[offset..offset + n]),
                None => buf[done..done + n].fill(0),
            }
            done += n;
            self.position += n as u64;
        }
        Ok(done)
    }
}

impl Write for MemoryStore {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.write_block_data(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for MemoryStore {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::Current(offset) => self.position.checked_add_signed(offset),
            SeekFrom::End(offset) => self.length.checked_add_signed(offset),
        };
        match target {
            Some(position) => {
                self.position = position;
                Ok(position)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid seek to a negative or overflowing position",
            )),
        }
    }
}

impl BackingStore for MemoryStore {
    fn len(&self) -> io::Result<u64> {
        Ok(self.length)
    }

    fn set_len(&mut self, len: u64) -> io::Result<()> {
        if len < self.length {
            let (id, offset) = self.locate(len);
            let keep = if offset == 0 { id } else { id + 1 };
            self.blocks.truncate(keep);
            // Zero the tail so a later grow does not resurrect stale bytes
            if offset != 0 {
                if let Some(block) = self.blocks.get_mut(id) {
                    block[offset..].fill(0);
                }
            }
        }
        self.length = len;
        Ok(())
    }
}

/// Store backed by a uniquely named temporary file
///
/// The file is removed from disk when the store is dropped.
#[derive(Debug)]
pub struct TempFileStore {
    file: NamedTempFile,
}

impl TempFileStore {
    pub fn new() -> io::Result<Self> {
        let file = tempfile::Builder::new()
            .prefix("psarc-")
            .suffix(".tmp")
            .tempfile()?;
        Ok(Self { file })
    }

    /// Location of the temporary file on disk
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

impl Read for TempFileStore {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for TempFileStore {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl Seek for TempFileStore {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }
}

impl BackingStore for TempFileStore {
    fn len(&self) -> io::Result<u64> {
        Ok(self.file.as_file().metadata()?.len())
    }

    fn set_len(&mut self, len: u64) -> io::Result<()> {
        self.file.as_file().set_len(len)
    }
}

impl BackingStore for File {
    fn len(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn set_len(&mut self, len: u64) -> io::Result<()> {
        File::set_len(self, len)
    }
}

impl BackingStore for Cursor<Vec<u8>> {
    fn len(&self) -> io::Result<u64> {
        Ok(self.get_ref().len() as u64)
    }

    fn set_len(&mut self, len: u64) -> io::Result<()> {
        let len = usize::try_from(len)
            .map_err(|_| io::Error::new(io::ErrorKind::OutOfMemory, "length exceeds memory"))?;
        self.get_mut().resize(len, 0);
        Ok(())
    }
}
