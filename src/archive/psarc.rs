use crate::archive::block::BlockSizeTable;
use crate::archive::entry::{Entry, MANIFEST_NAME};
use crate::archive::format::Header;
use crate::config::ArchiveOptions;
use crate::error::{PsarcError, Result};
use crate::storage::{BackingStore, MemoryStore, StorageMode};
use std::io::{Read, Seek, SeekFrom};

/// Seekable byte source an archive is read from
pub trait ArchiveSource: Read + Seek + Send {}

impl<T: Read + Seek + Send> ArchiveSource for T {}

/// A PSARC archive: header, entries and the block-size table
///
/// Created empty, then populated either by [`Psarc::read`] or by
/// [`Psarc::add_entry`]. Dropping the archive releases every entry's backing
/// store (temporary files are deleted).
///
/// An archive object is not meant to be shared between threads while it is
/// being read or written; all header and TOC mutation is sequential.
pub struct Psarc {
    pub(crate) header: Header,
    pub(crate) entries: Vec<Entry>,
    pub(crate) block_sizes: BlockSizeTable,
    pub(crate) options: ArchiveOptions,
    pub(crate) source: Option<Box<dyn ArchiveSource>>,
    pub(crate) manifest_error: Option<String>,
}

impl Psarc {
    /// Empty archive inflating entries into temporary files
    pub fn new() -> Self {
        Self::from_valid_options(ArchiveOptions::default())
    }

    /// Empty archive inflating entries into memory
    pub fn in_memory() -> Self {
        Self::from_valid_options(ArchiveOptions::default().with_storage(StorageMode::Memory))
    }

    /// Empty archive with custom options
    pub fn with_options(options: ArchiveOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self::from_valid_options(options))
    }

    fn from_valid_options(options: ArchiveOptions) -> Self {
        let mut header = Header::new();
        header.block_size = options.block_size;
        header.version = options.version;

        Self {
            header,
            entries: Vec::new(),
            block_sizes: BlockSizeTable::new(),
            options,
            source: None,
            manifest_error: None,
        }
    }

    /// Add a named entry backed by `data`
    ///
    /// Ownership of the store moves to the entry. The entry length is the
    /// store's current length. Returns the new entry id.
    pub fn add_entry<S>(&mut self, name: impl Into<String>, data: S) -> Result<u32>
    where
        S: BackingStore + 'static,
    {
        self.add_boxed_entry(name, Box::new(data))
    }

    /// Add a named entry from an already boxed store
    pub fn add_boxed_entry(
        &mut self,
        name: impl Into<String>,
        mut data: Box<dyn BackingStore>,
    ) -> Result<u32> {
        let name = name.into();
        if name == MANIFEST_NAME {
            return Err(PsarcError::ReservedName(name));
        }

        let length = data.len()?;
        data.seek(SeekFrom::Start(0))?;

        let id = u32::try_from(self.entries.len() + 1)
            .map_err(|_| PsarcError::InvalidFormat("too many entries".to_string()))?;
        self.entries.push(Entry::new(id, name, data, length));
        Ok(id)
    }

    /// Add a named entry holding a copy of `data` in memory
    pub fn add_bytes(&mut self, name: impl Into<String>, data: &[u8]) -> Result<u32> {
        self.add_entry(name, MemoryStore::from_bytes(data))
    }

    /// Entries in TOC order, manifest excluded
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> &mut [Entry] {
        &mut self.entries
    }

    pub fn entry(&self, index: usize) -> Option<&Entry> {
        self.entries.get(index)
    }

    /// Index of the first entry with exactly this name
    pub fn find(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name() == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn options(&self) -> &ArchiveOptions {
        &self.options
    }

    pub fn block_sizes(&self) -> &BlockSizeTable {
        &self.block_sizes
    }

    /// Whether the last read found a PSARC magic number
    pub fn header_valid(&self) -> bool {
        self.header.has_valid_magic()
    }

    /// Every entry's corruption message, one per line, or `None` when the
    /// archive decoded cleanly
    pub fn error_report(&self) -> Option<String> {
        let messages: Vec<&str> = self
            .manifest_error
            .as_deref()
            .into_iter()
            .chain(self.entries.iter().filter_map(Entry::error))
            .collect();

        if messages.is_empty() {
            None
        } else {
            Some(messages.join("\n"))
        }
    }

    /// Archive size implied by the TOC: the last entry's offset plus its
    /// stored blocks
    pub fn required_size(&self) -> u64 {
        let block_size = self.header.block_size;
        match self.entries.last() {
            Some(last) => {
                let range = BlockSizeTable::entry_range(last.block_index(), last.length(), block_size);
                let stored: u64 = range
                    .map(|i| self.block_sizes.stored_len(i, block_size).unwrap_or(0))
                    .sum();
                last.offset() + stored
            }
            None => u64::from(self.header.total_toc_size),
        }
    }

    /// Release every entry, its backing store and the source stream
    pub fn clear(&mut self) {
        self.entries.clear();
        self.block_sizes = BlockSizeTable::new();
        self.source = None;
        self.manifest_error = None;
    }
}

impl Default for Psarc {
    fn default() -> Self {
        Self::new()
    }
}
