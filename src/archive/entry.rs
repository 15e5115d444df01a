use crate::archive::format::{TocRecord, DIGEST_SIZE};
use crate::error::{PsarcError, Result};
use crate::storage::BackingStore;
use std::fmt;
use std::io::{Seek, SeekFrom};

/// Name of the synthetic entry holding every other entry's name
pub const MANIFEST_NAME: &str = "NamesBlock.bin";

/// Digest stored in a TOC record for `name`
///
/// The manifest record carries an all-zero digest; every other record
/// carries the MD5 of the UTF-8 name.
pub fn name_digest(name: &str) -> [u8; DIGEST_SIZE] {
    if name == MANIFEST_NAME {
        [0u8; DIGEST_SIZE]
    } else {
        md5::compute(name.as_bytes()).0
    }
}

/// One named byte stream inside an archive
///
/// The entry exclusively owns its backing store. The store is created when the
/// entry is inflated (or handed over by the caller in
/// [`crate::Psarc::add_entry`]) and released when the entry is written,
/// dropped, or given new data.
pub struct Entry {
    id: u32,
    name: String,
    digest: [u8; DIGEST_SIZE],
    block_index: u32,
    length: u64,
    offset: u64,
    data: Option<Box<dyn BackingStore>>,
    error: Option<String>,
}

impl Entry {
    /// Entry created from a caller-supplied store
    pub(crate) fn new(id: u32, name: String, data: Box<dyn BackingStore>, length: u64) -> Self {
        let digest = name_digest(&name);
        Self {
            id,
            name,
            digest,
            block_index: 0,
            length,
            offset: 0,
            data: Some(data),
            error: None,
        }
    }

    /// Entry parsed from a TOC record; its name is unknown until the
    /// manifest has been read
    pub(crate) fn from_record(id: u32, record: TocRecord) -> Self {
        Self {
            id,
            name: String::new(),
            digest: record.digest,
            block_index: record.block_index,
            length: record.length,
            offset: record.offset,
            data: None,
            error: None,
        }
    }

    /// Position in the TOC, in insertion order; the manifest is id 0
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Virtual path of the entry
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the entry; the digest follows on the next write
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn digest(&self) -> &[u8; DIGEST_SIZE] {
        &self.digest
    }

    pub fn digest_hex(&self) -> String {
        hex::encode(self.digest)
    }

    /// Index of the entry's first block in the archive-wide block-size table
    pub fn block_index(&self) -> u32 {
        self.block_index
    }

    /// Uncompressed length in bytes
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Offset of the entry's stored blocks from the start of the archive
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Description of corruption met while inflating this entry, if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Whether the entry currently holds a backing store
    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }

    pub fn data_mut(&mut self) -> Option<&mut (dyn BackingStore + 'static)> {
        self.data.as_deref_mut()
    }

    /// Take ownership of the backing store, leaving the entry without data
    pub fn take_data(&mut self) -> Option<Box<dyn BackingStore>> {
        self.data.take()
    }

    /// Replace the payload; the previous store is released
    pub fn set_data(&mut self, mut data: Box<dyn BackingStore>) -> Result<()> {
        self.length = data.len()?;
        data.seek(SeekFrom::Start(0))?;
        self.data = Some(data);
        self.error = None;
        Ok(())
    }

    /// Read the whole payload into memory
    ///
    /// The store is rewound before and after reading.
    pub fn read_data(&mut self) -> Result<Vec<u8>> {
        let name = self.name.clone();
        let data = self
            .data
            .as_deref_mut()
            .ok_or(PsarcError::MissingData(name))?;

        data.seek(SeekFrom::Start(0))?;
        let mut out = Vec::with_capacity(data.len()? as usize);
        data.read_to_end(&mut out)?;
        data.seek(SeekFrom::Start(0))?;
        Ok(out)
    }

    /// Recompute the digest from the current name
    pub fn update_digest(&mut self) {
        self.digest = name_digest(&self.name);
    }

    /// TOC record describing this entry as currently laid out
    pub(crate) fn to_record(&self) -> TocRecord {
        TocRecord {
            digest: self.digest,
            block_index: self.block_index,
            length: self.length,
            offset: self.offset,
        }
    }

    pub(crate) fn set_id(&mut self, id: u32) {
        self.id = id;
    }

    pub(crate) fn set_block_index(&mut self, block_index: u32) {
        self.block_index = block_index;
    }

    pub(crate) fn set_offset(&mut self, offset: u64) {
        self.offset = offset;
    }

    pub(crate) fn set_length(&mut self, length: u64) {
        self.length = length;
    }

    pub(crate) fn set_error(&mut self, message: String) {
        self.error = Some(message);
    }

    pub(crate) fn clear_error(&mut self) {
        self.error = None;
    }

    pub(crate) fn store_data(&mut self, data: Box<dyn BackingStore>) {
        self.data = Some(data);
    }

}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("digest", &self.digest_hex())
            .field("block_index", &self.block_index)
            .field("length", &self.length)
            .field("offset", &self.offset)
            .field("has_data", &self.data.is_some())
            .field("error", &self.error)
            .finish()
    }
}
