use crate::archive::block::{inflate_blocks, BlockSizeTable, BlockSpan, InflateReport};
use crate::archive::entry::{Entry, MANIFEST_NAME};
use crate::archive::format::{
    CompressionMethod, Header, TocRecord, HEADER_SIZE, MAGIC_NUMBER, TOC_ENTRY_SIZE,
};
use crate::archive::manifest::assign_names;
use crate::archive::psarc::{ArchiveSource, Psarc};
use crate::binary::ReadBigEndian;
use crate::crypto::decrypt_toc_in_place;
use crate::error::{PsarcError, Result};
use crate::storage::BackingStore;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::{debug, warn};

impl Psarc {
    /// Open and read an archive file
    pub fn open<P: AsRef<Path>>(path: P, lazy: bool) -> Result<Self> {
        let file = BufReader::new(File::open(path)?);
        let mut archive = Self::new();
        archive.read(file, lazy)?;
        Ok(archive)
    }

    /// Parse an archive from `source`
    ///
    /// Any previous content is released first. The header, TOC and names are
    /// always read; entry payloads are inflated now unless `lazy` is set, in
    /// which case `source` is kept for [`Psarc::inflate_entry`].
    ///
    /// A source without the PSARC magic number leaves the archive empty and
    /// is not an error; check [`Psarc::header_valid`].
    pub fn read<R>(&mut self, mut source: R, lazy: bool) -> Result<()>
    where
        R: Read + Seek + Send + 'static,
    {
        self.clear();
        source.seek(SeekFrom::Start(0))?;

        let magic = source.read_u32_be()?;
        if magic != MAGIC_NUMBER {
            warn!("not a PSARC archive (magic {:#010x})", magic);
            self.header = Header {
                magic,
                ..Header::new()
            };
            return Ok(());
        }
        let header = Header::read_after_magic(magic, &mut source)?;
        if header.toc_entry_size as usize != TOC_ENTRY_SIZE {
            return Err(PsarcError::InvalidFormat(format!(
                "unsupported TOC entry size {}",
                header.toc_entry_size
            )));
        }

        let width = header.block_width()?;
        let block_count = header.block_count()?;

        let region_size = header.toc_region_size()?;
        let available = source.seek(SeekFrom::End(0))?.saturating_sub(HEADER_SIZE as u64);
        if region_size as u64 > available {
            return Err(PsarcError::InvalidFormat(format!(
                "TOC of {} bytes extends past the end of the archive",
                region_size
            )));
        }
        source.seek(SeekFrom::Start(HEADER_SIZE as u64))?;

        let mut region = vec![0u8; region_size];
        source.read_exact(&mut region)?;
        if header.toc_encrypted() {
            debug!("decrypting {} byte TOC", region.len());
            decrypt_toc_in_place(&mut region);
        }

        let mut cursor = Cursor::new(&region[..]);
        let mut entries = Vec::with_capacity(header.num_files as usize);
        for id in 0..header.num_files {
            entries.push(Entry::from_record(id, TocRecord::read_from(&mut cursor)?));
        }
        let block_sizes = BlockSizeTable::read_from(&mut cursor, block_count, width)?;

        match header.compression_method()? {
            CompressionMethod::Zlib => {}
            CompressionMethod::Lzma => return Err(PsarcError::UnsupportedCompression("lzma")),
        }

        debug!(
            "PSARC v{}.{}: {} records, {} blocks of {} bytes",
            header.version >> 16,
            header.version & 0xFFFF,
            header.num_files,
            block_sizes.len(),
            header.block_size
        );

        self.options.block_size = header.block_size;
        self.header = header;
        self.block_sizes = block_sizes;
        self.entries = entries;
        self.source = Some(Box::new(source));

        self.read_manifest()?;
        self.check_source_size()?;

        if !lazy {
            self.inflate_entries()?;
        }
        Ok(())
    }

    /// Inflate record 0, name the remaining records and drop the manifest
    fn read_manifest(&mut self) -> Result<()> {
        if self.entries.is_empty() {
            return Ok(());
        }

        let mut manifest = self.entries.remove(0);
        manifest.set_name(MANIFEST_NAME);
        let mut payload = Vec::new();
        let report = self.inflate_to(&manifest, &mut payload)?;
        if let Some(message) = report.message() {
            self.manifest_error = Some(message);
        }

        let named = assign_names(&mut self.entries, &payload);
        if named < self.entries.len() {
            warn!("manifest names {} of {} entries", named, self.entries.len());
        }
        Ok(())
    }

    fn check_source_size(&mut self) -> Result<()> {
        let required = self.required_size();
        if let Some(source) = self.source.as_mut() {
            let actual = source.seek(SeekFrom::End(0))?;
            if actual < required {
                warn!(
                    "archive is truncated: {} bytes present, {} required",
                    actual, required
                );
            }
        }
        Ok(())
    }

    /// Decode one entry's blocks into `dest`
    fn inflate_to<W: Write + ?Sized>(&mut self, entry: &Entry, dest: &mut W) -> Result<InflateReport> {
        let source = self.source.as_mut().ok_or(PsarcError::NoSource)?;
        inflate_from(
            source.as_mut(),
            &self.block_sizes,
            self.header.block_size,
            entry,
            dest,
        )
    }

    /// Inflate the entry at `index` into a fresh backing store
    ///
    /// The store kind follows [`ArchiveOptions::storage`](crate::ArchiveOptions).
    /// Corruption is recorded on the entry rather than returned; see
    /// [`Entry::error`].
    pub fn inflate_entry(&mut self, index: usize) -> Result<()> {
        let storage = self.options.storage;
        let block_size = self.header.block_size;
        let source = self.source.as_mut().ok_or(PsarcError::NoSource)?;
        let entry = self
            .entries
            .get_mut(index)
            .ok_or_else(|| PsarcError::EntryNotFound(format!("index {}", index)))?;

        let mut store: Box<dyn BackingStore> = storage.create()?;
        let report = inflate_from(source.as_mut(), &self.block_sizes, block_size, entry, &mut store)?;
        store.flush()?;
        store.seek(SeekFrom::Start(0))?;

        entry.store_data(store);
        match report.message() {
            Some(message) => entry.set_error(message),
            None => entry.clear_error(),
        }
        Ok(())
    }

    /// Inflate the first entry whose name ends with `suffix`, returning its index
    pub fn inflate_by_name(&mut self, suffix: &str) -> Result<usize> {
        let index = self
            .entries
            .iter()
            .position(|e| e.name().ends_with(suffix))
            .ok_or_else(|| PsarcError::EntryNotFound(suffix.to_string()))?;
        self.inflate_entry(index)?;
        Ok(index)
    }

    /// Inflate every entry
    pub fn inflate_entries(&mut self) -> Result<()> {
        for index in 0..self.entries.len() {
            self.inflate_entry(index)?;
        }
        Ok(())
    }

    /// Decode the entry at `index` straight into a file at `path`
    ///
    /// The entry keeps no backing store. Returns whether it decoded cleanly;
    /// corruption is recorded on the entry.
    pub fn extract_entry_to<P: AsRef<Path>>(&mut self, index: usize, path: P) -> Result<bool> {
        let block_size = self.header.block_size;
        let source = self.source.as_mut().ok_or(PsarcError::NoSource)?;
        let entry = self
            .entries
            .get_mut(index)
            .ok_or_else(|| PsarcError::EntryNotFound(format!("index {}", index)))?;

        let mut file = File::create(path)?;
        let report = inflate_from(source.as_mut(), &self.block_sizes, block_size, entry, &mut file)?;
        file.flush()?;

        match report.message() {
            Some(message) => {
                entry.set_error(message);
                Ok(false)
            }
            None => {
                entry.clear_error();
                Ok(true)
            }
        }
    }

    /// Payload of the entry at `index`, inflating it first if needed
    pub fn entry_data(&mut self, index: usize) -> Result<Vec<u8>> {
        let needs_inflate = self
            .entries
            .get(index)
            .map(|e| !e.has_data())
            .ok_or_else(|| PsarcError::EntryNotFound(format!("index {}", index)))?;
        if needs_inflate {
            self.inflate_entry(index)?;
        }
        self.entries[index].read_data()
    }
}

fn inflate_from<W: Write + ?Sized>(
    source: &mut dyn ArchiveSource,
    block_sizes: &BlockSizeTable,
    block_size: u32,
    entry: &Entry,
    dest: &mut W,
) -> Result<InflateReport> {
    debug!(
        "inflating '{}': {} bytes from offset {} (block {})",
        entry.name(),
        entry.length(),
        entry.offset(),
        entry.block_index()
    );
    if entry.length() > 0 {
        source.seek(SeekFrom::Start(entry.offset()))?;
    }

    let span = BlockSpan {
        name: entry.name(),
        block_index: entry.block_index(),
        length: entry.length(),
    };
    inflate_blocks(source, dest, block_sizes, block_size, span)
}
