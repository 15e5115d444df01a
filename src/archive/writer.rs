use crate::archive::block::{compress_entry, BlockSizeTable, CompressedEntry};
use crate::archive::entry::{Entry, MANIFEST_NAME};
use crate::archive::format::{block_width, CompressionMethod, Header, HEADER_SIZE, TOC_ENTRY_SIZE};
use crate::archive::manifest::build_manifest;
use crate::archive::psarc::Psarc;
use crate::crypto;
use crate::error::{PsarcError, Result};
use crate::storage::MemoryStore;
use rayon::prelude::*;
use std::fs::OpenOptions;
use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::debug;

impl Psarc {
    /// Write the archive to a new file at `path`
    pub fn save<P: AsRef<Path>>(&mut self, path: P, encrypt_toc: bool) -> Result<u64> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        self.write(&mut file, encrypt_toc)
    }

    /// Write the archive into an in-memory buffer
    pub fn write_to_vec(&mut self, encrypt_toc: bool) -> Result<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        self.write(&mut cursor, encrypt_toc)?;
        Ok(cursor.into_inner())
    }

    /// Serialize the archive to `output`, returning the bytes written
    ///
    /// Layout: header, TOC records (manifest first), block-size table, then
    /// every entry's blocks in TOC order. Entries read lazily are inflated
    /// first. Every entry's backing store is released once its blocks are
    /// written, and the entry keeps the offsets of the new layout.
    ///
    /// With `encrypt_toc` the region between the header and the first data
    /// byte is re-read from `output` and overwritten encrypted, so `output`
    /// must be readable. `output` is left positioned at the end of the
    /// archive.
    pub fn write<W>(&mut self, output: &mut W, encrypt_toc: bool) -> Result<u64>
    where
        W: Read + Write + Seek,
    {
        let block_size = self.options.block_size;
        let level = self.options.compression_level;
        let width = block_width(block_size)?;

        if let Some(entry) = self.entries.iter().find(|e| e.name() == MANIFEST_NAME) {
            return Err(PsarcError::ReservedName(entry.name().to_string()));
        }
        self.ensure_data()?;
        for (i, entry) in self.entries.iter_mut().enumerate() {
            entry.set_id(i as u32 + 1);
            entry.update_digest();
        }

        let payload = build_manifest(self.entries.iter().map(Entry::name));
        let mut manifest = Entry::new(
            0,
            MANIFEST_NAME.to_string(),
            Box::new(MemoryStore::from_bytes(&payload)),
            payload.len() as u64,
        );

        let mut toc: Vec<&mut Entry> = std::iter::once(&mut manifest)
            .chain(self.entries.iter_mut())
            .collect();

        // Block payloads are independent, compress them in parallel
        let compressed: Vec<CompressedEntry> = toc
            .par_iter_mut()
            .map(|entry| compress_stored(entry, block_size, level))
            .collect::<Result<_>>()?;

        let mut block_sizes = BlockSizeTable::new();
        for (entry, packed) in toc.iter_mut().zip(&compressed) {
            entry.set_block_index(block_sizes.append(&packed.block_sizes)?);
            entry.set_length(packed.plain_len);
        }

        let total_toc_size = HEADER_SIZE + toc.len() * TOC_ENTRY_SIZE + block_sizes.len() * width;
        let mut offset = total_toc_size as u64;
        for (entry, packed) in toc.iter_mut().zip(&compressed) {
            entry.set_offset(offset);
            offset += packed.data.len() as u64;
        }

        let mut header = Header::new();
        header.version = self.options.version;
        header.compression = CompressionMethod::Zlib.tag();
        header.total_toc_size = u32::try_from(total_toc_size).map_err(|_| {
            PsarcError::InvalidFormat(format!("TOC of {} bytes does not fit the header", total_toc_size))
        })?;
        header.num_files = toc.len() as u32;
        header.block_size = block_size;
        header.set_toc_encrypted(encrypt_toc);

        debug!(
            "writing {} entries, {} blocks, TOC {} bytes",
            toc.len(),
            block_sizes.len(),
            total_toc_size
        );

        let base = output.stream_position()?;
        header.write_to(&mut *output)?;
        for entry in toc.iter() {
            entry.to_record().write_to(&mut *output)?;
        }
        block_sizes.write_to(&mut *output, width)?;

        for (entry, packed) in toc.iter_mut().zip(&compressed) {
            output.write_all(&packed.data)?;
            entry.take_data();
        }

        if encrypt_toc {
            let region_len = total_toc_size - HEADER_SIZE;
            output.flush()?;
            output.seek(SeekFrom::Start(base + HEADER_SIZE as u64))?;
            let encrypted = crypto::encrypt_toc(output, region_len)?;
            output.seek(SeekFrom::Start(base + HEADER_SIZE as u64))?;
            output.write_all(&encrypted)?;
            output.seek(SeekFrom::Start(base + offset))?;
            debug!("encrypted {} byte TOC", region_len);
        }
        output.flush()?;

        // Offsets now describe the new layout, the old source no longer applies
        self.source = None;
        self.header = header;
        self.block_sizes = block_sizes;
        Ok(offset)
    }

    /// Give every entry a backing store, inflating from the source if needed
    fn ensure_data(&mut self) -> Result<()> {
        for index in 0..self.entries.len() {
            if self.entries[index].has_data() {
                continue;
            }
            if self.source.is_none() {
                return Err(PsarcError::MissingData(self.entries[index].name().to_string()));
            }
            self.inflate_entry(index)?;
        }
        Ok(())
    }
}

fn compress_stored(entry: &mut Entry, block_size: u32, level: u32) -> Result<CompressedEntry> {
    let name = entry.name().to_string();
    let store = entry.data_mut().ok_or(PsarcError::MissingData(name))?;
    store.seek(SeekFrom::Start(0))?;
    compress_entry(store, block_size, level)
}
