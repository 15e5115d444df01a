//! Integration tests for psarc-rs
//!
//! Archives are written through the public API and read back, from memory and
//! from files on disk.

use psarc_rs::archive::{block_width, parse_manifest};
use psarc_rs::{
    ArchiveOptions, Header, MemoryStore, Psarc, PsarcError, StorageMode, TempFileStore,
    DEFAULT_BLOCK_SIZE, MANIFEST_NAME,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io::{Cursor, Write};
use tempfile::NamedTempFile;

/// Helper: deterministic pseudo-random payload
fn random_bytes(seed: u64, len: usize) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = vec![0u8; len];
    rng.fill(&mut data[..]);
    data
}

/// Helper: write `files` and read the result back eagerly
fn roundtrip(files: &[(&str, Vec<u8>)], encrypt: bool) -> Psarc {
    let mut archive = Psarc::in_memory();
    for (name, data) in files {
        archive.add_bytes(*name, data).unwrap();
    }
    let bytes = archive.write_to_vec(encrypt).unwrap();

    let mut read = Psarc::in_memory();
    read.read(Cursor::new(bytes), false).unwrap();
    read
}

#[test]
fn test_basic_archive_roundtrip() {
    let files = vec![
        ("songs/arr/intro_lead.xml", b"<song>lead</song>".to_vec()),
        ("manifests/songs/intro.json", b"{\"Entries\":{}}".to_vec()),
        ("gfxassets/album_art/intro_256.dds", random_bytes(1, 4096)),
    ];

    let mut archive = roundtrip(&files, false);
    assert_eq!(archive.len(), files.len());
    assert!(archive.error_report().is_none());

    for (index, (name, data)) in files.iter().enumerate() {
        let entry = &mut archive.entries_mut()[index];
        assert_eq!(entry.name(), *name);
        assert_eq!(entry.id(), index as u32 + 1);
        assert_eq!(entry.length(), data.len() as u64);
        assert_eq!(&entry.read_data().unwrap(), data);
    }
}

#[test]
fn test_two_entry_example_layout() {
    let mut archive = Psarc::in_memory();
    archive.add_bytes("a", b"hello").unwrap();
    archive.add_bytes("b", b"").unwrap();
    let bytes = archive.write_to_vec(false).unwrap();

    let header = Header::read_from(&bytes[..]).unwrap();
    assert_eq!(header.num_files, 3);
    assert_eq!(header.block_size, DEFAULT_BLOCK_SIZE);
    assert_eq!(header.toc_entry_size, 30);

    // Manifest record: zero digest, first block, 3 bytes "a\nb"
    let manifest = &bytes[32..62];
    assert_eq!(&manifest[..16], &[0u8; 16]);
    assert_eq!(&manifest[16..20], &[0, 0, 0, 0]);
    assert_eq!(&manifest[20..25], &[0, 0, 0, 0, 3]);

    let mut read = Psarc::in_memory();
    read.read(Cursor::new(bytes), false).unwrap();
    assert_eq!(read.len(), 2);
    assert_eq!(read.entries_mut()[0].read_data().unwrap(), b"hello");
    assert_eq!(read.entries()[1].length(), 0);
    assert!(read.entries_mut()[1].read_data().unwrap().is_empty());
}

#[test]
fn test_manifest_not_listed() {
    let files = vec![("a.txt", b"alpha".to_vec()), ("b.txt", b"beta".to_vec())];
    let archive = roundtrip(&files, false);

    assert!(archive.entries().iter().all(|e| e.name() != MANIFEST_NAME));
    assert!(archive.find(MANIFEST_NAME).is_none());
}

#[test]
fn test_manifest_payload_on_disk() {
    let mut archive = Psarc::in_memory();
    archive.add_bytes("x/one", b"1").unwrap();
    archive.add_bytes("x/two", b"2").unwrap();
    let bytes = archive.write_to_vec(false).unwrap();

    // Manifest is the first data block: compressed or raw, it decodes to the names
    let header = Header::read_from(&bytes[..]).unwrap();
    let mut reread = Psarc::in_memory();
    reread.read(Cursor::new(bytes.clone()), true).unwrap();
    let start = header.total_toc_size as usize;
    let first_entry = reread.entries()[0].offset() as usize;
    let stored = &bytes[start..first_entry];
    let names = if stored.len() == "x/one\nx/two".len() {
        parse_manifest(stored)
    } else {
        let mut decoder = flate2::read::ZlibDecoder::new(stored);
        let mut plain = Vec::new();
        std::io::Read::read_to_end(&mut decoder, &mut plain).unwrap();
        parse_manifest(&plain)
    };
    assert_eq!(names, ["x/one", "x/two"]);
}

#[test]
fn test_digests_are_md5_of_names() {
    let files = vec![("songs/a.sng", b"a".to_vec())];
    let archive = roundtrip(&files, false);

    assert_eq!(
        archive.entries()[0].digest(),
        &md5::compute(b"songs/a.sng").0
    );
}

#[test]
fn test_rewrite_is_identical() {
    let files = vec![
        ("one", random_bytes(2, 100_000)),
        ("two", b"repeat ".repeat(20_000)),
        ("three", Vec::new()),
    ];
    let mut archive = Psarc::in_memory();
    for (name, data) in &files {
        archive.add_bytes(*name, data).unwrap();
    }
    let first = archive.write_to_vec(false).unwrap();

    let mut read = Psarc::in_memory();
    read.read(Cursor::new(first.clone()), false).unwrap();
    let second = read.write_to_vec(false).unwrap();

    assert_eq!(first, second);
}

#[test]
fn test_lazy_rewrite_inflates_from_source() {
    let files = vec![("a", b"alpha".to_vec()), ("b", random_bytes(3, 70_000))];
    let mut archive = Psarc::in_memory();
    for (name, data) in &files {
        archive.add_bytes(*name, data).unwrap();
    }
    let first = archive.write_to_vec(false).unwrap();

    let mut lazy = Psarc::in_memory();
    lazy.read(Cursor::new(first.clone()), true).unwrap();
    assert!(lazy.entries().iter().all(|e| !e.has_data()));

    let second = lazy.write_to_vec(false).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_boundary_sizes() {
    let block = DEFAULT_BLOCK_SIZE as usize;
    let files = vec![
        ("empty", Vec::new()),
        ("one_byte", vec![0x42]),
        ("block_minus_one", random_bytes(4, block - 1)),
        ("exact_block", random_bytes(5, block)),
        ("block_plus_one", random_bytes(6, block + 1)),
        ("three_blocks", b"abc".repeat(block)),
    ];

    let mut archive = roundtrip(&files, false);
    assert!(archive.error_report().is_none());
    for (index, (_, data)) in files.iter().enumerate() {
        assert_eq!(&archive.entries_mut()[index].read_data().unwrap(), data);
    }
}

#[test]
fn test_exact_block_of_random_data_is_stored_raw() {
    let block = DEFAULT_BLOCK_SIZE as usize;
    let mut archive = Psarc::in_memory();
    archive.add_bytes("raw.bin", &random_bytes(7, block)).unwrap();
    archive.write_to_vec(false).unwrap();

    // Manifest block first, then the single full raw block recorded as 0
    assert_eq!(archive.block_sizes().len(), 2);
    assert_eq!(archive.block_sizes().get(1), Some(0));
}

#[test]
fn test_file_roundtrip_with_temp_file_storage() {
    let temp_file = NamedTempFile::new().unwrap();
    let payload = random_bytes(8, 200_000);

    {
        let mut archive = Psarc::new();
        archive.add_bytes("audio/song.wem", &payload).unwrap();
        archive.add_bytes("audio/preview.wem", &payload[..1000]).unwrap();
        archive.save(temp_file.path(), false).unwrap();
    }

    let mut archive = Psarc::open(temp_file.path(), false).unwrap();
    assert_eq!(archive.options().storage, StorageMode::TempFile);
    assert_eq!(archive.len(), 2);
    assert_eq!(archive.entries_mut()[0].read_data().unwrap(), payload);
    assert_eq!(archive.entries_mut()[1].read_data().unwrap(), &payload[..1000]);
}

#[test]
fn test_caller_supplied_stores() {
    let mut temp = TempFileStore::new().unwrap();
    temp.write_all(b"from a temp file").unwrap();

    let mut memory = MemoryStore::new();
    memory.write_all(b"from memory").unwrap();

    let mut archive = Psarc::in_memory();
    archive.add_entry("temp.txt", temp).unwrap();
    archive.add_entry("memory.txt", memory).unwrap();
    archive.add_entry("cursor.txt", Cursor::new(b"from a cursor".to_vec())).unwrap();
    let bytes = archive.write_to_vec(false).unwrap();

    let mut read = Psarc::in_memory();
    read.read(Cursor::new(bytes), false).unwrap();
    assert_eq!(read.entries_mut()[0].read_data().unwrap(), b"from a temp file");
    assert_eq!(read.entries_mut()[1].read_data().unwrap(), b"from memory");
    assert_eq!(read.entries_mut()[2].read_data().unwrap(), b"from a cursor");
}

#[test]
fn test_extract_entry_to_file() {
    let payload = random_bytes(9, 150_000);
    let mut archive = Psarc::in_memory();
    archive.add_bytes("big.bin", &payload).unwrap();
    let bytes = archive.write_to_vec(false).unwrap();

    let mut read = Psarc::in_memory();
    read.read(Cursor::new(bytes), true).unwrap();

    let out = NamedTempFile::new().unwrap();
    assert!(read.extract_entry_to(0, out.path()).unwrap());
    assert_eq!(std::fs::read(out.path()).unwrap(), payload);
    assert!(!read.entries()[0].has_data());
}

#[test]
fn test_large_block_size() {
    let options = ArchiveOptions::default()
        .with_block_size(16_777_216)
        .with_storage(StorageMode::Memory);
    assert_eq!(block_width(options.block_size).unwrap(), 3);

    let payload = b"sixteen megabyte blocks ".repeat(1000);
    let mut archive = Psarc::with_options(options.clone()).unwrap();
    archive.add_bytes("big_blocks.txt", &payload).unwrap();
    let bytes = archive.write_to_vec(false).unwrap();

    let header = Header::read_from(&bytes[..]).unwrap();
    assert_eq!(header.block_size, 16_777_216);
    // Two records and two 3-byte table values
    assert_eq!(header.total_toc_size, 32 + 2 * 30 + 2 * 3);

    let mut read = Psarc::with_options(options).unwrap();
    read.read(Cursor::new(bytes), false).unwrap();
    assert_eq!(read.entries_mut()[0].read_data().unwrap(), payload);
}

#[test]
fn test_options_from_toml() {
    let options = ArchiveOptions::from_toml_str(
        r#"
        storage = "memory"
        compression_level = 7
        "#,
    )
    .unwrap();

    let mut archive = Psarc::with_options(options).unwrap();
    let payload = b"level seven ".repeat(5000);
    archive.add_bytes("seven.txt", &payload).unwrap();
    let bytes = archive.write_to_vec(false).unwrap();

    // Every accepted level writes the marker the reader expects
    let offset = archive.entries()[0].offset() as usize;
    assert_eq!(&bytes[offset..offset + 2], &[0x78, 0xDA]);
    let mut read = Psarc::in_memory();
    read.read(Cursor::new(bytes), false).unwrap();
    assert_eq!(read.entries_mut()[0].read_data().unwrap(), payload);
}

#[test]
fn test_empty_archive() {
    let mut archive = Psarc::in_memory();
    let bytes = archive.write_to_vec(false).unwrap();

    let header = Header::read_from(&bytes[..]).unwrap();
    assert_eq!(header.num_files, 1);
    assert_eq!(bytes.len(), 32 + 30);

    let mut read = Psarc::in_memory();
    read.read(Cursor::new(bytes), false).unwrap();
    assert!(read.header_valid());
    assert!(read.is_empty());
}

#[test]
fn test_reserved_name_rejected() {
    let mut archive = Psarc::in_memory();
    assert!(matches!(
        archive.add_bytes(MANIFEST_NAME, b"names"),
        Err(PsarcError::ReservedName(_))
    ));
}

#[test]
fn test_renamed_entry_gets_new_digest() {
    let mut archive = Psarc::in_memory();
    archive.add_bytes("old/name.txt", b"data").unwrap();
    let bytes = archive.write_to_vec(false).unwrap();

    let mut read = Psarc::in_memory();
    read.read(Cursor::new(bytes), false).unwrap();
    read.entries_mut()[0].set_name("new/name.txt");
    let bytes = read.write_to_vec(false).unwrap();

    let mut reread = Psarc::in_memory();
    reread.read(Cursor::new(bytes), false).unwrap();
    assert_eq!(reread.entries()[0].name(), "new/name.txt");
    assert_eq!(reread.entries()[0].digest(), &md5::compute(b"new/name.txt").0);
}
