//! Encryption tests
//!
//! Covers TOC encryption on write and transparent decryption on read, plus
//! the standalone AES file cipher.

use psarc_rs::crypto::{decrypt_file, decrypt_toc_in_place, encrypt_file, PADDING_BOUNDARY};
use psarc_rs::{Header, Psarc, PsarcError, HEADER_SIZE};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io::Cursor;
use tempfile::NamedTempFile;

fn sample_files() -> Vec<(&'static str, Vec<u8>)> {
    vec![
        ("songs/arr/lead.sng", b"lead arrangement ".repeat(3000)),
        ("songs/arr/bass.sng", b"bass arrangement ".repeat(3000)),
        ("appid.appid", b"248750".to_vec()),
    ]
}

fn write_sample(encrypt: bool) -> Vec<u8> {
    let mut archive = Psarc::in_memory();
    for (name, data) in sample_files() {
        archive.add_bytes(name, &data).unwrap();
    }
    archive.write_to_vec(encrypt).unwrap()
}

#[test]
fn test_encrypted_toc_roundtrip() {
    let bytes = write_sample(true);

    let mut archive = Psarc::in_memory();
    archive.read(Cursor::new(bytes), false).unwrap();
    assert!(archive.header().toc_encrypted());
    assert!(archive.error_report().is_none());

    for (index, (name, data)) in sample_files().into_iter().enumerate() {
        let entry = &mut archive.entries_mut()[index];
        assert_eq!(entry.name(), name);
        assert_eq!(entry.read_data().unwrap(), data);
    }
}

#[test]
fn test_only_toc_region_differs() {
    let plain = write_sample(false);
    let encrypted = write_sample(true);
    assert_eq!(plain.len(), encrypted.len());

    let header = Header::read_from(&encrypted[..]).unwrap();
    let toc_end = header.total_toc_size as usize;

    // Header differs only in the flags word
    assert_eq!(&plain[..28], &encrypted[..28]);
    assert_eq!(&encrypted[28..32], &[0, 0, 0, 4]);

    assert_ne!(&plain[HEADER_SIZE..toc_end], &encrypted[HEADER_SIZE..toc_end]);
    assert_eq!(&plain[toc_end..], &encrypted[toc_end..]);

    let mut region = encrypted[HEADER_SIZE..toc_end].to_vec();
    decrypt_toc_in_place(&mut region);
    assert_eq!(&region[..], &plain[HEADER_SIZE..toc_end]);
}

#[test]
fn test_encrypted_archive_on_disk() {
    let temp_file = NamedTempFile::new().unwrap();
    {
        let mut archive = Psarc::in_memory();
        archive.add_bytes("a.txt", b"alpha").unwrap();
        archive.save(temp_file.path(), true).unwrap();
    }

    let mut archive = Psarc::open(temp_file.path(), false).unwrap();
    assert_eq!(archive.entries()[0].name(), "a.txt");
    assert_eq!(archive.entries_mut()[0].read_data().unwrap(), b"alpha");
}

#[test]
fn test_reencrypt_after_read() {
    let bytes = write_sample(true);

    let mut archive = Psarc::in_memory();
    archive.read(Cursor::new(bytes.clone()), false).unwrap();
    let rewritten = archive.write_to_vec(true).unwrap();
    assert_eq!(bytes, rewritten);
}

#[test]
fn test_file_cipher_roundtrip() {
    let key = [0x5Au8; 32];
    let mut rng = StdRng::seed_from_u64(42);
    let mut plain = vec![0u8; 1300];
    rng.fill(&mut plain[..]);

    let mut encrypted = Vec::new();
    let written = encrypt_file(&mut &plain[..], &mut encrypted, &key).unwrap();
    assert_eq!(written, 1536);
    assert_eq!(encrypted.len() % PADDING_BOUNDARY, 0);

    let mut decrypted = Vec::new();
    decrypt_file(&mut &encrypted[..], &mut decrypted, &key).unwrap();
    assert_eq!(&decrypted[..plain.len()], &plain[..]);
    assert!(decrypted[plain.len()..].iter().all(|&b| b == 0));
}

#[test]
fn test_file_cipher_aligned_input_not_padded() {
    let key = [0x11u8; 32];
    let plain = vec![0x33u8; PADDING_BOUNDARY * 2];

    let mut encrypted = Vec::new();
    encrypt_file(&mut &plain[..], &mut encrypted, &key).unwrap();
    assert_eq!(encrypted.len(), plain.len());
}

#[test]
fn test_file_cipher_rejects_short_key() {
    let mut out = Vec::new();
    let result = encrypt_file(&mut &b"data"[..], &mut out, &[0u8; 16]);
    assert!(matches!(result, Err(PsarcError::Crypto(_))));
}
