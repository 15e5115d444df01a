//! Generate seed corpus for fuzzing

use psarc_rs::Psarc;
use std::fs;

fn write_seed(path: &str, files: &[(&str, &[u8])], encrypt: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut archive = Psarc::in_memory();
    for (name, data) in files {
        archive.add_bytes(*name, data)?;
    }
    archive.save(path, encrypt)?;
    println!("✓ Generated: {}", path);
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let corpus_dir = "fuzz/corpus/fuzz_archive_parse";
    fs::create_dir_all(corpus_dir)?;

    println!("Generating seed corpus...");

    // Seed 1: Empty archive (manifest only)
    write_seed(&format!("{}/seed_empty.psarc", corpus_dir), &[], false)?;

    // Seed 2: Single small file
    write_seed(
        &format!("{}/seed_single_small.psarc", corpus_dir),
        &[("test.txt", &b"Hello, World!"[..])],
        false,
    )?;

    // Seed 3: Multiple files with nested names
    write_seed(
        &format!("{}/seed_multi.psarc", corpus_dir),
        &[
            ("songs/arr/lead.xml", &b"<song>lead</song>"[..]),
            ("songs/arr/bass.xml", &b"<song>bass</song>"[..]),
            ("manifests/songs.json", &b"{}"[..]),
        ],
        false,
    )?;

    // Seed 4: Multi-block compressible file
    let large = b"This is test data for compression. ".repeat(4000);
    write_seed(
        &format!("{}/seed_large.psarc", corpus_dir),
        &[("large.txt", large.as_slice())],
        false,
    )?;

    // Seed 5: Binary data stored raw
    let binary: Vec<u8> = (0..=255).collect();
    write_seed(
        &format!("{}/seed_binary.psarc", corpus_dir),
        &[("binary.bin", binary.as_slice())],
        false,
    )?;

    // Seed 6: Encrypted TOC with an empty entry
    write_seed(
        &format!("{}/seed_encrypted.psarc", corpus_dir),
        &[("empty.txt", &b""[..]), ("data.txt", &b"encrypted toc"[..])],
        true,
    )?;

    println!("\nGenerated 6 seed files in {}", corpus_dir);
    Ok(())
}
