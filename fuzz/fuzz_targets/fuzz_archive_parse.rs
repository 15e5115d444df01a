#![no_main]

use libfuzzer_sys::fuzz_target;
use psarc_rs::Psarc;
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    // Parse lazily - should never panic
    let mut archive = Psarc::in_memory();
    if archive.read(Cursor::new(data.to_vec()), true).is_err() {
        return; // Expected for corrupted data
    }

    // Inflate each entry - corruption is recorded, never a panic
    for index in 0..archive.len() {
        let _ = archive.inflate_entry(index);
    }
    let _ = archive.error_report();
    let _ = archive.required_size();

    // Lookups should never panic
    let _ = archive.find("NamesBlock.bin");
    let _ = archive.inflate_by_name("");
    let _ = archive.inflate_by_name(".xml");
});
