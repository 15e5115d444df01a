//! Name manifest
//!
//! Entry names are not stored in the TOC records. Instead the first entry of
//! every archive, [`MANIFEST_NAME`](crate::archive::MANIFEST_NAME), holds the
//! names of all other entries in TOC order, separated by line feeds and without
//! a trailing separator.

use crate::archive::entry::Entry;
use rayon::prelude::*;

/// Manifest payload for the given names
pub fn build_manifest<'a, I>(names: I) -> Vec<u8>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut payload = Vec::new();
    for (i, name) in names.into_iter().enumerate() {
        if i > 0 {
            payload.push(b'\n');
        }
        payload.extend_from_slice(name.as_bytes());
    }
    payload
}

/// Split a manifest payload into names
pub fn parse_manifest(payload: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(payload)
        .split('\n')
        .map(str::to_string)
        .collect()
}

/// Name `entries` from a manifest payload, line `i` naming entry `i`
///
/// Lines beyond the entry count are ignored; entries beyond the line count
/// keep their current name. Returns how many entries were named.
pub fn assign_names(entries: &mut [Entry], payload: &[u8]) -> usize {
    let names = parse_manifest(payload);
    entries
        .par_iter_mut()
        .zip(names.into_par_iter())
        .map(|(entry, name)| entry.set_name(name))
        .count()
}
