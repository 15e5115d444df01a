//! AES helpers for PSARC archives
//!
//! Two independent modes are provided:
//!
//! - TOC stream cipher: AES-256 in 128-bit cipher-feedback mode with the fixed
//!   [`PSARC_KEY`] and a zero IV, no padding. Ciphertext has exactly the length
//!   of the plaintext, so the `TotalTOCSize` header field stays valid.
//! - Generic padded cipher: AES in ECB mode with a caller-supplied key, input
//!   zero-padded to a [`PADDING_BOUNDARY`] multiple.

use crate::binary::read_full;
use crate::error::{PsarcError, Result};
use aes::cipher::{AsyncStreamCipher, BlockDecryptMut, BlockEncryptMut, KeyInit, KeyIvInit};
use aes::{Aes256, Block};
use std::io::{self, Read, Write};

type TocEncryptor = cfb_mode::Encryptor<Aes256>;
type TocDecryptor = cfb_mode::Decryptor<Aes256>;
type FileEncryptor = ecb::Encryptor<Aes256>;
type FileDecryptor = ecb::Decryptor<Aes256>;

/// Key protecting the table of contents of encrypted archives
pub const PSARC_KEY: [u8; 32] = [
    0xC5, 0x3D, 0xB2, 0x38, 0x70, 0xA1, 0xA2, 0xF7, 0x1C, 0xAE, 0x64, 0x06, 0x1F, 0xDD, 0x0E, 0x11,
    0x57, 0x30, 0x9D, 0xC8, 0x52, 0x04, 0xD4, 0xC5, 0xBF, 0xDF, 0x25, 0x09, 0x0D, 0xF2, 0x57, 0x2C,
];

/// Cipher block size in bytes
pub const BLOCK_LEN: usize = 16;

/// Generic padded cipher rounds its output up to this many bytes
pub const PADDING_BOUNDARY: usize = 512;

const TOC_IV: [u8; BLOCK_LEN] = [0; BLOCK_LEN];

/// Encrypt a TOC region in place
///
/// A trailing partial block is XORed with the prefix of its keystream block.
pub fn encrypt_toc_in_place(data: &mut [u8]) {
    TocEncryptor::new(&PSARC_KEY.into(), &TOC_IV.into()).encrypt(data);
}

/// Decrypt a TOC region in place
pub fn decrypt_toc_in_place(data: &mut [u8]) {
    TocDecryptor::new(&PSARC_KEY.into(), &TOC_IV.into()).decrypt(data);
}

/// Read exactly `len` bytes from `input` and return them encrypted
pub fn encrypt_toc<R: Read>(input: &mut R, len: usize) -> io::Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    input.read_exact(&mut buf)?;
    encrypt_toc_in_place(&mut buf);
    Ok(buf)
}

/// Read exactly `len` bytes from `input` and return them decrypted
pub fn decrypt_toc<R: Read>(input: &mut R, len: usize) -> io::Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    input.read_exact(&mut buf)?;
    decrypt_toc_in_place(&mut buf);
    Ok(buf)
}

/// Encrypt the whole of `input` into `output` with AES-ECB
///
/// The plaintext is zero-padded up to the next multiple of
/// [`PADDING_BOUNDARY`]; input that is already aligned gets no padding.
/// Returns the number of bytes written.
pub fn encrypt_file<R: Read, W: Write>(input: &mut R, output: &mut W, key: &[u8]) -> Result<u64> {
    let mut cipher = FileEncryptor::new_from_slice(key).map_err(|_| invalid_key(key))?;
    ecb_stream(input, output, |block| cipher.encrypt_block_mut(block))
}

/// Decrypt the whole of `input` into `output` with AES-ECB
///
/// Padding added by [`encrypt_file`] is kept in the output; callers that know
/// the original length truncate it themselves.
pub fn decrypt_file<R: Read, W: Write>(input: &mut R, output: &mut W, key: &[u8]) -> Result<u64> {
    let mut cipher = FileDecryptor::new_from_slice(key).map_err(|_| invalid_key(key))?;
    ecb_stream(input, output, |block| cipher.decrypt_block_mut(block))
}

/// Padding needed to bring `len` up to a multiple of `boundary`
pub fn padding_len(len: u64, boundary: usize) -> usize {
    let rem = (len % boundary as u64) as usize;
    if rem == 0 {
        0
    } else {
        boundary - rem
    }
}

fn invalid_key(key: &[u8]) -> PsarcError {
    PsarcError::Crypto(format!(
        "invalid key length: expected 32 bytes, got {}",
        key.len()
    ))
}

fn ecb_stream<R, W, F>(input: &mut R, output: &mut W, mut apply: F) -> Result<u64>
where
    R: Read,
    W: Write,
    F: FnMut(&mut Block),
{
    let mut buffer = [0u8; PADDING_BOUNDARY];
    let mut plain_len = 0u64;
    let mut total = 0u64;

    loop {
        let filled = read_full(input, &mut buffer)?;
        if filled == 0 {
            break;
        }
        plain_len += filled as u64;
        let padded = filled + padding_len(plain_len, PADDING_BOUNDARY);
        buffer[filled..padded].fill(0);

        for block in buffer[..padded].chunks_exact_mut(BLOCK_LEN) {
            apply(Block::from_mut_slice(block));
        }
        output.write_all(&buffer[..padded])?;
        total += padded as u64;

        if filled < buffer.len() {
            break;
        }
    }

    output.flush()?;
    Ok(total)
}
