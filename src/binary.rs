//! Big-endian integer primitives
//!
//! PSARC stores every multi-byte integer most-significant byte first. Besides
//! the usual widths it uses 24-bit values (block-size table for 16 MiB blocks)
//! and 40-bit values (entry length and offset).

use std::io::{self, Read, Write};

/// Largest value representable in 24 bits
pub const U24_MAX: u32 = 0x00FF_FFFF;

/// Largest value representable in 40 bits
pub const U40_MAX: u64 = 0x00FF_FFFF_FFFF;

/// Big-endian readers for any [`Read`]
pub trait ReadBigEndian: Read {
    fn read_u8_be(&mut self) -> io::Result<u8> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    fn read_u16_be(&mut self) -> io::Result<u16> {
        let mut buf = [0u8; 2];
        self.read_exact(&mut buf)?;
        Ok(u16::from_be_bytes(buf))
    }

    fn read_u24_be(&mut self) -> io::Result<u32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf[1..])?;
        Ok(u32::from_be_bytes(buf))
    }

    fn read_u32_be(&mut self) -> io::Result<u32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }

    fn read_u40_be(&mut self) -> io::Result<u64> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf[3..])?;
        Ok(u64::from_be_bytes(buf))
    }

    fn read_u64_be(&mut self) -> io::Result<u64> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf)?;
        Ok(u64::from_be_bytes(buf))
    }

    /// Read an unsigned integer stored in `width` bytes (1..=4)
    fn read_uint_be(&mut self, width: usize) -> io::Result<u32> {
        match width {
            1 => self.read_u8_be().map(u32::from),
            2 => self.read_u16_be().map(u32::from),
            3 => self.read_u24_be(),
            4 => self.read_u32_be(),
            _ => Err(invalid_width(width)),
        }
    }
}

impl<R: Read + ?Sized> ReadBigEndian for R {}

/// Big-endian writers for any [`Write`]
///
/// The 24- and 40-bit writers reject values that do not fit instead of
/// silently truncating them.
pub trait WriteBigEndian: Write {
    fn write_u8_be(&mut self, value: u8) -> io::Result<()> {
        self.write_all(&[value])
    }

    fn write_u16_be(&mut self, value: u16) -> io::Result<()> {
        self.write_all(&value.to_be_bytes())
    }

    fn write_u24_be(&mut self, value: u32) -> io::Result<()> {
        if value > U24_MAX {
            return Err(overflow(u64::from(value), 24));
        }
        self.write_all(&value.to_be_bytes()[1..])
    }

    fn write_u32_be(&mut self, value: u32) -> io::Result<()> {
        self.write_all(&value.to_be_bytes())
    }

    fn write_u40_be(&mut self, value: u64) -> io::Result<()> {
        if value > U40_MAX {
            return Err(overflow(value, 40));
        }
        self.write_all(&value.to_be_bytes()[3..])
    }

    fn write_u64_be(&mut self, value: u64) -> io::Result<()> {
        self.write_all(&value.to_be_bytes())
    }

    /// Write an unsigned integer into `width` bytes (1..=4)
    fn write_uint_be(&mut self, value: u32, width: usize) -> io::Result<()> {
        match width {
            1 => {
                let byte = u8::try_from(value).map_err(|_| overflow(u64::from(value), 8))?;
                self.write_u8_be(byte)
            }
            2 => {
                let short = u16::try_from(value).map_err(|_| overflow(u64::from(value), 16))?;
                self.write_u16_be(short)
            }
            3 => self.write_u24_be(value),
            4 => self.write_u32_be(value),
            _ => Err(invalid_width(width)),
        }
    }
}

impl<W: Write + ?Sized> WriteBigEndian for W {}

/// Fill `buf` from `reader` until it is full or the reader is exhausted
///
/// Returns the number of bytes read, which is short only at end of input.
pub fn read_full<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn overflow(value: u64, bits: u32) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("value {} does not fit in {} bits", value, bits),
    )
}

fn invalid_width(width: usize) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("unsupported integer width: {} bytes", width),
    )
}
