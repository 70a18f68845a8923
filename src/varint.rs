//! Variable-length unsigned integers.
//!
//! Each byte carries 7 data bits, least significant group first; the high
//! bit is set when more bytes follow. Used for field dimensions and for the
//! overflow channel of the frequency-table codec.

use std::io::{ErrorKind, Read, Write};

use crate::error::{Error, Result};

/// Longest encoding of a `u64`.
const MAX_VARINT_LEN: usize = 10;

/// Write `value` as a varint.
pub fn write_u64<W: Write>(out: &mut W, mut value: u64) -> Result<()> {
    let mut buf = [0u8; MAX_VARINT_LEN];
    let mut len = 0;
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            buf[len] = byte;
            len += 1;
            break;
        }
        buf[len] = byte | 0x80;
        len += 1;
    }
    out.write_all(&buf[..len])?;
    Ok(())
}

/// Write a `u32` as a varint.
pub fn write_u32<W: Write>(out: &mut W, value: u32) -> Result<()> {
    write_u64(out, u64::from(value))
}

/// Read a varint-encoded `u64`.
///
/// # Errors
/// Returns `Error::MalformedStream` if the input ends mid-value or the value
/// does not fit in 64 bits.
pub fn read_u64<R: Read>(input: &mut R) -> Result<u64> {
    let mut result = 0u64;
    let mut shift = 0u32;
    let mut byte = [0u8; 1];

    for _ in 0..MAX_VARINT_LEN {
        match input.read_exact(&mut byte) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                return Err(Error::MalformedStream("truncated varint"));
            }
            Err(e) => return Err(e.into()),
        }

        let data = u64::from(byte[0] & 0x7F);
        if shift == 63 && data > 1 {
            return Err(Error::MalformedStream("varint overflows 64 bits"));
        }
        result |= data << shift;

        if byte[0] & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
    }

    Err(Error::MalformedStream("varint too long"))
}

/// Read a varint-encoded `u32`.
pub fn read_u32<R: Read>(input: &mut R) -> Result<u32> {
    let value = read_u64(input)?;
    u32::try_from(value).map_err(|_| Error::MalformedStream("varint overflows 32 bits"))
}
