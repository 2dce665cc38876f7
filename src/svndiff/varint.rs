// svndiff variable-length integer encoding.
//
// Base-128, big-endian: most-significant group first.
// Each byte has bit 7 set except the final byte.

use std::io::{self, Read, Write};

use super::error::DeltaError;

/// Maximum encoded length for a 64-bit value (ceil(64/7) = 10).
pub const MAX_VARINT_LEN: usize = 10;

/// Overflow guard for the 64-bit accumulator: if any of these bits are set
/// before a shift, the next `<< 7` would drop significant bits.
const U64_OVERFLOW_MASK: u64 = 0xFE00_0000_0000_0000;

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encode `num` into the tail of `buf`.
/// Returns the number of bytes written (1..=10); the encoding occupies
/// `buf[MAX_VARINT_LEN - len..]`.
#[inline]
pub fn encode_u64(mut num: u64, buf: &mut [u8; MAX_VARINT_LEN]) -> usize {
    let mut i = MAX_VARINT_LEN;
    loop {
        i -= 1;
        buf[i] = (num as u8 & 0x7F) | 0x80;
        num >>= 7;
        if num == 0 {
            break;
        }
    }
    buf[MAX_VARINT_LEN - 1] &= 0x7F; // clear MSB on last byte
    MAX_VARINT_LEN - i
}

/// Append the encoding of `num` to an in-memory buffer.
#[inline]
pub fn append_u64(out: &mut Vec<u8>, num: u64) {
    let mut buf = [0u8; MAX_VARINT_LEN];
    let len = encode_u64(num, &mut buf);
    out.extend_from_slice(&buf[MAX_VARINT_LEN - len..]);
}

/// Encode a `u64` and write to a `Write` sink.
pub fn write_u64<W: Write>(w: &mut W, num: u64) -> io::Result<()> {
    let mut buf = [0u8; MAX_VARINT_LEN];
    let len = encode_u64(num, &mut buf);
    w.write_all(&buf[MAX_VARINT_LEN - len..])
}

// ---------------------------------------------------------------------------
// Decoding from byte slices
// ---------------------------------------------------------------------------

/// Decode a `u64` from the front of `data`.
/// Returns `(value, bytes_consumed)`.
pub fn read_u64(data: &[u8]) -> Result<(u64, usize), DeltaError> {
    let mut val: u64 = 0;
    for (i, &byte) in data.iter().enumerate() {
        if val & U64_OVERFLOW_MASK != 0 {
            return Err(DeltaError::Overflow("varint exceeds 64 bits"));
        }
        val = (val << 7) | u64::from(byte & 0x7F);
        if byte & 0x80 == 0 {
            return Ok((val, i + 1));
        }
    }
    Err(DeltaError::format("truncated varint"))
}

// ---------------------------------------------------------------------------
// Decoding from `Read` (streaming)
// ---------------------------------------------------------------------------

/// Read a `u64` varint from a streaming source.
///
/// Returns `Ok(None)` when the reader is exhausted before the first byte,
/// which is how the end of a window sequence shows up. Running out of input
/// after the first byte is a format error.
pub fn stream_read_u64<R: Read>(r: &mut R) -> Result<Option<u64>, DeltaError> {
    let mut val: u64 = 0;
    let mut buf = [0u8; 1];
    let mut first = true;
    loop {
        let n = read_byte(r, &mut buf)?;
        if n == 0 {
            if first {
                return Ok(None);
            }
            return Err(DeltaError::format("truncated varint"));
        }
        first = false;
        let byte = buf[0];
        if val & U64_OVERFLOW_MASK != 0 {
            return Err(DeltaError::Overflow("varint exceeds 64 bits"));
        }
        val = (val << 7) | u64::from(byte & 0x7F);
        if byte & 0x80 == 0 {
            return Ok(Some(val));
        }
    }
}

/// Read a varint that must be present and fit in `usize`.
pub fn stream_read_usize<R: Read>(r: &mut R) -> Result<usize, DeltaError> {
    let val = stream_read_u64(r)?.ok_or_else(|| DeltaError::format("truncated window header"))?;
    usize::try_from(val).map_err(|_| DeltaError::Overflow("varint exceeds usize"))
}

fn read_byte<R: Read>(r: &mut R, buf: &mut [u8; 1]) -> Result<usize, DeltaError> {
    loop {
        match r.read(buf) {
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Return the encoded byte-length of a `u64` value.
#[inline]
pub fn sizeof_u64(num: u64) -> usize {
    let bits = 64 - num.leading_zeros();
    (bits.max(1).div_ceil(7) as usize).min(MAX_VARINT_LEN)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
