//! LEB128 varints as protobuf uses them.
//!
//! Every writer takes `(buffer, cursor)` and returns the advanced cursor. The
//! destination range is checked before the first byte is stored, so a failed
//! write leaves the buffer untouched.

use crate::error::EncodeError;

/// Widest possible encoding of a `u64`.
pub const MAX_VARINT_LEN: usize = 10;

/// Width of the padded length varint used by reserved protobuf headers.
pub const PADDED_VARINT_LEN: usize = 3;

/// Largest value a [`PADDED_VARINT_LEN`]-byte varint can carry (21 bits).
pub const PADDED_VARINT_MAX: usize = (1 << (7 * PADDED_VARINT_LEN)) - 1;

/// Number of bytes `value` occupies once varint encoded, between 1 and 10.
#[inline]
pub const fn varint_len(value: u64) -> usize {
    // https://github.com/google/protobuf/blob/3.3.x/src/google/protobuf/io/coded_stream.h#L1301-L1309
    ((((value | 1).leading_zeros() ^ 63) * 9 + 73) / 64) as usize
}

#[inline]
fn check(buf: &[u8], cursor: usize, len: usize) -> Result<(), EncodeError> {
    match cursor.checked_add(len) {
        Some(end) if end <= buf.len() => Ok(()),
        _ => Err(EncodeError::overflow(cursor, len, buf.len())),
    }
}

pub fn write_varint(buf: &mut [u8], cursor: usize, mut value: u64) -> Result<usize, EncodeError> {
    check(buf, cursor, varint_len(value))?;
    let mut pos = cursor;
    while value >= 0x80 {
        buf[pos] = (value as u8 & 0x7F) | 0x80;
        value >>= 7;
        pos += 1;
    }
    buf[pos] = value as u8;
    Ok(pos + 1)
}

/// Writes `value` as exactly three varint bytes. The first two carry the
/// continuation bit even when their payload is zero, which decoders accept as
/// a non-minimal encoding of the same value.
pub fn write_padded_varint3(
    buf: &mut [u8],
    cursor: usize,
    value: usize,
) -> Result<usize, EncodeError> {
    if value > PADDED_VARINT_MAX {
        return Err(EncodeError::LengthOverflow(value));
    }
    check(buf, cursor, PADDED_VARINT_LEN)?;
    buf[cursor] = (value as u8 & 0x7F) | 0x80;
    buf[cursor + 1] = ((value >> 7) as u8 & 0x7F) | 0x80;
    buf[cursor + 2] = (value >> 14) as u8 & 0x7F;
    Ok(cursor + PADDED_VARINT_LEN)
}

/// Zigzag mapping for `sint32`/`sint64` fields.
#[inline]
pub const fn zigzag(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Decodes one varint, returning the value and the cursor after it.
/// `None` when the input ends early or the varint is longer than ten bytes.
pub fn read_varint(buf: &[u8], cursor: usize) -> Option<(u64, usize)> {
    let mut value = 0u64;
    for (i, byte) in buf.get(cursor..)?.iter().take(MAX_VARINT_LEN).enumerate() {
        value |= u64::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            return Some((value, cursor + i + 1));
        }
    }
    None
}
