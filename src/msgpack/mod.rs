//! MessagePack encoding of Fluentd Forward entries.
//!
//! Each record becomes one self-contained envelope:
//!
//! ```text
//! [ tableName, [ [ timestamp, { field map } ] ], { "TimeFormat": "DateTime" } ]
//! ```
//!
//! The field map header is reserved as a Map16 before any field is written and
//! backpatched with the real count once the record is complete.

mod log;
mod span;
mod template;

pub use log::LogSerializer;
pub use span::SpanSerializer;
pub use template::RecordTemplate;

use crate::codec::{EncodeBuffer, Reservation};
use crate::data::FieldValue;
use crate::error::EncodeError;
use std::time::SystemTime;

const NIL: u8 = 0xC0;
const FALSE: u8 = 0xC2;
const TRUE: u8 = 0xC3;
const EXT8: u8 = 0xC7;
const FLOAT64: u8 = 0xCB;
const UINT8: u8 = 0xCC;
const UINT16: u8 = 0xCD;
const UINT32: u8 = 0xCE;
const UINT64: u8 = 0xCF;
const INT8: u8 = 0xD0;
const INT16: u8 = 0xD1;
const INT32: u8 = 0xD2;
const INT64: u8 = 0xD3;
const STR8: u8 = 0xD9;
const STR16: u8 = 0xDA;
const STR32: u8 = 0xDB;
const ARRAY16: u8 = 0xDC;
const ARRAY32: u8 = 0xDD;
const FIXMAP: u8 = 0x80;
const FIXARRAY: u8 = 0x90;
const FIXSTR: u8 = 0xA0;

/// Extension type of the MessagePack timestamp.
const TIMESTAMP_EXT_TYPE: u8 = 0xFF;
/// Payload size of the 96-bit timestamp form.
const TIMESTAMP96_LEN: u8 = 12;

pub(crate) fn write_nil(buf: &mut EncodeBuffer) -> Result<(), EncodeError> {
    buf.write_u8(NIL)
}

pub(crate) fn write_bool(buf: &mut EncodeBuffer, value: bool) -> Result<(), EncodeError> {
    buf.write_u8(if value { TRUE } else { FALSE })
}

pub(crate) fn write_str(buf: &mut EncodeBuffer, value: &str) -> Result<(), EncodeError> {
    write_str_header(buf, value.len())?;
    buf.write_utf8(value)
}

pub(crate) fn write_str_header(buf: &mut EncodeBuffer, len: usize) -> Result<(), EncodeError> {
    if len < 32 {
        buf.write_u8(FIXSTR | len as u8)
    } else if len <= u8::MAX as usize {
        buf.write_raw(&[STR8, len as u8])
    } else if len <= u16::MAX as usize {
        buf.write_u8(STR16)?;
        buf.write_u16_be(len as u16)
    } else {
        // Longer than any buffer; the body write reports the overflow.
        buf.write_u8(STR32)?;
        buf.write_u32_be(len as u32)
    }
}

/// Writes the smallest MessagePack integer that holds `value`.
pub(crate) fn write_int(buf: &mut EncodeBuffer, value: i64) -> Result<(), EncodeError> {
    if value >= 0 {
        return write_uint(buf, value as u64);
    }
    if value >= -32 {
        buf.write_u8(value as i8 as u8)
    } else if value >= i8::MIN as i64 {
        buf.write_raw(&[INT8, value as i8 as u8])
    } else if value >= i16::MIN as i64 {
        buf.write_u8(INT16)?;
        buf.write_raw(&(value as i16).to_be_bytes())
    } else if value >= i32::MIN as i64 {
        buf.write_u8(INT32)?;
        buf.write_raw(&(value as i32).to_be_bytes())
    } else {
        buf.write_u8(INT64)?;
        buf.write_i64_be(value)
    }
}

pub(crate) fn write_uint(buf: &mut EncodeBuffer, value: u64) -> Result<(), EncodeError> {
    if value < 0x80 {
        buf.write_u8(value as u8)
    } else if value <= u8::MAX as u64 {
        buf.write_raw(&[UINT8, value as u8])
    } else if value <= u16::MAX as u64 {
        buf.write_u8(UINT16)?;
        buf.write_u16_be(value as u16)
    } else if value <= u32::MAX as u64 {
        buf.write_u8(UINT32)?;
        buf.write_u32_be(value as u32)
    } else {
        buf.write_u8(UINT64)?;
        buf.write_u64_be(value)
    }
}

pub(crate) fn write_f64(buf: &mut EncodeBuffer, value: f64) -> Result<(), EncodeError> {
    buf.write_u8(FLOAT64)?;
    buf.write_f64_be(value)
}

/// Writes `time` with the 96-bit timestamp extension: nanoseconds as `u32`
/// then seconds since the Unix epoch as `i64`, both big-endian.
pub(crate) fn write_timestamp(buf: &mut EncodeBuffer, time: SystemTime) -> Result<(), EncodeError> {
    let dt = chrono::DateTime::<chrono::Utc>::from(time);
    buf.write_raw(&[EXT8, TIMESTAMP96_LEN, TIMESTAMP_EXT_TYPE])?;
    buf.write_u32_be(dt.timestamp_subsec_nanos())?;
    buf.write_i64_be(dt.timestamp())
}

pub(crate) fn write_fixmap_header(buf: &mut EncodeBuffer, len: u8) -> Result<(), EncodeError> {
    debug_assert!(len < 16);
    buf.write_u8(FIXMAP | len)
}

pub(crate) fn write_array_header(buf: &mut EncodeBuffer, len: usize) -> Result<(), EncodeError> {
    if len < 16 {
        buf.write_u8(FIXARRAY | len as u8)
    } else if len <= u16::MAX as usize {
        buf.write_u8(ARRAY16)?;
        buf.write_u16_be(len as u16)
    } else {
        buf.write_u8(ARRAY32)?;
        buf.write_u32_be(len as u32)
    }
}

pub(crate) fn write_value(
    buf: &mut EncodeBuffer,
    value: &FieldValue<'_>,
) -> Result<(), EncodeError> {
    match value {
        FieldValue::String(s) => write_str(buf, s),
        FieldValue::Bool(b) => write_bool(buf, *b),
        FieldValue::I64(i) => write_int(buf, *i),
        FieldValue::F64(f) => write_f64(buf, *f),
        FieldValue::Null => write_nil(buf),
    }
}

/// An open MessagePack map whose element count is backpatched on close.
pub(crate) struct OpenMap {
    reservation: Reservation,
    count: usize,
}

impl OpenMap {
    pub(crate) fn open(buf: &mut EncodeBuffer) -> Result<Self, EncodeError> {
        Ok(OpenMap {
            reservation: buf.reserve_map16()?,
            count: 0,
        })
    }

    /// Adopts a reservation made elsewhere, typically by a template that has
    /// already written `count` entries.
    pub(crate) fn resume(reservation: Reservation, count: usize) -> Self {
        OpenMap { reservation, count }
    }

    pub(crate) fn count(&self) -> usize {
        self.count
    }

    /// Writes one key/value entry. Null values are skipped and not counted.
    pub(crate) fn field(
        &mut self,
        buf: &mut EncodeBuffer,
        key: &str,
        value: &FieldValue<'_>,
    ) -> Result<(), EncodeError> {
        if value.is_null() {
            return Ok(());
        }
        write_str(buf, key)?;
        write_value(buf, value)?;
        self.count += 1;
        Ok(())
    }

    pub(crate) fn str_field(
        &mut self,
        buf: &mut EncodeBuffer,
        key: &str,
        value: &str,
    ) -> Result<(), EncodeError> {
        write_str(buf, key)?;
        write_str(buf, value)?;
        self.count += 1;
        Ok(())
    }

    /// Writes a key whose value the caller writes next.
    pub(crate) fn key(&mut self, buf: &mut EncodeBuffer, key: &str) -> Result<(), EncodeError> {
        write_str(buf, key)?;
        self.count += 1;
        Ok(())
    }

    pub(crate) fn close(self, buf: &mut EncodeBuffer) -> Result<(), EncodeError> {
        buf.patch_map16(&self.reservation, self.count)
    }
}

/// Lowercase hex of `bytes` into `out`, which must be twice as long.
pub(crate) fn hex_encode<'o>(bytes: &[u8], out: &'o mut [u8]) -> &'o str {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    debug_assert_eq!(out.len(), bytes.len() * 2);
    for (i, b) in bytes.iter().enumerate() {
        out[2 * i] = HEX[(b >> 4) as usize];
        out[2 * i + 1] = HEX[(b & 0x0F) as usize];
    }
    // Only ASCII hex digits were written.
    std::str::from_utf8(out).unwrap_or_default()
}
