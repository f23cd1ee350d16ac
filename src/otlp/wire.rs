//! Protobuf field writers for values whose size is known up front. Nested
//! messages go through reservations instead.

use crate::codec::varint::{varint_len, zigzag};
use crate::codec::EncodeBuffer;
use crate::error::EncodeError;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WireType {
    Varint = 0,
    Fixed64 = 1,
    LengthDelimited = 2,
}

#[inline]
pub const fn tag(field_number: u32, wire_type: WireType) -> u64 {
    ((field_number << 3) | wire_type as u32) as u64
}

#[inline]
pub(crate) fn write_tag(
    buf: &mut EncodeBuffer,
    field_number: u32,
    wire_type: WireType,
) -> Result<(), EncodeError> {
    buf.write_varint(tag(field_number, wire_type))
}

pub(crate) fn write_varint_field(
    buf: &mut EncodeBuffer,
    field_number: u32,
    value: u64,
) -> Result<(), EncodeError> {
    write_tag(buf, field_number, WireType::Varint)?;
    buf.write_varint(value)
}

/// `int64` fields are two's complement varints, ten bytes when negative.
pub(crate) fn write_int64_field(
    buf: &mut EncodeBuffer,
    field_number: u32,
    value: i64,
) -> Result<(), EncodeError> {
    write_varint_field(buf, field_number, value as u64)
}

pub(crate) fn write_sint32_field(
    buf: &mut EncodeBuffer,
    field_number: u32,
    value: i32,
) -> Result<(), EncodeError> {
    write_varint_field(buf, field_number, zigzag(value as i64))
}

pub(crate) fn write_bool_field(
    buf: &mut EncodeBuffer,
    field_number: u32,
    value: bool,
) -> Result<(), EncodeError> {
    write_varint_field(buf, field_number, value as u64)
}

pub(crate) fn write_fixed64_field(
    buf: &mut EncodeBuffer,
    field_number: u32,
    value: u64,
) -> Result<(), EncodeError> {
    write_tag(buf, field_number, WireType::Fixed64)?;
    buf.write_fixed64_le(value)
}

pub(crate) fn write_sfixed64_field(
    buf: &mut EncodeBuffer,
    field_number: u32,
    value: i64,
) -> Result<(), EncodeError> {
    write_fixed64_field(buf, field_number, value as u64)
}

pub(crate) fn write_double_field(
    buf: &mut EncodeBuffer,
    field_number: u32,
    value: f64,
) -> Result<(), EncodeError> {
    write_tag(buf, field_number, WireType::Fixed64)?;
    buf.write_f64_le(value)
}

pub(crate) fn write_bytes_field(
    buf: &mut EncodeBuffer,
    field_number: u32,
    value: &[u8],
) -> Result<(), EncodeError> {
    write_tag(buf, field_number, WireType::LengthDelimited)?;
    buf.write_varint(value.len() as u64)?;
    buf.write_raw(value)
}

pub(crate) fn write_string_field(
    buf: &mut EncodeBuffer,
    field_number: u32,
    value: &str,
) -> Result<(), EncodeError> {
    write_bytes_field(buf, field_number, value.as_bytes())
}

/// Packed `repeated fixed64`. Empty slices write nothing.
pub(crate) fn write_packed_fixed64(
    buf: &mut EncodeBuffer,
    field_number: u32,
    values: &[u64],
) -> Result<(), EncodeError> {
    if values.is_empty() {
        return Ok(());
    }
    write_tag(buf, field_number, WireType::LengthDelimited)?;
    buf.write_varint((values.len() * 8) as u64)?;
    values.iter().try_for_each(|v| buf.write_fixed64_le(*v))
}

/// Packed `repeated double`. Empty slices write nothing.
pub(crate) fn write_packed_double(
    buf: &mut EncodeBuffer,
    field_number: u32,
    values: &[f64],
) -> Result<(), EncodeError> {
    if values.is_empty() {
        return Ok(());
    }
    write_tag(buf, field_number, WireType::LengthDelimited)?;
    buf.write_varint((values.len() * 8) as u64)?;
    values.iter().try_for_each(|v| buf.write_f64_le(*v))
}

/// Packed `repeated uint64`. Empty slices write nothing.
pub(crate) fn write_packed_varint(
    buf: &mut EncodeBuffer,
    field_number: u32,
    values: &[u64],
) -> Result<(), EncodeError> {
    if values.is_empty() {
        return Ok(());
    }
    let len: usize = values.iter().map(|v| varint_len(*v)).sum();
    write_tag(buf, field_number, WireType::LengthDelimited)?;
    buf.write_varint(len as u64)?;
    values.iter().try_for_each(|v| buf.write_varint(*v))
}

/// Nanoseconds since the Unix epoch; times before it clamp to zero.
pub(crate) fn unix_nanos(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
}
