use super::field_numbers::{any_value, key_value};
use super::wire::{write_bool_field, write_double_field, write_int64_field, write_string_field};
use crate::codec::EncodeBuffer;
use crate::data::{Attribute, FieldValue};
use crate::error::EncodeError;

/// Writes one `KeyValue` as field `field_number` of the enclosing message.
/// Null values write nothing.
pub(crate) fn write_key_value(
    buf: &mut EncodeBuffer,
    field_number: u32,
    key: &str,
    value: &FieldValue<'_>,
) -> Result<(), EncodeError> {
    if value.is_null() {
        return Ok(());
    }
    let kv = buf.reserve_message()?;
    write_string_field(buf, key_value::KEY, key)?;

    let any = buf.reserve_message()?;
    match value {
        FieldValue::String(s) => write_string_field(buf, any_value::STRING_VALUE, s)?,
        FieldValue::Bool(b) => write_bool_field(buf, any_value::BOOL_VALUE, *b)?,
        FieldValue::I64(i) => write_int64_field(buf, any_value::INT_VALUE, *i)?,
        FieldValue::F64(f) => write_double_field(buf, any_value::DOUBLE_VALUE, *f)?,
        FieldValue::Null => {}
    }
    buf.patch_length_delimited(&any, key_value::VALUE)?;
    buf.patch_length_delimited(&kv, field_number)
}

pub(crate) fn write_attributes(
    buf: &mut EncodeBuffer,
    field_number: u32,
    attributes: &[Attribute<'_>],
) -> Result<(), EncodeError> {
    attributes
        .iter()
        .try_for_each(|attr| write_key_value(buf, field_number, &attr.key, &attr.value))
}
