use std::borrow::Cow;

/// A scalar attribute value, resolved to one of the kinds both wire formats
/// can carry.
///
/// Everything else is folded in by the `From` conversions: characters become
/// strings, every integer type becomes `I64` (unsigned values above
/// `i64::MAX` become their decimal string), and arrays become their display
/// string.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue<'a> {
    String(Cow<'a, str>),
    Bool(bool),
    I64(i64),
    F64(f64),
    /// Skipped by both encoders.
    Null,
}

impl<'a> FieldValue<'a> {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }
}

impl<'a> From<&'a str> for FieldValue<'a> {
    fn from(value: &'a str) -> Self {
        FieldValue::String(Cow::Borrowed(value))
    }
}

impl<'a> From<String> for FieldValue<'a> {
    fn from(value: String) -> Self {
        FieldValue::String(Cow::Owned(value))
    }
}

impl<'a> From<Cow<'a, str>> for FieldValue<'a> {
    fn from(value: Cow<'a, str>) -> Self {
        FieldValue::String(value)
    }
}

impl<'a> From<char> for FieldValue<'a> {
    fn from(value: char) -> Self {
        FieldValue::String(Cow::Owned(value.to_string()))
    }
}

impl<'a> From<bool> for FieldValue<'a> {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

macro_rules! from_signed {
    ($($t:ty),*) => {
        $(impl<'a> From<$t> for FieldValue<'a> {
            fn from(value: $t) -> Self {
                FieldValue::I64(value as i64)
            }
        })*
    };
}

macro_rules! from_unsigned {
    ($($t:ty),*) => {
        $(impl<'a> From<$t> for FieldValue<'a> {
            fn from(value: $t) -> Self {
                match i64::try_from(value) {
                    Ok(v) => FieldValue::I64(v),
                    Err(_) => FieldValue::String(Cow::Owned(value.to_string())),
                }
            }
        })*
    };
}

from_signed!(i8, i16, i32, i64, isize, u8, u16, u32);
from_unsigned!(u64, usize);

impl<'a> From<f32> for FieldValue<'a> {
    fn from(value: f32) -> Self {
        FieldValue::F64(value as f64)
    }
}

impl<'a> From<f64> for FieldValue<'a> {
    fn from(value: f64) -> Self {
        FieldValue::F64(value)
    }
}

/// Borrows the value without copying string contents.
impl<'a> From<&'a FieldValue<'_>> for FieldValue<'a> {
    fn from(value: &'a FieldValue<'_>) -> Self {
        match value {
            FieldValue::String(s) => FieldValue::String(Cow::Borrowed(s.as_ref())),
            FieldValue::Bool(b) => FieldValue::Bool(*b),
            FieldValue::I64(i) => FieldValue::I64(*i),
            FieldValue::F64(f) => FieldValue::F64(*f),
            FieldValue::Null => FieldValue::Null,
        }
    }
}

impl<'a, T: Into<FieldValue<'a>>> From<Option<T>> for FieldValue<'a> {
    fn from(value: Option<T>) -> Self {
        value.map_or(FieldValue::Null, Into::into)
    }
}

impl<'a> From<&'a opentelemetry::Value> for FieldValue<'a> {
    fn from(value: &'a opentelemetry::Value) -> Self {
        match value {
            opentelemetry::Value::Bool(b) => FieldValue::Bool(*b),
            opentelemetry::Value::I64(i) => FieldValue::I64(*i),
            opentelemetry::Value::F64(f) => FieldValue::F64(*f),
            opentelemetry::Value::String(s) => {
                let s: &str = s.as_ref();
                FieldValue::String(Cow::Borrowed(s))
            }
            // Arrays are not carried natively.
            opentelemetry::Value::Array(_) => FieldValue::String(value.as_str()),
        }
    }
}

/// A key/value property of a record.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute<'a> {
    pub key: Cow<'a, str>,
    pub value: FieldValue<'a>,
}

impl<'a> Attribute<'a> {
    pub fn new(key: impl Into<Cow<'a, str>>, value: impl Into<FieldValue<'a>>) -> Self {
        Attribute {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl<'a> From<(&'a opentelemetry::Key, &'a opentelemetry::Value)> for Attribute<'a> {
    fn from((key, value): (&'a opentelemetry::Key, &'a opentelemetry::Value)) -> Self {
        Attribute {
            key: Cow::Borrowed(key.as_str()),
            value: value.into(),
        }
    }
}

impl<'a> From<&'a opentelemetry::KeyValue> for Attribute<'a> {
    fn from(kv: &'a opentelemetry::KeyValue) -> Self {
        (&kv.key, &kv.value).into()
    }
}
