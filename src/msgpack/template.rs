use super::{
    write_array_header, write_fixmap_header, write_str, write_timestamp, write_value, OpenMap,
};
use crate::codec::EncodeBuffer;
use crate::constants::{fields, MAX_TABLE_NAME_LEN};
use crate::data::{Attribute, FieldValue};
use crate::error::{EncodeError, Error};
use std::collections::HashSet;
use std::time::SystemTime;

/// Encoded size of a 96-bit MessagePack timestamp.
const TIMESTAMP_LEN: usize = 15;

/// Where a property ends up in the field map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Column {
    /// Its own column, under its own key.
    Dedicated,
    /// Its own column, under a fixed column name.
    Renamed(&'static str),
    /// An entry of the nested `env_properties` map.
    Deferred,
}

/// The constant parts of every envelope written for one table: the prologue
/// up to the timestamp, the Part-A fields that open the field map, and the
/// epilogue after it. Computed once and copied into the buffer per record.
#[derive(Debug, Clone)]
pub struct RecordTemplate {
    table_name: String,
    prologue: Box<[u8]>,
    part_a: Box<[u8]>,
    /// Length of the `env_name` entry at the start of `part_a`.
    env_name_len: usize,
    part_a_count: usize,
    epilogue: Box<[u8]>,
    prepopulated_names: Vec<String>,
}

impl RecordTemplate {
    pub fn new(table_name: &str, prepopulated_fields: &[Attribute<'_>]) -> Result<Self, Error> {
        validate_table_name(table_name)?;
        let mut prepopulated_names: Vec<String> = Vec::with_capacity(prepopulated_fields.len());
        for field in prepopulated_fields {
            let key: &str = &field.key;
            if fields::RESERVED.contains(&key) {
                return Err(Error::config(format!(
                    "prepopulated field {key:?} collides with a reserved field"
                )));
            }
            if prepopulated_names.iter().any(|name| name == key) {
                return Err(Error::config(format!("prepopulated field {key:?} is repeated")));
            }
            prepopulated_names.push(key.to_owned());
        }

        let too_large = |e: EncodeError| {
            Error::config(format!(
                "template for table {table_name:?} does not fit a payload: {e}"
            ))
        };
        let mut scratch = EncodeBuffer::new();

        write_prologue(&mut scratch, table_name).map_err(too_large)?;
        let prologue: Box<[u8]> = scratch.as_slice().into();
        scratch.reset();

        write_str(&mut scratch, fields::ENV_NAME).map_err(too_large)?;
        write_str(&mut scratch, table_name).map_err(too_large)?;
        let env_name_len = scratch.position();
        let mut part_a_count = 1;
        for field in prepopulated_fields.iter().filter(|f| !f.value.is_null()) {
            write_str(&mut scratch, &field.key).map_err(too_large)?;
            write_value(&mut scratch, &field.value).map_err(too_large)?;
            part_a_count += 1;
        }
        let part_a: Box<[u8]> = scratch.as_slice().into();
        scratch.reset();

        write_fixmap_header(&mut scratch, 1).map_err(too_large)?;
        write_str(&mut scratch, fields::TIME_FORMAT).map_err(too_large)?;
        write_str(&mut scratch, fields::DATE_TIME).map_err(too_large)?;
        let epilogue: Box<[u8]> = scratch.as_slice().into();

        Ok(RecordTemplate {
            table_name: table_name.to_owned(),
            prologue,
            part_a,
            env_name_len,
            part_a_count,
            epilogue,
            prepopulated_names,
        })
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Smallest envelope this template can produce: a record with no fields
    /// beyond Part-A.
    pub fn min_record_len(&self) -> usize {
        self.prologue.len()
            + TIMESTAMP_LEN
            + crate::codec::MSGPACK_HEADER_LEN
            + self.part_a.len()
            + self.epilogue.len()
    }

    /// Opens an envelope for this template's table and returns the open field
    /// map, already holding the Part-A fields.
    pub(crate) fn begin_record(
        &self,
        buf: &mut EncodeBuffer,
        time: SystemTime,
    ) -> Result<OpenMap, EncodeError> {
        buf.write_raw(&self.prologue)?;
        write_timestamp(buf, time)?;
        let reservation = buf.reserve_map16()?;
        buf.write_raw(&self.part_a)?;
        Ok(OpenMap::resume(reservation, self.part_a_count))
    }

    /// Like [`begin_record`](Self::begin_record) for a table name that only
    /// becomes known per record.
    pub(crate) fn begin_record_as(
        &self,
        buf: &mut EncodeBuffer,
        table_name: &str,
        time: SystemTime,
    ) -> Result<OpenMap, EncodeError> {
        write_prologue(buf, table_name)?;
        write_timestamp(buf, time)?;
        let reservation = buf.reserve_map16()?;
        write_str(buf, fields::ENV_NAME)?;
        write_str(buf, table_name)?;
        buf.write_raw(&self.part_a[self.env_name_len..])?;
        Ok(OpenMap::resume(reservation, self.part_a_count))
    }

    pub(crate) fn end_record(
        &self,
        buf: &mut EncodeBuffer,
        map: OpenMap,
    ) -> Result<(), EncodeError> {
        map.close(buf)?;
        buf.write_raw(&self.epilogue)
    }

    /// Keys that the envelope already writes itself.
    fn claims(&self, key: &str) -> bool {
        fields::RESERVED.contains(&key) || self.prepopulated_names.iter().any(|name| name == key)
    }

    /// Writes record properties in two passes: dedicated columns straight
    /// into `map`, then every deferred property into one nested
    /// `env_properties` map.
    ///
    /// Duplicates are resolved on the key a property is written under, per
    /// destination map: a later occurrence wins over an earlier one, and a
    /// renamed column wins over a property that already carries the column
    /// name. Null values are skipped and shadow nothing. Keys the envelope
    /// already uses are always deferred.
    pub(crate) fn write_properties<'x>(
        &self,
        buf: &mut EncodeBuffer,
        map: &mut OpenMap,
        properties: impl IntoIterator<Item = (&'x str, FieldValue<'x>)>,
        column: impl Fn(&str) -> Column,
    ) -> Result<(), EncodeError> {
        let mut placed: Vec<Placed<'x>> = properties
            .into_iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(key, value)| self.place(key, value, &column))
            .collect();

        let mut seen = HashSet::with_capacity(placed.len());
        for renamed in [true, false] {
            for p in placed.iter_mut().rev().filter(|p| p.renamed == renamed) {
                p.live = seen.insert((p.nested, p.key));
            }
        }

        for p in placed.iter().filter(|p| p.live && !p.nested) {
            map.field(buf, p.key, &p.value)?;
        }
        if !placed.iter().any(|p| p.live && p.nested) {
            return Ok(());
        }

        map.key(buf, fields::ENV_PROPERTIES)?;
        let mut nested = OpenMap::open(buf)?;
        for p in placed.iter().filter(|p| p.live && p.nested) {
            nested.field(buf, p.key, &p.value)?;
        }
        nested.close(buf)
    }

    fn place<'x>(
        &self,
        key: &'x str,
        value: FieldValue<'x>,
        column: &impl Fn(&str) -> Column,
    ) -> Placed<'x> {
        let (key, nested, renamed) = if self.claims(key) {
            (key, true, false)
        } else {
            match column(key) {
                Column::Dedicated => (key, false, false),
                Column::Renamed(name) if !self.claims(name) => (name, false, true),
                Column::Renamed(_) | Column::Deferred => (key, true, false),
            }
        };
        Placed {
            key,
            value,
            nested,
            renamed,
            live: false,
        }
    }
}

/// A property resolved to the map and key it is written under.
struct Placed<'x> {
    key: &'x str,
    value: FieldValue<'x>,
    /// Goes to `env_properties` rather than the field map.
    nested: bool,
    renamed: bool,
    live: bool,
}

/// `[ tableName, [ [` up to the timestamp.
fn write_prologue(buf: &mut EncodeBuffer, table_name: &str) -> Result<(), EncodeError> {
    write_array_header(buf, 3)?;
    write_str(buf, table_name)?;
    write_array_header(buf, 1)?;
    write_array_header(buf, 2)
}

pub(crate) fn validate_table_name(name: &str) -> Result<(), Error> {
    if name.is_empty() || name.len() > MAX_TABLE_NAME_LEN {
        return Err(Error::config(format!(
            "table name {name:?} must be 1 to {MAX_TABLE_NAME_LEN} characters"
        )));
    }
    let mut chars = name.chars();
    let starts_with_letter = chars.next().map_or(false, |c| c.is_ascii_alphabetic());
    if !starts_with_letter || !chars.all(|c| c.is_ascii_alphanumeric()) {
        return Err(Error::config(format!(
            "table name {name:?} must be ASCII alphanumeric and start with a letter"
        )));
    }
    Ok(())
}

/// Derives a table name from a log category: ASCII alphanumerics only, first
/// letter upper-cased, truncated to the longest table name. `None` when no
/// usable name remains.
pub(crate) fn sanitize_table_name<'s>(
    category: &str,
    scratch: &'s mut [u8; MAX_TABLE_NAME_LEN],
) -> Option<&'s str> {
    let mut len = 0;
    for b in category.bytes().filter(u8::is_ascii_alphanumeric) {
        if len == MAX_TABLE_NAME_LEN {
            break;
        }
        scratch[len] = b;
        len += 1;
    }
    let name = &mut scratch[..len];
    match name.first_mut() {
        Some(first) if first.is_ascii_alphabetic() => first.make_ascii_uppercase(),
        _ => return None,
    }
    std::str::from_utf8(name).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_names_are_validated() {
        assert!(validate_table_name("Log").is_ok());
        assert!(validate_table_name("").is_err());
        assert!(validate_table_name("9Lives").is_err());
        assert!(validate_table_name("My-Table").is_err());
        assert!(validate_table_name(&"a".repeat(MAX_TABLE_NAME_LEN + 1)).is_err());
    }

    #[test]
    fn prepopulated_fields_may_not_shadow_reserved_ones() {
        let fields = [Attribute::new("env_name", "x")];
        assert!(matches!(RecordTemplate::new("Log", &fields), Err(Error::Config(_))));

        let fields = [Attribute::new("cloud.role", "a"), Attribute::new("cloud.role", "b")];
        assert!(RecordTemplate::new("Log", &fields).is_err());
    }

    #[test]
    fn prologue_and_part_a_layout() {
        let fields = [Attribute::new("cloud.role", "api"), Attribute::new("skip", None::<i64>)];
        let template = RecordTemplate::new("Log", &fields).unwrap();
        assert_eq!(&*template.prologue, b"\x93\xA3Log\x91\x92");
        assert_eq!(template.part_a_count, 2);
        assert_eq!(&template.part_a[..template.env_name_len], b"\xA8env_name\xA3Log");
        assert_eq!(&*template.epilogue, b"\x81\xAATimeFormat\xA8DateTime");
    }

    #[test]
    fn category_names_are_sanitized() {
        let mut scratch = [0u8; MAX_TABLE_NAME_LEN];
        assert_eq!(sanitize_table_name("my.app-events", &mut scratch), Some("Myappevents"));
        assert_eq!(sanitize_table_name("123", &mut scratch), None);
        assert_eq!(sanitize_table_name("...", &mut scratch), None);
        let long = "x".repeat(80);
        assert_eq!(
            sanitize_table_name(&long, &mut scratch).map(str::len),
            Some(MAX_TABLE_NAME_LEN)
        );
    }

    #[test]
    fn later_properties_win() {
        let template = RecordTemplate::new("Log", &[]).unwrap();
        let attrs = [
            Attribute::new("a", 1i64),
            Attribute::new("b", true),
            Attribute::new("a", 2i64),
            Attribute::new("b", None::<bool>),
        ];
        let mut buf = EncodeBuffer::with_capacity(256);
        let mut map = OpenMap::open(&mut buf).unwrap();
        let props = attrs.iter().map(|a| (&*a.key, FieldValue::from(&a.value)));
        template
            .write_properties(&mut buf, &mut map, props, |_| Column::Dedicated)
            .unwrap();
        assert_eq!(map.count(), 2);
        map.close(&mut buf).unwrap();
        assert_eq!(buf.as_slice(), b"\xDE\x00\x02\xA1b\xC3\xA1a\x02");
    }

    #[test]
    fn deferred_properties_nest_under_env_properties() {
        let template = RecordTemplate::new("Log", &[]).unwrap();
        let attrs = [Attribute::new("keep", 1i64), Attribute::new("name", "clash")];
        let mut buf = EncodeBuffer::with_capacity(256);
        let mut map = OpenMap::open(&mut buf).unwrap();
        let props = attrs.iter().map(|a| (&*a.key, FieldValue::from(&a.value)));
        template
            .write_properties(&mut buf, &mut map, props, |_| Column::Dedicated)
            .unwrap();
        map.close(&mut buf).unwrap();

        let mut expected = b"\xDE\x00\x02\xA4keep\x01\xAEenv_properties\xDE\x00\x01".to_vec();
        expected.extend_from_slice(b"\xA4name\xA5clash");
        assert_eq!(buf.as_slice(), &expected[..]);
    }

    #[test]
    fn duplicates_resolve_on_the_written_key() {
        let template = RecordTemplate::new("Log", &[]).unwrap();
        let rename = |key: &str| match key {
            "http.method" => Column::Renamed("httpMethod"),
            _ => Column::Dedicated,
        };
        for attrs in [
            [Attribute::new("http.method", "GET"), Attribute::new("httpMethod", "POST")],
            [Attribute::new("httpMethod", "POST"), Attribute::new("http.method", "GET")],
        ] {
            let mut buf = EncodeBuffer::with_capacity(256);
            let mut map = OpenMap::open(&mut buf).unwrap();
            let props = attrs.iter().map(|a| (&*a.key, FieldValue::from(&a.value)));
            template.write_properties(&mut buf, &mut map, props, rename).unwrap();
            assert_eq!(map.count(), 1);
            map.close(&mut buf).unwrap();
            assert_eq!(buf.as_slice(), b"\xDE\x00\x01\xAAhttpMethod\xA3GET");
        }
    }

    #[test]
    fn many_repeated_keys_keep_the_last_value_each() {
        let template = RecordTemplate::new("Log", &[]).unwrap();
        let keys: Vec<String> = (0..50).map(|i| format!("k{i}")).collect();
        let attrs: Vec<Attribute<'_>> = (0..2_000_i64)
            .map(|i| Attribute::new(keys[(i % 50) as usize].as_str(), i))
            .collect();
        let mut buf = EncodeBuffer::new();
        let mut map = OpenMap::open(&mut buf).unwrap();
        let props = attrs.iter().map(|a| (&*a.key, FieldValue::from(&a.value)));
        template
            .write_properties(&mut buf, &mut map, props, |_| Column::Dedicated)
            .unwrap();
        assert_eq!(map.count(), 50);
        map.close(&mut buf).unwrap();

        // k0 last took 1950, a uint16 after its fixstr key.
        let bytes = buf.as_slice();
        assert!(bytes.starts_with(b"\xDE\x00\x32\xA2k0\xCD\x07\x9E"));
    }
}

