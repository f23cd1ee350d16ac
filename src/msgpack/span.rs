use super::template::{Column, RecordTemplate};
use super::{
    hex_encode, write_array_header, write_bool, write_fixmap_header, write_str, write_timestamp,
    OpenMap,
};
use crate::codec::EncodeBuffer;
use crate::constants::{fields, SPAN_PART_B_MAPPING};
use crate::data::{Attribute, FieldValue};
use crate::error::{EncodeError, Error};
use opentelemetry::trace::{SpanId, SpanKind, Status, TraceId};
use opentelemetry_sdk::export::trace::SpanData;
use std::collections::HashSet;

/// Writes finished spans as Fluentd Forward envelopes, stamped with the span
/// end time.
#[derive(Debug, Clone)]
pub struct SpanSerializer {
    template: RecordTemplate,
    custom_fields: Option<HashSet<String>>,
}

fn kind_number(kind: &SpanKind) -> i64 {
    match kind {
        SpanKind::Internal => 0,
        SpanKind::Server => 1,
        SpanKind::Client => 2,
        SpanKind::Producer => 3,
        SpanKind::Consumer => 4,
    }
}

impl SpanSerializer {
    pub fn new(
        table_name: &str,
        prepopulated_fields: &[Attribute<'_>],
        custom_fields: Option<&[String]>,
    ) -> Result<Self, Error> {
        Ok(SpanSerializer {
            template: RecordTemplate::new(table_name, prepopulated_fields)?,
            custom_fields: custom_fields.map(|names| names.iter().cloned().collect()),
        })
    }

    pub fn template(&self) -> &RecordTemplate {
        &self.template
    }

    fn column(&self, key: &str) -> Column {
        if let Some((_, column)) = SPAN_PART_B_MAPPING.iter().find(|(name, _)| *name == key) {
            return Column::Renamed(*column);
        }
        match &self.custom_fields {
            Some(names) if !names.contains(key) => Column::Deferred,
            _ => Column::Dedicated,
        }
    }

    /// Appends one envelope for `span` at the cursor.
    pub fn serialize(&self, buf: &mut EncodeBuffer, span: &SpanData) -> Result<(), EncodeError> {
        let mut map = self.template.begin_record(buf, span.end_time)?;

        let cx = &span.span_context;
        write_trace_id(buf, &mut map, fields::ENV_DT_TRACE_ID, cx.trace_id())?;
        write_span_id(buf, &mut map, fields::ENV_DT_SPAN_ID, cx.span_id())?;
        if span.parent_span_id != SpanId::INVALID {
            write_span_id(buf, &mut map, fields::PARENT_ID, span.parent_span_id)?;
        }

        map.str_field(buf, fields::NAME, &span.name)?;
        map.field(buf, fields::KIND, &FieldValue::I64(kind_number(&span.span_kind)))?;
        map.key(buf, fields::START_TIME)?;
        write_timestamp(buf, span.start_time)?;
        map.key(buf, fields::SUCCESS)?;
        write_bool(buf, !matches!(span.status, Status::Error { .. }))?;
        if let Status::Error { description } = &span.status {
            if !description.is_empty() {
                map.str_field(buf, fields::STATUS_MESSAGE, description)?;
            }
        }

        let link_count = span.links.iter().count();
        if link_count > 0 {
            map.key(buf, fields::LINKS)?;
            write_array_header(buf, link_count)?;
            for link in span.links.iter() {
                let mut hex = [0u8; 32];
                write_fixmap_header(buf, 2)?;
                write_str(buf, fields::TO_TRACE_ID)?;
                write_str(buf, hex_encode(&link.span_context.trace_id().to_bytes(), &mut hex))?;
                write_str(buf, fields::TO_SPAN_ID)?;
                let span_id = link.span_context.span_id().to_bytes();
                write_str(buf, hex_encode(&span_id, &mut hex[..16]))?;
            }
        }

        let properties = span
            .attributes
            .iter()
            .map(|(key, value)| (key.as_str(), FieldValue::from(value)));
        self.template
            .write_properties(buf, &mut map, properties, |key| self.column(key))?;

        self.template.end_record(buf, map)
    }
}

fn write_trace_id(
    buf: &mut EncodeBuffer,
    map: &mut OpenMap,
    key: &str,
    id: TraceId,
) -> Result<(), EncodeError> {
    let mut hex = [0u8; 32];
    map.str_field(buf, key, hex_encode(&id.to_bytes(), &mut hex))
}

fn write_span_id(
    buf: &mut EncodeBuffer,
    map: &mut OpenMap,
    key: &str,
    id: SpanId,
) -> Result<(), EncodeError> {
    let mut hex = [0u8; 16];
    map.str_field(buf, key, hex_encode(&id.to_bytes(), &mut hex))
}
