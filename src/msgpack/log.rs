use super::template::{sanitize_table_name, Column, RecordTemplate};
use super::{hex_encode, OpenMap};
use crate::codec::EncodeBuffer;
use crate::constants::{fields, MAX_TABLE_NAME_LEN};
use crate::data::{Attribute, FieldValue, LogRecord};
use crate::error::{EncodeError, Error};
use std::collections::HashSet;

/// Category or table name that stands for "every other category".
pub const WILDCARD: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    /// Index into `LogSerializer::templates`.
    Table(usize),
    /// The record's own category name becomes its table name.
    PassThrough,
}

/// Writes log records as Fluentd Forward envelopes.
#[derive(Debug, Clone)]
pub struct LogSerializer {
    /// `templates[0]` is the default table.
    templates: Vec<RecordTemplate>,
    routes: Vec<(String, Route)>,
    fallback: Route,
    custom_fields: Option<HashSet<String>>,
}

impl LogSerializer {
    /// Precomputes a template for `table_name` and for every table named in
    /// `table_mappings`.
    ///
    /// Each mapping pairs a category name (or `*`) with a table name (or `*`
    /// for "use the category name"). Without custom fields every property gets
    /// its own column; with them only the listed ones do and the rest go to
    /// `env_properties`.
    pub fn new(
        table_name: &str,
        table_mappings: &[(String, String)],
        prepopulated_fields: &[Attribute<'_>],
        custom_fields: Option<&[String]>,
    ) -> Result<Self, Error> {
        let mut templates = vec![RecordTemplate::new(table_name, prepopulated_fields)?];
        let mut routes = Vec::with_capacity(table_mappings.len());
        let mut fallback = Route::Table(0);

        for (category, table) in table_mappings {
            let route = if table == WILDCARD {
                if category != WILDCARD {
                    return Err(Error::config(format!(
                        "only the {WILDCARD:?} category may pass through its name, not {category:?}"
                    )));
                }
                Route::PassThrough
            } else {
                match templates.iter().position(|t| t.table_name() == table) {
                    Some(index) => Route::Table(index),
                    None => {
                        templates.push(RecordTemplate::new(table, prepopulated_fields)?);
                        Route::Table(templates.len() - 1)
                    }
                }
            };
            if category == WILDCARD {
                fallback = route;
            } else {
                routes.push((category.clone(), route));
            }
        }

        Ok(LogSerializer {
            templates,
            routes,
            fallback,
            custom_fields: custom_fields.map(|names| names.iter().cloned().collect()),
        })
    }

    pub fn default_template(&self) -> &RecordTemplate {
        &self.templates[0]
    }

    pub(crate) fn templates(&self) -> &[RecordTemplate] {
        &self.templates
    }

    fn route(&self, category: Option<&str>) -> Route {
        let Some(category) = category else {
            return Route::Table(0);
        };
        self.routes
            .iter()
            .find(|(name, _)| name == category)
            .map_or(self.fallback, |(_, route)| *route)
    }

    fn column(&self, key: &str) -> Column {
        match &self.custom_fields {
            Some(names) if !names.contains(key) => Column::Deferred,
            _ => Column::Dedicated,
        }
    }

    /// Appends one envelope for `record` at the cursor.
    ///
    /// On error the buffer holds a partial envelope; callers rewind to a
    /// checkpoint taken before the call.
    pub fn serialize(
        &self,
        buf: &mut EncodeBuffer,
        record: &LogRecord<'_>,
    ) -> Result<(), EncodeError> {
        let mut scratch = [0u8; MAX_TABLE_NAME_LEN];
        let (template, mut map, table_name) = match self.route(record.category_name) {
            Route::Table(index) => {
                let template = &self.templates[index];
                let map = template.begin_record(buf, record.timestamp)?;
                (template, map, template.table_name())
            }
            Route::PassThrough => {
                let template = &self.templates[0];
                let name = match record.category_name {
                    Some(category) => sanitize_table_name(category, &mut scratch),
                    None => None,
                };
                match name {
                    Some(name) => {
                        let map = template.begin_record_as(buf, name, record.timestamp)?;
                        (template, map, name)
                    }
                    None => {
                        let map = template.begin_record(buf, record.timestamp)?;
                        (template, map, template.table_name())
                    }
                }
            }
        };

        write_log_fields(buf, &mut map, record, table_name)?;

        let properties = std::iter::once(record.attributes)
            .chain(record.scopes.iter().copied())
            .flat_map(|frame| frame.iter())
            .map(|attr| (&*attr.key, FieldValue::from(&attr.value)));
        template.write_properties(buf, &mut map, properties, |key| self.column(key))?;

        template.end_record(buf, map)
    }
}

fn write_log_fields(
    buf: &mut EncodeBuffer,
    map: &mut OpenMap,
    record: &LogRecord<'_>,
    table_name: &str,
) -> Result<(), EncodeError> {
    if let Some(cx) = &record.trace_context {
        let mut hex = [0u8; 32];
        map.str_field(buf, fields::ENV_DT_TRACE_ID, hex_encode(&cx.trace_id.to_bytes(), &mut hex))?;
        let mut hex = [0u8; 16];
        map.str_field(buf, fields::ENV_DT_SPAN_ID, hex_encode(&cx.span_id.to_bytes(), &mut hex))?;
        map.field(buf, fields::ENV_DT_TRACE_FLAGS, &cx.trace_flags.to_u8().into())?;
    }

    map.str_field(buf, fields::SEVERITY_TEXT, record.severity.text())?;
    map.field(buf, fields::SEVERITY_NUMBER, &record.severity.number().into())?;
    map.str_field(buf, fields::NAME, record.category_name.unwrap_or(table_name))?;

    if let Some(event_id) = record.event_id {
        map.field(buf, fields::EVENT_ID, &event_id.into())?;
    }
    if let Some(event_name) = record.event_name {
        map.str_field(buf, fields::EVENT_NAME, event_name)?;
    }
    if let Some(body) = record.body {
        map.str_field(buf, fields::BODY, body)?;
    }
    if let Some(exception) = &record.exception {
        map.str_field(buf, fields::ENV_EX_TYPE, exception.type_name)?;
        map.str_field(buf, fields::ENV_EX_MSG, exception.message)?;
    }
    Ok(())
}
