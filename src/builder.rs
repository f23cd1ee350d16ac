use crate::constants::{
    DEFAULT_LOG_TABLE_NAME, DEFAULT_SPAN_TABLE_NAME, GROUP_ID, MAX_PAYLOAD_SIZE,
};
use crate::data::{Attribute, FieldValue};
use crate::error::{Error, Result};
use crate::exporter::{LogExporter, MetricExporter, SpanExporter};
use crate::msgpack::{LogSerializer, SpanSerializer};
use crate::otlp::MetricsSerializer;
use crate::transport::{DataTransport, EtwTransport};
use opentelemetry_api::{global, trace::TracerProvider};
use std::borrow::Cow;
use std::sync::Arc;
use tracelogging_dynamic::Guid;

#[derive(Debug)]
pub struct ExporterBuilder {
    provider_name: String,
    group_id: Guid,
    transport: Option<Arc<dyn DataTransport>>,
    table_name: String,
    span_table_name: String,
    table_mappings: Vec<(String, String)>,
    prepopulated_fields: Vec<Attribute<'static>>,
    custom_fields: Option<Vec<String>>,
    resource_attributes: Vec<Attribute<'static>>,
    buffer_capacity: usize,
    trace_config: Option<opentelemetry_sdk::trace::Config>,
}

/// Starts configuring exporters that write to the ETW provider `name`,
/// unless another transport is assigned.
pub fn new_exporter(name: &str) -> ExporterBuilder {
    ExporterBuilder {
        provider_name: name.to_owned(),
        group_id: GROUP_ID,
        transport: None,
        table_name: DEFAULT_LOG_TABLE_NAME.to_owned(),
        span_table_name: DEFAULT_SPAN_TABLE_NAME.to_owned(),
        table_mappings: Vec::new(),
        prepopulated_fields: Vec::new(),
        custom_fields: None,
        resource_attributes: Vec::new(),
        buffer_capacity: MAX_PAYLOAD_SIZE,
        trace_config: None,
    }
}

impl ExporterBuilder {
    /// For advanced scenarios.
    /// Join the ETW provider to a group other than the default one.
    pub fn with_group_id(mut self, guid: &Guid) -> Self {
        self.group_id = guid.to_owned();
        self
    }

    /// Send payloads somewhere other than ETW.
    pub fn with_transport(mut self, transport: impl DataTransport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Table for log records whose category has no mapping. Default `Log`.
    pub fn with_table_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = name.into();
        self
    }

    /// Table for spans. Default `Span`.
    pub fn with_span_table_name(mut self, name: impl Into<String>) -> Self {
        self.span_table_name = name.into();
        self
    }

    /// Routes log records of `category` to `table`. A `*` category matches
    /// every unmapped category; mapping `*` to `*` uses the category name as
    /// the table name.
    pub fn with_table_mapping(
        mut self,
        category: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        self.table_mappings.push((category.into(), table.into()));
        self
    }

    /// A field written into every log and span record.
    pub fn with_prepopulated_field(
        mut self,
        key: impl Into<Cow<'static, str>>,
        value: impl Into<FieldValue<'static>>,
    ) -> Self {
        self.prepopulated_fields.push(Attribute::new(key, value));
        self
    }

    /// Only these properties get their own column; the others are collected
    /// into `env_properties`.
    pub fn with_custom_fields<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.custom_fields = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_resource_attribute(
        mut self,
        key: impl Into<Cow<'static, str>>,
        value: impl Into<FieldValue<'static>>,
    ) -> Self {
        self.resource_attributes.push(Attribute::new(key, value));
        self
    }

    /// Upper bound on every payload. Cannot exceed [`MAX_PAYLOAD_SIZE`].
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    /// Assign the SDK trace configuration used by [`install_simple`](Self::install_simple).
    pub fn with_trace_config(mut self, config: opentelemetry_sdk::trace::Config) -> Self {
        self.trace_config = Some(config);
        self
    }
}

impl ExporterBuilder {
    pub fn build_log_exporter(&self) -> Result<LogExporter> {
        let serializer = LogSerializer::new(
            &self.table_name,
            &self.table_mappings,
            &self.prepopulated_fields,
            self.custom_fields.as_deref(),
        )?;
        let smallest = serializer
            .templates()
            .iter()
            .map(|t| t.min_record_len())
            .max()
            .unwrap_or_default();
        let capacity = self.checked_capacity(smallest)?;
        Ok(LogExporter::new(serializer, self.transport()).with_capacity(capacity))
    }

    pub fn build_span_exporter(&self) -> Result<SpanExporter> {
        let serializer = SpanSerializer::new(
            &self.span_table_name,
            &self.prepopulated_fields,
            self.custom_fields.as_deref(),
        )?;
        let capacity = self.checked_capacity(serializer.template().min_record_len())?;
        Ok(SpanExporter::new(serializer, self.transport()).with_capacity(capacity))
    }

    pub fn build_metric_exporter(&self) -> Result<MetricExporter> {
        let serializer = MetricsSerializer::new(&self.resource_attributes)?;
        let capacity = self.checked_capacity(serializer.resource_len())?;
        Ok(MetricExporter::new(serializer, self.transport()).with_capacity(capacity))
    }

    /// Install the span exporter as a "simple" span exporter on a new tracer
    /// provider, and make that provider the global one.
    pub fn install_simple(mut self) -> Result<opentelemetry_sdk::trace::Tracer> {
        let exporter = self.build_span_exporter()?;

        let mut provider_builder =
            opentelemetry_sdk::trace::TracerProvider::builder().with_simple_exporter(exporter);

        if let Some(config) = self.trace_config.take() {
            provider_builder = provider_builder.with_config(config);
        }

        let provider = provider_builder.build();

        let tracer = provider.versioned_tracer(
            "opentelemetry-etw-wire",
            Some(env!("CARGO_PKG_VERSION")),
            None,
        );
        let _ = global::set_tracer_provider(provider);

        Ok(tracer)
    }

    fn transport(&self) -> Arc<dyn DataTransport> {
        match &self.transport {
            Some(transport) => transport.clone(),
            None => Arc::new(EtwTransport::with_group_id(&self.provider_name, &self.group_id)),
        }
    }

    /// `smallest` is the size of the shortest payload the exporter can emit.
    fn checked_capacity(&self, smallest: usize) -> Result<usize> {
        if self.buffer_capacity > MAX_PAYLOAD_SIZE {
            return Err(Error::config(format!(
                "buffer capacity {} exceeds the {MAX_PAYLOAD_SIZE} byte payload limit",
                self.buffer_capacity
            )));
        }
        if self.buffer_capacity < smallest {
            return Err(Error::config(format!(
                "buffer capacity {} cannot hold the {smallest} byte record header",
                self.buffer_capacity
            )));
        }
        Ok(self.buffer_capacity)
    }
}
