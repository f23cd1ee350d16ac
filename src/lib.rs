//! # ETW Wire Exporters
//!
//! Exporters that encode OpenTelemetry logs, spans and metrics into
//! fixed-size binary payloads and hand each payload to a transport.
//!
//! Logs and spans are written as MessagePack "Fluentd Forward" envelopes,
//! one record per payload:
//! `[table, [[timestamp, fields]], {"TimeFormat": "DateTime"}]`.
//! Metrics are written as OTLP `ExportMetricsServiceRequest` protobuf
//! messages, packing as many data points into a payload as fit.
//!
//! Every payload is encoded in a single forward pass into a buffer that never
//! grows. Nested lengths and counts are reserved as fixed-width headers and
//! patched once their content is known. A record that does not fit into
//! [`MAX_PAYLOAD_SIZE`](constants::MAX_PAYLOAD_SIZE) bytes is dropped, never
//! split.
//!
//! By default payloads are written as ETW events. The ETW provider is joined
//! to the group `{e60ec51a-8e54-5a4f-2fb260a4f9213b3a}`. On Unix, a
//! [`UnixDomainSocketTransport`](transport::UnixDomainSocketTransport) can
//! forward payloads to a local agent instead.
//!
//! # Examples
//!
//! ```no_run
//! use opentelemetry_api::global::shutdown_tracer_provider;
//! use opentelemetry_api::trace::Tracer;
//!
//! let tracer = opentelemetry_etw_wire::new_exporter("MyEtwProviderName")
//!     .with_prepopulated_field("cloud.role", "checkout")
//!     .install_simple()
//!     .unwrap();
//!
//! tracer.in_span("doing_work", |cx| {
//!     // Traced app logic here...
//! });
//!
//! shutdown_tracer_provider(); // sending remaining spans
//! ```
mod builder;
pub mod codec;
pub mod constants;
pub mod data;
mod error;
mod exporter;
pub mod msgpack;
pub mod otlp;
pub mod transport;

pub use builder::{new_exporter, ExporterBuilder};
pub use error::{EncodeError, Error, Result, TransportError};
pub use exporter::{LogExporter, MetricExporter, SpanExporter};
