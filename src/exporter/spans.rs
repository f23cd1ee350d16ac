use super::{export_each, with_thread_buffer};
use crate::codec::EncodeBuffer;
use crate::constants::MAX_PAYLOAD_SIZE;
use crate::error::Result;
use crate::msgpack::SpanSerializer;
use crate::transport::DataTransport;
use futures_util::future::BoxFuture;
use opentelemetry::trace::TraceError;
use opentelemetry_sdk::export::trace::{ExportResult, SpanData};
use std::cell::RefCell;
use std::sync::Arc;

thread_local! {static SPAN_BUFFER: RefCell<EncodeBuffer> = RefCell::new(EncodeBuffer::new());}

/// Sends each finished span as one MessagePack envelope.
#[derive(Debug)]
pub struct SpanExporter {
    serializer: SpanSerializer,
    transport: Arc<dyn DataTransport>,
    capacity: usize,
}

impl SpanExporter {
    pub fn new(serializer: SpanSerializer, transport: Arc<dyn DataTransport>) -> Self {
        SpanExporter {
            serializer,
            transport,
            capacity: MAX_PAYLOAD_SIZE,
        }
    }

    pub(crate) fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn serializer(&self) -> &SpanSerializer {
        &self.serializer
    }

    /// Synchronous form of [`export`](opentelemetry_sdk::export::trace::SpanExporter::export).
    pub fn export_spans(&self, spans: &[SpanData]) -> Result<()> {
        if !self.transport.is_enabled() {
            return Ok(());
        }
        with_thread_buffer(&SPAN_BUFFER, self.capacity, |buf| {
            export_each(buf, spans, &*self.transport, "span", |buf, span| {
                self.serializer.serialize(buf, span)
            })
        })
    }
}

impl opentelemetry_sdk::export::trace::SpanExporter for SpanExporter {
    fn export(&mut self, batch: Vec<SpanData>) -> BoxFuture<'static, ExportResult> {
        let result = self
            .export_spans(&batch)
            .map_err(|e| TraceError::ExportFailed(Box::new(e)));
        Box::pin(std::future::ready(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::RecordingTransport;
    use opentelemetry::trace::{
        SpanContext, SpanId, SpanKind, Status, TraceFlags, TraceId, TraceState,
    };
    use opentelemetry::{ExportError, InstrumentationLibrary};
    use opentelemetry_sdk::export::trace::SpanExporter as _;
    use opentelemetry_sdk::trace::{EvictedHashMap, EvictedQueue};
    use std::borrow::Cow;
    use std::time::{Duration, UNIX_EPOCH};

    fn span(name: &'static str) -> SpanData {
        let config = opentelemetry_sdk::trace::config();
        SpanData {
            span_context: SpanContext::new(
                TraceId::from_hex("4bf92f3577b34da6a3ce929d0e0e4736").unwrap(),
                SpanId::from_hex("00f067aa0ba902b7").unwrap(),
                TraceFlags::SAMPLED,
                false,
                TraceState::default(),
            ),
            parent_span_id: SpanId::INVALID,
            span_kind: SpanKind::Server,
            name: Cow::Borrowed(name),
            start_time: UNIX_EPOCH + Duration::from_secs(1),
            end_time: UNIX_EPOCH + Duration::from_secs(2),
            attributes: EvictedHashMap::new(config.span_limits.max_attributes_per_span, 0),
            events: EvictedQueue::new(config.span_limits.max_events_per_span),
            links: EvictedQueue::new(config.span_limits.max_links_per_span),
            status: Status::Unset,
            resource: config.resource.clone(),
            instrumentation_lib: InstrumentationLibrary::new(Cow::Borrowed("test"), None, None),
        }
    }

    #[test]
    fn sdk_export_sends_every_span() {
        let transport = Arc::new(RecordingTransport::default());
        let serializer = SpanSerializer::new("Span", &[], None).unwrap();
        let mut exporter = SpanExporter::new(serializer, transport.clone());

        let result = futures::executor::block_on(exporter.export(vec![span("a"), span("b")]));
        assert!(result.is_ok());
        assert_eq!(transport.payloads().len(), 2);
    }

    #[test]
    fn sdk_export_surfaces_partial_failure() {
        let transport = Arc::new(RecordingTransport::default());
        transport.fail_next(1);
        let serializer = SpanSerializer::new("Span", &[], None).unwrap();
        let mut exporter = SpanExporter::new(serializer, transport.clone());

        let result = futures::executor::block_on(exporter.export(vec![span("a"), span("b")]));
        match result {
            Err(TraceError::ExportFailed(e)) => assert_eq!(e.exporter_name(), "etw-wire"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(transport.payloads().len(), 1);
    }
}
