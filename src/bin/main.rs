use opentelemetry::trace::TraceContextExt;
use opentelemetry::Key;
use opentelemetry_api::global::shutdown_tracer_provider;
use opentelemetry_api::trace::{Span, Tracer};
use opentelemetry_etw_wire as otel_wire;
use otel_wire::data::{
    Attribute, InstrumentationScope, LogRecord, Metric, MetricData, NumberDataPoint, NumberValue,
    Severity, Temporality, TraceContext,
};
use std::time::{Duration, SystemTime};

const SAMPLE_KEY_METHOD: Key = Key::from_static_str("http.method");

/// Usage: `main [socket-path]`. Without a path, payloads go to ETW.
///
/// Span events are not exported; the span's attributes carry its details.
fn main() -> Result<(), otel_wire::Error> {
    let builder = otel_wire::new_exporter("Sample-Provider-Name")
        .with_prepopulated_field("cloud.role", "sample")
        .with_resource_attribute("service.name", "sample")
        .with_table_mapping("*", "*");

    #[cfg(unix)]
    let builder = match std::env::args().nth(1) {
        Some(path) => {
            builder.with_transport(otel_wire::transport::UnixDomainSocketTransport::new(path))
        }
        None => builder,
    };

    let logs = builder.build_log_exporter()?;
    let mut metrics = builder.build_metric_exporter()?;
    let tracer = builder.install_simple()?;

    tracer.in_span("OuterSpanName", |cx| {
        let span = cx.span();
        span.set_attribute(SAMPLE_KEY_METHOD.string("GET"));

        let attributes = [Attribute::new("user", "alice"), Attribute::new("attempt", 3_i64)];
        let record = LogRecord::new(SystemTime::now(), Severity::Information)
            .with_category("Sample.Login")
            .with_event(1, Some("LoginSucceeded"))
            .with_body("user logged in")
            .with_trace_context(TraceContext::from(span.span_context()))
            .with_attributes(&attributes);
        if let Err(e) = logs.export(&[record]) {
            eprintln!("log export failed: {e}");
        }

        let mut child = tracer.start("InnerSpanName");
        std::thread::sleep(Duration::from_millis(10));
        child.end();
    });

    let start = SystemTime::now();
    let points = [
        NumberDataPoint {
            attributes: &[],
            start_time: start,
            time: start + Duration::from_secs(1),
            value: NumberValue::I64(10),
            exemplars: &[],
        },
        NumberDataPoint {
            attributes: &[],
            start_time: start,
            time: start + Duration::from_secs(2),
            value: NumberValue::F64(12.5),
            exemplars: &[],
        },
    ];
    let batch = [Metric {
        scope: InstrumentationScope::new("sample").with_version(env!("CARGO_PKG_VERSION")),
        name: "requests",
        description: "Requests handled by the sample",
        unit: "1",
        data: MetricData::Sum {
            data_points: &points,
            temporality: Temporality::Cumulative,
            is_monotonic: true,
        },
    }];
    if let Err(e) = metrics.export(&batch) {
        eprintln!("metric export failed: {e}");
    }

    shutdown_tracer_provider(); // sending remaining spans
    Ok(())
}
