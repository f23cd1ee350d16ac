use super::Attribute;
use opentelemetry::trace::{SpanContext, SpanId, TraceFlags, TraceId};
use std::time::SystemTime;

/// Log severity, with the OpenTelemetry severity number of each level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Trace,
    Debug,
    Information,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn number(self) -> u8 {
        match self {
            Severity::Trace => 1,
            Severity::Debug => 5,
            Severity::Information => 9,
            Severity::Warning => 13,
            Severity::Error => 17,
            Severity::Critical => 21,
        }
    }

    pub fn text(self) -> &'static str {
        match self {
            Severity::Trace => "Trace",
            Severity::Debug => "Debug",
            Severity::Information => "Information",
            Severity::Warning => "Warning",
            Severity::Error => "Error",
            Severity::Critical => "Critical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceContext {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    pub trace_flags: TraceFlags,
}

impl From<&SpanContext> for TraceContext {
    fn from(cx: &SpanContext) -> Self {
        TraceContext {
            trace_id: cx.trace_id(),
            span_id: cx.span_id(),
            trace_flags: cx.trace_flags(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionInfo<'a> {
    pub type_name: &'a str,
    pub message: &'a str,
}

/// Read-only view of one log record.
///
/// `scopes` holds the structured-logging scope frames active when the record
/// was written, outermost first.
#[derive(Debug, Clone)]
pub struct LogRecord<'a> {
    pub timestamp: SystemTime,
    pub category_name: Option<&'a str>,
    pub severity: Severity,
    pub event_id: Option<i32>,
    pub event_name: Option<&'a str>,
    pub body: Option<&'a str>,
    pub trace_context: Option<TraceContext>,
    pub attributes: &'a [Attribute<'a>],
    pub scopes: &'a [&'a [Attribute<'a>]],
    pub exception: Option<ExceptionInfo<'a>>,
}

impl<'a> LogRecord<'a> {
    pub fn new(timestamp: SystemTime, severity: Severity) -> Self {
        LogRecord {
            timestamp,
            category_name: None,
            severity,
            event_id: None,
            event_name: None,
            body: None,
            trace_context: None,
            attributes: &[],
            scopes: &[],
            exception: None,
        }
    }

    pub fn with_category(mut self, category_name: &'a str) -> Self {
        self.category_name = Some(category_name);
        self
    }

    pub fn with_event(mut self, id: i32, name: Option<&'a str>) -> Self {
        self.event_id = Some(id);
        self.event_name = name;
        self
    }

    pub fn with_body(mut self, body: &'a str) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_trace_context(mut self, trace_context: TraceContext) -> Self {
        self.trace_context = Some(trace_context);
        self
    }

    pub fn with_attributes(mut self, attributes: &'a [Attribute<'a>]) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_scopes(mut self, scopes: &'a [&'a [Attribute<'a>]]) -> Self {
        self.scopes = scopes;
        self
    }

    pub fn with_exception(mut self, type_name: &'a str, message: &'a str) -> Self {
        self.exception = Some(ExceptionInfo { type_name, message });
        self
    }
}
