use tracelogging_dynamic::Guid;

/// Largest payload a single transport write may carry. Records that do not fit
/// are dropped, never split.
pub const MAX_PAYLOAD_SIZE: usize = 65_360;

/// {e60ec51a-8e54-5a4f-2fb260a4f9213b3a}
/// Events in this group were (re)logged from OpenTelemetry.
/// The payload field holds a MessagePack or OTLP encoded record.
pub const GROUP_ID: Guid = Guid::from_fields(
    0xe60ec51a,
    0x8e54,
    0x5a4f,
    [0x2f, 0xb2, 0x60, 0xa4, 0xf9, 0x21, 0x3b, 0x3a],
);

pub const DEFAULT_LOG_TABLE_NAME: &str = "Log";
pub const DEFAULT_SPAN_TABLE_NAME: &str = "Span";

/// Longest table name accepted by the envelope.
pub const MAX_TABLE_NAME_LEN: usize = 50;

/// Field names with a fixed meaning in the envelope. Prepopulated fields may not
/// reuse them.
pub mod fields {
    pub const ENV_NAME: &str = "env_name";
    pub const ENV_PROPERTIES: &str = "env_properties";
    pub const ENV_DT_TRACE_ID: &str = "env_dt_traceId";
    pub const ENV_DT_SPAN_ID: &str = "env_dt_spanId";
    pub const ENV_DT_TRACE_FLAGS: &str = "env_dt_traceFlags";
    pub const ENV_EX_TYPE: &str = "env_ex_type";
    pub const ENV_EX_MSG: &str = "env_ex_msg";

    pub const SEVERITY_TEXT: &str = "severityText";
    pub const SEVERITY_NUMBER: &str = "severityNumber";
    pub const NAME: &str = "name";
    pub const EVENT_ID: &str = "eventId";
    pub const EVENT_NAME: &str = "eventName";
    pub const BODY: &str = "body";

    pub const PARENT_ID: &str = "parentId";
    pub const KIND: &str = "kind";
    pub const START_TIME: &str = "startTime";
    pub const SUCCESS: &str = "success";
    pub const STATUS_MESSAGE: &str = "statusMessage";
    pub const LINKS: &str = "links";
    pub const TO_TRACE_ID: &str = "toTraceId";
    pub const TO_SPAN_ID: &str = "toSpanId";

    pub const TIME_FORMAT: &str = "TimeFormat";
    pub const DATE_TIME: &str = "DateTime";

    pub(crate) const RESERVED: &[&str] = &[
        ENV_NAME,
        ENV_PROPERTIES,
        ENV_DT_TRACE_ID,
        ENV_DT_SPAN_ID,
        ENV_DT_TRACE_FLAGS,
        ENV_EX_TYPE,
        ENV_EX_MSG,
        SEVERITY_TEXT,
        SEVERITY_NUMBER,
        NAME,
        EVENT_ID,
        EVENT_NAME,
        BODY,
        PARENT_ID,
        KIND,
        START_TIME,
        SUCCESS,
        STATUS_MESSAGE,
        LINKS,
    ];
}

/// Span attributes that always get a dedicated column, with the column name
/// they are renamed to.
pub const SPAN_PART_B_MAPPING: &[(&str, &str)] = &[
    ("db.system", "dbSystem"),
    ("db.name", "dbName"),
    ("db.statement", "dbStatement"),
    ("http.method", "httpMethod"),
    ("http.url", "httpUrl"),
    ("http.status_code", "httpStatusCode"),
    ("messaging.system", "messagingSystem"),
    ("messaging.destination", "messagingDestination"),
    ("messaging.url", "messagingUrl"),
];

/// Event name used by the ETW transport for every payload.
pub const ETW_EVENT_NAME: &str = "OpenTelemetryPayload";
/// Name of the ETW field that carries the encoded payload.
pub const ETW_PAYLOAD_FIELD: &str = "Payload";
