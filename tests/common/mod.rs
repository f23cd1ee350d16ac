#![allow(dead_code)]

use opentelemetry_etw_wire::transport::DataTransport;
use opentelemetry_etw_wire::TransportError;
use std::sync::Mutex;

/// Keeps every payload it is given.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    payloads: Mutex<Vec<Vec<u8>>>,
}

impl RecordingTransport {
    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.payloads.lock().unwrap().clone()
    }
}

impl DataTransport for RecordingTransport {
    fn send(&self, payload: &[u8]) -> Result<(), TransportError> {
        self.payloads.lock().unwrap().push(payload.to_vec());
        Ok(())
    }
}

/// A decoded MessagePack value.
#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    Nil,
    Bool(bool),
    Int(i64),
    UInt(u64),
    F64(f64),
    Str(String),
    Array(Vec<Msg>),
    Map(Vec<(Msg, Msg)>),
    Timestamp { secs: i64, nanos: u32 },
}

impl Msg {
    /// Looks up a string key of a map.
    pub fn get(&self, key: &str) -> Option<&Msg> {
        match self {
            Msg::Map(entries) => entries
                .iter()
                .find(|(k, _)| matches!(k, Msg::Str(s) if s == key))
                .map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn keys(&self) -> Vec<&str> {
        match self {
            Msg::Map(entries) => entries
                .iter()
                .filter_map(|(k, _)| match k {
                    Msg::Str(s) => Some(s.as_str()),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Msg::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Msg::Int(i) => Some(i),
            Msg::UInt(u) => i64::try_from(u).ok(),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Msg]> {
        match self {
            Msg::Array(items) => Some(items),
            _ => None,
        }
    }
}

/// Decodes one complete value; panics on trailing bytes or malformed input.
pub fn decode_msgpack(bytes: &[u8]) -> Msg {
    let mut reader = Reader { bytes, at: 0 };
    let value = reader.value();
    assert_eq!(reader.at, bytes.len(), "trailing bytes after value");
    value
}

/// The `[table, [[time, fields]], options]` parts of one envelope.
pub struct Envelope {
    pub table: String,
    pub time: Msg,
    pub fields: Msg,
    pub options: Msg,
}

pub fn decode_envelope(bytes: &[u8]) -> Envelope {
    let root = decode_msgpack(bytes);
    let parts = root.as_array().expect("envelope is an array");
    assert_eq!(parts.len(), 3);
    let entries = parts[1].as_array().expect("entries array");
    assert_eq!(entries.len(), 1);
    let entry = entries[0].as_array().expect("entry array");
    assert_eq!(entry.len(), 2);
    Envelope {
        table: parts[0].as_str().expect("table name").to_owned(),
        time: entry[0].clone(),
        fields: entry[1].clone(),
        options: parts[2].clone(),
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    at: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> &'a [u8] {
        let slice = &self.bytes[self.at..self.at + len];
        self.at += len;
        slice
    }

    fn u8(&mut self) -> u8 {
        self.take(1)[0]
    }

    fn be<const N: usize>(&mut self) -> [u8; N] {
        self.take(N).try_into().unwrap()
    }

    fn str(&mut self, len: usize) -> Msg {
        Msg::Str(String::from_utf8(self.take(len).to_vec()).unwrap())
    }

    fn array(&mut self, len: usize) -> Msg {
        Msg::Array((0..len).map(|_| self.value()).collect())
    }

    fn map(&mut self, len: usize) -> Msg {
        Msg::Map((0..len).map(|_| (self.value(), self.value())).collect())
    }

    fn value(&mut self) -> Msg {
        let marker = self.u8();
        match marker {
            0x00..=0x7F => Msg::UInt(marker as u64),
            0x80..=0x8F => self.map((marker & 0x0F) as usize),
            0x90..=0x9F => self.array((marker & 0x0F) as usize),
            0xA0..=0xBF => self.str((marker & 0x1F) as usize),
            0xC0 => Msg::Nil,
            0xC2 => Msg::Bool(false),
            0xC3 => Msg::Bool(true),
            0xC7 => {
                let len = self.u8() as usize;
                let ext_type = self.u8() as i8;
                assert_eq!((len, ext_type), (12, -1), "only 96-bit timestamps are expected");
                let nanos = u32::from_be_bytes(self.be());
                let secs = i64::from_be_bytes(self.be());
                Msg::Timestamp { secs, nanos }
            }
            0xCA => Msg::F64(f32::from_be_bytes(self.be()) as f64),
            0xCB => Msg::F64(f64::from_be_bytes(self.be())),
            0xCC => Msg::UInt(self.u8() as u64),
            0xCD => Msg::UInt(u16::from_be_bytes(self.be()) as u64),
            0xCE => Msg::UInt(u32::from_be_bytes(self.be()) as u64),
            0xCF => Msg::UInt(u64::from_be_bytes(self.be())),
            0xD0 => Msg::Int(self.u8() as i8 as i64),
            0xD1 => Msg::Int(i16::from_be_bytes(self.be()) as i64),
            0xD2 => Msg::Int(i32::from_be_bytes(self.be()) as i64),
            0xD3 => Msg::Int(i64::from_be_bytes(self.be())),
            0xD9 => {
                let len = self.u8() as usize;
                self.str(len)
            }
            0xDA => {
                let len = u16::from_be_bytes(self.be()) as usize;
                self.str(len)
            }
            0xDB => {
                let len = u32::from_be_bytes(self.be()) as usize;
                self.str(len)
            }
            0xDC => {
                let len = u16::from_be_bytes(self.be()) as usize;
                self.array(len)
            }
            0xDD => {
                let len = u32::from_be_bytes(self.be()) as usize;
                self.array(len)
            }
            0xDE => {
                let len = u16::from_be_bytes(self.be()) as usize;
                self.map(len)
            }
            0xDF => {
                let len = u32::from_be_bytes(self.be()) as usize;
                self.map(len)
            }
            0xE0..=0xFF => Msg::Int(marker as i8 as i64),
            other => panic!("unexpected marker {other:#04x} at {}", self.at - 1),
        }
    }
}

/// OTLP metrics messages, decoded with `prost`.
pub mod otlp {
    #[derive(Clone, PartialEq, prost::Message)]
    pub struct ExportMetricsServiceRequest {
        #[prost(message, repeated, tag = "1")]
        pub resource_metrics: Vec<ResourceMetrics>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct ResourceMetrics {
        #[prost(message, optional, tag = "1")]
        pub resource: Option<Resource>,
        #[prost(message, repeated, tag = "2")]
        pub scope_metrics: Vec<ScopeMetrics>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct Resource {
        #[prost(message, repeated, tag = "1")]
        pub attributes: Vec<KeyValue>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct ScopeMetrics {
        #[prost(message, optional, tag = "1")]
        pub scope: Option<InstrumentationScope>,
        #[prost(message, repeated, tag = "2")]
        pub metrics: Vec<Metric>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct InstrumentationScope {
        #[prost(string, tag = "1")]
        pub name: String,
        #[prost(string, tag = "2")]
        pub version: String,
        #[prost(message, repeated, tag = "3")]
        pub attributes: Vec<KeyValue>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct Metric {
        #[prost(string, tag = "1")]
        pub name: String,
        #[prost(string, tag = "2")]
        pub description: String,
        #[prost(string, tag = "3")]
        pub unit: String,
        #[prost(oneof = "metric::Data", tags = "5, 7, 9, 10")]
        pub data: Option<metric::Data>,
    }

    pub mod metric {
        #[derive(Clone, PartialEq, prost::Oneof)]
        pub enum Data {
            #[prost(message, tag = "5")]
            Gauge(super::Gauge),
            #[prost(message, tag = "7")]
            Sum(super::Sum),
            #[prost(message, tag = "9")]
            Histogram(super::Histogram),
            #[prost(message, tag = "10")]
            ExponentialHistogram(super::ExponentialHistogram),
        }
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct Gauge {
        #[prost(message, repeated, tag = "1")]
        pub data_points: Vec<NumberDataPoint>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct Sum {
        #[prost(message, repeated, tag = "1")]
        pub data_points: Vec<NumberDataPoint>,
        #[prost(int32, tag = "2")]
        pub aggregation_temporality: i32,
        #[prost(bool, tag = "3")]
        pub is_monotonic: bool,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct Histogram {
        #[prost(message, repeated, tag = "1")]
        pub data_points: Vec<HistogramDataPoint>,
        #[prost(int32, tag = "2")]
        pub aggregation_temporality: i32,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct ExponentialHistogram {
        #[prost(message, repeated, tag = "1")]
        pub data_points: Vec<ExponentialHistogramDataPoint>,
        #[prost(int32, tag = "2")]
        pub aggregation_temporality: i32,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct NumberDataPoint {
        #[prost(message, repeated, tag = "7")]
        pub attributes: Vec<KeyValue>,
        #[prost(fixed64, tag = "2")]
        pub start_time_unix_nano: u64,
        #[prost(fixed64, tag = "3")]
        pub time_unix_nano: u64,
        #[prost(message, repeated, tag = "5")]
        pub exemplars: Vec<Exemplar>,
        #[prost(oneof = "number_data_point::Value", tags = "4, 6")]
        pub value: Option<number_data_point::Value>,
    }

    pub mod number_data_point {
        #[derive(Clone, Copy, PartialEq, prost::Oneof)]
        pub enum Value {
            #[prost(double, tag = "4")]
            AsDouble(f64),
            #[prost(sfixed64, tag = "6")]
            AsInt(i64),
        }
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct HistogramDataPoint {
        #[prost(message, repeated, tag = "9")]
        pub attributes: Vec<KeyValue>,
        #[prost(fixed64, tag = "2")]
        pub start_time_unix_nano: u64,
        #[prost(fixed64, tag = "3")]
        pub time_unix_nano: u64,
        #[prost(fixed64, tag = "4")]
        pub count: u64,
        #[prost(double, optional, tag = "5")]
        pub sum: Option<f64>,
        #[prost(fixed64, repeated, tag = "6")]
        pub bucket_counts: Vec<u64>,
        #[prost(double, repeated, tag = "7")]
        pub explicit_bounds: Vec<f64>,
        #[prost(message, repeated, tag = "8")]
        pub exemplars: Vec<Exemplar>,
        #[prost(double, optional, tag = "11")]
        pub min: Option<f64>,
        #[prost(double, optional, tag = "12")]
        pub max: Option<f64>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct ExponentialHistogramDataPoint {
        #[prost(message, repeated, tag = "1")]
        pub attributes: Vec<KeyValue>,
        #[prost(fixed64, tag = "2")]
        pub start_time_unix_nano: u64,
        #[prost(fixed64, tag = "3")]
        pub time_unix_nano: u64,
        #[prost(fixed64, tag = "4")]
        pub count: u64,
        #[prost(double, optional, tag = "5")]
        pub sum: Option<f64>,
        #[prost(sint32, tag = "6")]
        pub scale: i32,
        #[prost(fixed64, tag = "7")]
        pub zero_count: u64,
        #[prost(message, optional, tag = "8")]
        pub positive: Option<Buckets>,
        #[prost(message, optional, tag = "9")]
        pub negative: Option<Buckets>,
        #[prost(double, optional, tag = "12")]
        pub min: Option<f64>,
        #[prost(double, optional, tag = "13")]
        pub max: Option<f64>,
        #[prost(double, tag = "14")]
        pub zero_threshold: f64,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct Buckets {
        #[prost(sint32, tag = "1")]
        pub offset: i32,
        #[prost(uint64, repeated, tag = "2")]
        pub bucket_counts: Vec<u64>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct Exemplar {
        #[prost(message, repeated, tag = "7")]
        pub filtered_attributes: Vec<KeyValue>,
        #[prost(fixed64, tag = "2")]
        pub time_unix_nano: u64,
        #[prost(bytes = "vec", tag = "4")]
        pub span_id: Vec<u8>,
        #[prost(bytes = "vec", tag = "5")]
        pub trace_id: Vec<u8>,
        #[prost(oneof = "exemplar::Value", tags = "3, 6")]
        pub value: Option<exemplar::Value>,
    }

    pub mod exemplar {
        #[derive(Clone, Copy, PartialEq, prost::Oneof)]
        pub enum Value {
            #[prost(double, tag = "3")]
            AsDouble(f64),
            #[prost(sfixed64, tag = "6")]
            AsInt(i64),
        }
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct KeyValue {
        #[prost(string, tag = "1")]
        pub key: String,
        #[prost(message, optional, tag = "2")]
        pub value: Option<AnyValue>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct AnyValue {
        #[prost(oneof = "any_value::Value", tags = "1, 2, 3, 4")]
        pub value: Option<any_value::Value>,
    }

    pub mod any_value {
        #[derive(Clone, PartialEq, prost::Oneof)]
        pub enum Value {
            #[prost(string, tag = "1")]
            StringValue(String),
            #[prost(bool, tag = "2")]
            BoolValue(bool),
            #[prost(int64, tag = "3")]
            IntValue(i64),
            #[prost(double, tag = "4")]
            DoubleValue(f64),
        }
    }

    pub fn decode(payload: &[u8]) -> ExportMetricsServiceRequest {
        prost::Message::decode(payload).expect("payload is a valid ExportMetricsServiceRequest")
    }

    /// `(key, value)` pairs of decoded attributes, values rendered as text.
    pub fn attributes(kvs: &[KeyValue]) -> Vec<(String, String)> {
        kvs.iter()
            .map(|kv| {
                let value = match kv.value.as_ref().and_then(|v| v.value.clone()) {
                    Some(any_value::Value::StringValue(s)) => s,
                    Some(any_value::Value::BoolValue(b)) => b.to_string(),
                    Some(any_value::Value::IntValue(i)) => i.to_string(),
                    Some(any_value::Value::DoubleValue(d)) => d.to_string(),
                    None => String::new(),
                };
                (kv.key.clone(), value)
            })
            .collect()
    }
}
