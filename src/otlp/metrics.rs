//! Single-pass encoder for an OTLP `ExportMetricsServiceRequest`.
//!
//! The five enclosing messages of a data point each hold one slot of a
//! [`ReservationStack`]. After every data point all open slots are patched
//! with their current length, so the buffer always ends in a complete,
//! decodable request and can be sent as soon as the next point does not fit.

use super::attributes::write_attributes;
use super::field_numbers::{
    buckets, exemplar, export_metrics_service_request, instrument, instrumentation_scope, metric,
    resource, resource_metrics, scope_metrics,
};
use super::wire::{
    unix_nanos, write_bool_field, write_bytes_field, write_double_field, write_fixed64_field,
    write_packed_double, write_packed_fixed64, write_packed_varint, write_sfixed64_field,
    write_sint32_field, write_string_field, write_varint_field,
};
use crate::codec::{Checkpoint, EncodeBuffer, ReservationStack};
use crate::data::{
    Attribute, DataPoint, Exemplar, ExponentialBuckets, ExponentialHistogramDataPoint,
    HistogramDataPoint, InstrumentationScope, Metric, MetricData, NumberDataPoint, NumberValue,
    Temporality,
};
use crate::error::{EncodeError, Error};

pub const DEPTH_RESOURCE: usize = 0;
pub const DEPTH_SCOPE: usize = 1;
pub const DEPTH_METRIC: usize = 2;
pub const DEPTH_INSTRUMENT: usize = 3;
pub const DEPTH_DATA_POINT: usize = 4;

const MAX_DEPTH: usize = 5;

pub const MIN_EXPONENTIAL_SCALE: i32 = -10;
pub const MAX_EXPONENTIAL_SCALE: i32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrumentKind {
    Gauge,
    Sum,
    Histogram,
    ExponentialHistogram,
}

impl InstrumentKind {
    pub fn of(data: &MetricData<'_>) -> Self {
        match data {
            MetricData::Gauge { .. } => InstrumentKind::Gauge,
            MetricData::Sum { .. } => InstrumentKind::Sum,
            MetricData::Histogram { .. } => InstrumentKind::Histogram,
            MetricData::ExponentialHistogram { .. } => InstrumentKind::ExponentialHistogram,
        }
    }

    /// Field number of this instrument inside `Metric`.
    pub fn field_number(self) -> u32 {
        match self {
            InstrumentKind::Gauge => metric::GAUGE,
            InstrumentKind::Sum => metric::SUM,
            InstrumentKind::Histogram => metric::HISTOGRAM,
            InstrumentKind::ExponentialHistogram => metric::EXPONENTIAL_HISTOGRAM,
        }
    }
}

/// Encodes the resource once so each request can start with a copy of it.
#[derive(Debug, Clone)]
pub struct MetricsSerializer {
    /// The complete `ResourceMetrics.resource` field, header included.
    resource: Box<[u8]>,
}

impl MetricsSerializer {
    pub fn new(resource_attributes: &[Attribute<'_>]) -> Result<Self, Error> {
        let mut scratch = EncodeBuffer::new();
        let encoded = scratch.reserve_message().and_then(|header| {
            write_attributes(&mut scratch, resource::ATTRIBUTES, resource_attributes)?;
            scratch.patch_length_delimited(&header, resource_metrics::RESOURCE)
        });
        if let Err(e) = encoded {
            return Err(Error::config(format!("resource attributes do not fit a payload: {e}")));
        }
        Ok(MetricsSerializer {
            resource: scratch.as_slice().into(),
        })
    }

    /// Bytes taken by a request that holds only the resource.
    pub fn resource_len(&self) -> usize {
        crate::codec::PROTOBUF_HEADER_LEN + self.resource.len()
    }

    /// Starts an empty request at the beginning of `buf`.
    pub fn encoder<'b>(&'b self, buf: &'b mut EncodeBuffer) -> MetricsEncoder<'b> {
        buf.reset();
        MetricsEncoder {
            buf,
            resource: &self.resource,
            stack: ReservationStack::new(),
            instrument: None,
        }
    }
}

/// Cursor and open levels of a [`MetricsEncoder`], for rewinding a failed
/// unit. Levels closed after the checkpoint come back on rewind.
#[derive(Debug, Clone)]
pub struct MetricsCheckpoint {
    position: Checkpoint,
    stack: ReservationStack<MAX_DEPTH>,
    instrument: Option<InstrumentKind>,
}

/// One encoding session over a borrowed buffer.
#[derive(Debug)]
pub struct MetricsEncoder<'b> {
    buf: &'b mut EncodeBuffer,
    resource: &'b [u8],
    stack: ReservationStack<MAX_DEPTH>,
    instrument: Option<InstrumentKind>,
}

impl<'b> MetricsEncoder<'b> {
    pub fn depth(&self) -> usize {
        self.stack.depth()
    }

    /// Everything written so far. A complete request whenever no unit is
    /// half-written.
    pub fn payload(&self) -> &[u8] {
        self.buf.as_slice()
    }

    pub fn checkpoint(&self) -> MetricsCheckpoint {
        MetricsCheckpoint {
            position: self.buf.checkpoint(),
            stack: self.stack.clone(),
            instrument: self.instrument,
        }
    }

    pub fn rewind(&mut self, checkpoint: MetricsCheckpoint) {
        self.buf.rewind(checkpoint.position);
        self.stack = checkpoint.stack;
        self.instrument = checkpoint.instrument;
    }

    /// Drops the request and starts an empty one.
    pub fn reset(&mut self) {
        self.buf.reset();
        self.stack.clear();
        self.instrument = None;
    }

    /// Closes every level at or below `depth`. Their headers already hold
    /// their final lengths.
    pub fn close_to(&mut self, depth: usize) {
        self.stack.truncate(depth);
        if depth <= DEPTH_INSTRUMENT {
            self.instrument = None;
        }
    }

    fn field_number_at(&self, depth: usize) -> u32 {
        match depth {
            DEPTH_RESOURCE => export_metrics_service_request::RESOURCE_METRICS,
            DEPTH_SCOPE => resource_metrics::SCOPE_METRICS,
            DEPTH_METRIC => scope_metrics::METRICS,
            DEPTH_INSTRUMENT => self.instrument.map_or(metric::GAUGE, InstrumentKind::field_number),
            _ => instrument::DATA_POINTS,
        }
    }

    fn open(&mut self, depth: usize) -> Result<(), EncodeError> {
        debug_assert_eq!(self.stack.depth(), depth);
        let reservation = self.buf.reserve_message()?;
        self.stack.push(reservation)
    }

    /// Opens the `ResourceMetrics` entry and copies the encoded resource.
    pub fn begin_resource(&mut self) -> Result<(), EncodeError> {
        self.open(DEPTH_RESOURCE)?;
        self.buf.write_raw(self.resource)
    }

    /// Opens a `ScopeMetrics` entry and writes its `InstrumentationScope`.
    pub fn begin_scope(&mut self, scope: &InstrumentationScope<'_>) -> Result<(), EncodeError> {
        self.open(DEPTH_SCOPE)?;
        let header = self.buf.reserve_message()?;
        write_string_field(self.buf, instrumentation_scope::NAME, scope.name)?;
        if let Some(version) = scope.version {
            write_string_field(self.buf, instrumentation_scope::VERSION, version)?;
        }
        write_attributes(self.buf, instrumentation_scope::ATTRIBUTES, scope.attributes)?;
        self.buf.patch_length_delimited(&header, scope_metrics::SCOPE)
    }

    /// Opens a `Metric` and writes its descriptive fields.
    pub fn begin_metric(&mut self, m: &Metric<'_>) -> Result<(), EncodeError> {
        self.open(DEPTH_METRIC)?;
        write_string_field(self.buf, metric::NAME, m.name)?;
        if !m.description.is_empty() {
            write_string_field(self.buf, metric::DESCRIPTION, m.description)?;
        }
        if !m.unit.is_empty() {
            write_string_field(self.buf, metric::UNIT, m.unit)?;
        }
        Ok(())
    }

    /// Opens the instrument message of `data` and writes its temporality and
    /// monotonicity.
    pub fn begin_instrument(&mut self, data: &MetricData<'_>) -> Result<(), EncodeError> {
        self.open(DEPTH_INSTRUMENT)?;
        self.instrument = Some(InstrumentKind::of(data));
        match *data {
            MetricData::Gauge { .. } => Ok(()),
            MetricData::Sum {
                temporality,
                is_monotonic,
                ..
            } => {
                self.write_temporality(temporality)?;
                if is_monotonic {
                    write_bool_field(self.buf, instrument::IS_MONOTONIC, true)?;
                }
                Ok(())
            }
            MetricData::Histogram { temporality, .. }
            | MetricData::ExponentialHistogram { temporality, .. } => {
                self.write_temporality(temporality)
            }
        }
    }

    fn write_temporality(&mut self, temporality: Temporality) -> Result<(), EncodeError> {
        if temporality == Temporality::Unspecified {
            return Ok(());
        }
        write_varint_field(self.buf, instrument::AGGREGATION_TEMPORALITY, temporality as u64)
    }

    /// Writes one data point under the open instrument, then repatches every
    /// open ancestor.
    ///
    /// On error the point is half-written; rewind to a checkpoint taken before
    /// the call.
    pub fn emit_data_point(&mut self, point: DataPoint<'_>) -> Result<(), EncodeError> {
        self.open(DEPTH_DATA_POINT)?;
        match point {
            DataPoint::Number(p) => write_number_point(self.buf, p)?,
            DataPoint::Histogram(p) => write_histogram_point(self.buf, p)?,
            DataPoint::ExponentialHistogram(p) => write_exponential_histogram_point(self.buf, p)?,
        }
        if let Some(reservation) = self.stack.pop() {
            self.buf.patch_length_delimited(&reservation, instrument::DATA_POINTS)?;
        }
        self.write_individual_message_tags_and_length()
    }

    /// Patches every open level with its length so far.
    pub fn write_individual_message_tags_and_length(&mut self) -> Result<(), EncodeError> {
        for depth in 0..self.stack.depth() {
            if let Some(reservation) = self.stack.get(depth).copied() {
                let field_number = self.field_number_at(depth);
                self.buf.patch_length_delimited(&reservation, field_number)?;
            }
        }
        Ok(())
    }
}

fn write_number_value(
    buf: &mut EncodeBuffer,
    value: NumberValue,
    as_double: u32,
    as_int: u32,
) -> Result<(), EncodeError> {
    match value {
        NumberValue::F64(v) => write_double_field(buf, as_double, v),
        NumberValue::I64(v) => write_sfixed64_field(buf, as_int, v),
    }
}

fn write_exemplars(
    buf: &mut EncodeBuffer,
    field_number: u32,
    exemplars: &[Exemplar<'_>],
) -> Result<(), EncodeError> {
    for ex in exemplars {
        let header = buf.reserve_message()?;
        write_fixed64_field(buf, exemplar::TIME_UNIX_NANO, unix_nanos(ex.time))?;
        write_number_value(buf, ex.value, exemplar::AS_DOUBLE, exemplar::AS_INT)?;
        if let Some(span_id) = &ex.span_id {
            write_bytes_field(buf, exemplar::SPAN_ID, span_id)?;
        }
        if let Some(trace_id) = &ex.trace_id {
            write_bytes_field(buf, exemplar::TRACE_ID, trace_id)?;
        }
        write_attributes(buf, exemplar::FILTERED_ATTRIBUTES, ex.filtered_attributes)?;
        buf.patch_length_delimited(&header, field_number)?;
    }
    Ok(())
}

fn write_number_point(buf: &mut EncodeBuffer, p: &NumberDataPoint<'_>) -> Result<(), EncodeError> {
    use super::field_numbers::number_data_point::*;
    write_fixed64_field(buf, START_TIME_UNIX_NANO, unix_nanos(p.start_time))?;
    write_fixed64_field(buf, TIME_UNIX_NANO, unix_nanos(p.time))?;
    write_number_value(buf, p.value, AS_DOUBLE, AS_INT)?;
    write_exemplars(buf, EXEMPLARS, p.exemplars)?;
    write_attributes(buf, ATTRIBUTES, p.attributes)
}

fn write_histogram_point(
    buf: &mut EncodeBuffer,
    p: &HistogramDataPoint<'_>,
) -> Result<(), EncodeError> {
    use super::field_numbers::histogram_data_point::*;
    write_fixed64_field(buf, START_TIME_UNIX_NANO, unix_nanos(p.start_time))?;
    write_fixed64_field(buf, TIME_UNIX_NANO, unix_nanos(p.time))?;
    write_fixed64_field(buf, COUNT, p.count)?;
    if let Some(sum) = p.sum {
        write_double_field(buf, SUM, sum)?;
    }
    if !p.bucket_counts.is_empty() && p.bucket_counts.len() != p.explicit_bounds.len() + 1 {
        return Err(EncodeError::InvalidDataPoint(
            "histogram needs exactly one more bucket count than explicit bounds",
        ));
    }
    write_packed_fixed64(buf, BUCKET_COUNTS, p.bucket_counts)?;
    write_packed_double(buf, EXPLICIT_BOUNDS, p.explicit_bounds)?;
    write_exemplars(buf, EXEMPLARS, p.exemplars)?;
    if let Some(min) = p.min {
        write_double_field(buf, MIN, min)?;
    }
    if let Some(max) = p.max {
        write_double_field(buf, MAX, max)?;
    }
    write_attributes(buf, ATTRIBUTES, p.attributes)
}

fn write_buckets(
    buf: &mut EncodeBuffer,
    field_number: u32,
    b: &ExponentialBuckets<'_>,
) -> Result<(), EncodeError> {
    if b.bucket_counts.is_empty() && b.offset == 0 {
        return Ok(());
    }
    let header = buf.reserve_message()?;
    if b.offset != 0 {
        write_sint32_field(buf, buckets::OFFSET, b.offset)?;
    }
    write_packed_varint(buf, buckets::BUCKET_COUNTS, b.bucket_counts)?;
    buf.patch_length_delimited(&header, field_number)
}

fn write_exponential_histogram_point(
    buf: &mut EncodeBuffer,
    p: &ExponentialHistogramDataPoint<'_>,
) -> Result<(), EncodeError> {
    use super::field_numbers::exponential_histogram_data_point::*;
    write_attributes(buf, ATTRIBUTES, p.attributes)?;
    write_fixed64_field(buf, START_TIME_UNIX_NANO, unix_nanos(p.start_time))?;
    write_fixed64_field(buf, TIME_UNIX_NANO, unix_nanos(p.time))?;
    write_fixed64_field(buf, COUNT, p.count)?;
    if let Some(sum) = p.sum {
        write_double_field(buf, SUM, sum)?;
    }
    if !(MIN_EXPONENTIAL_SCALE..=MAX_EXPONENTIAL_SCALE).contains(&p.scale) {
        return Err(EncodeError::InvalidDataPoint(
            "exponential histogram scale is outside [-10, 20]",
        ));
    }
    write_sint32_field(buf, SCALE, p.scale)?;
    write_fixed64_field(buf, ZERO_COUNT, p.zero_count)?;
    write_buckets(buf, POSITIVE, &p.positive)?;
    write_buckets(buf, NEGATIVE, &p.negative)?;
    if let Some(min) = p.min {
        write_double_field(buf, MIN, min)?;
    }
    if let Some(max) = p.max {
        write_double_field(buf, MAX, max)?;
    }
    if p.zero_threshold != 0.0 {
        write_double_field(buf, ZERO_THRESHOLD, p.zero_threshold)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::varint::read_varint;
    use std::time::{Duration, UNIX_EPOCH};

    fn number(value: i64) -> NumberDataPoint<'static> {
        NumberDataPoint {
            attributes: &[],
            start_time: UNIX_EPOCH,
            time: UNIX_EPOCH + Duration::from_secs(1),
            value: NumberValue::I64(value),
            exemplars: &[],
        }
    }

    /// Reads the length of the message whose 4-byte header starts at `at`.
    fn length_at(bytes: &[u8], at: usize) -> usize {
        read_varint(bytes, at + 1).unwrap().0 as usize
    }

    #[test]
    fn ancestors_are_patched_after_every_point() {
        let serializer = MetricsSerializer::new(&[Attribute::new("service.name", "svc")]).unwrap();
        let mut buf = EncodeBuffer::with_capacity(4096);
        let points = [number(1), number(2)];
        let metric = Metric {
            scope: InstrumentationScope::new("lib"),
            name: "requests",
            description: "",
            unit: "1",
            data: MetricData::Sum {
                data_points: &points,
                temporality: Temporality::Cumulative,
                is_monotonic: true,
            },
        };

        let mut enc = serializer.encoder(&mut buf);
        enc.begin_resource().unwrap();
        enc.begin_scope(&metric.scope).unwrap();
        enc.begin_metric(&metric).unwrap();
        enc.begin_instrument(&metric.data).unwrap();
        for point in metric.data.data_points() {
            enc.emit_data_point(point).unwrap();
            let bytes = enc.payload();
            assert_eq!(bytes[0], 0x0A);
            assert_eq!(length_at(bytes, 0), bytes.len() - 4);
        }
        assert_eq!(enc.depth(), 4);
    }

    #[test]
    fn invalid_points_fail_mid_write() {
        let serializer = MetricsSerializer::new(&[]).unwrap();
        let mut buf = EncodeBuffer::with_capacity(4096);
        let points = [HistogramDataPoint {
            attributes: &[],
            start_time: UNIX_EPOCH,
            time: UNIX_EPOCH,
            count: 3,
            sum: Some(6.0),
            bucket_counts: &[1, 2],
            explicit_bounds: &[1.0, 2.0],
            min: None,
            max: None,
            exemplars: &[],
        }];
        let data = MetricData::Histogram {
            data_points: &points,
            temporality: Temporality::Delta,
        };
        let mut enc = serializer.encoder(&mut buf);
        enc.begin_resource().unwrap();
        enc.begin_scope(&InstrumentationScope::new("lib")).unwrap();
        enc.begin_metric(&Metric {
            scope: InstrumentationScope::new("lib"),
            name: "latency",
            description: "",
            unit: "ms",
            data,
        })
        .unwrap();
        enc.begin_instrument(&data).unwrap();

        let before = enc.checkpoint();
        let len = enc.payload().len();
        let err = enc.emit_data_point(DataPoint::Histogram(&points[0])).unwrap_err();
        assert!(matches!(err, EncodeError::InvalidDataPoint(_)));
        assert!(enc.payload().len() > len);
        enc.rewind(before);
        assert_eq!(enc.payload().len(), len);
        assert_eq!(enc.depth(), 4);
    }

    #[test]
    fn scale_out_of_range_is_rejected() {
        let mut buf = EncodeBuffer::with_capacity(256);
        let point = ExponentialHistogramDataPoint {
            attributes: &[],
            start_time: UNIX_EPOCH,
            time: UNIX_EPOCH,
            count: 0,
            sum: None,
            scale: 21,
            zero_count: 0,
            positive: ExponentialBuckets::default(),
            negative: ExponentialBuckets::default(),
            min: None,
            max: None,
            zero_threshold: 0.0,
        };
        assert!(matches!(
            write_exponential_histogram_point(&mut buf, &point),
            Err(EncodeError::InvalidDataPoint(_))
        ));
    }

    #[test]
    fn overflow_leaves_prefix_decodable() {
        let serializer = MetricsSerializer::new(&[]).unwrap();
        let mut buf = EncodeBuffer::with_capacity(120);
        let points = [number(1), number(2), number(3), number(4)];
        let data = MetricData::Gauge { data_points: &points };
        let metric = Metric {
            scope: InstrumentationScope::new("lib"),
            name: "g",
            description: "",
            unit: "",
            data,
        };
        let mut enc = serializer.encoder(&mut buf);
        enc.begin_resource().unwrap();
        enc.begin_scope(&metric.scope).unwrap();
        enc.begin_metric(&metric).unwrap();
        enc.begin_instrument(&data).unwrap();

        let mut written = 0;
        for point in data.data_points() {
            let cp = enc.checkpoint();
            match enc.emit_data_point(point) {
                Ok(()) => written += 1,
                Err(e) => {
                    assert!(e.is_overflow());
                    enc.rewind(cp);
                    break;
                }
            }
        }
        assert!(written > 0 && written < points.len());
        let bytes = enc.payload();
        assert_eq!(length_at(bytes, 0), bytes.len() - 4);
    }
}
