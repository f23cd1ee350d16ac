use super::Attribute;
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, Default)]
pub struct InstrumentationScope<'a> {
    pub name: &'a str,
    pub version: Option<&'a str>,
    pub attributes: &'a [Attribute<'a>],
}

impl<'a> InstrumentationScope<'a> {
    pub fn new(name: &'a str) -> Self {
        InstrumentationScope {
            name,
            version: None,
            attributes: &[],
        }
    }

    pub fn with_version(mut self, version: &'a str) -> Self {
        self.version = Some(version);
        self
    }

    pub fn with_attributes(mut self, attributes: &'a [Attribute<'a>]) -> Self {
        self.attributes = attributes;
        self
    }

    /// Scopes are grouped by name and version.
    pub(crate) fn same_scope(&self, other: &InstrumentationScope<'_>) -> bool {
        self.name == other.name && self.version == other.version
    }
}

/// OTLP `AggregationTemporality`, with its wire value as discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Temporality {
    #[default]
    Unspecified = 0,
    Delta = 1,
    Cumulative = 2,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumberValue {
    I64(i64),
    F64(f64),
}

#[derive(Debug, Clone, Copy)]
pub struct Exemplar<'a> {
    pub filtered_attributes: &'a [Attribute<'a>],
    pub time: SystemTime,
    pub value: NumberValue,
    pub span_id: Option<[u8; 8]>,
    pub trace_id: Option<[u8; 16]>,
}

#[derive(Debug, Clone, Copy)]
pub struct NumberDataPoint<'a> {
    pub attributes: &'a [Attribute<'a>],
    pub start_time: SystemTime,
    pub time: SystemTime,
    pub value: NumberValue,
    pub exemplars: &'a [Exemplar<'a>],
}

#[derive(Debug, Clone, Copy)]
pub struct HistogramDataPoint<'a> {
    pub attributes: &'a [Attribute<'a>],
    pub start_time: SystemTime,
    pub time: SystemTime,
    pub count: u64,
    pub sum: Option<f64>,
    /// Either empty or exactly one longer than `explicit_bounds`.
    pub bucket_counts: &'a [u64],
    pub explicit_bounds: &'a [f64],
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub exemplars: &'a [Exemplar<'a>],
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExponentialBuckets<'a> {
    pub offset: i32,
    pub bucket_counts: &'a [u64],
}

#[derive(Debug, Clone, Copy)]
pub struct ExponentialHistogramDataPoint<'a> {
    pub attributes: &'a [Attribute<'a>],
    pub start_time: SystemTime,
    pub time: SystemTime,
    pub count: u64,
    pub sum: Option<f64>,
    /// Must lie in `[-10, 20]`.
    pub scale: i32,
    pub zero_count: u64,
    pub positive: ExponentialBuckets<'a>,
    pub negative: ExponentialBuckets<'a>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub zero_threshold: f64,
}

#[derive(Debug, Clone, Copy)]
pub enum MetricData<'a> {
    Gauge {
        data_points: &'a [NumberDataPoint<'a>],
    },
    Sum {
        data_points: &'a [NumberDataPoint<'a>],
        temporality: Temporality,
        is_monotonic: bool,
    },
    Histogram {
        data_points: &'a [HistogramDataPoint<'a>],
        temporality: Temporality,
    },
    ExponentialHistogram {
        data_points: &'a [ExponentialHistogramDataPoint<'a>],
        temporality: Temporality,
    },
}

/// One data point of any instrument kind.
#[derive(Debug, Clone, Copy)]
pub enum DataPoint<'a> {
    Number(&'a NumberDataPoint<'a>),
    Histogram(&'a HistogramDataPoint<'a>),
    ExponentialHistogram(&'a ExponentialHistogramDataPoint<'a>),
}

impl<'a> MetricData<'a> {
    pub fn data_point(&self, index: usize) -> Option<DataPoint<'a>> {
        match *self {
            MetricData::Gauge { data_points } | MetricData::Sum { data_points, .. } => {
                data_points.get(index).map(DataPoint::Number)
            }
            MetricData::Histogram { data_points, .. } => {
                data_points.get(index).map(DataPoint::Histogram)
            }
            MetricData::ExponentialHistogram { data_points, .. } => {
                data_points.get(index).map(DataPoint::ExponentialHistogram)
            }
        }
    }

    pub fn data_points(&self) -> impl Iterator<Item = DataPoint<'a>> + '_ {
        (0..self.data_point_count()).filter_map(move |i| self.data_point(i))
    }

    pub fn data_point_count(&self) -> usize {
        match self {
            MetricData::Gauge { data_points } => data_points.len(),
            MetricData::Sum { data_points, .. } => data_points.len(),
            MetricData::Histogram { data_points, .. } => data_points.len(),
            MetricData::ExponentialHistogram { data_points, .. } => data_points.len(),
        }
    }
}

/// Read-only view of one metric stream and the scope that produced it.
#[derive(Debug, Clone, Copy)]
pub struct Metric<'a> {
    pub scope: InstrumentationScope<'a>,
    pub name: &'a str,
    pub description: &'a str,
    pub unit: &'a str,
    pub data: MetricData<'a>,
}
