//! Protobuf encoding of OTLP metrics.

mod attributes;
pub mod field_numbers;
mod metrics;
pub mod wire;

pub use metrics::{
    InstrumentKind, MetricsCheckpoint, MetricsEncoder, MetricsSerializer, DEPTH_DATA_POINT,
    DEPTH_INSTRUMENT, DEPTH_METRIC, DEPTH_RESOURCE, DEPTH_SCOPE, MAX_EXPONENTIAL_SCALE,
    MIN_EXPONENTIAL_SCALE,
};
