//! Read-only views of the telemetry the encoders consume. Nothing here is
//! mutated or retained by an exporter.

mod log;
mod metrics;
mod value;

pub use log::*;
pub use metrics::*;
pub use value::*;
