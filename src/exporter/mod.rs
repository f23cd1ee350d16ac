//! Encode-and-send loops. Each exporter owns its serializer and a transport;
//! a unit that fails to encode or send is logged, counted and skipped while
//! the rest of the batch continues.

mod logs;
mod metrics;
mod spans;

pub use logs::LogExporter;
pub use metrics::MetricExporter;
pub use spans::SpanExporter;

use crate::codec::EncodeBuffer;
use crate::error::{EncodeError, Error, Result, TransportError};
use crate::transport::DataTransport;
use std::cell::RefCell;
use std::thread::LocalKey;

/// Counts the units of one export call.
#[derive(Debug)]
pub(crate) struct ExportTally {
    total: usize,
    failed: usize,
    send_failures: usize,
}

impl ExportTally {
    pub(crate) fn new(total: usize) -> Self {
        ExportTally {
            total,
            failed: 0,
            send_failures: 0,
        }
    }

    pub(crate) fn dropped(&mut self, unit: &'static str, error: &EncodeError) {
        tracing::warn!(target: "etw_wire", unit, %error, "dropped unit that could not be encoded");
        self.failed += 1;
    }

    /// Only the first transport error of a call is logged.
    pub(crate) fn send_failed(&mut self, units: usize, error: &TransportError) {
        if self.send_failures == 0 {
            tracing::warn!(target: "etw_wire", units, %error, "transport rejected payload");
        }
        self.send_failures += 1;
        self.failed += units;
    }

    pub(crate) fn finish(self) -> Result<()> {
        if self.failed == 0 {
            Ok(())
        } else {
            Err(Error::PartialFailure {
                failed: self.failed,
                total: self.total,
            })
        }
    }
}

/// Runs `f` on this thread's buffer for one export path, sized to `capacity`.
pub(crate) fn with_thread_buffer<R>(
    key: &'static LocalKey<RefCell<EncodeBuffer>>,
    capacity: usize,
    f: impl FnOnce(&mut EncodeBuffer) -> R,
) -> R {
    key.with(|cell| match cell.try_borrow_mut() {
        Ok(mut buf) => {
            if buf.capacity() != capacity {
                *buf = EncodeBuffer::with_capacity(capacity);
            }
            f(&mut buf)
        }
        // Re-entered from a transport on this thread.
        Err(_) => f(&mut EncodeBuffer::with_capacity(capacity)),
    })
}

/// Encodes and sends each unit as its own payload.
pub(crate) fn export_each<T>(
    buf: &mut EncodeBuffer,
    units: &[T],
    transport: &dyn DataTransport,
    unit: &'static str,
    mut encode: impl FnMut(&mut EncodeBuffer, &T) -> Result<(), EncodeError>,
) -> Result<()> {
    let mut tally = ExportTally::new(units.len());
    for item in units {
        buf.reset();
        if let Err(e) = encode(buf, item) {
            tally.dropped(unit, &e);
            continue;
        }
        if let Err(e) = transport.send(buf.as_slice()) {
            tally.send_failed(1, &e);
        }
    }
    tally.finish()
}
