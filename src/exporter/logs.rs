use super::{export_each, with_thread_buffer};
use crate::codec::EncodeBuffer;
use crate::constants::MAX_PAYLOAD_SIZE;
use crate::data::LogRecord;
use crate::error::Result;
use crate::msgpack::LogSerializer;
use crate::transport::DataTransport;
use std::cell::RefCell;
use std::sync::Arc;

thread_local! {static LOG_BUFFER: RefCell<EncodeBuffer> = RefCell::new(EncodeBuffer::new());}

/// Sends each log record as one MessagePack envelope.
#[derive(Debug)]
pub struct LogExporter {
    serializer: LogSerializer,
    transport: Arc<dyn DataTransport>,
    capacity: usize,
}

impl LogExporter {
    pub fn new(serializer: LogSerializer, transport: Arc<dyn DataTransport>) -> Self {
        LogExporter {
            serializer,
            transport,
            capacity: MAX_PAYLOAD_SIZE,
        }
    }

    pub(crate) fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn serializer(&self) -> &LogSerializer {
        &self.serializer
    }

    /// Encodes and sends every record. Records that do not fit a payload are
    /// dropped and reported through [`Error::PartialFailure`](crate::Error::PartialFailure).
    pub fn export(&self, records: &[LogRecord<'_>]) -> Result<()> {
        if !self.transport.is_enabled() {
            return Ok(());
        }
        with_thread_buffer(&LOG_BUFFER, self.capacity, |buf| {
            export_each(buf, records, &*self.transport, "log record", |buf, record| {
                self.serializer.serialize(buf, record)
            })
        })
    }
}
