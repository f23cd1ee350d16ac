use thiserror::Error;

/// Failures raised while writing into a bounded [`EncodeBuffer`](crate::codec::EncodeBuffer).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// The write would run past the end of the buffer. Nothing was written.
    #[error("buffer overflow: writing {requested} bytes at offset {offset} exceeds capacity {capacity}")]
    BufferOverflow {
        offset: usize,
        requested: usize,
        capacity: usize,
    },

    /// A nested message is longer than its reserved length prefix can address.
    #[error("nested length {0} does not fit the reserved header")]
    LengthOverflow(usize),

    /// A MessagePack map or array holds more elements than a 16-bit count.
    #[error("element count {0} does not fit a 16-bit header")]
    CountOverflow(usize),

    /// More reservations were opened than the schema allows.
    #[error("reservation stack is full at depth {0}")]
    NestingTooDeep(usize),

    /// The data point cannot be expressed in the wire schema.
    #[error("invalid data point: {0}")]
    InvalidDataPoint(&'static str),
}

impl EncodeError {
    #[inline]
    pub(crate) fn overflow(offset: usize, requested: usize, capacity: usize) -> Self {
        Self::BufferOverflow {
            offset,
            requested,
            capacity,
        }
    }

    pub fn is_overflow(&self) -> bool {
        matches!(self, Self::BufferOverflow { .. })
    }
}

/// Failures reported by a [`DataTransport`](crate::transport::DataTransport).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Win32 error: {0}")]
    Win32(u32),

    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no listener is enabled for this transport")]
    Disabled,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Some units of a batch were dropped; the others were sent.
    #[error("{failed} of {total} units could not be exported")]
    PartialFailure { failed: usize, total: usize },

    #[error("invalid exporter configuration: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl opentelemetry::ExportError for Error {
    fn exporter_name(&self) -> &'static str {
        "etw-wire"
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
