//! Where finished payloads go. A transport receives one complete, independently
//! decodable payload per call and never sees a partial record.

mod etw;
#[cfg(unix)]
mod unix_socket;

pub use etw::EtwTransport;
#[cfg(unix)]
pub use unix_socket::UnixDomainSocketTransport;

use crate::error::TransportError;
use std::fmt::Debug;
use std::sync::Arc;

pub trait DataTransport: Send + Sync + Debug {
    fn send(&self, payload: &[u8]) -> Result<(), TransportError>;

    /// Whether anyone is listening. Exporters skip encoding entirely when
    /// this is false.
    fn is_enabled(&self) -> bool {
        true
    }
}

impl<T: DataTransport + ?Sized> DataTransport for Arc<T> {
    fn send(&self, payload: &[u8]) -> Result<(), TransportError> {
        (**self).send(payload)
    }

    fn is_enabled(&self) -> bool {
        (**self).is_enabled()
    }
}

impl<T: DataTransport + ?Sized> DataTransport for Box<T> {
    fn send(&self, payload: &[u8]) -> Result<(), TransportError> {
        (**self).send(payload)
    }

    fn is_enabled(&self) -> bool {
        (**self).is_enabled()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Keeps every payload; can be told to fail the next sends.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingTransport {
        pub(crate) payloads: Mutex<Vec<Vec<u8>>>,
        pub(crate) failures: Mutex<usize>,
    }

    impl RecordingTransport {
        pub(crate) fn payloads(&self) -> Vec<Vec<u8>> {
            self.payloads.lock().unwrap().clone()
        }

        pub(crate) fn fail_next(&self, count: usize) {
            *self.failures.lock().unwrap() = count;
        }
    }

    impl DataTransport for RecordingTransport {
        fn send(&self, payload: &[u8]) -> Result<(), TransportError> {
            let mut failures = self.failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(TransportError::Win32(5));
            }
            self.payloads.lock().unwrap().push(payload.to_vec());
            Ok(())
        }
    }
}
