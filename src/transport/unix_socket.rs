use super::DataTransport;
use crate::error::TransportError;
use std::io::Write;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Streams payloads to a Unix domain socket, such as a local collection
/// agent. Connects on first use; after a failed write the connection is
/// dropped and the next send reconnects. Nothing is retried.
#[derive(Debug)]
pub struct UnixDomainSocketTransport {
    path: PathBuf,
    stream: Mutex<Option<UnixStream>>,
}

impl UnixDomainSocketTransport {
    pub fn new(path: impl AsRef<Path>) -> Self {
        UnixDomainSocketTransport {
            path: path.as_ref().to_owned(),
            stream: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DataTransport for UnixDomainSocketTransport {
    fn send(&self, payload: &[u8]) -> Result<(), TransportError> {
        let mut guard = self.stream.lock().unwrap_or_else(PoisonError::into_inner);
        let mut stream = match guard.take() {
            Some(stream) => stream,
            None => {
                let stream = UnixStream::connect(&self.path)?;
                tracing::debug!(target: "etw_wire", path = %self.path.display(), "connected");
                stream
            }
        };
        stream.write_all(payload)?;
        *guard = Some(stream);
        Ok(())
    }
}
