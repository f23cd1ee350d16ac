use super::varint;
use crate::constants::MAX_PAYLOAD_SIZE;
use crate::error::EncodeError;

/// A cursor position taken before a unit of work, used to drop that unit's
/// bytes if it fails halfway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Checkpoint(usize);

impl Checkpoint {
    pub fn position(self) -> usize {
        self.0
    }
}

/// Fixed-capacity output buffer with a forward-only write cursor.
///
/// The backing storage is allocated once and never grows. Writes that do not
/// fit fail with [`EncodeError::BufferOverflow`] before touching any byte.
pub struct EncodeBuffer {
    bytes: Box<[u8]>,
    cursor: usize,
}

impl EncodeBuffer {
    /// Allocates a buffer sized to the transport budget.
    pub fn new() -> Self {
        Self::with_capacity(MAX_PAYLOAD_SIZE)
    }

    /// Capacities above [`MAX_PAYLOAD_SIZE`] are clamped to it.
    pub fn with_capacity(capacity: usize) -> Self {
        EncodeBuffer {
            bytes: vec![0u8; capacity.min(MAX_PAYLOAD_SIZE)].into_boxed_slice(),
            cursor: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.cursor
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.cursor
    }

    /// The encoded bytes, `[0, cursor)`.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.cursor]
    }

    /// Starts a new encoding pass at offset 0.
    #[inline]
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    #[inline]
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.cursor)
    }

    /// Drops everything written after `checkpoint`. The stranded bytes stay in
    /// storage and are overwritten by the next write.
    #[inline]
    pub fn rewind(&mut self, checkpoint: Checkpoint) {
        debug_assert!(checkpoint.0 <= self.cursor);
        self.cursor = checkpoint.0;
    }

    /// Bounds-checks `len` bytes at the cursor and hands them out, advancing
    /// the cursor past them.
    #[inline]
    fn claim(&mut self, len: usize) -> Result<&mut [u8], EncodeError> {
        let start = self.cursor;
        match start.checked_add(len) {
            Some(end) if end <= self.bytes.len() => {
                self.cursor = end;
                Ok(&mut self.bytes[start..end])
            }
            _ => Err(EncodeError::overflow(start, len, self.bytes.len())),
        }
    }

    /// Advances over `len` bytes without initializing them.
    pub(crate) fn skip(&mut self, len: usize) -> Result<usize, EncodeError> {
        let start = self.cursor;
        self.claim(len)?;
        Ok(start)
    }

    /// Mutable access to bytes already behind the cursor, for backpatching.
    #[inline]
    pub(crate) fn written_mut(&mut self, start: usize, end: usize) -> &mut [u8] {
        debug_assert!(start <= end && end <= self.cursor);
        &mut self.bytes[start..end]
    }

    #[inline]
    pub fn write_u8(&mut self, value: u8) -> Result<(), EncodeError> {
        self.claim(1)?[0] = value;
        Ok(())
    }

    #[inline]
    pub fn write_raw(&mut self, bytes: &[u8]) -> Result<(), EncodeError> {
        self.claim(bytes.len())?.copy_from_slice(bytes);
        Ok(())
    }

    /// Copies an ASCII string. Only meant for names known at compile time or
    /// validated at construction.
    #[inline]
    pub fn write_ascii(&mut self, value: &str) -> Result<(), EncodeError> {
        debug_assert!(value.is_ascii());
        self.write_raw(value.as_bytes())
    }

    #[inline]
    pub fn write_utf8(&mut self, value: &str) -> Result<(), EncodeError> {
        self.write_raw(value.as_bytes())
    }

    pub fn write_varint(&mut self, value: u64) -> Result<(), EncodeError> {
        self.cursor = varint::write_varint(&mut self.bytes, self.cursor, value)?;
        Ok(())
    }

    #[inline]
    pub fn write_fixed64_le(&mut self, value: u64) -> Result<(), EncodeError> {
        self.write_raw(&value.to_le_bytes())
    }

    #[inline]
    pub fn write_f64_le(&mut self, value: f64) -> Result<(), EncodeError> {
        self.write_raw(&value.to_le_bytes())
    }

    #[inline]
    pub fn write_u16_be(&mut self, value: u16) -> Result<(), EncodeError> {
        self.write_raw(&value.to_be_bytes())
    }

    #[inline]
    pub fn write_u32_be(&mut self, value: u32) -> Result<(), EncodeError> {
        self.write_raw(&value.to_be_bytes())
    }

    #[inline]
    pub fn write_u64_be(&mut self, value: u64) -> Result<(), EncodeError> {
        self.write_raw(&value.to_be_bytes())
    }

    #[inline]
    pub fn write_i64_be(&mut self, value: i64) -> Result<(), EncodeError> {
        self.write_raw(&value.to_be_bytes())
    }

    #[inline]
    pub fn write_f64_be(&mut self, value: f64) -> Result<(), EncodeError> {
        self.write_raw(&value.to_be_bytes())
    }
}

impl Default for EncodeBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EncodeBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodeBuffer")
            .field("capacity", &self.capacity())
            .field("position", &self.cursor)
            .finish()
    }
}
