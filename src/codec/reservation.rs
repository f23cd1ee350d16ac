//! Fixed-width header slots that are written before their content is known
//! and backpatched afterwards.
//!
//! A reservation always takes the worst-case width of the header it will
//! hold, so patching never has to move bytes that follow it. The same slot may
//! be patched any number of times; each patch rewrites exactly the reserved
//! width.

use super::buffer::EncodeBuffer;
use super::varint::{write_padded_varint3, PADDED_VARINT_LEN, PADDED_VARINT_MAX};
use crate::constants::MAX_PAYLOAD_SIZE;
use crate::error::EncodeError;

/// One tag byte plus a three byte padded length.
pub const PROTOBUF_HEADER_LEN: usize = 1 + PADDED_VARINT_LEN;

/// Map16/Array16 marker plus a big-endian `u16` count.
pub const MSGPACK_HEADER_LEN: usize = 3;

const MSGPACK_MAP16: u8 = 0xDE;
const MSGPACK_ARRAY16: u8 = 0xDC;

const WIRE_TYPE_LEN: u8 = 2;

// The padded length must be able to address any payload the transport accepts.
const _: () = assert!(MAX_PAYLOAD_SIZE <= PADDED_VARINT_MAX);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Reservation {
    header_start: usize,
    value_start: usize,
}

impl Reservation {
    #[inline]
    pub fn header_start(&self) -> usize {
        self.header_start
    }

    #[inline]
    pub fn value_start(&self) -> usize {
        self.value_start
    }

    /// Bytes written into the reservation so far.
    #[inline]
    pub fn content_len(&self, buffer: &EncodeBuffer) -> usize {
        buffer.position() - self.value_start
    }
}

impl EncodeBuffer {
    /// Reserves `width` header bytes at the cursor.
    pub fn reserve(&mut self, width: usize) -> Result<Reservation, EncodeError> {
        let header_start = self.skip(width)?;
        Ok(Reservation {
            header_start,
            value_start: header_start + width,
        })
    }

    #[inline]
    pub fn reserve_message(&mut self) -> Result<Reservation, EncodeError> {
        self.reserve(PROTOBUF_HEADER_LEN)
    }

    #[inline]
    pub fn reserve_map16(&mut self) -> Result<Reservation, EncodeError> {
        self.reserve(MSGPACK_HEADER_LEN)
    }

    #[inline]
    pub fn reserve_array16(&mut self) -> Result<Reservation, EncodeError> {
        self.reserve(MSGPACK_HEADER_LEN)
    }

    /// Writes the protobuf tag for `field_number` (wire type LEN) and the
    /// current content length into a [`PROTOBUF_HEADER_LEN`] slot.
    pub fn patch_length_delimited(
        &mut self,
        reservation: &Reservation,
        field_number: u32,
    ) -> Result<(), EncodeError> {
        debug_assert_eq!(
            reservation.value_start - reservation.header_start,
            PROTOBUF_HEADER_LEN
        );
        // A single tag byte holds field numbers 1 through 15.
        debug_assert!((1..16).contains(&field_number));
        let len = reservation.content_len(self);
        if len > PADDED_VARINT_MAX {
            return Err(EncodeError::LengthOverflow(len));
        }
        let slot = self.written_mut(reservation.header_start, reservation.value_start);
        slot[0] = ((field_number as u8) << 3) | WIRE_TYPE_LEN;
        write_padded_varint3(slot, 1, len)?;
        Ok(())
    }

    pub fn patch_map16(
        &mut self,
        reservation: &Reservation,
        count: usize,
    ) -> Result<(), EncodeError> {
        self.patch_msgpack_header(reservation, MSGPACK_MAP16, count)
    }

    pub fn patch_array16(
        &mut self,
        reservation: &Reservation,
        count: usize,
    ) -> Result<(), EncodeError> {
        self.patch_msgpack_header(reservation, MSGPACK_ARRAY16, count)
    }

    fn patch_msgpack_header(
        &mut self,
        reservation: &Reservation,
        marker: u8,
        count: usize,
    ) -> Result<(), EncodeError> {
        debug_assert_eq!(
            reservation.value_start - reservation.header_start,
            MSGPACK_HEADER_LEN
        );
        let count = u16::try_from(count).map_err(|_| EncodeError::CountOverflow(count))?;
        let slot = self.written_mut(reservation.header_start, reservation.value_start);
        slot[0] = marker;
        slot[1..].copy_from_slice(&count.to_be_bytes());
        Ok(())
    }
}

/// Open reservations indexed by nesting depth. The depth limit comes from the
/// wire schema, so the slots live inline and nothing is allocated.
#[derive(Debug, Clone)]
pub struct ReservationStack<const N: usize> {
    slots: [Reservation; N],
    depth: usize,
}

impl<const N: usize> ReservationStack<N> {
    pub const fn new() -> Self {
        ReservationStack {
            slots: [Reservation {
                header_start: 0,
                value_start: 0,
            }; N],
            depth: 0,
        }
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.depth == 0
    }

    pub fn push(&mut self, reservation: Reservation) -> Result<(), EncodeError> {
        let slot = self
            .slots
            .get_mut(self.depth)
            .ok_or(EncodeError::NestingTooDeep(N))?;
        *slot = reservation;
        self.depth += 1;
        Ok(())
    }

    pub fn pop(&mut self) -> Option<Reservation> {
        if self.depth == 0 {
            return None;
        }
        self.depth -= 1;
        Some(self.slots[self.depth])
    }

    #[inline]
    pub fn top(&self) -> Option<&Reservation> {
        self.depth.checked_sub(1).map(|i| &self.slots[i])
    }

    #[inline]
    pub fn get(&self, depth: usize) -> Option<&Reservation> {
        self.slots[..self.depth].get(depth)
    }

    /// Drops every reservation deeper than `depth`.
    #[inline]
    pub fn truncate(&mut self, depth: usize) {
        self.depth = self.depth.min(depth);
    }

    #[inline]
    pub fn clear(&mut self) {
        self.depth = 0;
    }

    /// Open reservations, innermost first.
    pub fn iter(&self) -> impl Iterator<Item = &Reservation> + '_ {
        self.slots[..self.depth].iter().rev()
    }
}

impl<const N: usize> Default for ReservationStack<N> {
    fn default() -> Self {
        Self::new()
    }
}
