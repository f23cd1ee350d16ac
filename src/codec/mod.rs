//! Bounded, backpatchable byte encoding shared by the MessagePack and OTLP
//! front-ends.

mod buffer;
mod reservation;
pub mod varint;

pub use buffer::{Checkpoint, EncodeBuffer};
pub use reservation::{Reservation, ReservationStack, MSGPACK_HEADER_LEN, PROTOBUF_HEADER_LEN};
