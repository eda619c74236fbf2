//! A protobuf-style tagged binary wire format with zero-copy leanings.
//!
//! Fields are `(field number, wire type)` tags followed by their values.
//! Varints cover the integer family (with zigzag variants for signed data),
//! fixed widths exist for 8, 16, 32 and 64 bit values, and strings, byte
//! slices and nested messages travel length-delimited. On the write side an
//! [`Encoder`] frames nested messages in a single pass over a chain of
//! buffers, splicing large byte slices in by reference instead of copying.
//! On the read side a [`Decoder`] hands strings and bytes back as borrows of
//! the input.
//!
//! ```
//! use protowire::{Decoder, Encoder, Input, Output, ReadError};
//!
//! # fn main() -> Result<(), ReadError> {
//! let mut encoder = Encoder::new();
//! encoder.write_u32(1, 150);
//! encoder.write_string(2, "hi");
//! let bytes = encoder.to_bytes();
//! assert_eq!(vec![0x08, 0x96, 0x01, 0x12, 0x02, b'h', b'i'], bytes);
//!
//! let mut decoder = Decoder::new(&bytes);
//! assert_eq!(1, decoder.read_field_number()?);
//! assert_eq!(150, decoder.read_u32()?);
//! assert_eq!(2, decoder.read_field_number()?);
//! assert_eq!("hi", decoder.read_string()?);
//! assert_eq!(0, decoder.read_field_number()?);
//! # Ok(()) }
//! ```

mod buffer;
mod error;
mod float;
mod reader;
mod schema;
mod sink;
mod strings;
mod varint;
mod wire;
mod writer;

pub use buffer::WriteSession;
pub use error::ReadError;
pub use reader::{Decoder, Input};
pub use schema::Schema;
pub use sink::{Buffered, Sink};
pub use wire::{make_tag, tag_field_number, tag_wire_type, WireType, TAG_TYPE_BITS, TAG_TYPE_MASK};
pub use writer::{Encoder, Output};
