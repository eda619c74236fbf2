//! Tag bit layout. A tag packs a field number and a 3-bit wire-type code into
//! one varint: `(field_number << 3) | wire_type`. A field number of zero never
//! occurs in a valid tag; decoders use it as the end-of-message sentinel.

use crate::error::ReadError;
use std::convert::TryFrom;

pub const TAG_TYPE_BITS: u32 = 3;
pub const TAG_TYPE_MASK: u32 = (1 << TAG_TYPE_BITS) - 1;

/// How the value following a tag is framed on the wire.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireType {
    Varint = 0,
    Fixed64 = 1,
    LengthDelimited = 2,
    Fixed8 = 3,
    Fixed16 = 4,
    Fixed32 = 5,
}

impl TryFrom<u32> for WireType {
    type Error = ReadError;

    fn try_from(v: u32) -> Result<Self, Self::Error> {
        match v {
            x if x == WireType::Varint as u32 => Ok(WireType::Varint),
            x if x == WireType::Fixed64 as u32 => Ok(WireType::Fixed64),
            x if x == WireType::LengthDelimited as u32 => Ok(WireType::LengthDelimited),
            x if x == WireType::Fixed8 as u32 => Ok(WireType::Fixed8),
            x if x == WireType::Fixed16 as u32 => Ok(WireType::Fixed16),
            x if x == WireType::Fixed32 as u32 => Ok(WireType::Fixed32),
            x => Err(ReadError::InvalidWireType(x)),
        }
    }
}

#[inline]
pub fn make_tag(field_number: u32, wire_type: WireType) -> u32 {
    field_number << TAG_TYPE_BITS | wire_type as u32
}

#[inline]
pub fn tag_wire_type(tag: u32) -> u32 {
    tag & TAG_TYPE_MASK
}

#[inline]
pub fn tag_field_number(tag: u32) -> u32 {
    tag >> TAG_TYPE_BITS
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::TryInto;

    #[test]
    fn tag_roundtrip() {
        for field in [1, 2, 15, 16, 100, 1 << 26] {
            for wire_type in [
                WireType::Varint,
                WireType::Fixed64,
                WireType::LengthDelimited,
                WireType::Fixed8,
                WireType::Fixed16,
                WireType::Fixed32,
            ] {
                let tag = make_tag(field, wire_type);
                assert_eq!(field, tag_field_number(tag));
                assert_eq!(wire_type as u32, tag_wire_type(tag));
            }
        }
    }

    #[test]
    fn rejects_unknown_wire_type() {
        let wire_type: Result<WireType, _> = 6u32.try_into();
        assert_eq!(wire_type.unwrap_err(), ReadError::InvalidWireType(6));
        let wire_type: Result<WireType, _> = 7u32.try_into();
        assert!(wire_type.is_err());
    }
}
