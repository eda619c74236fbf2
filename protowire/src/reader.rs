//! Field-level decoding over a borrowed byte slice.
//!
//! [`Decoder`] walks tag/value pairs between `offset` and `limit`. Nested
//! messages narrow the limit and restore it afterwards, packed regions are
//! tracked lazily through `packed_limit`, and strings and byte fields come
//! back as slices of the input rather than copies.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use crate::error::ReadError;
use crate::float::{bits_to_f32, bits_to_f64};
use crate::varint::{join64, unzigzag32, unzigzag64};
use crate::wire::{tag_wire_type, WireType, TAG_TYPE_BITS};

const DEFAULT_RECURSION_LIMIT: usize = 64;

/// Read half of a message contract, mirroring [`Output`](crate::Output).
pub trait Input<'a> {
    /// Field number of the next tag, or 0 when the current region is done.
    fn read_field_number(&mut self) -> Result<u32, ReadError>;

    /// Skips over the value of the field the last tag announced.
    fn handle_unknown_field(&mut self) -> Result<(), ReadError>;

    fn read_message<T, F>(&mut self, content: F) -> Result<T, ReadError>
    where
        Self: Sized,
        F: FnOnce(&mut Self) -> Result<T, ReadError>;

    fn read_message_start(&mut self) -> Result<usize, ReadError>;
    fn read_message_stop(&mut self, old_limit: usize) -> Result<(), ReadError>;

    fn read_bool(&mut self) -> Result<bool, ReadError>;
    fn read_i8(&mut self) -> Result<i8, ReadError>;
    fn read_u8(&mut self) -> Result<u8, ReadError>;
    fn read_i16(&mut self) -> Result<i16, ReadError>;
    fn read_u16(&mut self) -> Result<u16, ReadError>;
    fn read_i32(&mut self) -> Result<i32, ReadError>;
    fn read_u32(&mut self) -> Result<u32, ReadError>;
    fn read_s32(&mut self) -> Result<i32, ReadError>;
    fn read_i64(&mut self) -> Result<i64, ReadError>;
    fn read_u64(&mut self) -> Result<u64, ReadError>;
    fn read_s64(&mut self) -> Result<i64, ReadError>;
    fn read_fixed32(&mut self) -> Result<u32, ReadError>;
    fn read_sfixed32(&mut self) -> Result<i32, ReadError>;
    fn read_float(&mut self) -> Result<f32, ReadError>;
    fn read_fixed64(&mut self) -> Result<u64, ReadError>;
    fn read_sfixed64(&mut self) -> Result<i64, ReadError>;
    fn read_double(&mut self) -> Result<f64, ReadError>;
    fn read_string(&mut self) -> Result<&'a str, ReadError>;
    fn read_bytes(&mut self) -> Result<&'a [u8], ReadError>;

    fn read_array<T, F>(&mut self, read: F) -> Result<Vec<T>, ReadError>
    where
        Self: Sized,
        F: FnMut(&mut Self) -> Result<T, ReadError>;

    fn read_list<T, F>(&mut self, read: F) -> Result<Vec<T>, ReadError>
    where
        Self: Sized,
        F: FnMut(&mut Self) -> Result<T, ReadError>;

    fn read_set<T, F>(&mut self, read: F) -> Result<HashSet<T>, ReadError>
    where
        Self: Sized,
        T: Eq + Hash,
        F: FnMut(&mut Self) -> Result<T, ReadError>;

    fn read_map<K, V, FK, FV>(&mut self, read_key: FK, read_value: FV) -> Result<HashMap<K, V>, ReadError>
    where
        Self: Sized,
        K: Eq + Hash,
        FK: FnMut(&mut Self) -> Result<K, ReadError>,
        FV: FnMut(&mut Self) -> Result<V, ReadError>;

    fn read_bool_array(&mut self) -> Result<Vec<bool>, ReadError>;
}

pub struct Decoder<'a> {
    buf: &'a [u8],
    offset: usize,
    limit: usize,
    last_tag: u32,
    packed_limit: usize,
    depth: usize,
    recursion_limit: usize,
    /// Largest accepted delimited length. Zero disables the guard.
    size_limit: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self::with_bounds(buf, 0, buf.len())
    }

    pub fn with_bounds(buf: &'a [u8], offset: usize, limit: usize) -> Self {
        Decoder {
            buf,
            offset,
            limit,
            last_tag: 0,
            packed_limit: 0,
            depth: 0,
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            size_limit: 0,
        }
    }

    /// Rewinds to the start of the input for another decoding pass.
    pub fn reset(&mut self) {
        self.set_bounds(0, self.buf.len());
    }

    pub fn set_bounds(&mut self, offset: usize, limit: usize) {
        self.offset = offset;
        self.limit = limit;
        self.last_tag = 0;
        self.packed_limit = 0;
        self.depth = 0;
    }

    pub fn set_recursion_limit(&mut self, limit: usize) {
        self.recursion_limit = limit;
    }

    pub fn set_size_limit(&mut self, limit: usize) {
        self.size_limit = limit;
    }

    pub fn current_offset(&self) -> usize {
        self.offset
    }

    pub fn current_limit(&self) -> usize {
        self.limit
    }

    pub fn last_tag(&self) -> u32 {
        self.last_tag
    }

    pub fn is_current_field_packed(&self) -> bool {
        tag_wire_type(self.last_tag) == WireType::LengthDelimited as u32
    }

    fn read_byte(&mut self) -> Result<u8, ReadError> {
        if self.offset >= self.limit {
            return Err(ReadError::Truncated);
        }
        let b = self.buf[self.offset];
        self.offset += 1;
        Ok(b)
    }

    fn read_raw_varint32(&mut self) -> Result<u32, ReadError> {
        let b = self.read_byte()?;
        if b < 0x80 {
            return Ok(b as u32);
        }
        let mut result = (b & 0x7F) as u32;
        let b = self.read_byte()?;
        result |= ((b & 0x7F) as u32) << 7;
        if b < 0x80 {
            return Ok(result);
        }
        let b = self.read_byte()?;
        result |= ((b & 0x7F) as u32) << 14;
        if b < 0x80 {
            return Ok(result);
        }
        let b = self.read_byte()?;
        result |= ((b & 0x7F) as u32) << 21;
        if b < 0x80 {
            return Ok(result);
        }
        let b = self.read_byte()?;
        result |= (b as u32) << 28;
        if b < 0x80 {
            return Ok(result);
        }
        // sign-extended 64-bit varints spill past five bytes, tolerate up to
        // five more before declaring the stream broken
        for _ in 0..5 {
            if self.read_byte()? < 0x80 {
                return Ok(result);
            }
        }
        Err(ReadError::MalformedVarint)
    }

    fn read_raw_varint64(&mut self) -> Result<u64, ReadError> {
        if self.limit - self.offset > 4 {
            // five bytes are in bounds, read them blind
            let mut lo = 0u32;
            for i in 0..4 {
                let b = self.buf[self.offset];
                self.offset += 1;
                lo |= ((b & 0x7F) as u32) << (i * 7);
                if b < 0x80 {
                    return Ok(lo as u64);
                }
            }
            let b = self.buf[self.offset];
            self.offset += 1;
            lo |= ((b & 0x7F) as u32) << 28;
            let mut hi = ((b & 0x7F) as u32) >> 4;
            if b < 0x80 {
                return Ok(join64(lo, hi));
            }
            for i in 0..5 {
                let b = self.read_byte()?;
                if i == 4 {
                    if b >= 0x80 {
                        break;
                    }
                    hi |= (b as u32) << 31;
                    return Ok(join64(lo, hi));
                }
                hi |= ((b & 0x7F) as u32) << (i * 7 + 3);
                if b < 0x80 {
                    return Ok(join64(lo, hi));
                }
            }
            return Err(ReadError::MalformedVarint);
        }
        // short region: at most four bytes can be left
        let mut lo = 0u32;
        for i in 0..4 {
            if self.offset >= self.limit {
                return Err(ReadError::MisreportedSize);
            }
            let b = self.buf[self.offset];
            self.offset += 1;
            lo |= ((b & 0x7F) as u32) << (i * 7);
            if b < 0x80 {
                break;
            }
        }
        Ok(lo as u64)
    }

    fn read_length(&mut self) -> Result<usize, ReadError> {
        let value = self.read_raw_varint32()? as i32;
        if value < 0 {
            return Err(ReadError::NegativeSize);
        }
        if self.size_limit != 0 && value as usize > self.size_limit {
            return Err(ReadError::SizeLimitExceeded);
        }
        Ok(value as usize)
    }

    /// A length-delimited field opens a packed region on first element read.
    fn check_packed_field(&mut self) -> Result<(), ReadError> {
        if self.packed_limit == 0 && self.is_current_field_packed() {
            let length = self.read_length()?;
            if length > self.limit - self.offset {
                return Err(ReadError::MisreportedSize);
            }
            self.packed_limit = self.offset + length;
        }
        Ok(())
    }

    fn read_delimited(&mut self) -> Result<&'a [u8], ReadError> {
        let length = self.read_length()?;
        if length > self.limit - self.offset {
            return Err(ReadError::MisreportedSize);
        }
        let bytes = &self.buf[self.offset..self.offset + length];
        self.offset += length;
        Ok(bytes)
    }

    fn read_fixed(&mut self, n: usize) -> Result<&'a [u8], ReadError> {
        if self.limit - self.offset < n {
            return Err(ReadError::Truncated);
        }
        let bytes = &self.buf[self.offset..self.offset + n];
        self.offset += n;
        Ok(bytes)
    }

    fn skip_raw_bytes(&mut self, n: usize) -> Result<(), ReadError> {
        if self.limit - self.offset < n {
            return Err(ReadError::Truncated);
        }
        self.offset += n;
        Ok(())
    }

    fn skip_field(&mut self) -> Result<(), ReadError> {
        match WireType::try_from(tag_wire_type(self.last_tag))? {
            WireType::Varint => {
                self.read_raw_varint64()?;
            }
            WireType::Fixed64 => self.skip_raw_bytes(8)?,
            WireType::LengthDelimited => {
                let length = self.read_length()?;
                self.skip_raw_bytes(length)?;
            }
            WireType::Fixed8 => self.skip_raw_bytes(1)?,
            WireType::Fixed16 => self.skip_raw_bytes(2)?,
            WireType::Fixed32 => self.skip_raw_bytes(4)?,
        }
        Ok(())
    }
}

impl<'a> Input<'a> for Decoder<'a> {
    fn read_field_number(&mut self) -> Result<u32, ReadError> {
        if self.offset == self.limit {
            self.last_tag = 0;
            return Ok(0);
        }
        self.packed_limit = 0;
        let tag = self.read_raw_varint32()?;
        let field_number = tag >> TAG_TYPE_BITS;
        if field_number == 0 {
            return Err(ReadError::InvalidTag);
        }
        self.last_tag = tag;
        Ok(field_number)
    }

    fn handle_unknown_field(&mut self) -> Result<(), ReadError> {
        self.skip_field()
    }

    fn read_message<T, F>(&mut self, content: F) -> Result<T, ReadError>
    where
        F: FnOnce(&mut Self) -> Result<T, ReadError>,
    {
        let old_limit = self.read_message_start()?;
        let value = content(self)?;
        self.read_message_stop(old_limit)?;
        Ok(value)
    }

    fn read_message_start(&mut self) -> Result<usize, ReadError> {
        let length = self.read_length()?;
        if length > self.limit - self.offset {
            return Err(ReadError::MisreportedSize);
        }
        self.depth += 1;
        if self.depth > self.recursion_limit {
            return Err(ReadError::RecursionLimitExceeded);
        }
        let old_limit = self.limit;
        self.limit = self.offset + length;
        self.packed_limit = self.limit;
        Ok(old_limit)
    }

    fn read_message_stop(&mut self, old_limit: usize) -> Result<(), ReadError> {
        if self.offset != self.limit {
            return Err(ReadError::MisreportedSize);
        }
        self.limit = old_limit;
        self.depth -= 1;
        self.last_tag = 0;
        self.packed_limit = 0;
        Ok(())
    }

    fn read_bool(&mut self) -> Result<bool, ReadError> {
        self.check_packed_field()?;
        Ok(self.read_byte()? != 0)
    }

    fn read_i8(&mut self) -> Result<i8, ReadError> {
        self.check_packed_field()?;
        Ok(self.read_byte()? as i8)
    }

    fn read_u8(&mut self) -> Result<u8, ReadError> {
        self.check_packed_field()?;
        self.read_byte()
    }

    fn read_i16(&mut self) -> Result<i16, ReadError> {
        Ok(self.read_u16()? as i16)
    }

    fn read_u16(&mut self) -> Result<u16, ReadError> {
        self.check_packed_field()?;
        let le = self.read_fixed(2)?;
        Ok(u16::from_le_bytes([le[0], le[1]]))
    }

    fn read_i32(&mut self) -> Result<i32, ReadError> {
        self.check_packed_field()?;
        Ok(self.read_raw_varint32()? as i32)
    }

    fn read_u32(&mut self) -> Result<u32, ReadError> {
        self.check_packed_field()?;
        self.read_raw_varint32()
    }

    fn read_s32(&mut self) -> Result<i32, ReadError> {
        self.check_packed_field()?;
        Ok(unzigzag32(self.read_raw_varint32()?))
    }

    fn read_i64(&mut self) -> Result<i64, ReadError> {
        self.check_packed_field()?;
        Ok(self.read_raw_varint64()? as i64)
    }

    fn read_u64(&mut self) -> Result<u64, ReadError> {
        self.check_packed_field()?;
        self.read_raw_varint64()
    }

    fn read_s64(&mut self) -> Result<i64, ReadError> {
        self.check_packed_field()?;
        Ok(unzigzag64(self.read_raw_varint64()?))
    }

    fn read_fixed32(&mut self) -> Result<u32, ReadError> {
        self.check_packed_field()?;
        let le = self.read_fixed(4)?;
        Ok(u32::from_le_bytes([le[0], le[1], le[2], le[3]]))
    }

    fn read_sfixed32(&mut self) -> Result<i32, ReadError> {
        Ok(self.read_fixed32()? as i32)
    }

    fn read_float(&mut self) -> Result<f32, ReadError> {
        Ok(bits_to_f32(self.read_fixed32()?))
    }

    fn read_fixed64(&mut self) -> Result<u64, ReadError> {
        self.check_packed_field()?;
        let le = self.read_fixed(8)?;
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(le);
        Ok(u64::from_le_bytes(bytes))
    }

    fn read_sfixed64(&mut self) -> Result<i64, ReadError> {
        Ok(self.read_fixed64()? as i64)
    }

    fn read_double(&mut self) -> Result<f64, ReadError> {
        Ok(bits_to_f64(self.read_fixed64()?))
    }

    fn read_string(&mut self) -> Result<&'a str, ReadError> {
        Ok(std::str::from_utf8(self.read_delimited()?)?)
    }

    fn read_bytes(&mut self) -> Result<&'a [u8], ReadError> {
        self.read_delimited()
    }

    fn read_array<T, F>(&mut self, mut read: F) -> Result<Vec<T>, ReadError>
    where
        F: FnMut(&mut Self) -> Result<T, ReadError>,
    {
        self.check_packed_field()?;
        let count = self.read_raw_varint32()? as i32;
        if count < 0 {
            return Err(ReadError::NegativeSize);
        }
        let count = count as usize;
        if count > self.limit - self.offset {
            return Err(ReadError::MisreportedSize);
        }
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(read(self)?);
        }
        Ok(out)
    }

    fn read_list<T, F>(&mut self, mut read: F) -> Result<Vec<T>, ReadError>
    where
        F: FnMut(&mut Self) -> Result<T, ReadError>,
    {
        self.check_packed_field()?;
        let mut out = Vec::new();
        while self.offset < self.packed_limit {
            out.push(read(self)?);
        }
        Ok(out)
    }

    fn read_set<T, F>(&mut self, mut read: F) -> Result<HashSet<T>, ReadError>
    where
        T: Eq + Hash,
        F: FnMut(&mut Self) -> Result<T, ReadError>,
    {
        self.check_packed_field()?;
        let mut out = HashSet::new();
        while self.offset < self.packed_limit {
            out.insert(read(self)?);
        }
        Ok(out)
    }

    fn read_map<K, V, FK, FV>(
        &mut self,
        mut read_key: FK,
        mut read_value: FV,
    ) -> Result<HashMap<K, V>, ReadError>
    where
        K: Eq + Hash,
        FK: FnMut(&mut Self) -> Result<K, ReadError>,
        FV: FnMut(&mut Self) -> Result<V, ReadError>,
    {
        self.check_packed_field()?;
        let mut out = HashMap::new();
        while self.offset < self.packed_limit {
            let key = read_key(self)?;
            let value = read_value(self)?;
            out.insert(key, value);
        }
        Ok(out)
    }

    fn read_bool_array(&mut self) -> Result<Vec<bool>, ReadError> {
        self.check_packed_field()?;
        let count = self.read_raw_varint32()? as i32;
        if count < 0 {
            return Err(ReadError::NegativeSize);
        }
        let count = count as usize;
        let byte_count = (count + 7) / 8;
        if byte_count > self.limit - self.offset {
            return Err(ReadError::MisreportedSize);
        }
        let mut out = Vec::with_capacity(count);
        for i in 0..count {
            let byte = self.buf[self.offset + i / 8];
            out.push(byte >> (i % 8) & 1 == 1);
        }
        self.offset += byte_count;
        Ok(out)
    }
}
