//! Field-level encoding.
//!
//! [`Encoder`] stamps tagged fields into a [`WriteSession`] through a
//! [`Sink`]. Nested messages are framed without a second pass: a single
//! length byte is reserved before the content closure runs and patched
//! afterwards, and when the content outgrows 127 bytes the written region is
//! carved into a view block and a wider varint block is spliced in front of
//! it, so nothing already written ever moves.

use std::marker::PhantomData;

use crate::buffer::WriteSession;
use crate::float::{f32_to_bits, f64_to_bits};
use crate::sink::{Buffered, Sink};
use crate::varint::{varint32_size, zigzag32, zigzag64};
use crate::wire::{make_tag, WireType};

/// Write half of a message contract. Implemented by [`Encoder`]; generated
/// and hand-rolled schemas stay generic over it.
pub trait Output<'a> {
    fn write_message<F: FnOnce(&mut Self)>(&mut self, field: u32, content: F)
    where
        Self: Sized;

    fn write_bool(&mut self, field: u32, value: bool);
    fn write_i8(&mut self, field: u32, value: i8);
    fn write_u8(&mut self, field: u32, value: u8);
    fn write_i16(&mut self, field: u32, value: i16);
    fn write_u16(&mut self, field: u32, value: u16);
    fn write_i32(&mut self, field: u32, value: i32);
    fn write_u32(&mut self, field: u32, value: u32);
    fn write_s32(&mut self, field: u32, value: i32);
    fn write_i64(&mut self, field: u32, value: i64);
    fn write_u64(&mut self, field: u32, value: u64);
    fn write_s64(&mut self, field: u32, value: i64);
    fn write_fixed32(&mut self, field: u32, value: u32);
    fn write_sfixed32(&mut self, field: u32, value: i32);
    fn write_float(&mut self, field: u32, value: f32);
    fn write_fixed64(&mut self, field: u32, value: u64);
    fn write_sfixed64(&mut self, field: u32, value: i64);
    fn write_double(&mut self, field: u32, value: f64);
    fn write_string(&mut self, field: u32, value: &str);
    fn write_bytes(&mut self, field: u32, value: &'a [u8]);

    // untagged forms, for elements inside a delimited region
    fn write_bool_packed(&mut self, value: bool);
    fn write_i8_packed(&mut self, value: i8);
    fn write_u8_packed(&mut self, value: u8);
    fn write_i16_packed(&mut self, value: i16);
    fn write_u16_packed(&mut self, value: u16);
    fn write_i32_packed(&mut self, value: i32);
    fn write_u32_packed(&mut self, value: u32);
    fn write_s32_packed(&mut self, value: i32);
    fn write_i64_packed(&mut self, value: i64);
    fn write_u64_packed(&mut self, value: u64);
    fn write_s64_packed(&mut self, value: i64);
    fn write_fixed32_packed(&mut self, value: u32);
    fn write_sfixed32_packed(&mut self, value: i32);
    fn write_float_packed(&mut self, value: f32);
    fn write_fixed64_packed(&mut self, value: u64);
    fn write_sfixed64_packed(&mut self, value: i64);
    fn write_double_packed(&mut self, value: f64);
    fn write_string_packed(&mut self, value: &str);
    fn write_bytes_packed(&mut self, value: &'a [u8]);

    fn write_array<T, F>(&mut self, field: u32, values: &[T], write: F)
    where
        Self: Sized,
        F: FnMut(&mut Self, &T);

    fn write_list<I, F>(&mut self, field: u32, values: I, write: F)
    where
        Self: Sized,
        I: IntoIterator,
        F: FnMut(&mut Self, I::Item);

    fn write_set<I, F>(&mut self, field: u32, values: I, write: F)
    where
        Self: Sized,
        I: IntoIterator,
        F: FnMut(&mut Self, I::Item);

    fn write_map<I, K, V, FK, FV>(&mut self, field: u32, entries: I, write_key: FK, write_value: FV)
    where
        Self: Sized,
        I: IntoIterator<Item = (K, V)>,
        FK: FnMut(&mut Self, K),
        FV: FnMut(&mut Self, V);

    fn write_bool_array(&mut self, field: u32, values: &[bool])
    where
        Self: Sized;

    fn write_bool_list<I>(&mut self, field: u32, values: I)
    where
        Self: Sized,
        I: IntoIterator<Item = bool>;
}

pub struct Encoder<'a, S: Sink = Buffered> {
    session: WriteSession<'a>,
    _sink: PhantomData<S>,
}

impl<'a> Encoder<'a> {
    pub fn new() -> Self {
        Self::with_buffer_size(crate::buffer::DEFAULT_BUFFER_SIZE)
    }

    pub fn with_buffer_size(buffer_size: usize) -> Self {
        Encoder { session: WriteSession::with_buffer_size(buffer_size), _sink: PhantomData }
    }
}

impl<'a, S: Sink> Encoder<'a, S> {
    /// Total encoded bytes so far.
    pub fn size(&self) -> usize {
        self.session.size()
    }

    /// Rewinds for another encoding pass, keeping the first storage.
    pub fn clear(&mut self) {
        self.session.clear();
    }

    /// Assembles the output into one contiguous buffer.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.session.to_bytes()
    }

    fn write_tag(&mut self, field: u32, wire_type: WireType) {
        let tag = make_tag(field, wire_type);
        let tail = self.session.tail();
        if field < 16 && self.session.remaining(tail) != 0 {
            self.session.size += 1;
            let (buf, offset) = self.session.block_buf_mut(tail);
            buf[*offset] = tag as u8;
            *offset += 1;
        } else {
            self.write_raw_varint32(tag);
        }
    }

    /// Varint written whole into the tail, growing first if it would split.
    fn write_raw_varint32(&mut self, value: u32) {
        let n = varint32_size(value);
        if self.session.remaining(self.session.tail()) < n {
            self.session.grow();
        }
        self.session.size += n;
        let tail = self.session.tail();
        let (buf, offset) = self.session.block_buf_mut(tail);
        *offset += crate::varint::encode_varint32(value, &mut buf[*offset..]);
    }
}

impl<'a, S: Sink> Default for Encoder<'a, S> {
    fn default() -> Self {
        Encoder { session: WriteSession::new(), _sink: PhantomData }
    }
}

/// Detached block holding just the varint of `value`.
fn delimited_block(session: &mut WriteSession<'_>, value: u32) -> usize {
    let n = varint32_size(value);
    session.size += n;
    let block = session.detached_block(n);
    let (buf, offset) = session.block_buf_mut(block);
    *offset = crate::varint::encode_varint32(value, buf);
    block
}

impl<'a, S: Sink> Output<'a> for Encoder<'a, S> {
    fn write_message<F: FnOnce(&mut Self)>(&mut self, field: u32, content: F) {
        self.write_tag(field, WireType::LengthDelimited);
        let last = self.session.tail();
        let last_offset = self.session.block(last).offset;
        let last_size = self.session.size;

        if last_offset == self.session.capacity(last) {
            // cannot even reserve a length byte here: give the content its
            // own block and splice the length in front afterwards
            let first = self.session.detached_block(self.session.next_buffer_size);
            self.session.set_tail(first);
            content(self);
            let msg_size = self.session.size - last_size;
            let delim = delimited_block(&mut self.session, msg_size as u32);
            self.session.link(last, delim);
            self.session.link(delim, first);
            return;
        }

        // reserve one byte for the length
        self.session.block_mut(last).offset += 1;
        self.session.size += 1;
        content(self);
        let msg_size = self.session.size - last_size - 1;
        if msg_size < 128 {
            self.session.patch_byte(last, last_offset, msg_size as u8);
        } else {
            // carve the content written into `last` out as a view and put a
            // full-width varint block where the reserved byte was
            let end = self.session.block(last).offset;
            let after = self.session.block(last).next;
            let view = self.session.view_block(last, last_offset + 1, end);
            match after {
                None => self.session.set_tail(view),
                Some(next) => self.session.link(view, next),
            }
            self.session.block_mut(last).offset = last_offset;
            let delim = delimited_block(&mut self.session, msg_size as u32);
            self.session.size -= 1;
            self.session.link(last, delim);
            self.session.link(delim, view);
        }
    }

    fn write_bool(&mut self, field: u32, value: bool) {
        self.write_tag(field, WireType::Fixed8);
        S::write_byte(&mut self.session, value as u8);
    }

    fn write_i8(&mut self, field: u32, value: i8) {
        self.write_tag(field, WireType::Fixed8);
        S::write_byte(&mut self.session, value as u8);
    }

    fn write_u8(&mut self, field: u32, value: u8) {
        self.write_tag(field, WireType::Fixed8);
        S::write_byte(&mut self.session, value);
    }

    fn write_i16(&mut self, field: u32, value: i16) {
        self.write_tag(field, WireType::Fixed16);
        S::write_fixed16_le(&mut self.session, value as u16);
    }

    fn write_u16(&mut self, field: u32, value: u16) {
        self.write_tag(field, WireType::Fixed16);
        S::write_fixed16_le(&mut self.session, value);
    }

    fn write_i32(&mut self, field: u32, value: i32) {
        self.write_tag(field, WireType::Varint);
        self.write_i32_packed(value);
    }

    fn write_u32(&mut self, field: u32, value: u32) {
        self.write_tag(field, WireType::Varint);
        S::write_varint32(&mut self.session, value);
    }

    fn write_s32(&mut self, field: u32, value: i32) {
        self.write_tag(field, WireType::Varint);
        S::write_varint32(&mut self.session, zigzag32(value));
    }

    fn write_i64(&mut self, field: u32, value: i64) {
        self.write_tag(field, WireType::Varint);
        S::write_varint64(&mut self.session, value as u64);
    }

    fn write_u64(&mut self, field: u32, value: u64) {
        self.write_tag(field, WireType::Varint);
        S::write_varint64(&mut self.session, value);
    }

    fn write_s64(&mut self, field: u32, value: i64) {
        self.write_tag(field, WireType::Varint);
        S::write_varint64(&mut self.session, zigzag64(value));
    }

    fn write_fixed32(&mut self, field: u32, value: u32) {
        self.write_tag(field, WireType::Fixed32);
        S::write_fixed32_le(&mut self.session, value);
    }

    fn write_sfixed32(&mut self, field: u32, value: i32) {
        self.write_tag(field, WireType::Fixed32);
        S::write_fixed32_le(&mut self.session, value as u32);
    }

    fn write_float(&mut self, field: u32, value: f32) {
        self.write_tag(field, WireType::Fixed32);
        S::write_fixed32_le(&mut self.session, f32_to_bits(value));
    }

    fn write_fixed64(&mut self, field: u32, value: u64) {
        self.write_tag(field, WireType::Fixed64);
        S::write_fixed64_le(&mut self.session, value);
    }

    fn write_sfixed64(&mut self, field: u32, value: i64) {
        self.write_tag(field, WireType::Fixed64);
        S::write_fixed64_le(&mut self.session, value as u64);
    }

    fn write_double(&mut self, field: u32, value: f64) {
        self.write_tag(field, WireType::Fixed64);
        S::write_fixed64_le(&mut self.session, f64_to_bits(value));
    }

    fn write_string(&mut self, field: u32, value: &str) {
        self.write_tag(field, WireType::LengthDelimited);
        S::write_utf8_str(&mut self.session, value);
    }

    fn write_bytes(&mut self, field: u32, value: &'a [u8]) {
        self.write_tag(field, WireType::LengthDelimited);
        S::write_varint32(&mut self.session, value.len() as u32);
        S::write_bytes(&mut self.session, value);
    }

    fn write_bool_packed(&mut self, value: bool) {
        S::write_byte(&mut self.session, value as u8);
    }

    fn write_i8_packed(&mut self, value: i8) {
        S::write_byte(&mut self.session, value as u8);
    }

    fn write_u8_packed(&mut self, value: u8) {
        S::write_byte(&mut self.session, value);
    }

    fn write_i16_packed(&mut self, value: i16) {
        S::write_fixed16_le(&mut self.session, value as u16);
    }

    fn write_u16_packed(&mut self, value: u16) {
        S::write_fixed16_le(&mut self.session, value);
    }

    fn write_i32_packed(&mut self, value: i32) {
        if value >= 0 {
            S::write_varint32(&mut self.session, value as u32);
        } else {
            // negative int32 carries its sign extension, like any varint field
            S::write_varint64(&mut self.session, value as i64 as u64);
        }
    }

    fn write_u32_packed(&mut self, value: u32) {
        S::write_varint32(&mut self.session, value);
    }

    fn write_s32_packed(&mut self, value: i32) {
        S::write_varint32(&mut self.session, zigzag32(value));
    }

    fn write_i64_packed(&mut self, value: i64) {
        S::write_varint64(&mut self.session, value as u64);
    }

    fn write_u64_packed(&mut self, value: u64) {
        S::write_varint64(&mut self.session, value);
    }

    fn write_s64_packed(&mut self, value: i64) {
        S::write_varint64(&mut self.session, zigzag64(value));
    }

    fn write_fixed32_packed(&mut self, value: u32) {
        S::write_fixed32_le(&mut self.session, value);
    }

    fn write_sfixed32_packed(&mut self, value: i32) {
        S::write_fixed32_le(&mut self.session, value as u32);
    }

    fn write_float_packed(&mut self, value: f32) {
        S::write_fixed32_le(&mut self.session, f32_to_bits(value));
    }

    fn write_fixed64_packed(&mut self, value: u64) {
        S::write_fixed64_le(&mut self.session, value);
    }

    fn write_sfixed64_packed(&mut self, value: i64) {
        S::write_fixed64_le(&mut self.session, value as u64);
    }

    fn write_double_packed(&mut self, value: f64) {
        S::write_fixed64_le(&mut self.session, f64_to_bits(value));
    }

    fn write_string_packed(&mut self, value: &str) {
        S::write_utf8_str(&mut self.session, value);
    }

    fn write_bytes_packed(&mut self, value: &'a [u8]) {
        S::write_varint32(&mut self.session, value.len() as u32);
        S::write_bytes(&mut self.session, value);
    }

    fn write_array<T, F>(&mut self, field: u32, values: &[T], mut write: F)
    where
        F: FnMut(&mut Self, &T),
    {
        self.write_message(field, |w| {
            w.write_i32_packed(values.len() as i32);
            for value in values {
                write(w, value);
            }
        });
    }

    fn write_list<I, F>(&mut self, field: u32, values: I, mut write: F)
    where
        I: IntoIterator,
        F: FnMut(&mut Self, I::Item),
    {
        self.write_message(field, |w| {
            for value in values {
                write(w, value);
            }
        });
    }

    fn write_set<I, F>(&mut self, field: u32, values: I, write: F)
    where
        I: IntoIterator,
        F: FnMut(&mut Self, I::Item),
    {
        self.write_list(field, values, write);
    }

    fn write_map<I, K, V, FK, FV>(
        &mut self,
        field: u32,
        entries: I,
        mut write_key: FK,
        mut write_value: FV,
    ) where
        I: IntoIterator<Item = (K, V)>,
        FK: FnMut(&mut Self, K),
        FV: FnMut(&mut Self, V),
    {
        self.write_message(field, |w| {
            for (key, value) in entries {
                write_key(w, key);
                write_value(w, value);
            }
        });
    }

    fn write_bool_array(&mut self, field: u32, values: &[bool]) {
        self.write_bool_list(field, values.iter().copied());
    }

    fn write_bool_list<I>(&mut self, field: u32, values: I)
    where
        I: IntoIterator<Item = bool>,
    {
        let mut bits = Vec::new();
        let mut count = 0usize;
        for value in values {
            if count % 8 == 0 {
                bits.push(0u8);
            }
            if value {
                bits[count / 8] |= 1 << (count % 8);
            }
            count += 1;
        }
        self.write_message(field, |w| {
            w.write_i32_packed(count as i32);
            S::write_bytes_buffered(&mut w.session, &bits);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode<F: FnOnce(&mut Encoder<'_>)>(f: F) -> Vec<u8> {
        let mut encoder = Encoder::new();
        f(&mut encoder);
        encoder.to_bytes()
    }

    #[test]
    fn varint_field_with_classic_tag() {
        // field 1, varint 150: the canonical protobuf example
        assert_eq!(vec![0x08, 0x96, 0x01], encode(|e| e.write_u32(1, 150)));
    }

    #[test]
    fn high_field_numbers_get_multi_byte_tags() {
        let bytes = encode(|e| e.write_u32(100, 1));
        assert_eq!(vec![0xA0, 0x06, 0x01], bytes);
    }

    #[test]
    fn fixed_width_fields() {
        assert_eq!(vec![0x0B, 0x01], encode(|e| e.write_bool(1, true)));
        assert_eq!(vec![0x0C, 0x34, 0x12], encode(|e| e.write_u16(1, 0x1234)));
        assert_eq!(
            vec![0x0D, 0x78, 0x56, 0x34, 0x12],
            encode(|e| e.write_fixed32(1, 0x1234_5678))
        );
        assert_eq!(
            vec![0x09, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
            encode(|e| e.write_fixed64(1, 1))
        );
    }

    #[test]
    fn negative_i32_sign_extends_to_ten_bytes() {
        let bytes = encode(|e| e.write_i32(1, -1));
        assert_eq!(11, bytes.len());
        assert_eq!(0x08, bytes[0]);
        assert_eq!(&[0xFF; 9][..], &bytes[1..10]);
        assert_eq!(0x01, bytes[10]);
    }

    #[test]
    fn zigzag_fields_stay_short() {
        assert_eq!(vec![0x08, 0x01], encode(|e| e.write_s32(1, -1)));
        assert_eq!(vec![0x08, 0x03], encode(|e| e.write_s64(1, -2)));
    }

    #[test]
    fn float_fields_use_ieee_bits() {
        assert_eq!(
            vec![0x0D, 0x00, 0x00, 0x80, 0x3F],
            encode(|e| e.write_float(1, 1.0))
        );
        assert_eq!(
            vec![0x09, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xF0, 0x3F],
            encode(|e| e.write_double(1, 1.0))
        );
    }

    #[test]
    fn string_field() {
        assert_eq!(
            vec![0x12, 0x02, b'h', b'i'],
            encode(|e| e.write_string(2, "hi"))
        );
    }

    #[test]
    fn small_message_backpatches_reserved_byte() {
        let content = "c".repeat(125);
        let bytes = encode(|e| e.write_message(1, |w| w.write_string_packed(&content)));
        // 1 length byte for the string prefix + 125 payload = 126 < 128
        assert_eq!(vec![0x0A, 126, 125], bytes[..3].to_vec());
        assert_eq!(128, bytes.len());
    }

    #[test]
    fn large_message_splices_wider_length() {
        let content = "c".repeat(200);
        let bytes = encode(|e| e.write_message(1, |w| w.write_string_packed(&content)));
        // inner: 2-byte prefix + 200 payload = 202 content bytes
        assert_eq!(vec![0x0A, 0xCA, 0x01, 0xC8, 0x01], bytes[..5].to_vec());
        assert_eq!(205, bytes.len());
        assert_eq!(content.as_bytes(), &bytes[5..]);
    }

    #[test]
    fn message_framing_across_content_sizes() {
        for content_size in [0usize, 1, 127, 128, 16384] {
            let bytes = encode(|e| {
                e.write_message(1, |w| {
                    for _ in 0..content_size {
                        w.write_u8_packed(0xAA);
                    }
                });
            });
            let expected_prefix = match content_size {
                0 => vec![0x0A, 0x00],
                1 => vec![0x0A, 0x01],
                127 => vec![0x0A, 0x7F],
                128 => vec![0x0A, 0x80, 0x01],
                _ => vec![0x0A, 0x80, 0x80, 0x01],
            };
            assert_eq!(expected_prefix, bytes[..bytes.len() - content_size].to_vec());
            assert!(bytes[expected_prefix.len()..].iter().all(|&b| b == 0xAA));
        }
    }

    #[test]
    fn message_framing_at_block_boundary() {
        let mut encoder = Encoder::with_buffer_size(256);
        // leave exactly one free byte, so the tag lands on the last slot and
        // the length byte cannot be reserved in place
        let pad = vec![0u8; 252];
        encoder.write_bytes(1, &pad);
        encoder.write_message(2, |w| w.write_u32_packed(7));
        let bytes = encoder.to_bytes();
        assert_eq!(258, bytes.len());
        assert_eq!(&[0x12, 0x01, 0x07], &bytes[255..]);
    }

    #[test]
    fn nested_messages() {
        let bytes = encode(|e| {
            e.write_message(1, |outer| {
                outer.write_u32(1, 5);
                outer.write_message(2, |inner| inner.write_u32(1, 6));
            });
        });
        assert_eq!(vec![0x0A, 0x06, 0x08, 0x05, 0x12, 0x02, 0x08, 0x06], bytes);
    }

    #[test]
    fn message_straddling_growth_keeps_order() {
        let big = "x".repeat(1000);
        let bytes = encode(|e| {
            e.write_message(1, |w| {
                w.write_u32(1, 1);
                w.write_string(2, &big);
                w.write_u32(3, 3);
            });
        });
        // inner size: 2 + 1 + 2 + 1000 + 2 = 1007
        assert_eq!(vec![0x0A, 0xEF, 0x07], bytes[..3].to_vec());
        assert_eq!(1010, bytes.len());
        assert_eq!(&[0x18, 0x03], &bytes[1008..]);
    }

    #[test]
    fn bool_list_is_bit_packed() {
        let values = [true, false, true, true, false, false, false, false, true];
        let bytes = encode(|e| e.write_bool_array(1, &values));
        assert_eq!(vec![0x0A, 0x03, 0x09, 0b0000_1101, 0b0000_0001], bytes);
    }

    #[test]
    fn clear_allows_reuse() {
        let mut encoder = Encoder::new();
        encoder.write_u32(1, 1);
        encoder.clear();
        encoder.write_u32(1, 2);
        assert_eq!(vec![0x08, 0x02], encoder.to_bytes());
    }
}
