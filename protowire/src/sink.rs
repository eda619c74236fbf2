//! Byte-level write strategies over a [`WriteSession`].
//!
//! The [`Sink`] trait is the seam between field-level encoding and raw byte
//! placement. Its one shipped implementation, [`Buffered`], appends into the
//! session's block chain and splices large caller slices in by reference
//! instead of copying them.

use crate::buffer::WriteSession;
use crate::strings;

pub trait Sink {
    fn write_byte(session: &mut WriteSession<'_>, value: u8);

    /// Writes a slice, splicing it in zero-copy when that is cheaper than
    /// copying it across blocks.
    fn write_bytes<'a>(session: &mut WriteSession<'a>, bytes: &'a [u8]);

    /// Always-copy variant for bytes that do not outlive the session.
    fn write_bytes_buffered(session: &mut WriteSession<'_>, bytes: &[u8]);

    fn write_fixed16_le(session: &mut WriteSession<'_>, value: u16);
    fn write_fixed32_le(session: &mut WriteSession<'_>, value: u32);
    fn write_fixed64_le(session: &mut WriteSession<'_>, value: u64);

    fn write_varint32(session: &mut WriteSession<'_>, value: u32);
    fn write_varint64(session: &mut WriteSession<'_>, value: u64);

    /// UTF-8 payload preceded by its byte length as a varint.
    fn write_utf8_str(session: &mut WriteSession<'_>, value: &str);
}

/// Block-chain sink. Uninhabited: only its associated functions are used.
pub enum Buffered {}

impl Sink for Buffered {
    fn write_byte(session: &mut WriteSession<'_>, value: u8) {
        if session.remaining(session.tail()) == 0 {
            session.grow();
        }
        session.size += 1;
        let tail = session.tail();
        let (buf, offset) = session.block_buf_mut(tail);
        buf[*offset] = value;
        *offset += 1;
    }

    fn write_bytes<'a>(session: &mut WriteSession<'a>, bytes: &'a [u8]) {
        let len = bytes.len();
        if len == 0 {
            return;
        }
        let tail = session.tail();
        let remaining = session.remaining(tail);
        if len > remaining && remaining + session.next_buffer_size < len {
            // splicing beats copying: link the caller's slice in directly
            session.size += len;
            let donor = session.borrowed_block(bytes);
            session.link(tail, donor);
            if remaining == 0 {
                let fresh = session.detached_block(session.next_buffer_size);
                session.link(donor, fresh);
                session.set_tail(fresh);
            } else {
                // keep writing into the unused rest of the old tail's storage
                let offset = session.block(tail).offset;
                let view = session.view_block(tail, offset, offset);
                session.link(donor, view);
                session.set_tail(view);
            }
            return;
        }
        Self::write_bytes_buffered(session, bytes);
    }

    fn write_bytes_buffered(session: &mut WriteSession<'_>, bytes: &[u8]) {
        session.size += bytes.len();
        let mut rest = bytes;
        while !rest.is_empty() {
            let tail = session.tail();
            let n = session.remaining(tail).min(rest.len());
            if n == 0 {
                session.grow();
                continue;
            }
            let (buf, offset) = session.block_buf_mut(tail);
            buf[*offset..*offset + n].copy_from_slice(&rest[..n]);
            *offset += n;
            rest = &rest[n..];
        }
    }

    fn write_fixed16_le(session: &mut WriteSession<'_>, value: u16) {
        write_fixed(session, &value.to_le_bytes());
    }

    fn write_fixed32_le(session: &mut WriteSession<'_>, value: u32) {
        write_fixed(session, &value.to_le_bytes());
    }

    fn write_fixed64_le(session: &mut WriteSession<'_>, value: u64) {
        write_fixed(session, &value.to_le_bytes());
    }

    fn write_varint32(session: &mut WriteSession<'_>, value: u32) {
        let mut value = value;
        while value >= 0x80 {
            Self::write_byte(session, value as u8 | 0x80);
            value >>= 7;
        }
        Self::write_byte(session, value as u8);
    }

    fn write_varint64(session: &mut WriteSession<'_>, value: u64) {
        let (mut lo, mut hi) = crate::varint::split64(value);
        while hi != 0 {
            Self::write_byte(session, lo as u8 & 0x7F | 0x80);
            lo = lo >> 7 | hi << 25;
            hi >>= 7;
        }
        while lo >= 0x80 {
            Self::write_byte(session, lo as u8 | 0x80);
            lo >>= 7;
        }
        Self::write_byte(session, lo as u8);
    }

    fn write_utf8_str(session: &mut WriteSession<'_>, value: &str) {
        strings::write_utf8_var_delimited(value, session);
    }
}

fn write_fixed(session: &mut WriteSession<'_>, bytes: &[u8]) {
    if session.remaining(session.tail()) < bytes.len() {
        session.grow();
    }
    session.size += bytes.len();
    let tail = session.tail();
    let (buf, offset) = session.block_buf_mut(tail);
    buf[*offset..*offset + bytes.len()].copy_from_slice(bytes);
    *offset += bytes.len();
}
