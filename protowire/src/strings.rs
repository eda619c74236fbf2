//! Length-delimited UTF-8 writing with an adaptive varint prefix.
//!
//! The payload length is not known to the prefix writer up front, so the
//! byte length picks a size band, the prefix space is reserved, the payload
//! is encoded, and if the payload came in under the band's floor the spare
//! prefix byte is reclaimed by sliding the payload left one position. Band
//! boundaries are a third of each varint-size boundary, so a reclaim never
//! drops more than one byte.

use crate::buffer::WriteSession;

const ONE_BYTE_EXCLUSIVE: usize = 128 / 3 + 1;
const TWO_BYTE_EXCLUSIVE: usize = (1 << 14) / 3 + 1;
const THREE_BYTE_EXCLUSIVE: usize = (1 << 21) / 3 + 1;
const FOUR_BYTE_EXCLUSIVE: usize = (1 << 28) / 3 + 1;

pub(crate) fn write_utf8_var_delimited(value: &str, session: &mut WriteSession<'_>) {
    let len = value.len();
    if len == 0 {
        push_byte(session, 0);
    } else if len < ONE_BYTE_EXCLUSIVE {
        write_var_delimited(value, 0, 1, session);
    } else if len < TWO_BYTE_EXCLUSIVE {
        write_var_delimited(value, 128, 2, session);
    } else if len < THREE_BYTE_EXCLUSIVE {
        write_var_delimited(value, 1 << 14, 3, session);
    } else if len < FOUR_BYTE_EXCLUSIVE {
        write_var_delimited(value, 1 << 21, 4, session);
    } else {
        write_var_delimited(value, 1 << 28, 5, session);
    }
}

fn write_var_delimited(
    value: &str,
    lower_limit: usize,
    expected_size: usize,
    session: &mut WriteSession<'_>,
) {
    let len = value.len();
    let mut tail = session.tail();
    if session.remaining(tail) < expected_size {
        // a prefix must never straddle blocks
        tail = session.grow_with_capacity((len + expected_size).max(session.next_buffer_size));
    }
    let prefix_at = session.block(tail).offset;
    session.block_mut(tail).offset += expected_size;

    let mut expected = expected_size;
    if session.remaining(tail) >= len {
        write_payload(value, session, tail);
        if len < lower_limit {
            // payload undershot the band: slide it left over the spare byte
            let (buf, offset) = session.block_buf_mut(tail);
            buf.copy_within(prefix_at + expected..*offset, prefix_at + expected - 1);
            *offset -= 1;
            expected -= 1;
        }
        session.size += len + expected;
        write_prefix(len, expected, session, tail, prefix_at);
    } else {
        // payload will spill into further blocks, settle the prefix first
        if len < lower_limit {
            let block = session.block_mut(tail);
            block.offset -= 1;
            expected -= 1;
        }
        session.size += expected;
        write_prefix(len, expected, session, tail, prefix_at);
        write_payload_bounded(value, session);
    }
}

/// Varint of `len` laid into exactly `expected` reserved bytes.
fn write_prefix(len: usize, expected: usize, session: &mut WriteSession<'_>, block: usize, at: usize) {
    for i in 0..expected - 1 {
        session.patch_byte(block, at + i, (len >> (7 * i)) as u8 | 0x80);
    }
    session.patch_byte(block, at + expected - 1, (len >> (7 * (expected - 1))) as u8);
}

/// Fast path: the whole payload fits in `block` after the reserved prefix.
fn write_payload(value: &str, session: &mut WriteSession<'_>, block: usize) {
    let (buf, offset) = session.block_buf_mut(block);
    let mut at = *offset;
    let mut scratch = [0u8; 4];
    for c in value.chars() {
        let c = c as u32;
        if c < 0x80 {
            buf[at] = c as u8;
            at += 1;
        } else {
            let n = encode_char(c, &mut scratch);
            buf[at..at + n].copy_from_slice(&scratch[..n]);
            at += n;
        }
    }
    *offset = at;
}

/// Spill path: byte at a time, growing the chain as blocks fill up.
fn write_payload_bounded(value: &str, session: &mut WriteSession<'_>) {
    let mut scratch = [0u8; 4];
    for c in value.chars() {
        let n = encode_char(c as u32, &mut scratch);
        for &b in &scratch[..n] {
            push_byte(session, b);
        }
    }
}

fn push_byte(session: &mut WriteSession<'_>, value: u8) {
    if session.remaining(session.tail()) == 0 {
        session.grow();
    }
    session.size += 1;
    let tail = session.tail();
    let (buf, offset) = session.block_buf_mut(tail);
    buf[*offset] = value;
    *offset += 1;
}

/// UTF-8 encoding of one scalar value. Returns the byte count (1 to 4).
fn encode_char(c: u32, out: &mut [u8; 4]) -> usize {
    if c < 0x80 {
        out[0] = c as u8;
        1
    } else if c < 0x800 {
        out[0] = 0xC0 | (c >> 6) as u8;
        out[1] = 0x80 | (c & 0x3F) as u8;
        2
    } else if c < 0x10000 {
        out[0] = 0xE0 | (c >> 12) as u8;
        out[1] = 0x80 | (c >> 6 & 0x3F) as u8;
        out[2] = 0x80 | (c & 0x3F) as u8;
        3
    } else {
        out[0] = 0xF0 | (c >> 18) as u8;
        out[1] = 0x80 | (c >> 12 & 0x3F) as u8;
        out[2] = 0x80 | (c >> 6 & 0x3F) as u8;
        out[3] = 0x80 | (c & 0x3F) as u8;
        4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(value: &str) -> Vec<u8> {
        let mut session = WriteSession::new();
        write_utf8_var_delimited(value, &mut session);
        session.to_bytes()
    }

    #[test]
    fn empty_string_is_a_lone_zero() {
        assert_eq!(vec![0x00], encode(""));
    }

    #[test]
    fn short_string_gets_one_byte_prefix() {
        assert_eq!(vec![5, b'h', b'e', b'l', b'l', b'o'], encode("hello"));
    }

    #[test]
    fn undershooting_band_reclaims_prefix_byte() {
        // 100 bytes classifies into the two-byte band but needs only one
        let value = "x".repeat(100);
        let bytes = encode(&value);
        assert_eq!(101, bytes.len());
        assert_eq!(100, bytes[0]);
        assert_eq!(value.as_bytes(), &bytes[1..]);
    }

    #[test]
    fn one_byte_band_edge() {
        // 42 classifies one-byte, 43 classifies two-byte but reclaims
        let bytes = encode(&"a".repeat(42));
        assert_eq!(42, bytes[0]);
        assert_eq!(43, bytes.len());

        let bytes = encode(&"a".repeat(43));
        assert_eq!(43, bytes[0]);
        assert_eq!(44, bytes.len());
    }

    #[test]
    fn band_floor_keeps_full_prefix() {
        let value = "y".repeat(200);
        let bytes = encode(&value);
        assert_eq!(202, bytes.len());
        assert_eq!([0xC8, 0x01], bytes[..2]);
        assert_eq!(value.as_bytes(), &bytes[2..]);
    }

    #[test]
    fn three_byte_band_edges() {
        let bytes = encode(&"z".repeat(16383));
        assert_eq!([0xFF, 0x7F], bytes[..2]);
        assert_eq!(16385, bytes.len());

        let bytes = encode(&"z".repeat(16384));
        assert_eq!([0x80, 0x80, 0x01], bytes[..3]);
        assert_eq!(16387, bytes.len());
    }

    #[test]
    fn multibyte_payload_matches_utf8() {
        let value = "héllo wörld \u{6771}\u{4EAC} \u{1D11E}";
        let bytes = encode(value);
        assert_eq!(value.len() as u8, bytes[0]);
        assert_eq!(value.as_bytes(), &bytes[1..]);
    }

    #[test]
    fn payload_spills_across_blocks() {
        let mut session = WriteSession::with_buffer_size(256);
        for _ in 0..250 {
            push_byte(&mut session, 0xEE);
        }
        let value = "s".repeat(120);
        write_utf8_var_delimited(&value, &mut session);
        assert_eq!(371, session.size());
        let bytes = session.to_bytes();
        assert_eq!(120, bytes[250]);
        assert_eq!(value.as_bytes(), &bytes[251..]);
    }

    #[test]
    fn prefix_never_straddles_a_block_boundary() {
        let mut session = WriteSession::with_buffer_size(256);
        for _ in 0..255 {
            push_byte(&mut session, 0xEE);
        }
        let value = "q".repeat(50);
        write_utf8_var_delimited(&value, &mut session);
        let bytes = session.to_bytes();
        // the last byte of the first block is abandoned, prefix and payload
        // move to a fresh block together
        assert_eq!(306, bytes.len());
        assert_eq!(50, bytes[255]);
        assert_eq!(value.as_bytes(), &bytes[256..]);
    }
}
