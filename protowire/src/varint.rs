//! Base-128 varints and the zigzag transform. Varints are little-endian
//! seven-bit groups with a continuation bit of `0x80` on every byte but the
//! last. The 64-bit routines operate on a `(lo, hi)` pair of 32-bit words so
//! the bit-level steps stay expressible on targets without native 64-bit
//! arithmetic; `split64`/`join64` bridge to the native integer at the API
//! boundary.

/// Number of bytes the varint encoding of `value` occupies.
#[inline]
pub(crate) const fn varint32_size(value: u32) -> usize {
    if value & (u32::MAX << 7) == 0 {
        1
    } else if value & (u32::MAX << 14) == 0 {
        2
    } else if value & (u32::MAX << 21) == 0 {
        3
    } else if value & (u32::MAX << 28) == 0 {
        4
    } else {
        5
    }
}

/// Encodes `value` into the front of `buf` and returns the number of bytes
/// written. `buf` must hold at least `varint32_size(value)` bytes.
pub(crate) fn encode_varint32(mut value: u32, buf: &mut [u8]) -> usize {
    let mut i = 0;
    while value & !0x7F != 0 {
        buf[i] = (value as u8 & 0x7F) | 0x80;
        value >>= 7;
        i += 1;
    }
    buf[i] = value as u8;
    i + 1
}

#[inline]
pub(crate) const fn split64(value: u64) -> (u32, u32) {
    (value as u32, (value >> 32) as u32)
}

#[inline]
pub(crate) const fn join64(lo: u32, hi: u32) -> u64 {
    (hi as u64) << 32 | lo as u64
}

/// Maps signed to unsigned so small-magnitude values stay numerically small.
/// The right shift must be arithmetic.
#[inline]
pub(crate) const fn zigzag32(n: i32) -> u32 {
    ((n << 1) ^ (n >> 31)) as u32
}

#[inline]
pub(crate) const fn unzigzag32(n: u32) -> i32 {
    (n >> 1) as i32 ^ -((n & 1) as i32)
}

/// Zigzag across the word pair, using the sign word as the mask.
pub(crate) const fn zigzag64(value: i64) -> u64 {
    let (lo, hi) = split64(value as u64);
    let mask = (hi as i32 >> 31) as u32;
    join64((lo << 1) ^ mask, (hi << 1 | lo >> 31) ^ mask)
}

pub(crate) const fn unzigzag64(value: u64) -> i64 {
    let (lo, hi) = split64(value);
    let mask = -((lo & 1) as i32) as u32;
    join64((lo >> 1 | hi << 31) ^ mask, (hi >> 1) ^ mask) as i64
}
