//! IEEE-754 bit conversions done with plain arithmetic, for targets without
//! a native bit-reinterpretation primitive. The layouts are the standard
//! ones: sign bit, 8/11 exponent bits, 23/52 mantissa bits, bias 127/1023.
//!
//! Every step is exact: exponents are found by halving/doubling (powers of
//! two are exact in binary floating point) and the normalized mantissa of a
//! finite input is an integer after scaling, so no rounding decisions arise.
//! NaNs canonicalize to the quiet patterns `0x7FC0_0000` and
//! `0x7FF8_0000_0000_0000`.

const F32_SIGN: u32 = 1 << 31;
const F32_INFINITY: u32 = 0x7F80_0000;
const F32_NAN: u32 = 0x7FC0_0000;
const F32_MANTISSA: f64 = 8388608.0; // 2^23

const F64_SIGN: u64 = 1 << 63;
const F64_INFINITY: u64 = 0x7FF0_0000_0000_0000;
const F64_NAN: u64 = 0x7FF8_0000_0000_0000;
const F64_MANTISSA: f64 = 4503599627370496.0; // 2^52

/// 2^e, exact for -1074 <= e < 1024.
fn pow2(e: i32) -> f64 {
    let mut r = 1.0f64;
    let mut e = e;
    while e > 0 {
        r *= 2.0;
        e -= 1;
    }
    while e < 0 {
        r *= 0.5;
        e += 1;
    }
    r
}

pub(crate) fn f32_to_bits(value: f32) -> u32 {
    if value != value {
        return F32_NAN;
    }
    if value == 0.0 {
        return if 1.0 / value < 0.0 { F32_SIGN } else { 0 };
    }
    let wide = value as f64;
    let (sign, mut frac) = if wide < 0.0 { (F32_SIGN, -wide) } else { (0, wide) };
    if frac > f32::MAX as f64 {
        return sign | F32_INFINITY;
    }
    if frac < pow2(-126) {
        // subnormal, counted in units of 2^-149
        return sign | (frac / pow2(-149)) as u32;
    }
    let mut exponent = 0i32;
    while frac >= 2.0 {
        frac *= 0.5;
        exponent += 1;
    }
    while frac < 1.0 {
        frac *= 2.0;
        exponent -= 1;
    }
    sign | ((exponent + 127) as u32) << 23 | ((frac - 1.0) * F32_MANTISSA) as u32
}

pub(crate) fn bits_to_f32(bits: u32) -> f32 {
    let sign = if bits & F32_SIGN != 0 { -1.0f64 } else { 1.0 };
    let exponent = (bits >> 23 & 0xFF) as i32;
    let mantissa = (bits & 0x7F_FFFF) as f64;
    if exponent == 0xFF {
        return if mantissa != 0.0 { f32::NAN } else { (sign * f64::INFINITY) as f32 };
    }
    if exponent == 0 {
        return (sign * pow2(-149) * mantissa) as f32;
    }
    (sign * pow2(exponent - 150) * (mantissa + F32_MANTISSA)) as f32
}

pub(crate) fn f64_to_bits(value: f64) -> u64 {
    if value != value {
        return F64_NAN;
    }
    if value == 0.0 {
        return if 1.0 / value < 0.0 { F64_SIGN } else { 0 };
    }
    let (sign, mut frac) = if value < 0.0 { (F64_SIGN, -value) } else { (0, value) };
    if frac > f64::MAX {
        return sign | F64_INFINITY;
    }
    if frac < pow2(-1022) {
        // subnormal, counted in units of 2^-1074
        return sign | (frac / pow2(-1074)) as u64;
    }
    let mut exponent = 0i32;
    while frac >= 2.0 {
        frac *= 0.5;
        exponent += 1;
    }
    while frac < 1.0 {
        frac *= 2.0;
        exponent -= 1;
    }
    sign | ((exponent + 1023) as u64) << 52 | ((frac - 1.0) * F64_MANTISSA) as u64
}

pub(crate) fn bits_to_f64(bits: u64) -> f64 {
    let sign = if bits & F64_SIGN != 0 { -1.0f64 } else { 1.0 };
    let exponent = (bits >> 52 & 0x7FF) as i32;
    let mantissa = (bits & 0xF_FFFF_FFFF_FFFF) as f64;
    if exponent == 0x7FF {
        return if mantissa != 0.0 { f64::NAN } else { sign * f64::INFINITY };
    }
    if exponent == 0 {
        return sign * pow2(-1074) * mantissa;
    }
    sign * pow2(exponent - 1075) * (mantissa + F64_MANTISSA)
}
