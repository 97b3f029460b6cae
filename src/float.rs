//! Decoding of floating point formats without a native Rust type

/// IEEE 754 binary16
pub fn decode_half(bits: u16) -> f64 {
    let sign = if bits >> 15 != 0 { -1.0 } else { 1.0 };
    let exp = ((bits >> 10) & 0x1f) as i32;
    let frac = (bits & 0x3ff) as f64;
    match exp {
        0 => sign * frac * 2f64.powi(-24),
        0x1f if frac == 0.0 => sign * f64::INFINITY,
        0x1f => f64::NAN,
        _ => sign * (1.0 + frac / 1024.0) * 2f64.powi(exp - 15),
    }
}

/// x87 80-bit extended precision, `data` holds at least 10 little endian bytes
pub fn decode_x87(data: &[u8]) -> Option<f64> {
    let data = data.get(..10)?;
    let mut mantissa = [0u8; 8];
    mantissa.copy_from_slice(&data[..8]);
    let mantissa = u64::from_le_bytes(mantissa);
    let se = u16::from_le_bytes([data[8], data[9]]);
    let sign = if se >> 15 != 0 { -1.0 } else { 1.0 };
    let exp = (se & 0x7fff) as i32;
    if exp == 0x7fff {
        return Some(if mantissa << 1 == 0 {
            sign * f64::INFINITY
        } else {
            f64::NAN
        });
    }
    // the integer bit is explicit
    let exp = if exp == 0 { 1 } else { exp } - 16383 - 63;
    Some(sign * scale(mantissa as f64, exp))
}

/// IEEE 754 binary128, `data` holds 16 little endian bytes; precision is cut to f64
pub fn decode_binary128(data: &[u8]) -> Option<f64> {
    let data = data.get(..16)?;
    let mut raw = [0u8; 16];
    raw.copy_from_slice(data);
    let raw = u128::from_le_bytes(raw);
    let sign = if raw >> 127 != 0 { -1.0 } else { 1.0 };
    let exp = ((raw >> 112) & 0x7fff) as i32;
    let frac = raw & ((1u128 << 112) - 1);
    if exp == 0x7fff {
        return Some(if frac == 0 {
            sign * f64::INFINITY
        } else {
            f64::NAN
        });
    }
    // keep the top 64 bits of the fraction
    let top = (frac >> 48) as u64;
    let (int_bit, exp) = if exp == 0 { (0.0, -16382) } else { (1.0, exp - 16383) };
    let value = int_bit + top as f64 / 2f64.powi(64);
    Some(sign * scale(value, exp))
}

/// `value * 2^exp` without an overflowing intermediate power
fn scale(value: f64, exp: i32) -> f64 {
    let half = exp / 2;
    value * 2f64.powi(half) * 2f64.powi(exp - half)
}
