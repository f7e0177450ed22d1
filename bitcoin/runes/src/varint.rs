//! Unsigned varints made of 7 bit groups, least significant group first.
//! Every byte except the last has its high bit set.

use num::{BigUint, ToPrimitive, Zero};

use crate::error::VarintError;

const CONTINUATION: u8 = 0x80;
const PAYLOAD: u8 = 0x7f;

/// Appends the encoding of `n` to `buf`.
pub fn encode_to_vec(mut n: u128, buf: &mut Vec<u8>) {
    while n >= CONTINUATION as u128 {
        buf.push((n as u8 & PAYLOAD) | CONTINUATION);
        n >>= 7;
    }
    buf.push(n as u8);
}

pub fn encode(n: u128) -> Vec<u8> {
    let mut buf = Vec::with_capacity(19);
    encode_to_vec(n, &mut buf);
    buf
}

/// Decodes one varint from the front of `buf`, returning the value and the
/// number of bytes it occupied.
pub fn decode(buf: &[u8]) -> Result<(u128, usize), VarintError> {
    let mut n: u128 = 0;

    for (i, &byte) in buf.iter().enumerate() {
        let shift = 7 * i as u32;
        let value = (byte & PAYLOAD) as u128;

        if shift >= 128 || (shift > 121 && value >> (128 - shift) != 0) {
            return Err(VarintError::Overflow { bits: 128 });
        }

        n |= value << shift;

        if byte & CONTINUATION == 0 {
            return Ok((n, i + 1));
        }
    }

    Err(VarintError::Truncated)
}

/// Arbitrary precision variant of [`encode`].
pub fn encode_big(n: &BigUint) -> Vec<u8> {
    let mask = BigUint::from(PAYLOAD);
    let threshold = BigUint::from(CONTINUATION);
    let mut n = n.clone();
    let mut buf = Vec::new();

    while n >= threshold {
        let low = (&n & &mask).to_u8().unwrap_or_default();
        buf.push(low | CONTINUATION);
        n >>= 7;
    }
    buf.push(n.to_u8().unwrap_or_default());

    buf
}

/// Arbitrary precision variant of [`decode`].
pub fn decode_big(buf: &[u8]) -> Result<(BigUint, usize), VarintError> {
    let mut n = BigUint::zero();

    for (i, &byte) in buf.iter().enumerate() {
        n |= BigUint::from(byte & PAYLOAD) << (7 * i);

        if byte & CONTINUATION == 0 {
            return Ok((n, i + 1));
        }
    }

    Err(VarintError::Truncated)
}

/// Decodes consecutive varints until `buf` is exhausted.
pub fn decode_all(mut buf: &[u8]) -> Result<Vec<u128>, VarintError> {
    let mut values = Vec::new();
    while !buf.is_empty() {
        let (value, len) = decode(buf)?;
        values.push(value);
        buf = &buf[len..];
    }
    Ok(values)
}

/// [`decode_all`] without the 128-bit bound.
pub fn decode_all_big(mut buf: &[u8]) -> Result<Vec<BigUint>, VarintError> {
    let mut values = Vec::new();
    while !buf.is_empty() {
        let (value, len) = decode_big(buf)?;
        values.push(value);
        buf = &buf[len..];
    }
    Ok(values)
}
