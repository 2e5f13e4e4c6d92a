//! ZigZag variable-length integers.
//!
//! Every type ordinal, collection length, component count and enum constant
//! index on the wire is a ZigZag-mapped little-endian base-128 varint, so
//! small magnitudes of either sign occupy one byte.

/// Longest legal encoding of a 64-bit value. Decoders must refuse anything
/// longer as malformed rather than silently wrapping.
pub const MAX_VARINT_LEN: usize = 10;

/// Map a signed value onto the unsigned ZigZag spiral:
/// `0, -1, 1, -2, 2, ...` becomes `0, 1, 2, 3, 4, ...`.
#[inline]
#[must_use]
pub const fn zigzag(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

/// Inverse of [`zigzag`].
#[inline]
#[must_use]
pub const fn unzigzag(z: u64) -> i64 {
    ((z >> 1) as i64) ^ -((z & 1) as i64)
}

/// Number of bytes [`zigzag`]-encoding `n` occupies on the wire.
#[inline]
#[must_use]
pub const fn varint_len(n: i64) -> usize {
    let z = zigzag(n);
    if z == 0 {
        1
    } else {
        (64 - z.leading_zeros() as usize).div_ceil(7)
    }
}
