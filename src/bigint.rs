//! Arithmetic adapter for decoding MMDB unsigned integers (up to 128 bits)
//! without relying on host-native integer width.
//!
//! The format's own decision rule: use native arithmetic when the
//! accumulating value demonstrably fits, otherwise fall back to a wider
//! backend. Rust's `u128` already covers every width this format defines
//! (16 bytes), so there is no need for an arbitrary-precision crate -- but
//! the native/big split from the original capability check is kept visible
//! in [`MmdbUint`] so callers can still tell which tier a value took.

use crate::error::MmdbError;

/// Which width ultimately backed a decoded unsigned integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmdbUint {
    /// Fit in a 64-bit accumulator.
    Native(u64),
    /// Needed the full 128-bit accumulator.
    Big(u128),
}

impl MmdbUint {
    pub fn as_u128(self) -> u128 {
        match self {
            MmdbUint::Native(v) => v as u128,
            MmdbUint::Big(v) => v,
        }
    }
}

impl std::fmt::Display for MmdbUint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MmdbUint::Native(v) => write!(f, "{v}"),
            MmdbUint::Big(v) => write!(f, "{v}"),
        }
    }
}

/// Accumulates big-endian bytes one at a time: shift the running value left
/// by 8 bits, then OR in the next byte. Mirrors the `add`/`shift_left`
/// capability pair the format's decode algorithm is specified in terms of.
trait UintAccumulator: Copy {
    fn zero() -> Self;
    fn shift_left_by_bits(self, bits: u32) -> Result<Self, MmdbError>;
    fn add_byte(self, byte: u8) -> Self;
}

impl UintAccumulator for u64 {
    fn zero() -> Self {
        0
    }

    fn shift_left_by_bits(self, bits: u32) -> Result<Self, MmdbError> {
        self.checked_shl(bits)
            .ok_or(MmdbError::PlatformLimit("u64 accumulator overflowed"))
    }

    fn add_byte(self, byte: u8) -> Self {
        self | byte as u64
    }
}

impl UintAccumulator for u128 {
    fn zero() -> Self {
        0
    }

    fn shift_left_by_bits(self, bits: u32) -> Result<Self, MmdbError> {
        self.checked_shl(bits)
            .ok_or(MmdbError::PlatformLimit("u128 accumulator overflowed"))
    }

    fn add_byte(self, byte: u8) -> Self {
        self | byte as u128
    }
}

fn accumulate<A: UintAccumulator>(bytes: &[u8]) -> Result<A, MmdbError> {
    let mut v = A::zero();
    for &byte in bytes {
        v = v.shift_left_by_bits(8)?;
        v = v.add_byte(byte);
    }
    Ok(v)
}

/// Decides whether `size` bytes of big-endian data, whose leading byte is
/// `msb`, fit the native 64-bit tier or need the 128-bit tier.
///
/// Native is used when `size` is strictly less than the native word width
/// (8 bytes), or when it equals the native width and the top bit of the
/// leading byte is clear -- i.e. the value would also fit a *signed* 64-bit
/// word. (A widely copied reference implementation tests only the top 6
/// bits here, which looks like a typo for the top-bit mask `0x80`; this
/// reader tests the high bit directly.)
fn fits_native(size: usize, msb: u8) -> bool {
    const NATIVE_WORD_BYTES: usize = 8;
    size < NATIVE_WORD_BYTES || (size == NATIVE_WORD_BYTES && msb & 0x80 == 0)
}

/// Accumulates `bytes` (big-endian, 0..=16 of them) into an [`MmdbUint`],
/// selecting the native or big tier per [`fits_native`].
pub fn decode_uint(bytes: &[u8]) -> Result<MmdbUint, MmdbError> {
    if bytes.is_empty() {
        return Ok(MmdbUint::Native(0));
    }
    if bytes.len() > 16 {
        return Err(MmdbError::InvalidData(
            "unsigned integer field wider than 128 bits",
        ));
    }
    if fits_native(bytes.len(), bytes[0]) {
        Ok(MmdbUint::Native(accumulate::<u64>(bytes)?))
    } else {
        Ok(MmdbUint::Big(accumulate::<u128>(bytes)?))
    }
}
