//! Positioned read/seek primitives shared by the rest of the crate.
//!
//! Nothing here is MMDB-specific; it exists so decode/search code reads as
//! "seek then read `n` strict bytes" rather than hand-rolling `read_exact`
//! at every call site.

use std::io::{Read, Seek, SeekFrom};

use crate::error::MmdbError;

/// Seeks to an absolute offset within the stream.
pub fn seek_to<T: Seek>(stream: &mut T, offset: u64) -> Result<(), MmdbError> {
    stream.seek(SeekFrom::Start(offset))?;
    Ok(())
}

/// Reads exactly `len` bytes at the current position. A short read (stream
/// ends early) surfaces as an I/O error rather than a partial buffer.
pub fn read_strict<T: Read>(stream: &mut T, len: usize) -> Result<Vec<u8>, MmdbError> {
    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf)?;
    Ok(buf)
}

/// Seeks to `offset` and reads exactly `len` bytes from there.
pub fn read_at<T: Read + Seek>(stream: &mut T, offset: u64, len: usize) -> Result<Vec<u8>, MmdbError> {
    seek_to(stream, offset)?;
    read_strict(stream, len)
}
