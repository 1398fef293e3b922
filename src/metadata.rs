//! Locates the metadata marker near end-of-file and decodes the metadata
//! map that follows it.

use std::io::{Read, Seek};

use crate::decoder::{decode, Value};
use crate::error::MmdbError;
use crate::stream::seek_to;

const METADATA_MARKER: &[u8] = b"\xAB\xCD\xEFMaxMind.com";
const METADATA_MAX_SEARCH: u64 = 128 * 1024;

/// Parsed database metadata. `node_count`, `record_size`, and `ip_version`
/// drive the search tree walk; every other key the database carries is
/// preserved verbatim, in on-disk order, in `extra`.
#[derive(Debug, Clone)]
pub struct Metadata {
    pub node_count: u32,
    pub record_size: u16,
    pub ip_version: u16,
    pub extra: Vec<(String, Value)>,
}

impl Metadata {
    fn from_value(value: Value) -> Result<Self, MmdbError> {
        let Value::Map(entries) = value else {
            return Err(MmdbError::InvalidMetadata(
                "metadata was not encoded as a map",
            ));
        };

        let mut node_count = None;
        let mut record_size = None;
        let mut ip_version = None;
        let mut extra = Vec::with_capacity(entries.len());

        for (key, value) in entries {
            match key.as_str() {
                "node_count" => node_count = Some(require_u32(&value)?),
                "record_size" => record_size = Some(require_u16(&value)?),
                "ip_version" => ip_version = Some(require_u16(&value)?),
                _ => extra.push((key, value)),
            }
        }

        Ok(Metadata {
            node_count: node_count
                .ok_or(MmdbError::InvalidMetadata("does not contain node_count"))?,
            record_size: record_size
                .ok_or(MmdbError::InvalidMetadata("does not contain record_size"))?,
            ip_version: ip_version
                .ok_or(MmdbError::InvalidMetadata("does not contain ip_version"))?,
            extra,
        })
    }

    /// Looks up an opaque metadata key outside the three fields this
    /// reader interprets directly.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.extra.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}

fn require_u32(value: &Value) -> Result<u32, MmdbError> {
    match value {
        Value::Uint32(v) => Ok(*v),
        Value::Uint16(v) => Ok(*v as u32),
        _ => Err(MmdbError::InvalidMetadata(
            "node_count field has unexpected type",
        )),
    }
}

fn require_u16(value: &Value) -> Result<u16, MmdbError> {
    match value {
        Value::Uint16(v) => Ok(*v),
        _ => Err(MmdbError::InvalidMetadata(
            "record_size/ip_version field has unexpected type",
        )),
    }
}

/// Locates the metadata marker within the trailing 128 KiB of the file and
/// decodes the metadata map immediately following it. Returns the metadata
/// and the absolute file offset the map was decoded from (the metadata
/// section base, which any pointers inside it are relative to).
pub fn load_metadata<T: Read + Seek>(
    stream: &mut T,
    file_size: u64,
) -> Result<(Metadata, u64), MmdbError> {
    let metadata_offset = find_metadata_offset(stream, file_size)?;
    let (value, _) = decode(stream, metadata_offset, metadata_offset)?;
    Ok((Metadata::from_value(value)?, metadata_offset))
}

/// Finds the offset immediately after the last marker occurrence in the
/// trailing 128 KiB. Reading that whole tail once and scanning backward
/// with a single `windows().rposition()` is simpler than chunked
/// boundary-straddling scans and has no failure mode at chunk edges.
fn find_metadata_offset<T: Read + Seek>(stream: &mut T, file_size: u64) -> Result<u64, MmdbError> {
    let search_start = file_size.saturating_sub(METADATA_MAX_SEARCH);
    let tail_len = (file_size - search_start) as usize;

    seek_to(stream, search_start)?;
    let mut tail = vec![0u8; tail_len];
    stream.read_exact(&mut tail)?;

    let marker_pos = tail
        .windows(METADATA_MARKER.len())
        .rposition(|window| window == METADATA_MARKER)
        .ok_or(MmdbError::MetadataNotFound)?;

    Ok(search_start + (marker_pos + METADATA_MARKER.len()) as u64)
}
