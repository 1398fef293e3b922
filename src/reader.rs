//! The top-level façade: owns the stream, decodes metadata once at
//! construction, and exposes `lookup`/`metadata` to callers.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::net::IpAddr;
use std::path::Path;

use tracing::{debug, info};

use crate::decoder::Value;
use crate::error::MmdbError;
use crate::metadata::{load_metadata, Metadata};
use crate::stream::seek_to;
use crate::tree::{address_bytes, lookup as tree_lookup};

/// A reader for the MaxMind DB format, generic over any seekable byte
/// stream. Owns the stream for its whole lifetime; the metadata map is
/// decoded once at construction and cached immutably. No decoded
/// data-section values are cached across lookups.
pub struct Reader<T: Read + Seek> {
    stream: T,
    metadata: Metadata,
}

impl Reader<BufReader<File>> {
    /// Opens a database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MmdbError> {
        let file = File::open(path)?;
        Self::from_stream(BufReader::new(file))
    }
}

impl<T: Read + Seek> Reader<T> {
    /// Wraps an already-open seekable stream, reading its metadata
    /// immediately.
    pub fn from_stream(mut stream: T) -> Result<Self, MmdbError> {
        let file_size = stream.seek(SeekFrom::End(0))?;
        let (metadata, _) = load_metadata(&mut stream, file_size)?;

        if !matches!(metadata.ip_version, 4 | 6) {
            return Err(MmdbError::UnsupportedIpVersion(metadata.ip_version));
        }

        info!(
            node_count = metadata.node_count,
            record_size = metadata.record_size,
            ip_version = metadata.ip_version,
            "opened mmdb database"
        );

        seek_to(&mut stream, 0)?;
        Ok(Self { stream, metadata })
    }

    /// Returns the database's decoded metadata.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Looks up `ip`, returning the decoded record (if any is stored for
    /// the matching prefix) and the bit depth of the longest matching
    /// prefix. A `lookup` error leaves the reader itself fully usable;
    /// only the stream's cursor position is left unspecified, and the
    /// next operation re-seeks before reading.
    pub fn lookup(&mut self, ip: IpAddr) -> Result<(Option<Value>, u32), MmdbError> {
        let address = address_bytes(ip, self.metadata.ip_version)?;
        let result = tree_lookup(&mut self.stream, &self.metadata, &address)?;
        debug!(
            %ip,
            prefix_len = result.prefix_len,
            found = result.value.is_some(),
            "mmdb lookup"
        );
        Ok((result.value, result.prefix_len))
    }

    /// Convenience wrapper that parses `ip_text` before looking it up.
    pub fn lookup_str(&mut self, ip_text: &str) -> Result<(Option<Value>, u32), MmdbError> {
        let ip: IpAddr = ip_text.parse()?;
        self.lookup(ip)
    }
}
