use std::num::TryFromIntError;

/// Errors produced while opening or querying a MaxMind DB.
#[derive(Debug, thiserror::Error)]
pub enum MmdbError {
    #[error("database does not contain a metadata marker")]
    MetadataNotFound,
    #[error("metadata map is missing required field: {0}")]
    InvalidMetadata(&'static str),
    #[error("database contents are malformed: {0}")]
    InvalidData(&'static str),
    #[error("value or pointer exceeds the range this reader can represent: {0}")]
    PlatformLimit(&'static str),
    #[error("unsupported ip_version in database metadata: {0}")]
    UnsupportedIpVersion(u16),
    #[error("the provided text could not be parsed as an IP address")]
    InvalidAddress(#[from] std::net::AddrParseError),
    #[error("decoder recursed past the maximum supported depth")]
    RecursionLimitExceeded,
    #[error("I/O error while reading database")]
    BadIo(#[from] std::io::Error),
    #[error("integer conversion error while reading database")]
    BadConversion(#[from] TryFromIntError),
    #[error("feature of the MMDB format is not implemented by this reader: {0}")]
    NotImplemented(&'static str),
}
