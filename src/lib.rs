//! A reader for the MaxMind DB (MMDB) binary database format.
//!
//! An MMDB file packs a binary search tree over IP address prefixes ahead
//! of a self-describing, type-tagged data section. Given a queried
//! address, this crate walks the tree for the longest matching prefix and
//! decodes whatever record is stored there.
//!
//! ```no_run
//! use mmdb::Reader;
//!
//! let mut reader = Reader::open("GeoLite2-Country.mmdb")?;
//! let (record, prefix_len) = reader.lookup_str("1.1.1.1")?;
//! match record {
//!     Some(value) => println!("{value} (/{prefix_len})"),
//!     None => println!("no data for this address"),
//! }
//! # Ok::<(), mmdb::MmdbError>(())
//! ```
//!
//! Writing or mutating databases, network I/O, and hot-reload of an open
//! database are all out of scope; this crate only reads.

mod bigint;
mod control;
mod decoder;
mod error;
mod metadata;
mod record;
mod reader;
mod stream;
mod tree;

pub use bigint::MmdbUint;
pub use decoder::Value;
pub use error::MmdbError;
pub use metadata::Metadata;
pub use reader::Reader;
