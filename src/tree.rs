//! Walks the binary search tree bit-by-bit for a queried address and
//! dispatches to the value decoder once a terminal record is reached.

use std::io::{Read, Seek};
use std::net::IpAddr;

use crate::decoder::{decode, Value};
use crate::error::MmdbError;
use crate::metadata::Metadata;
use crate::record::{node_size_bytes, read_record, RecordSlot};

/// Bytes separating the search tree from the data section.
const DATA_SECTION_SEPARATOR: u64 = 16;

/// Outcome of walking the tree for one address.
pub struct LookupResult {
    pub value: Option<Value>,
    pub prefix_len: u32,
}

/// Converts a parsed address into the database's expected byte width,
/// truncating an IPv6 address into an IPv4-only database or zero-padding
/// an IPv4 address into an IPv6 database. Databases that embed IPv4
/// addresses under an explicit `::ffff:`-style prefix are the database
/// author's responsibility; this reader does not synthesize one.
pub fn address_bytes(ip: IpAddr, ip_version: u16) -> Result<Vec<u8>, MmdbError> {
    match (ip, ip_version) {
        (IpAddr::V4(ip), 4) => Ok(ip.octets().to_vec()),
        (IpAddr::V6(ip), 6) => Ok(ip.octets().to_vec()),
        (IpAddr::V4(ip), 6) => {
            let mut bytes = vec![0u8; 12];
            bytes.extend_from_slice(&ip.octets());
            Ok(bytes)
        }
        (IpAddr::V6(ip), 4) => Ok(ip.octets()[12..].to_vec()),
        (_, other) => Err(MmdbError::UnsupportedIpVersion(other)),
    }
}

/// Walks the search tree bit-by-bit for `address`, then decodes the
/// terminal record, if any, from the data section.
pub fn lookup<T: Read + Seek>(
    stream: &mut T,
    metadata: &Metadata,
    address: &[u8],
) -> Result<LookupResult, MmdbError> {
    let tree_bits = (address.len() * 8) as u32;
    let node_count = metadata.node_count;
    let mut node = 0u32;
    let mut depth = 0u32;

    while depth < tree_bits && node < node_count {
        let bit = (address[(depth / 8) as usize] >> (7 - depth % 8)) & 1;
        let slot = if bit == 0 {
            RecordSlot::Left
        } else {
            RecordSlot::Right
        };
        node = read_record(stream, metadata, node, slot)?;
        depth += 1;
    }

    if node <= node_count {
        // `node == node_count` is the "no data" sentinel; `node < node_count`
        // only happens when the loop exhausted every address bit without
        // reaching a terminal record, which a well-formed database mapping
        // this address should not produce. Both are an empty result.
        return Ok(LookupResult {
            value: None,
            prefix_len: depth,
        });
    }

    let node_bytes = node_size_bytes(metadata.record_size)?;
    let search_tree_size = node_bytes * node_count as u64;
    let data_section_base = search_tree_size + DATA_SECTION_SEPARATOR;
    let data_offset = data_section_base + (node as u64 - node_count as u64 - DATA_SECTION_SEPARATOR);

    let (value, _) = decode(stream, data_offset, data_section_base)?;
    Ok(LookupResult {
        value: Some(value),
        prefix_len: depth,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::net::{Ipv4Addr, Ipv6Addr};

    fn control_byte(type_code: u8, size_bits: u8) -> u8 {
        (type_code << 5) | (size_bits & 0x1F)
    }

    fn metadata(record_size: u16, node_count: u32, ip_version: u16) -> Metadata {
        Metadata {
            node_count,
            record_size,
            ip_version,
            extra: vec![],
        }
    }

    #[test]
    fn address_bytes_truncates_v6_into_v4_database() {
        let ip: IpAddr = "::1.1.1.1".parse().unwrap();
        let bytes = address_bytes(ip, 4).unwrap();
        assert_eq!(bytes, Ipv4Addr::new(1, 1, 1, 1).octets().to_vec());
    }

    #[test]
    fn address_bytes_zero_pads_v4_into_v6_database() {
        let ip = IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1));
        let bytes = address_bytes(ip, 6).unwrap();
        let mut expected = vec![0u8; 12];
        expected.extend_from_slice(&[1, 1, 1, 1]);
        assert_eq!(bytes, expected);
        assert_eq!(bytes.len(), 16);
    }

    #[test]
    fn address_bytes_passes_through_matching_version() {
        let addr = Ipv6Addr::new(0x2001, 0x0db8, 0, 0, 0, 0, 0, 1);
        let bytes = address_bytes(IpAddr::V6(addr), 6).unwrap();
        assert_eq!(bytes, addr.octets().to_vec());
    }

    #[test]
    fn empty_tree_returns_no_data_at_root() {
        // single node, record_size 24, both records point at the "no data"
        // sentinel (node_count itself).
        let node_count = 1u32;
        let bytes = vec![0x00, 0x00, 0x01, 0x00, 0x00, 0x01]; // both records = 1
        let mut cursor = Cursor::new(bytes);
        let meta = metadata(24, node_count, 4);
        let address = vec![0u8; 4];
        let result = lookup(&mut cursor, &meta, &address).unwrap();
        assert!(result.value.is_none());
        assert_eq!(result.prefix_len, 1);
    }

    #[test]
    fn terminal_record_decodes_data_section_value() {
        // node_count = 1, record_size 24, search tree is 6 bytes, followed
        // by a 16-byte separator, then the data section.
        let node_count = 1u32;
        let data_pointer = node_count + 16; // resolves to data_offset 0
        let mut file = vec![0u8; 6];
        // left record (bit 0) -> data pointer; right -> no data
        file[0] = ((data_pointer >> 16) & 0xFF) as u8;
        file[1] = ((data_pointer >> 8) & 0xFF) as u8;
        file[2] = (data_pointer & 0xFF) as u8;
        file[3] = 0;
        file[4] = 0;
        file[5] = node_count as u8; // right = sentinel

        file.extend(vec![0u8; 16]); // separator
        file.push(control_byte(14, 1)); // boolean true in the data section

        let mut cursor = Cursor::new(file);
        let meta = metadata(24, node_count, 4);
        let address = vec![0u8; 4]; // first bit is 0 -> left record

        let result = lookup(&mut cursor, &meta, &address).unwrap();
        assert_eq!(result.value, Some(Value::Boolean(true)));
        assert_eq!(result.prefix_len, 1);
    }
}
