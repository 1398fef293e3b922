//! Recursive decoder for the type-tagged value tree the data and metadata
//! sections are built from.

use byteorder::{BigEndian, ReadBytesExt};
use std::collections::HashMap;
use std::fmt::{self, Display};
use std::io::{Read, Seek};

use crate::bigint::{decode_uint, MmdbUint};
use crate::control::{read_control, ValueType};
use crate::error::MmdbError;
use crate::stream::{read_strict, seek_to};

/// Nesting depth (maps/arrays/pointer chases combined) past which the
/// decoder gives up rather than recursing further. Well-formed databases
/// never come close; this only defends against adversarial or corrupt
/// input driving unbounded recursion.
const MAX_DEPTH: u32 = 512;

/// A decoded MMDB value. Pointers are resolved transparently while
/// decoding and are never observed by callers.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Double(f64),
    Bytes(Vec<u8>),
    Uint16(u16),
    Uint32(u32),
    Int32(i32),
    Uint64(u64),
    Uint128(MmdbUint),
    Map(Vec<(String, Value)>),
    Array(Vec<Value>),
    Boolean(bool),
    Float(f32),
}

impl Value {
    /// Returns this value's entries if it is a [`Value::Map`].
    pub fn as_map(&self) -> Option<&[(String, Value)]> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Looks up `key` if this value is a [`Value::Map`].
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map()?.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn pretty_names() -> &'static HashMap<&'static str, &'static str> {
            use std::sync::OnceLock;
            static NAMES: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
            NAMES.get_or_init(|| {
                HashMap::from([
                    ("asn", "ASN"),
                    ("country_code", "Country Code"),
                    ("domain", "Domain"),
                    ("name", "Name"),
                    ("network", "Network"),
                    ("org", "Organization"),
                ])
            })
        }

        fn write_value(value: &Value, indent: usize, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match value {
                Value::String(s) => write!(f, "{s}"),
                Value::Double(d) => write!(f, "{d}"),
                Value::Float(x) => write!(f, "{x}"),
                Value::Bytes(bytes) => {
                    write!(f, "[")?;
                    for (i, byte) in bytes.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{byte:02X}")?;
                    }
                    write!(f, "]")
                }
                Value::Uint16(x) => write!(f, "{x}"),
                Value::Uint32(x) => write!(f, "{x}"),
                Value::Int32(x) => write!(f, "{x}"),
                Value::Uint64(x) => write!(f, "{x}"),
                Value::Uint128(x) => write!(f, "{x}"),
                Value::Boolean(x) => write!(f, "{x}"),
                Value::Map(entries) => {
                    let names = pretty_names();
                    for (i, (key, value)) in entries.iter().enumerate() {
                        if i > 0 {
                            writeln!(f)?;
                        }
                        let label = names.get(key.as_str()).copied().unwrap_or(key.as_str());
                        write!(f, "{}{label}: ", " ".repeat(indent))?;
                        if matches!(value, Value::Map(_)) {
                            writeln!(f)?;
                        }
                        write_value(value, indent + 2, f)?;
                    }
                    Ok(())
                }
                Value::Array(items) => {
                    for (i, item) in items.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write_value(item, indent, f)?;
                    }
                    Ok(())
                }
            }
        }

        write_value(self, 0, f)
    }
}

/// Decodes one value at `offset`, relative to the stream's absolute
/// position. `base_address` is the absolute file offset that any pointer
/// encountered while decoding is relative to -- the data section base for
/// data-section values, or the metadata section base while loading
/// metadata.
///
/// Returns the decoded value and the stream offset immediately following
/// this value's own on-disk encoding. If decoding followed a pointer, that
/// offset is the position right after the pointer's bytes, not after
/// whatever the pointer targeted.
pub fn decode<T: Read + Seek>(
    stream: &mut T,
    offset: u64,
    base_address: u64,
) -> Result<(Value, u64), MmdbError> {
    seek_to(stream, offset)?;
    let value = decode_here(stream, base_address, 0)?;
    Ok((value, stream.stream_position()?))
}

fn decode_here<T: Read + Seek>(
    stream: &mut T,
    base_address: u64,
    depth: u32,
) -> Result<Value, MmdbError> {
    if depth > MAX_DEPTH {
        return Err(MmdbError::RecursionLimitExceeded);
    }

    let (value_type, size) = read_control(stream)?;

    if value_type == ValueType::Pointer {
        return decode_pointer(stream, size, base_address, depth);
    }

    Ok(match value_type {
        ValueType::String => {
            let bytes = read_strict(stream, size as usize)?;
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        }
        ValueType::Bytes => Value::Bytes(read_strict(stream, size as usize)?),
        ValueType::Double => {
            if size != 8 {
                return Err(MmdbError::InvalidData("double value must be 8 bytes"));
            }
            Value::Double(stream.read_f64::<BigEndian>()?)
        }
        ValueType::Float => {
            if size != 4 {
                return Err(MmdbError::InvalidData("float value must be 4 bytes"));
            }
            Value::Float(stream.read_f32::<BigEndian>()?)
        }
        ValueType::Uint16 => {
            Value::Uint16(decode_uint_sized(stream, size)?.as_u128().try_into()?)
        }
        ValueType::Uint32 => {
            Value::Uint32(decode_uint_sized(stream, size)?.as_u128().try_into()?)
        }
        ValueType::Uint64 => {
            Value::Uint64(decode_uint_sized(stream, size)?.as_u128().try_into()?)
        }
        ValueType::Uint128 => Value::Uint128(decode_uint_sized(stream, size)?),
        ValueType::Int32 => Value::Int32(decode_int32(stream, size)?),
        ValueType::Map => {
            let mut entries = Vec::with_capacity(size as usize);
            for _ in 0..size {
                let key = match decode_here(stream, base_address, depth + 1)? {
                    Value::String(key) => key,
                    _ => return Err(MmdbError::InvalidData("map key is not a string")),
                };
                let value = decode_here(stream, base_address, depth + 1)?;
                entries.push((key, value));
            }
            Value::Map(entries)
        }
        ValueType::Array => {
            let mut items = Vec::with_capacity(size as usize);
            for _ in 0..size {
                items.push(decode_here(stream, base_address, depth + 1)?);
            }
            Value::Array(items)
        }
        ValueType::Boolean => match size {
            0 => Value::Boolean(false),
            1 => Value::Boolean(true),
            _ => return Err(MmdbError::InvalidData("boolean size must be 0 or 1")),
        },
        ValueType::Pointer => unreachable!("handled above"),
    })
}

fn decode_uint_sized<T: Read>(stream: &mut T, size: u32) -> Result<MmdbUint, MmdbError> {
    if size > 16 {
        return Err(MmdbError::InvalidData(
            "unsigned integer field wider than 128 bits",
        ));
    }
    let bytes = read_strict(stream, size as usize)?;
    decode_uint(&bytes)
}

fn decode_int32<T: Read>(stream: &mut T, size: u32) -> Result<i32, MmdbError> {
    if size > 4 {
        return Err(MmdbError::InvalidData("int32 value wider than 4 bytes"));
    }
    if size == 0 {
        return Ok(0);
    }
    let bytes = read_strict(stream, size as usize)?;
    let mut buf = [0u8; 4];
    buf[4 - bytes.len()..].copy_from_slice(&bytes);
    Ok(i32::from_be_bytes(buf))
}

/// Decodes a pointer's payload, jumps to its target, decodes the value
/// there, then restores the stream position to just past the pointer's own
/// bytes before returning.
fn decode_pointer<T: Read + Seek>(
    stream: &mut T,
    size_bits: u32,
    base_address: u64,
    depth: u32,
) -> Result<Value, MmdbError> {
    let subtype = (size_bits >> 3) & 0x3;
    let leading = (size_bits & 0x7) as u64;

    let pointer = match subtype {
        0 => {
            let payload = stream.read_u8()? as u64;
            base_address + ((leading << 8) | payload)
        }
        1 => {
            let payload = stream.read_u16::<BigEndian>()? as u64;
            base_address + 2048 + ((leading << 16) | payload)
        }
        2 => {
            let payload = stream.read_u24::<BigEndian>()? as u64;
            base_address + 526336 + ((leading << 24) | payload)
        }
        3 => {
            let payload = stream.read_u32::<BigEndian>()? as u64;
            base_address + payload
        }
        _ => unreachable!("subtype is masked to 2 bits"),
    };

    let resume_at = stream.stream_position()?;
    seek_to(stream, pointer)?;
    let value = decode_here(stream, base_address, depth + 1)?;
    seek_to(stream, resume_at)?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn control_byte(type_code: u8, size_bits: u8) -> u8 {
        (type_code << 5) | (size_bits & 0x1F)
    }

    #[test]
    fn decodes_a_string() {
        let mut bytes = vec![control_byte(2, 5)];
        bytes.extend_from_slice(b"hello");
        let mut cursor = Cursor::new(bytes);
        let (value, next) = decode(&mut cursor, 0, 0).unwrap();
        assert_eq!(value, Value::String("hello".to_string()));
        assert_eq!(next, 6);
    }

    #[test]
    fn decodes_a_boolean() {
        let mut cursor = Cursor::new(vec![control_byte(14, 1)]);
        let (value, _) = decode(&mut cursor, 0, 0).unwrap();
        assert_eq!(value, Value::Boolean(true));
    }

    #[test]
    fn decodes_a_double() {
        let mut bytes = vec![control_byte(3, 8)];
        bytes.extend_from_slice(&42.5f64.to_be_bytes());
        let mut cursor = Cursor::new(bytes);
        let (value, _) = decode(&mut cursor, 0, 0).unwrap();
        assert_eq!(value, Value::Double(42.5));
    }

    #[test]
    fn decodes_an_int32_with_sign_extension_guarantee() {
        // size < 4 is guaranteed nonnegative by the format, so zero-padding
        // suffices even though the target type is signed.
        let bytes = vec![control_byte(8, 2), 0x01, 0x00];
        let mut cursor = Cursor::new(bytes);
        let (value, _) = decode(&mut cursor, 0, 0).unwrap();
        assert_eq!(value, Value::Int32(256));
    }

    #[test]
    fn decodes_nested_map_and_array() {
        // { "a": [1u16, 2u16] }
        let mut bytes = vec![control_byte(7, 1)]; // map, 1 entry
        bytes.push(control_byte(2, 1));
        bytes.push(b'a');
        bytes.push(control_byte(11, 2)); // array, 2 elements
        bytes.push(control_byte(5, 1)); // uint16, size 1
        bytes.push(1);
        bytes.push(control_byte(5, 1));
        bytes.push(2);

        let mut cursor = Cursor::new(bytes);
        let (value, _) = decode(&mut cursor, 0, 0).unwrap();
        let expected = Value::Map(vec![(
            "a".to_string(),
            Value::Array(vec![Value::Uint16(1), Value::Uint16(2)]),
        )]);
        assert_eq!(value, expected);
    }

    #[test]
    fn pointer_resolves_and_resumes_after_its_own_bytes() {
        // offset 0: pointer (subtype 0) to offset 4
        // offset 2: trailing marker the outer decode must land on
        // offset 4: the string "hi"
        let mut bytes = vec![control_byte(1, 0), 4]; // pointer payload = 4
        bytes.push(control_byte(14, 1)); // trailing boolean marker at offset 2
        bytes.push(0); // padding byte at offset 3
        bytes.push(control_byte(2, 2));
        bytes.extend_from_slice(b"hi");

        let mut cursor = Cursor::new(bytes);
        let (value, next) = decode(&mut cursor, 0, 0).unwrap();
        assert_eq!(value, Value::String("hi".to_string()));
        assert_eq!(next, 2); // resumed right after the 2-byte pointer encoding
    }

    #[test]
    fn pointer_subtype_1_adds_2048_bias() {
        // subtype 1 uses a 2-byte payload and a 2048 bias; target is the
        // bottom of that subtype's range (2048 <= target <= 526335).
        let low = 0u8;
        let payload: u16 = 0;
        let target = 2048u64;
        let size_bits = (1u8 << 3) | low;

        let mut bytes = vec![control_byte(1, size_bits)];
        bytes.extend_from_slice(&payload.to_be_bytes());
        bytes.resize(target as usize, 0);
        bytes.push(control_byte(2, 2));
        bytes.extend_from_slice(b"hi");

        let mut cursor = Cursor::new(bytes);
        let (value, next) = decode(&mut cursor, 0, 0).unwrap();
        assert_eq!(value, Value::String("hi".to_string()));
        assert_eq!(next, 3); // 1 control byte + 2 payload bytes
    }

    #[test]
    fn pointer_subtype_2_adds_526336_bias() {
        // subtype 2 uses a 3-byte payload and a 526336 bias; target is the
        // bottom of that subtype's range (526336 <= target <= 134744063).
        let low = 0u8;
        let payload: u32 = 0;
        let target = 526336u64;
        let size_bits = (2u8 << 3) | low;

        let mut bytes = vec![control_byte(1, size_bits)];
        bytes.extend_from_slice(&payload.to_be_bytes()[1..]); // 3 big-endian bytes
        bytes.resize(target as usize, 0);
        bytes.push(control_byte(2, 2));
        bytes.extend_from_slice(b"hi");

        let mut cursor = Cursor::new(bytes);
        let (value, next) = decode(&mut cursor, 0, 0).unwrap();
        assert_eq!(value, Value::String("hi".to_string()));
        assert_eq!(next, 4); // 1 control byte + 3 payload bytes
    }

    #[test]
    fn pointer_subtype_3_is_an_absolute_4_byte_offset() {
        // subtype 3 is an unbiased absolute 4-byte offset; the control
        // byte's low 3 size bits are ignored entirely.
        let target: u32 = 10;
        let size_bits = 0b111_11u8; // subtype 3, low bits set to confirm they're ignored
        assert_eq!((size_bits >> 3) & 0x3, 3);

        let mut bytes = vec![control_byte(1, size_bits)];
        bytes.extend_from_slice(&target.to_be_bytes());
        bytes.resize(target as usize, 0);
        bytes.push(control_byte(2, 2));
        bytes.extend_from_slice(b"hi");

        let mut cursor = Cursor::new(bytes);
        let (value, next) = decode(&mut cursor, 0, 0).unwrap();
        assert_eq!(value, Value::String("hi".to_string()));
        assert_eq!(next, 5); // 1 control byte + 4 payload bytes
    }

    #[test]
    fn uint128_decodes_to_big_tier_for_wide_values() {
        let mut bytes = vec![control_byte(10, 16)];
        let mut payload = vec![0u8; 16];
        payload[0] = 0x80;
        bytes.extend_from_slice(&payload);
        let mut cursor = Cursor::new(bytes);
        let (value, _) = decode(&mut cursor, 0, 0).unwrap();
        assert_eq!(value, Value::Uint128(MmdbUint::Big(1u128 << 127)));
    }

    #[test]
    fn non_utf8_bytes_do_not_fail_decoding() {
        let mut bytes = vec![control_byte(2, 2)];
        bytes.extend_from_slice(&[0xFF, 0xFE]);
        let mut cursor = Cursor::new(bytes);
        assert!(decode(&mut cursor, 0, 0).is_ok());
    }
}
