//! Parses the control byte (and its up-to-three extension bytes) that
//! prefixes every encoded MMDB value.

use byteorder::{BigEndian, ReadBytesExt};
use std::io::Read;

use crate::error::MmdbError;

/// The 11 value kinds the format defines, resolved from a control byte's
/// type bits (extended via a second byte when the top 3 bits are all 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Pointer,
    String,
    Double,
    Bytes,
    Uint16,
    Uint32,
    Map,
    Int32,
    Uint64,
    Uint128,
    Array,
    Boolean,
    Float,
}

impl ValueType {
    fn from_code(code: u8) -> Result<Self, MmdbError> {
        Ok(match code {
            1 => ValueType::Pointer,
            2 => ValueType::String,
            3 => ValueType::Double,
            4 => ValueType::Bytes,
            5 => ValueType::Uint16,
            6 => ValueType::Uint32,
            7 => ValueType::Map,
            8 => ValueType::Int32,
            9 => ValueType::Uint64,
            10 => ValueType::Uint128,
            11 => ValueType::Array,
            12 => return Err(MmdbError::NotImplemented("data cache container")),
            13 => return Err(MmdbError::NotImplemented("end marker")),
            14 => ValueType::Boolean,
            15 => ValueType::Float,
            _ => return Err(MmdbError::InvalidData("invalid data type specifier")),
        })
    }
}

/// Reads the control byte at the stream's current position, plus any
/// extended-type or extended-size bytes it calls for.
///
/// Returns the resolved [`ValueType`] and a `size`. For every type except
/// `Pointer` this is the decoded length/count per the extended-size table;
/// for `Pointer` it is the raw 5 size bits of the control byte, since the
/// pointer payload is packed differently and is read by the caller.
pub fn read_control<T: Read>(reader: &mut T) -> Result<(ValueType, u32), MmdbError> {
    let control_byte = reader.read_u8()?;
    let type_bits = control_byte >> 5;
    let size_bits = control_byte & 0x1F;

    let type_code = if type_bits == 0 {
        7u8 + reader.read_u8()?
    } else {
        type_bits
    };
    let value_type = ValueType::from_code(type_code)?;

    if value_type == ValueType::Pointer {
        return Ok((value_type, size_bits as u32));
    }

    let size = match size_bits {
        0..=28 => size_bits as u32,
        29 => 29 + reader.read_u8()? as u32,
        30 => 285 + reader.read_u16::<BigEndian>()? as u32,
        31 => 65821 + reader.read_u24::<BigEndian>()?,
        _ => unreachable!("size_bits is masked to 5 bits"),
    };

    Ok((value_type, size))
}
