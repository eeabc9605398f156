//! Schema-free protobuf wire walker.
//!
//! Two usage modes beyond plain field-by-field scanning:
//!
//! - **Delimited scan** (`scan_delimited`): walk fields sequentially until
//!   field number 1 repeats, which marks the start of the next top-level
//!   message. Used to isolate one header section that declares no total
//!   length of its own.
//! - **Brute-force scan** (`scan_varints` / `scan_plausible`): treat every
//!   byte offset as a candidate varint start and filter the results against
//!   a plausible numeric window. Heuristic recovery only — it produces
//!   false positives by construction and is never authoritative.

use demgate_types::{FieldTag, WireType};

use crate::bits::BitReader;
use crate::error::{CodecError, CodecResult};

/// Upper bound on varint groups. Ten 7-bit groups cover a full u64;
/// anything longer is corrupt input, not a longer value.
const MAX_VARINT_GROUPS: usize = 10;

/// Brute-force candidates are capped at five groups (35 bits), wide enough
/// for unix-epoch timestamps while cutting the false-positive rate.
const MAX_BRUTE_GROUPS: usize = 5;

/// One field's decoded payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Varint(u64),
    Fixed64(u64),
    Bytes(Vec<u8>),
    Fixed32(u32),
}

/// Tag/wire-type walker over a byte buffer.
pub struct ProtoScanner<'a> {
    reader: BitReader<'a>,
}

impl<'a> ProtoScanner<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            reader: BitReader::new(data),
        }
    }

    pub fn at_end(&self) -> bool {
        self.reader.bits_remaining() == 0
    }

    pub fn bytes_remaining(&self) -> usize {
        self.reader.bits_remaining() / 8
    }

    /// Decode one base-128 little-endian varint: each byte contributes its
    /// low 7 bits shifted by `7 * group`; a clear high bit terminates.
    pub fn read_varint(&mut self) -> CodecResult<u64> {
        let mut value = 0u64;
        for group in 0..MAX_VARINT_GROUPS {
            let byte = self.reader.read_bytes(1)?[0];
            value |= u64::from(byte & 0x7F) << (7 * group);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(CodecError::Malformed(format!(
            "varint continues past {MAX_VARINT_GROUPS} groups"
        )))
    }

    /// Decode one field key into its number and wire type.
    pub fn read_key(&mut self) -> CodecResult<FieldTag> {
        let key = self.read_varint()?;
        let wire = (key & 0x7) as u8;
        let wire_type = WireType::try_from(wire)
            .map_err(|_| CodecError::Malformed(format!("unsupported wire type {wire}")))?;
        let number = u32::try_from(key >> 3)
            .map_err(|_| CodecError::Malformed(format!("field number {} out of range", key >> 3)))?;
        if number == 0 {
            return Err(CodecError::Malformed("field number 0".to_string()));
        }
        Ok(FieldTag { number, wire_type })
    }

    /// Read a varint length, then exactly that many bytes.
    pub fn read_length_delimited(&mut self) -> CodecResult<&'a [u8]> {
        let length = self.read_varint()?;
        if length > self.bytes_remaining() as u64 {
            return Err(CodecError::Malformed(format!(
                "length-delimited field of {length} bytes overruns {} remaining",
                self.bytes_remaining()
            )));
        }
        self.reader.read_bytes(length as usize)
    }

    pub fn read_fixed32(&mut self) -> CodecResult<u32> {
        let b = self.reader.read_bytes(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_fixed64(&mut self) -> CodecResult<u64> {
        let b = self.reader.read_bytes(8)?;
        Ok(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    /// Decode one field payload per its wire type.
    pub fn read_field(&mut self, wire_type: WireType) -> CodecResult<FieldValue> {
        match wire_type {
            WireType::Varint => Ok(FieldValue::Varint(self.read_varint()?)),
            WireType::Fixed64 => Ok(FieldValue::Fixed64(self.read_fixed64()?)),
            WireType::LengthDelimited => {
                Ok(FieldValue::Bytes(self.read_length_delimited()?.to_vec()))
            }
            WireType::Fixed32 => Ok(FieldValue::Fixed32(self.read_fixed32()?)),
        }
    }

    /// Skip one field payload per its wire type.
    pub fn skip_field(&mut self, wire_type: WireType) -> CodecResult<()> {
        match wire_type {
            WireType::Varint => {
                self.read_varint()?;
            }
            WireType::Fixed64 => {
                self.reader.read_bytes(8)?;
            }
            WireType::LengthDelimited => {
                self.read_length_delimited()?;
            }
            WireType::Fixed32 => {
                self.reader.read_bytes(4)?;
            }
        }
        Ok(())
    }
}

/// Walk fields from `offset` until field number 1 repeats, returning the
/// fields collected before the repeat.
///
/// A clean out-of-data at a key boundary ends the scan (the section ran to
/// the end of the buffer); a failure inside a field payload propagates.
pub fn scan_delimited(data: &[u8], offset: usize) -> CodecResult<Vec<(FieldTag, FieldValue)>> {
    let section = data
        .get(offset..)
        .ok_or_else(|| CodecError::Malformed(format!("scan offset {offset} beyond buffer")))?;

    let mut scanner = ProtoScanner::new(section);
    let mut fields = Vec::new();
    let mut seen_field_one = false;

    while !scanner.at_end() {
        let tag = match scanner.read_key() {
            Ok(tag) => tag,
            Err(CodecError::OutOfData { .. }) => break,
            Err(e) => return Err(e),
        };
        if tag.number == 1 {
            if seen_field_one {
                break;
            }
            seen_field_one = true;
        }
        fields.push((tag, scanner.read_field(tag.wire_type)?));
    }
    Ok(fields)
}

/// Yield `(offset, value)` for every byte offset that decodes as a varint
/// of at most [`MAX_BRUTE_GROUPS`] groups. Best-effort by design.
pub fn scan_varints(data: &[u8]) -> impl Iterator<Item = (usize, u64)> + '_ {
    (0..data.len()).filter_map(move |offset| {
        let mut value = 0u64;
        for (group, &byte) in data[offset..].iter().take(MAX_BRUTE_GROUPS).enumerate() {
            value |= u64::from(byte & 0x7F) << (7 * group);
            if byte & 0x80 == 0 {
                return Some((offset, value));
            }
        }
        None
    })
}

/// Brute-force candidates filtered against a plausible window, e.g. a
/// timestamp range. Results are candidates, not facts.
pub fn scan_plausible(
    data: &[u8],
    range: std::ops::RangeInclusive<u64>,
) -> Vec<(usize, u64)> {
    scan_varints(data)
        .filter(|(_, value)| range.contains(value))
        .collect()
}
