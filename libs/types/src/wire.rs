//! Protobuf wire-format vocabulary.

use num_enum::TryFromPrimitive;

/// Wire types supported by the scanner and catalog.
///
/// Groups (3/4) and any future values are unsupported; the codec rejects
/// them as malformed input rather than guessing a framing.
#[repr(u8)]
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    TryFromPrimitive,
    serde::Serialize,
    serde::Deserialize,
)]
pub enum WireType {
    Varint = 0,
    Fixed64 = 1,
    LengthDelimited = 2,
    Fixed32 = 5,
}

/// A decoded field key: field number plus wire type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldTag {
    pub number: u32,
    pub wire_type: WireType,
}
