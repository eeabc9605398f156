//! Declarative per-message field layouts.
//!
//! Each message type is declared once, ahead of time, as a static field
//! table; the table maps directly onto a statically defined record type in
//! [`crate::messages`]. Nothing here is built at runtime via reflection.

use demgate_types::WireType;

/// How a declared field is decoded and framed.
#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    Varint,
    Fixed32,
    Fixed64,
    Bytes,
    /// Length-delimited nested message with its own layout.
    Message(&'static MessageSchema),
}

impl FieldKind {
    /// Wire type this kind is encoded with.
    pub fn wire_type(&self) -> WireType {
        match self {
            FieldKind::Varint => WireType::Varint,
            FieldKind::Fixed32 => WireType::Fixed32,
            FieldKind::Fixed64 => WireType::Fixed64,
            FieldKind::Bytes | FieldKind::Message(_) => WireType::LengthDelimited,
        }
    }
}

/// One declared field. `repeated` fields decode into an ordered sequence;
/// singular fields keep the last occurrence.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub number: u32,
    pub kind: FieldKind,
    pub repeated: bool,
}

/// Immutable field layout for one message type.
#[derive(Debug)]
pub struct MessageSchema {
    pub name: &'static str,
    pub fields: &'static [FieldSpec],
}

impl MessageSchema {
    pub fn field(&self, number: u32) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.number == number)
    }
}
