//! Catalog decode/encode over declared schemas.
//!
//! `decode` tolerates and drops unknown field numbers (forward-compatible
//! decoding, never a hard failure) and fails `Malformed` only on
//! structurally invalid reads. `encode` is the inverse; it writes fields in
//! stored order, so output is deterministic for a given message.

use demgate_types::WireType;
use tracing::trace;

use crate::error::CodecResult;
use crate::scan::ProtoScanner;
use crate::schema::{FieldKind, MessageSchema};

/// One decoded field, in wire order.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedField {
    pub number: u32,
    pub name: &'static str,
    pub value: Value,
}

/// A decoded field payload, including nested messages.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Varint(u64),
    Fixed32(u32),
    Fixed64(u64),
    Bytes(Vec<u8>),
    Message(DecodedMessage),
}

impl Value {
    fn wire_type(&self) -> WireType {
        match self {
            Value::Varint(_) => WireType::Varint,
            Value::Fixed32(_) => WireType::Fixed32,
            Value::Fixed64(_) => WireType::Fixed64,
            Value::Bytes(_) | Value::Message(_) => WireType::LengthDelimited,
        }
    }
}

/// Decoded form of one cataloged message: declared fields in wire order,
/// unknown fields dropped.
#[derive(Debug, Clone)]
pub struct DecodedMessage {
    pub schema: &'static MessageSchema,
    pub fields: Vec<DecodedField>,
}

impl PartialEq for DecodedMessage {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.schema, other.schema) && self.fields == other.fields
    }
}

impl DecodedMessage {
    pub fn new(schema: &'static MessageSchema) -> Self {
        Self {
            schema,
            fields: Vec::new(),
        }
    }

    /// Append a field by number, taking its name from the schema.
    pub fn push(&mut self, number: u32, value: Value) {
        let name = self.schema.field(number).map(|f| f.name).unwrap_or("");
        self.fields.push(DecodedField { number, name, value });
    }

    /// Builder-style [`push`](Self::push).
    pub fn with(mut self, number: u32, value: Value) -> Self {
        self.push(number, value);
        self
    }

    /// First value for a field number.
    pub fn get(&self, number: u32) -> Option<&Value> {
        self.fields
            .iter()
            .find(|f| f.number == number)
            .map(|f| &f.value)
    }

    pub fn get_u64(&self, number: u32) -> Option<u64> {
        match self.get(number)? {
            Value::Varint(v) | Value::Fixed64(v) => Some(*v),
            Value::Fixed32(v) => Some(u64::from(*v)),
            _ => None,
        }
    }

    pub fn get_u32(&self, number: u32) -> Option<u32> {
        self.get_u64(number).map(|v| v as u32)
    }

    pub fn get_bytes(&self, number: u32) -> Option<&[u8]> {
        match self.get(number)? {
            Value::Bytes(b) => Some(b.as_slice()),
            _ => None,
        }
    }

    pub fn get_str(&self, number: u32) -> Option<&str> {
        std::str::from_utf8(self.get_bytes(number)?).ok()
    }

    /// All nested messages for a repeated message field, in wire order.
    pub fn messages(&self, number: u32) -> impl Iterator<Item = &DecodedMessage> {
        self.fields
            .iter()
            .filter(move |f| f.number == number)
            .filter_map(|f| match &f.value {
                Value::Message(m) => Some(m),
                _ => None,
            })
    }
}

/// Decode `bytes` against `schema`.
///
/// Unknown field numbers are skipped via the tag's wire type and dropped. A
/// declared field whose tag disagrees with its declared wire type is skipped
/// the same way rather than failing the whole message.
pub fn decode(schema: &'static MessageSchema, bytes: &[u8]) -> CodecResult<DecodedMessage> {
    let mut scanner = ProtoScanner::new(bytes);
    let mut message = DecodedMessage::new(schema);

    while !scanner.at_end() {
        let tag = scanner.read_key()?;

        let Some(spec) = schema.field(tag.number) else {
            scanner.skip_field(tag.wire_type)?;
            continue;
        };
        if spec.kind.wire_type() != tag.wire_type {
            trace!(
                message = schema.name,
                field = spec.name,
                declared = ?spec.kind.wire_type(),
                got = ?tag.wire_type,
                "wire type disagrees with declaration; skipping field"
            );
            scanner.skip_field(tag.wire_type)?;
            continue;
        }

        let value = match spec.kind {
            FieldKind::Varint => Value::Varint(scanner.read_varint()?),
            FieldKind::Fixed32 => Value::Fixed32(scanner.read_fixed32()?),
            FieldKind::Fixed64 => Value::Fixed64(scanner.read_fixed64()?),
            FieldKind::Bytes => Value::Bytes(scanner.read_length_delimited()?.to_vec()),
            FieldKind::Message(inner) => {
                Value::Message(decode(inner, scanner.read_length_delimited()?)?)
            }
        };

        if !spec.repeated {
            // singular fields keep the last occurrence
            if let Some(existing) = message.fields.iter_mut().find(|f| f.number == tag.number) {
                existing.value = value;
                continue;
            }
        }
        message.push(tag.number, value);
    }

    Ok(message)
}

/// Encode a decoded message back to wire bytes.
pub fn encode(message: &DecodedMessage) -> Vec<u8> {
    let mut out = Vec::new();
    for field in &message.fields {
        let key = (u64::from(field.number) << 3) | u64::from(field.value.wire_type() as u8);
        write_varint(&mut out, key);
        match &field.value {
            Value::Varint(v) => write_varint(&mut out, *v),
            Value::Fixed32(v) => out.extend_from_slice(&v.to_le_bytes()),
            Value::Fixed64(v) => out.extend_from_slice(&v.to_le_bytes()),
            Value::Bytes(b) => {
                write_varint(&mut out, b.len() as u64);
                out.extend_from_slice(b);
            }
            Value::Message(m) => {
                let inner = encode(m);
                write_varint(&mut out, inner.len() as u64);
                out.extend_from_slice(&inner);
            }
        }
    }
    out
}

/// Append one base-128 little-endian varint.
pub fn write_varint(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CodecError;
    use crate::schema::FieldSpec;

    static INNER: MessageSchema = MessageSchema {
        name: "Inner",
        fields: &[FieldSpec {
            name: "id",
            number: 1,
            kind: FieldKind::Varint,
            repeated: false,
        }],
    };

    static OUTER: MessageSchema = MessageSchema {
        name: "Outer",
        fields: &[
            FieldSpec {
                name: "count",
                number: 1,
                kind: FieldKind::Varint,
                repeated: false,
            },
            FieldSpec {
                name: "label",
                number: 2,
                kind: FieldKind::Bytes,
                repeated: false,
            },
            FieldSpec {
                name: "crc",
                number: 3,
                kind: FieldKind::Fixed32,
                repeated: false,
            },
            FieldSpec {
                name: "stamp",
                number: 4,
                kind: FieldKind::Fixed64,
                repeated: false,
            },
            FieldSpec {
                name: "inner",
                number: 5,
                kind: FieldKind::Message(&INNER),
                repeated: true,
            },
        ],
    };

    #[test]
    fn single_field_round_trips_exactly() {
        let cases = vec![
            (1, Value::Varint(150)),
            (2, Value::Bytes(b"testing".to_vec())),
            (3, Value::Fixed32(0xDEAD_BEEF)),
            (4, Value::Fixed64(u64::MAX)),
        ];
        for (number, value) in cases {
            let message = DecodedMessage::new(&OUTER).with(number, value.clone());
            let bytes = encode(&message);
            let decoded = decode(&OUTER, &bytes).unwrap();
            assert_eq!(decoded.get(number), Some(&value), "field {number}");
        }
    }

    #[test]
    fn classic_varint_bytes_decode() {
        let decoded = decode(&OUTER, &[0x08, 0x96, 0x01]).unwrap();
        assert_eq!(decoded.get_u64(1), Some(150));
    }

    #[test]
    fn unknown_fields_are_dropped_not_fatal() {
        // fields 9 (varint), 10 (bytes), 11 (fixed32): none declared
        let mut bytes = Vec::new();
        write_varint(&mut bytes, (9 << 3) | 0);
        write_varint(&mut bytes, 7);
        write_varint(&mut bytes, (10 << 3) | 2);
        write_varint(&mut bytes, 3);
        bytes.extend_from_slice(b"xyz");
        write_varint(&mut bytes, (11 << 3) | 5);
        bytes.extend_from_slice(&42u32.to_le_bytes());

        let decoded = decode(&OUTER, &bytes).unwrap();
        assert!(decoded.fields.is_empty());
    }

    #[test]
    fn overrunning_length_is_malformed() {
        // field 2 declares 200 bytes, buffer ends immediately
        let bytes = [0x12, 0xC8, 0x01];
        assert!(matches!(
            decode(&OUTER, &bytes),
            Err(CodecError::Malformed(_))
        ));
    }

    #[test]
    fn nested_repeated_messages_keep_order() {
        let message = DecodedMessage::new(&OUTER)
            .with(5, Value::Message(DecodedMessage::new(&INNER).with(1, Value::Varint(10))))
            .with(5, Value::Message(DecodedMessage::new(&INNER).with(1, Value::Varint(20))));
        let decoded = decode(&OUTER, &encode(&message)).unwrap();
        let ids: Vec<_> = decoded.messages(5).map(|m| m.get_u64(1).unwrap()).collect();
        assert_eq!(ids, vec![10, 20]);
    }

    #[test]
    fn singular_field_keeps_last_occurrence() {
        let mut bytes = Vec::new();
        write_varint(&mut bytes, (1 << 3) | 0);
        write_varint(&mut bytes, 5);
        write_varint(&mut bytes, (1 << 3) | 0);
        write_varint(&mut bytes, 6);
        let decoded = decode(&OUTER, &bytes).unwrap();
        assert_eq!(decoded.get_u64(1), Some(6));
        assert_eq!(decoded.fields.len(), 1);
    }

    #[test]
    fn mismatched_wire_type_is_skipped() {
        // field 1 declared varint but arrives length-delimited; field 3
        // after it still decodes
        let mut bytes = Vec::new();
        write_varint(&mut bytes, (1 << 3) | 2);
        write_varint(&mut bytes, 2);
        bytes.extend_from_slice(b"no");
        write_varint(&mut bytes, (3 << 3) | 5);
        bytes.extend_from_slice(&7u32.to_le_bytes());

        let decoded = decode(&OUTER, &bytes).unwrap();
        assert_eq!(decoded.get(1), None);
        assert_eq!(decoded.get(3), Some(&Value::Fixed32(7)));
    }

    #[test]
    fn encode_preserves_stored_field_order() {
        let message = DecodedMessage::new(&OUTER)
            .with(2, Value::Bytes(b"abc".to_vec()))
            .with(1, Value::Varint(3));
        assert_eq!(
            encode(&message),
            vec![0x12, 0x03, b'a', b'b', b'c', 0x08, 0x03]
        );
    }
}
