//! GC wire frames.

use bytes::Bytes;
use demgate_types::emsg;

/// Frame header length on the wire: message id and payload length, both
/// u32 little-endian.
pub const FRAME_HEADER_LEN: usize = 8;

/// One transport-level frame. `emsg` is whatever the wire carried: masked
/// inbound, clean until the transport masks it outbound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcFrame {
    pub emsg: u32,
    pub payload: Bytes,
}

impl GcFrame {
    pub fn new(emsg: u32, payload: Bytes) -> Self {
        Self { emsg, payload }
    }

    /// Message id with the reserved transport bit stripped. Every catalog
    /// and handler lookup happens on this form.
    pub fn clean_id(&self) -> u32 {
        emsg::unmask(self.emsg)
    }

    /// Serialize header plus payload for a stream transport.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(FRAME_HEADER_LEN + self.payload.len());
        out.extend_from_slice(&self.emsg.to_le_bytes());
        out.extend_from_slice(&(self.payload.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.payload);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_id_strips_the_reserved_bit() {
        let frame = GcFrame::new(emsg::mask(emsg::MATCH_LIST), Bytes::new());
        assert_eq!(frame.clean_id(), emsg::MATCH_LIST);

        let already_clean = GcFrame::new(emsg::MATCH_LIST, Bytes::new());
        assert_eq!(already_clean.clean_id(), emsg::MATCH_LIST);
    }

    #[test]
    fn wire_layout_is_id_then_length_then_payload() {
        let frame = GcFrame::new(0x8000_0FA6, Bytes::from_static(b"\x08\x01"));
        let bytes = frame.to_bytes();
        assert_eq!(&bytes[0..4], &0x8000_0FA6u32.to_le_bytes());
        assert_eq!(&bytes[4..8], &2u32.to_le_bytes());
        assert_eq!(&bytes[8..], b"\x08\x01");
    }
}
