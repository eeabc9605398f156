//! Decode-path errors.

use thiserror::Error;

/// Errors raised by the bit cursor, the scanner, and catalog decoding.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// A read ran past the end of the buffer. Carries bit counts because the
    /// cursor is bit-granular; byte-level callers see multiples of eight.
    #[error("out of data: needed {need} bits, {have} remaining")]
    OutOfData { need: usize, have: usize },

    /// Structurally invalid wire data: truncated or overlong varint, a
    /// length-delimited field overrunning the buffer, an unsupported wire
    /// type, or a field key that cannot exist.
    #[error("malformed wire data: {0}")]
    Malformed(String),
}

/// Result type for codec operations.
pub type CodecResult<T> = std::result::Result<T, CodecError>;
