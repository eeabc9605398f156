//! # Demgate Types Library
//!
//! Pure data definitions shared across the demgate workspace:
//! - **Wire primitives**: `WireType`, `FieldTag` — the vocabulary of the
//!   protobuf wire format the codec walks
//! - **Coordinator identifiers**: the `emsg` module with GC message ids and
//!   the reserved-bit mask helpers
//! - **Match identity**: `MatchRequest` and share-code conversion
//!
//! ## What This Crate Does NOT Contain
//! - Decode/encode logic (belongs in libs/codec)
//! - Connection or framing state (belongs in network/)
//! - Anything that performs I/O

pub mod emsg;
pub mod sharecode;
pub mod wire;

pub use sharecode::{MatchRequest, ShareCodeError};
pub use wire::{FieldTag, WireType};
