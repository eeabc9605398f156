//! # Demgate Wire Codec
//!
//! ## Purpose
//!
//! The "rules" layer of the demgate system: everything needed to turn raw
//! coordinator bytes into typed match metadata and back, with no knowledge
//! of connections, sessions, or queues.
//!
//! - **BitReader**: bounds-checked bit/byte cursor over a byte buffer
//! - **ProtoScanner**: schema-free tag/wire-type walker built on the cursor
//! - **Catalog**: declarative per-message field layouts with decode/encode
//! - **Messages**: the statically declared GC record types and the immutable
//!   id → schema registry
//!
//! ## Architecture Role
//!
//! ```text
//! libs/types → [demgate-codec] → network/
//!     ↑             ↓                ↓
//! Pure Data    Wire Rules       Connections
//! WireType     Decode/Encode    Frames
//! ```
//!
//! ## What This Crate Does NOT Contain
//! - Connection or handshake state (belongs in network/)
//! - Download or queue logic (belongs in services/)
//! - A schema compiler: maps, oneofs, groups, and extensions are out of
//!   scope; unknown fields are skipped, unsupported wire types are rejected
//!
//! ## Error Handling
//!
//! Decode failures propagate synchronously to the caller that initiated the
//! decode. The codec never truncates or substitutes data on error: a read
//! past the end of the buffer is `OutOfData`, structurally invalid input is
//! `Malformed`, and there is no implicit retry.

pub mod bits;
pub mod catalog;
pub mod error;
pub mod messages;
pub mod scan;
pub mod schema;

pub use bits::BitReader;
pub use catalog::{decode, encode, DecodedField, DecodedMessage, Value};
pub use error::{CodecError, CodecResult};
pub use messages::{
    schema_for, ClientHello, ClientWelcome, ConnectionStatus, GcProto, MatchInfo, MatchList,
    MatchListRequestFullGameInfo, RoundStats,
};
pub use scan::{scan_delimited, scan_plausible, scan_varints, FieldValue, ProtoScanner};
pub use schema::{FieldKind, FieldSpec, MessageSchema};
