//! # Demgate Network Layer
//!
//! The connection side of the acquisition core: one GC conversation, owned
//! end to end.
//!
//! - [`frame`] - transport-level frames with the masked message id
//! - [`transport`] - the `GcTransport` seam and its TCP implementation
//! - [`channel`] - handshake state machine and inbound dispatch
//! - [`correlation`] - single-flight request/response pairing with timeout
//!
//! ## Concurrency Model
//!
//! One task owns transport I/O and dispatch ([`channel::ChannelDriver`]);
//! the consumer task calls [`correlation::CorrelationEngine::submit`] and
//! blocks there. The only state shared between the two paths is the pending
//! slot inside the engine, guarded by a mutex so that exactly one of
//! {succeed, fail} is observed per submission. Dispatch handlers run on the
//! I/O task and must return quickly - blocking work belongs to the consumer.

pub mod channel;
pub mod correlation;
pub mod frame;
pub mod transport;

use demgate_codec::CodecError;
use thiserror::Error;

pub use channel::{ChannelDriver, ChannelState, GcChannel, GcHandler};
pub use correlation::CorrelationEngine;
pub use frame::{GcFrame, FRAME_HEADER_LEN};
pub use transport::{FrameSink, FrameStream, GcTransport, TcpGcTransport};

/// Connection-layer errors.
#[derive(Debug, Error)]
pub enum GcError {
    /// Request issued before the welcome handshake completed. Requests are
    /// rejected, never queued.
    #[error("channel is not ready: handshake incomplete")]
    NotReady,

    /// No correlated response arrived within the configured bound.
    #[error("timed out waiting for the correlated response")]
    Timeout,

    /// A request is already in flight. The wire protocol carries no
    /// correlation id, so one outstanding request is the ceiling.
    #[error("a request is already pending")]
    Busy,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for connection-layer operations.
pub type GcResult<T> = std::result::Result<T, GcError>;
