//! # Demgate Ingest Service
//!
//! The consumer side of the acquisition core. Share-code tokens arrive over
//! a line-delimited TCP listener (or in-process submission), drain through a
//! single worker, and each resolved match drives the download pipeline:
//!
//! ```text
//! listener ─┐
//!           ├─> IngestQueue ─> IngestWorker ─> CorrelationEngine (GC)
//! submit() ─┘                       │
//!                                   └─> AcquisitionPipeline ─> ArtifactSink
//! ```
//!
//! Per token the pipeline is at-most-once and best-effort: every stage
//! failure is caught, logged with its token, and the worker moves on. There
//! is no automatic retry.

pub mod config;
pub mod listener;
pub mod pipeline;
pub mod queue;
pub mod sink;
pub mod worker;

use demgate_codec::CodecError;
use demgate_network::GcError;
use demgate_types::ShareCodeError;
use thiserror::Error;

pub use config::IngestConfig;
pub use pipeline::{AcquisitionPipeline, PipelineArtifact};
pub use queue::IngestQueue;
pub use sink::{ArtifactSink, HttpArtifactSink, LogArtifactSink};
pub use worker::{IngestWorker, MetadataResolver};

/// Ingest-side errors. Each maps to one stage of the worker loop.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("invalid share code {0:?}: {1}")]
    InvalidToken(String, #[source] ShareCodeError),

    /// The coordinator answered, but reported no match for the request.
    #[error("coordinator reported no match for the request")]
    Unresolvable,

    #[error("coordinator error: {0}")]
    Gc(#[from] GcError),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("download failed: {0}")]
    Download(#[from] reqwest::Error),

    #[error("decompression failed: {0}")]
    Decompression(String),

    #[error("artifact handoff failed: {0}")]
    Handoff(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for ingest operations.
pub type IngestResult<T> = std::result::Result<T, IngestError>;
