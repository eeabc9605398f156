//! Ingest daemon configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{IngestError, IngestResult};

/// Top-level daemon configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestConfig {
    pub gc: GcSettings,
    pub ingest: ListenerSettings,
    pub pipeline: PipelineSettings,
}

/// Coordinator connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GcSettings {
    /// Local session endpoint speaking raw GC frames. Session security
    /// lives below that endpoint, not here.
    pub address: String,
    /// Client version reported in the hello message.
    pub hello_version: u32,
    /// Seconds to wait for the correlated match-list response.
    pub response_timeout_secs: u64,
}

/// Token listener settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListenerSettings {
    /// Address for the newline-delimited token listener.
    pub listen: String,
}

/// Acquisition pipeline settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineSettings {
    /// Directory replays are downloaded and decompressed into.
    pub replay_dir: PathBuf,
    /// Downstream endpoint for the artifact-ready handoff. When absent,
    /// artifacts are only logged.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub handoff_url: Option<String>,
}

impl IngestConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> IngestResult<Self> {
        let contents = std::fs::read_to_string(&path).map_err(|e| {
            IngestError::Config(format!(
                "failed to read config file {}: {e}",
                path.as_ref().display()
            ))
        })?;
        toml::from_str(&contents)
            .map_err(|e| IngestError::Config(format!("failed to parse config: {e}")))
    }

    /// Defaults for a local deployment.
    pub fn defaults() -> Self {
        Self {
            gc: GcSettings {
                address: "127.0.0.1:7301".to_string(),
                hello_version: 2_000_682,
                response_timeout_secs: 10,
            },
            ingest: ListenerSettings {
                listen: "127.0.0.1:6000".to_string(),
            },
            pipeline: PipelineSettings {
                replay_dir: PathBuf::from("replays"),
                handoff_url: None,
            },
        }
    }
}
