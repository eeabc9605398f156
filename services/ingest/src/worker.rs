//! Single-consumer job loop.
//!
//! Exactly one worker drains the queue, so pipeline runs never overlap and
//! the correlation engine's single-flight ceiling is never contended from
//! this side.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{error, info};

use demgate_codec::{GcProto, MatchList};
use demgate_network::{CorrelationEngine, GcError};
use demgate_types::MatchRequest;

use crate::pipeline::{AcquisitionPipeline, PipelineArtifact};
use crate::{IngestError, IngestResult};

/// Seam between the worker and the coordinator client.
#[async_trait]
pub trait MetadataResolver: Send + Sync {
    async fn resolve(&self, request: &MatchRequest) -> Result<MatchList, GcError>;
}

#[async_trait]
impl MetadataResolver for CorrelationEngine {
    async fn resolve(&self, request: &MatchRequest) -> Result<MatchList, GcError> {
        let message = self.submit(request).await?;
        Ok(MatchList::from_decoded(&message)?)
    }
}

/// Lifecycle of one queued token. Transient: nothing survives a terminal
/// state except the log line and the counters.
#[derive(Debug)]
pub struct Job {
    pub token: String,
    pub state: JobState,
    pub created_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Queued,
    InFlight,
    Done,
    Failed,
}

/// Worker loop counters.
#[derive(Debug, Default)]
pub struct WorkerMetrics {
    pub tokens_received: u64,
    pub jobs_done: u64,
    pub jobs_failed: u64,
}

/// The one consumer of the ingest queue.
pub struct IngestWorker {
    rx: mpsc::UnboundedReceiver<String>,
    resolver: Arc<dyn MetadataResolver>,
    pipeline: AcquisitionPipeline,
    metrics: WorkerMetrics,
}

impl IngestWorker {
    pub fn new(
        rx: mpsc::UnboundedReceiver<String>,
        resolver: Arc<dyn MetadataResolver>,
        pipeline: AcquisitionPipeline,
    ) -> Self {
        Self {
            rx,
            resolver,
            pipeline,
            metrics: WorkerMetrics::default(),
        }
    }

    /// Drain the queue one token at a time, forever. Every failure is
    /// caught and logged with its token; the loop always moves on. No
    /// retry - a token gets exactly one attempt.
    pub async fn run(mut self) {
        info!("ingest worker started; waiting for share codes");
        while let Some(token) = self.rx.recv().await {
            self.metrics.tokens_received += 1;
            let mut job = Job {
                token,
                state: JobState::Queued,
                created_at: Instant::now(),
            };

            info!(token = %job.token, "processing share code");
            job.state = JobState::InFlight;
            match self.process(&job.token).await {
                Ok(artifact) => {
                    job.state = JobState::Done;
                    self.metrics.jobs_done += 1;
                    info!(
                        token = %job.token,
                        path = %artifact.decompressed_path.display(),
                        accepted = artifact.accepted,
                        elapsed = ?job.created_at.elapsed(),
                        "job complete"
                    );
                }
                Err(e) => {
                    job.state = JobState::Failed;
                    self.metrics.jobs_failed += 1;
                    error!(token = %job.token, error = %e, "job failed");
                }
            }
        }
        info!(
            received = self.metrics.tokens_received,
            done = self.metrics.jobs_done,
            failed = self.metrics.jobs_failed,
            "ingest queue closed; worker stopping"
        );
    }

    async fn process(&self, token: &str) -> IngestResult<PipelineArtifact> {
        let request = MatchRequest::from_share_code(token)
            .map_err(|e| IngestError::InvalidToken(token.to_string(), e))?;

        let list = self.resolver.resolve(&request).await?;
        let info = list.matches.first().ok_or(IngestError::Unresolvable)?;
        let url = info
            .roundstatsall
            .last()
            .map(|round| round.map.clone())
            .filter(|url| !url.is_empty())
            .ok_or(IngestError::Unresolvable)?;

        info!(
            matchid = info.matchid,
            matchtime = info.matchtime,
            url = %url,
            "match resolved"
        );
        self.pipeline.run(&url).await
    }
}
