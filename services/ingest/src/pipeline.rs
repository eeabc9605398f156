//! Replay acquisition: download, decompress, hand off.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::sink::ArtifactSink;
use crate::{IngestError, IngestResult};

/// Outcome of one pipeline run. The compressed intermediate is already
/// deleted by the time this exists.
#[derive(Debug, Clone)]
pub struct PipelineArtifact {
    pub url: String,
    pub compressed_path: PathBuf,
    pub decompressed_path: PathBuf,
    /// Downstream verdict from the handoff.
    pub accepted: bool,
}

/// Runs the download → decompress → handoff sequence for one resolved
/// replay location. At-most-once per call; retry policy belongs to callers
/// (and the worker deliberately has none).
pub struct AcquisitionPipeline {
    http: reqwest::Client,
    replay_dir: PathBuf,
    sink: Arc<dyn ArtifactSink>,
}

impl AcquisitionPipeline {
    pub fn new(replay_dir: PathBuf, sink: Arc<dyn ArtifactSink>) -> Self {
        Self {
            http: reqwest::Client::new(),
            replay_dir,
            sink,
        }
    }

    /// Acquire one replay and hand the final path downstream.
    pub async fn run(&self, url: &str) -> IngestResult<PipelineArtifact> {
        tokio::fs::create_dir_all(&self.replay_dir).await?;

        let filename = url
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .unwrap_or("replay.dem.bz2");
        let compressed = self.replay_dir.join(filename);

        self.download(url, &compressed).await?;

        let decompressed = decompressed_path(&compressed);
        decompress(compressed.clone(), decompressed.clone()).await?;
        tokio::fs::remove_file(&compressed).await?;
        info!(path = %decompressed.display(), "replay ready");

        let accepted = self.sink.accept(&decompressed).await?;
        if !accepted {
            warn!(path = %decompressed.display(), "downstream rejected artifact");
        }

        Ok(PipelineArtifact {
            url: url.to_string(),
            compressed_path: compressed,
            decompressed_path: decompressed,
            accepted,
        })
    }

    /// Stream the resource to disk in chunks; no assumed size limit.
    async fn download(&self, url: &str, dest: &Path) -> IngestResult<()> {
        debug!(url, "starting download");
        let response = self.http.get(url).send().await?.error_for_status()?;

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut bytes = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            bytes += chunk.len() as u64;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        info!(url, bytes, path = %dest.display(), "download complete");
        Ok(())
    }
}

/// `foo.dem.bz2` → `foo.dem`; anything without the `.bz2` suffix gets a
/// `.dem` extension so the artifact name is always recognizable downstream.
fn decompressed_path(compressed: &Path) -> PathBuf {
    match compressed.extension() {
        Some(ext) if ext == "bz2" => compressed.with_extension(""),
        _ => compressed.with_extension("dem"),
    }
}

/// bz2 inflation is CPU-bound; run it off the async runtime.
async fn decompress(src: PathBuf, dest: PathBuf) -> IngestResult<()> {
    tokio::task::spawn_blocking(move || -> IngestResult<()> {
        let input = std::fs::File::open(&src)?;
        let mut decoder = bzip2::read::BzDecoder::new(std::io::BufReader::new(input));
        let mut output = std::fs::File::create(&dest)?;
        std::io::copy(&mut decoder, &mut output)
            .map_err(|e| IngestError::Decompression(e.to_string()))?;
        Ok(())
    })
    .await
    .map_err(|e| IngestError::Decompression(format!("decompression task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::LogArtifactSink;
    use std::io::Write;

    fn bz2_bytes(content: &[u8]) -> Vec<u8> {
        let mut encoder =
            bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
        encoder.write_all(content).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn bz2_suffix_is_stripped_for_the_final_path() {
        assert_eq!(
            decompressed_path(Path::new("/r/match_1.dem.bz2")),
            PathBuf::from("/r/match_1.dem")
        );
        assert_eq!(
            decompressed_path(Path::new("/r/oddball")),
            PathBuf::from("/r/oddball.dem")
        );
    }

    #[tokio::test]
    async fn downloads_decompresses_and_deletes_the_intermediate() {
        let mut server = mockito::Server::new_async().await;
        let body = bz2_bytes(b"HL2DEMO fake replay payload");
        let mock = server
            .mock("GET", "/730/0042_1.dem.bz2")
            .with_body(body)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let pipeline =
            AcquisitionPipeline::new(dir.path().to_path_buf(), Arc::new(LogArtifactSink));
        let url = format!("{}/730/0042_1.dem.bz2", server.url());
        let artifact = pipeline.run(&url).await.unwrap();

        assert!(artifact.accepted);
        assert_eq!(artifact.decompressed_path, dir.path().join("0042_1.dem"));
        let replay = std::fs::read(&artifact.decompressed_path).unwrap();
        assert_eq!(replay, b"HL2DEMO fake replay payload");
        // the compressed intermediate is gone
        assert!(!artifact.compressed_path.exists());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn http_failure_surfaces_as_download_error() {
        let mut server = mockito::Server::new_async().await;
        let _missing = server
            .mock("GET", "/gone.dem.bz2")
            .with_status(404)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let pipeline =
            AcquisitionPipeline::new(dir.path().to_path_buf(), Arc::new(LogArtifactSink));
        let err = pipeline
            .run(&format!("{}/gone.dem.bz2", server.url()))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Download(_)));
    }

    #[tokio::test]
    async fn garbage_body_surfaces_as_decompression_error() {
        let mut server = mockito::Server::new_async().await;
        let _garbage = server
            .mock("GET", "/bad.dem.bz2")
            .with_body(b"this is not bzip2")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let pipeline =
            AcquisitionPipeline::new(dir.path().to_path_buf(), Arc::new(LogArtifactSink));
        let err = pipeline
            .run(&format!("{}/bad.dem.bz2", server.url()))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Decompression(_)));
    }
}
