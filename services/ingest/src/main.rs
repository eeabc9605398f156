//! ingestd: the match-replay acquisition daemon.
//!
//! Wires the GC channel, the correlation engine, the token listener, and
//! the worker loop together. Handler registration happens once, here,
//! before any traffic flows.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use demgate_ingest::listener::run_listener;
use demgate_ingest::{
    AcquisitionPipeline, ArtifactSink, HttpArtifactSink, IngestConfig, IngestQueue, IngestWorker,
    LogArtifactSink,
};
use demgate_network::{CorrelationEngine, GcChannel, TcpGcTransport};
use demgate_types::emsg;

#[derive(Debug, Parser)]
#[command(name = "ingestd", about = "Match replay acquisition daemon")]
struct Args {
    /// Path to a TOML config file; built-in defaults apply when omitted.
    #[arg(long)]
    config: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => IngestConfig::from_file(path)?,
        None => IngestConfig::defaults(),
    };
    info!(?config, "starting ingestd");

    // coordinator side
    let gc_addr: SocketAddr = config
        .gc
        .address
        .parse()
        .with_context(|| format!("invalid gc address {:?}", config.gc.address))?;
    let transport = TcpGcTransport::connect(gc_addr, Duration::from_secs(10)).await?;

    let (channel, driver) = GcChannel::new(config.gc.hello_version);
    let engine = Arc::new(CorrelationEngine::new(
        Arc::clone(&channel),
        Duration::from_secs(config.gc.response_timeout_secs),
    ));

    channel.register(emsg::MATCH_LIST, engine.resolver());
    channel.register(
        emsg::CLIENT_CONNECTION_STATUS,
        Box::new(|_, message| {
            let status = message.get_u32(1).unwrap_or_default();
            info!(status, "coordinator connection status");
        }),
    );

    tokio::spawn(async move {
        if let Err(e) = driver.run(Box::new(transport)).await {
            error!(error = %e, "GC I/O loop terminated");
        }
    });

    channel.wait_ready().await;
    info!("coordinator handshake complete");

    // ingest side
    let (queue, rx) = IngestQueue::new();
    let token_listener = TcpListener::bind(&config.ingest.listen)
        .await
        .with_context(|| format!("failed to bind token listener on {}", config.ingest.listen))?;
    info!(listen = %config.ingest.listen, "token listener started");
    tokio::spawn(run_listener(token_listener, queue));

    let sink: Arc<dyn ArtifactSink> = match &config.pipeline.handoff_url {
        Some(url) => Arc::new(HttpArtifactSink::new(url.clone())),
        None => Arc::new(LogArtifactSink),
    };
    let pipeline = AcquisitionPipeline::new(config.pipeline.replay_dir.clone(), sink);

    IngestWorker::new(rx, engine, pipeline).run().await;
    Ok(())
}
