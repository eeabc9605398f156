//! Line-delimited token listener.
//!
//! One newline-terminated UTF-8 token per line, over persistent connections
//! that may carry many tokens before closing. Each connection gets its own
//! task; all of them feed the same queue.

use std::net::SocketAddr;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::queue::IngestQueue;

/// Accept connections forever, spawning one reader task per connection.
pub async fn run_listener(listener: TcpListener, queue: IngestQueue) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                info!(peer = %peer, "ingest connection established");
                let queue = queue.clone();
                tokio::spawn(handle_connection(stream, peer, queue));
            }
            Err(e) => {
                error!(error = %e, "failed to accept ingest connection");
            }
        }
    }
}

async fn handle_connection(stream: TcpStream, peer: SocketAddr, queue: IngestQueue) {
    let mut lines = BufReader::new(stream).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let token = line.trim();
                if token.is_empty() {
                    continue;
                }
                debug!(peer = %peer, token, "token received");
                if !queue.submit(token) {
                    warn!(peer = %peer, "consumer gone; closing ingest connection");
                    return;
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(peer = %peer, error = %e, "read error on ingest connection");
                break;
            }
        }
    }
    info!(peer = %peer, "ingest connection closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn multiple_tokens_per_connection_reach_the_queue() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (queue, mut rx) = IngestQueue::new();
        tokio::spawn(run_listener(listener, queue));

        let mut client = TcpStream::connect(addr).await.unwrap();
        client
            .write_all(b"CSGO-AAAAA-AAAAA-AAAAA-AAAAA-AAAAA\n\n  \nsecond-token\n")
            .await
            .unwrap();
        client.shutdown().await.unwrap();

        assert_eq!(
            rx.recv().await.as_deref(),
            Some("CSGO-AAAAA-AAAAA-AAAAA-AAAAA-AAAAA")
        );
        // blank lines are skipped, not enqueued
        assert_eq!(rx.recv().await.as_deref(), Some("second-token"));
    }

    #[tokio::test]
    async fn tokens_from_two_connections_interleave_into_one_queue() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (queue, mut rx) = IngestQueue::new();
        tokio::spawn(run_listener(listener, queue));

        let mut first = TcpStream::connect(addr).await.unwrap();
        first.write_all(b"one\n").await.unwrap();
        assert_eq!(rx.recv().await.as_deref(), Some("one"));

        let mut second = TcpStream::connect(addr).await.unwrap();
        second.write_all(b"two\n").await.unwrap();
        assert_eq!(rx.recv().await.as_deref(), Some("two"));

        // the first connection is still alive and accepted afterwards
        first.write_all(b"three\n").await.unwrap();
        assert_eq!(rx.recv().await.as_deref(), Some("three"));
    }
}
