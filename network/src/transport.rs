//! Transport seam under the GC channel.
//!
//! Session security (encryption, account login, the Steam session itself)
//! terminates below this layer; the transport speaks raw GC frames to a
//! local session endpoint. The reserved protobuf bit on outbound message
//! ids is set here, not by the channel.
//!
//! A connected transport splits into independent halves so that sends never
//! interleave with an in-progress frame read.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, info};

use demgate_types::emsg;

use crate::frame::{GcFrame, FRAME_HEADER_LEN};
use crate::{GcError, GcResult};

/// Largest payload the transport will accept from the peer.
const DEFAULT_MAX_FRAME: usize = 16 * 1024 * 1024;

/// Outbound half of a frame pipe.
#[async_trait]
pub trait FrameSink: Send {
    async fn send(&mut self, frame: GcFrame) -> GcResult<()>;
}

/// Inbound half of a frame pipe.
#[async_trait]
pub trait FrameStream: Send {
    async fn recv(&mut self) -> GcResult<GcFrame>;
}

/// One connected GC frame pipe, ready to be split for concurrent I/O.
pub trait GcTransport: Send {
    fn split(self: Box<Self>) -> (Box<dyn FrameSink>, Box<dyn FrameStream>);
}

/// Length-prefix framed TCP transport to the session endpoint.
pub struct TcpGcTransport {
    stream: TcpStream,
    peer: SocketAddr,
}

impl TcpGcTransport {
    pub async fn connect(addr: SocketAddr, connect_timeout: Duration) -> GcResult<Self> {
        let stream = tokio::time::timeout(connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| GcError::Transport(format!("connect to {addr} timed out")))??;
        stream.set_nodelay(true)?;
        info!(peer = %addr, "connected to GC session endpoint");
        Ok(Self { stream, peer: addr })
    }
}

impl GcTransport for TcpGcTransport {
    fn split(self: Box<Self>) -> (Box<dyn FrameSink>, Box<dyn FrameStream>) {
        let (read, write) = self.stream.into_split();
        (
            Box::new(TcpFrameSink {
                write,
                peer: self.peer,
                bytes_sent: 0,
            }),
            Box::new(TcpFrameStream {
                read,
                peer: self.peer,
                max_frame: DEFAULT_MAX_FRAME,
                bytes_received: 0,
            }),
        )
    }
}

pub struct TcpFrameSink {
    write: OwnedWriteHalf,
    peer: SocketAddr,
    bytes_sent: u64,
}

#[async_trait]
impl FrameSink for TcpFrameSink {
    async fn send(&mut self, frame: GcFrame) -> GcResult<()> {
        // the reserved bit travels on the wire, never above this layer
        let wire = GcFrame::new(emsg::mask(frame.emsg), frame.payload);
        let bytes = wire.to_bytes();
        self.write.write_all(&bytes).await?;
        self.write.flush().await?;
        self.bytes_sent += bytes.len() as u64;
        debug!(
            peer = %self.peer,
            emsg = wire.clean_id(),
            bytes = bytes.len(),
            total_sent = self.bytes_sent,
            "sent GC frame"
        );
        Ok(())
    }
}

pub struct TcpFrameStream {
    read: OwnedReadHalf,
    peer: SocketAddr,
    max_frame: usize,
    bytes_received: u64,
}

#[async_trait]
impl FrameStream for TcpFrameStream {
    async fn recv(&mut self) -> GcResult<GcFrame> {
        let mut header = [0u8; FRAME_HEADER_LEN];
        self.read.read_exact(&mut header).await?;

        let wire_emsg = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let length = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
        if length > self.max_frame {
            return Err(GcError::Transport(format!(
                "frame of {length} bytes exceeds maximum {}",
                self.max_frame
            )));
        }

        let mut payload = vec![0u8; length];
        self.read.read_exact(&mut payload).await?;
        self.bytes_received += (FRAME_HEADER_LEN + length) as u64;
        debug!(
            peer = %self.peer,
            emsg = emsg::unmask(wire_emsg),
            bytes = length,
            total_received = self.bytes_received,
            "received GC frame"
        );
        Ok(GcFrame::new(wire_emsg, Bytes::from(payload)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn frames_survive_a_tcp_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let echo = tokio::spawn(async move {
            let (stream, peer) = listener.accept().await.unwrap();
            let transport = Box::new(TcpGcTransport { stream, peer });
            let (mut sink, mut source) = (transport as Box<dyn GcTransport>).split();
            let frame = source.recv().await.unwrap();
            // wire form must carry the reserved bit set by the client side
            assert_eq!(frame.emsg & emsg::GC_PROTO_MASK, emsg::GC_PROTO_MASK);
            sink.send(GcFrame::new(frame.clean_id(), frame.payload))
                .await
                .unwrap();
        });

        let client = TcpGcTransport::connect(addr, Duration::from_secs(5))
            .await
            .unwrap();
        let (mut sink, mut source) = (Box::new(client) as Box<dyn GcTransport>).split();
        sink.send(GcFrame::new(
            emsg::CLIENT_HELLO,
            Bytes::from_static(b"\x08\x2A"),
        ))
        .await
        .unwrap();
        let back = source.recv().await.unwrap();
        assert_eq!(back.clean_id(), emsg::CLIENT_HELLO);
        assert_eq!(&back.payload[..], b"\x08\x2A");
        echo.await.unwrap();
    }
}
