//! The GC channel: one connection, a two-state handshake, inbound dispatch.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use demgate_codec::{catalog, messages, ClientHello, ClientWelcome, DecodedMessage, GcProto};
use demgate_types::emsg;

use crate::frame::GcFrame;
use crate::transport::GcTransport;
use crate::{GcError, GcResult};

/// Handler invoked on the I/O task for one clean message id. Must return
/// quickly; blocking work belongs to the consumer task.
pub type GcHandler = Box<dyn Fn(u32, DecodedMessage) + Send + Sync>;

/// Handshake states. Requests are rejected until `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Connecting,
    Ready,
}

/// Dispatch counters, updated on the I/O path.
#[derive(Debug, Default)]
pub struct ChannelMetrics {
    pub frames_sent: AtomicU64,
    pub frames_received: AtomicU64,
    pub frames_dropped: AtomicU64,
}

/// Shared handle to one GC conversation.
///
/// Handlers are registered once during initialization, before the driver
/// starts; the map is never mutated afterwards.
pub struct GcChannel {
    state: watch::Sender<ChannelState>,
    outbound: mpsc::UnboundedSender<GcFrame>,
    handlers: RwLock<HashMap<u32, GcHandler>>,
    hello_version: u32,
    pub metrics: ChannelMetrics,
}

impl GcChannel {
    /// Create the channel handle and the driver that will own transport I/O.
    pub fn new(hello_version: u32) -> (Arc<Self>, ChannelDriver) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(ChannelState::Connecting);
        let channel = Arc::new(Self {
            state: state_tx,
            outbound: outbound_tx,
            handlers: RwLock::new(HashMap::new()),
            hello_version,
            metrics: ChannelMetrics::default(),
        });
        let driver = ChannelDriver {
            channel: Arc::clone(&channel),
            outbound: outbound_rx,
        };
        (channel, driver)
    }

    /// Register the handler for one clean message id. Called during
    /// initialization only.
    pub fn register(&self, clean_id: u32, handler: GcHandler) {
        if self.handlers.write().insert(clean_id, handler).is_some() {
            warn!(emsg = clean_id, "handler for message id replaced");
        }
    }

    /// Queue one outbound message. Fails `NotReady` until the welcome
    /// handshake completes - an explicit reject, never a silent queue.
    pub fn send(&self, clean_id: u32, payload: Bytes) -> GcResult<()> {
        if *self.state.borrow() != ChannelState::Ready {
            return Err(GcError::NotReady);
        }
        self.outbound
            .send(GcFrame::new(clean_id, payload))
            .map_err(|_| GcError::Transport("channel I/O loop is gone".to_string()))?;
        self.metrics.frames_sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    /// Wait until the handshake completes. Returns immediately once ready.
    pub async fn wait_ready(&self) {
        let mut rx = self.state.subscribe();
        while *rx.borrow() != ChannelState::Ready {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Unmask, decode, and route one inbound frame. Runs on the I/O task.
    fn dispatch(&self, frame: GcFrame) {
        self.metrics.frames_received.fetch_add(1, Ordering::Relaxed);
        let clean_id = frame.clean_id();

        if clean_id == emsg::CLIENT_WELCOME {
            self.on_welcome(&frame);
            return;
        }

        let Some(schema) = messages::schema_for(clean_id) else {
            debug!(emsg = clean_id, "no cataloged schema for inbound message; dropping");
            self.metrics.frames_dropped.fetch_add(1, Ordering::Relaxed);
            return;
        };

        let handlers = self.handlers.read();
        let Some(handler) = handlers.get(&clean_id) else {
            debug!(emsg = clean_id, "no handler registered for inbound message; dropping");
            self.metrics.frames_dropped.fetch_add(1, Ordering::Relaxed);
            return;
        };

        match catalog::decode(schema, &frame.payload) {
            Ok(message) => handler(clean_id, message),
            Err(e) => {
                // malformed inbound frame: drop it, keep the connection
                let preview_len = frame.payload.len().min(32);
                warn!(
                    emsg = clean_id,
                    error = %e,
                    payload_preview = %hex::encode(&frame.payload[..preview_len]),
                    "failed to decode inbound payload; dropping frame"
                );
                self.metrics.frames_dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn on_welcome(&self, frame: &GcFrame) {
        match ClientWelcome::decode(&frame.payload) {
            Ok(welcome) => {
                info!(version = welcome.version, "welcomed by coordinator");
                self.state.send_replace(ChannelState::Ready);
            }
            Err(e) => {
                warn!(error = %e, "malformed welcome; staying in connecting state");
                self.metrics.frames_dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

/// Owns the transport halves and the I/O tasks. Exactly one per channel.
pub struct ChannelDriver {
    channel: Arc<GcChannel>,
    outbound: mpsc::UnboundedReceiver<GcFrame>,
}

impl ChannelDriver {
    /// Open the conversation and pump frames until the transport fails or
    /// every channel handle is gone.
    ///
    /// The writer half drains the outbound queue on its own task; the
    /// reader half dispatches inline here. Dispatch must stay non-blocking -
    /// the consumer task does its waiting elsewhere.
    pub async fn run(self, transport: Box<dyn GcTransport>) -> GcResult<()> {
        let ChannelDriver {
            channel,
            mut outbound,
        } = self;
        let (mut sink, mut source) = transport.split();

        // the hello opens every conversation, before send() is allowed
        let hello = ClientHello {
            version: channel.hello_version,
            ..Default::default()
        };
        sink.send(GcFrame::new(emsg::CLIENT_HELLO, hello.encode().into()))
            .await?;
        info!(version = channel.hello_version, "sent client hello");

        let writer = tokio::spawn(async move {
            while let Some(frame) = outbound.recv().await {
                if let Err(e) = sink.send(frame).await {
                    warn!(error = %e, "outbound send failed; writer stopping");
                    return;
                }
            }
            debug!("all channel handles dropped; writer stopping");
        });

        let result = loop {
            match source.recv().await {
                Ok(frame) => channel.dispatch(frame),
                Err(e) => break Err(e),
            }
        };
        writer.abort();
        result
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::transport::{FrameSink, FrameStream};
    use async_trait::async_trait;
    use demgate_codec::ConnectionStatus;
    use std::sync::Mutex;

    /// In-memory transport: inbound frames are injected, outbound frames
    /// are captured. The reserved bit is applied like the real transport.
    pub(crate) struct MockTransport {
        inbound: mpsc::UnboundedReceiver<GcFrame>,
        outbound: mpsc::UnboundedSender<GcFrame>,
    }

    pub(crate) struct MockWire {
        pub inbound: mpsc::UnboundedSender<GcFrame>,
        pub outbound: mpsc::UnboundedReceiver<GcFrame>,
    }

    pub(crate) fn mock_transport() -> (Box<dyn GcTransport>, MockWire) {
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        (
            Box::new(MockTransport {
                inbound: in_rx,
                outbound: out_tx,
            }),
            MockWire {
                inbound: in_tx,
                outbound: out_rx,
            },
        )
    }

    struct MockSink {
        outbound: mpsc::UnboundedSender<GcFrame>,
    }

    #[async_trait]
    impl FrameSink for MockSink {
        async fn send(&mut self, frame: GcFrame) -> GcResult<()> {
            let wire = GcFrame::new(emsg::mask(frame.emsg), frame.payload);
            self.outbound
                .send(wire)
                .map_err(|_| GcError::Transport("mock peer gone".to_string()))
        }
    }

    struct MockStream {
        inbound: mpsc::UnboundedReceiver<GcFrame>,
    }

    #[async_trait]
    impl FrameStream for MockStream {
        async fn recv(&mut self) -> GcResult<GcFrame> {
            self.inbound
                .recv()
                .await
                .ok_or_else(|| GcError::Transport("mock peer closed".to_string()))
        }
    }

    impl GcTransport for MockTransport {
        fn split(self: Box<Self>) -> (Box<dyn FrameSink>, Box<dyn FrameStream>) {
            (
                Box::new(MockSink {
                    outbound: self.outbound,
                }),
                Box::new(MockStream {
                    inbound: self.inbound,
                }),
            )
        }
    }

    pub(crate) fn welcome_frame() -> GcFrame {
        let welcome = ClientWelcome {
            version: 1,
            ..Default::default()
        };
        GcFrame::new(emsg::mask(emsg::CLIENT_WELCOME), welcome.encode().into())
    }

    #[tokio::test]
    async fn hello_goes_out_and_welcome_flips_state() {
        let (transport, mut wire) = mock_transport();
        let (channel, driver) = GcChannel::new(2_000_682);
        let driver_task = tokio::spawn(driver.run(transport));

        let hello = wire.outbound.recv().await.unwrap();
        assert_eq!(hello.clean_id(), emsg::CLIENT_HELLO);
        assert_eq!(hello.emsg & emsg::GC_PROTO_MASK, emsg::GC_PROTO_MASK);
        let decoded = ClientHello::decode(&hello.payload).unwrap();
        assert_eq!(decoded.version, 2_000_682);

        assert_eq!(channel.state(), ChannelState::Connecting);
        wire.inbound.send(welcome_frame()).unwrap();
        channel.wait_ready().await;
        assert_eq!(channel.state(), ChannelState::Ready);

        drop(wire);
        let _ = driver_task.await;
    }

    #[tokio::test]
    async fn send_before_welcome_is_rejected_not_queued() {
        let (transport, mut wire) = mock_transport();
        let (channel, driver) = GcChannel::new(1);
        let driver_task = tokio::spawn(driver.run(transport));

        // only the hello crosses the wire
        let hello = wire.outbound.recv().await.unwrap();
        assert_eq!(hello.clean_id(), emsg::CLIENT_HELLO);

        let err = channel.send(emsg::MATCH_LIST_REQUEST_FULL_GAME_INFO, Bytes::new());
        assert!(matches!(err, Err(GcError::NotReady)));
        assert!(wire.outbound.try_recv().is_err());

        drop(wire);
        let _ = driver_task.await;
    }

    #[tokio::test]
    async fn registered_handler_sees_unmasked_decoded_message() {
        let (transport, mut wire) = mock_transport();
        let (channel, driver) = GcChannel::new(1);

        let seen: Arc<Mutex<Vec<u32>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_by_handler = Arc::clone(&seen);
        channel.register(
            emsg::CLIENT_CONNECTION_STATUS,
            Box::new(move |id, message| {
                assert_eq!(id & emsg::GC_PROTO_MASK, 0);
                let status = message.get_u32(1).unwrap_or_default();
                seen_by_handler.lock().unwrap().push(status);
            }),
        );

        let driver_task = tokio::spawn(driver.run(transport));
        let _ = wire.outbound.recv().await.unwrap();

        let status = ConnectionStatus { status: 2 };
        wire.inbound
            .send(GcFrame::new(
                emsg::mask(emsg::CLIENT_CONNECTION_STATUS),
                status.encode().into(),
            ))
            .unwrap();

        // unregistered and unknown ids are dropped without any effect
        wire.inbound
            .send(GcFrame::new(emsg::mask(emsg::MATCH_LIST), Bytes::new()))
            .unwrap();
        wire.inbound
            .send(GcFrame::new(emsg::mask(31_337), Bytes::new()))
            .unwrap();

        // malformed payload for a registered id is dropped, connection stays up
        wire.inbound
            .send(GcFrame::new(
                emsg::mask(emsg::CLIENT_CONNECTION_STATUS),
                Bytes::from_static(&[0x0A, 0xFF]),
            ))
            .unwrap();

        let status = ConnectionStatus { status: 5 };
        wire.inbound
            .send(GcFrame::new(
                emsg::mask(emsg::CLIENT_CONNECTION_STATUS),
                status.encode().into(),
            ))
            .unwrap();

        // wait until the final good frame lands
        for _ in 0..200 {
            if seen.lock().unwrap().len() == 2 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert_eq!(*seen.lock().unwrap(), vec![2, 5]);
        assert!(channel.metrics.frames_dropped.load(Ordering::Relaxed) >= 3);

        drop(wire);
        let _ = driver_task.await;
    }
}
