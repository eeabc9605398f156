//! Unbounded share-code queue: any number of producers, exactly one consumer.

use tokio::sync::mpsc;

/// Cloneable producer handle. The receiver returned by [`IngestQueue::new`]
/// belongs to the single worker loop.
#[derive(Debug, Clone)]
pub struct IngestQueue {
    tx: mpsc::UnboundedSender<String>,
}

impl IngestQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Enqueue one token. Returns `false` when the consumer is gone.
    pub fn submit(&self, token: impl Into<String>) -> bool {
        self.tx.send(token.into()).is_ok()
    }
}
