//! Request/response correlation over the GC channel.
//!
//! The wire protocol carries no per-request correlation id - a structural
//! limitation of the remote service, not a gap here - so at most one request
//! may be outstanding at a time. A single pending slot pairs the one awaited
//! response type with the one waiting submitter; the slot lives in the
//! engine and is shared with the receive-dispatch path by explicit `Arc`.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use demgate_codec::{DecodedMessage, GcProto, MatchListRequestFullGameInfo};
use demgate_types::{emsg, MatchRequest};

use crate::channel::{GcChannel, GcHandler};
use crate::{GcError, GcResult};

struct Pending {
    expect: u32,
    tx: oneshot::Sender<DecodedMessage>,
}

/// Maps one outstanding request to the next matching inbound message.
pub struct CorrelationEngine {
    channel: Arc<GcChannel>,
    pending: Arc<Mutex<Option<Pending>>>,
    timeout: Duration,
}

impl CorrelationEngine {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(channel: Arc<GcChannel>, timeout: Duration) -> Self {
        Self {
            channel,
            pending: Arc::new(Mutex::new(None)),
            timeout,
        }
    }

    /// Dispatch-side handler; install it on the channel for the awaited
    /// response id. Runs on the I/O task and never blocks: it only moves
    /// the message into the pending slot's oneshot.
    pub fn resolver(&self) -> GcHandler {
        let pending = Arc::clone(&self.pending);
        Box::new(move |clean_id, message| {
            let mut slot = pending.lock();
            let matches = slot
                .as_ref()
                .map(|p| p.expect == clean_id)
                .unwrap_or(false);
            if !matches {
                // late, duplicate, or unsolicited: discard without touching
                // engine state
                warn!(emsg = clean_id, "response with no matching pending request; discarding");
                return;
            }
            if let Some(p) = slot.take() {
                if p.tx.send(message).is_err() {
                    debug!(emsg = clean_id, "pending waiter already gone; response dropped");
                }
            }
        })
    }

    /// Submit one request and await its correlated response.
    ///
    /// Policy: a second submission while one is pending fails `Busy`
    /// immediately; it never displaces the pending slot. A timeout cancels
    /// only the local wait - the request cannot be recalled, so its late
    /// response (if any) is discarded by the resolver as unsolicited.
    pub async fn submit(&self, request: &MatchRequest) -> GcResult<DecodedMessage> {
        let rx = {
            let mut slot = self.pending.lock();
            if slot.is_some() {
                return Err(GcError::Busy);
            }
            let (tx, rx) = oneshot::channel();
            *slot = Some(Pending {
                expect: emsg::MATCH_LIST,
                tx,
            });
            rx
        };

        let wire_request = MatchListRequestFullGameInfo {
            matchid: request.matchid,
            outcomeid: request.outcomeid,
            token: request.token,
        };
        if let Err(e) = self.channel.send(
            MatchListRequestFullGameInfo::MSG_ID,
            wire_request.encode().into(),
        ) {
            self.clear();
            return Err(e);
        }
        debug!(matchid = request.matchid, "match metadata request sent");

        match tokio::time::timeout(self.timeout, rx).await {
            // the resolver cleared the slot before resolving us
            Ok(Ok(message)) => Ok(message),
            Ok(Err(_)) => {
                self.clear();
                Err(GcError::Transport(
                    "pending response channel closed".to_string(),
                ))
            }
            Err(_) => {
                self.clear();
                warn!(
                    matchid = request.matchid,
                    timeout = ?self.timeout,
                    "no correlated response within bound"
                );
                Err(GcError::Timeout)
            }
        }
    }

    fn clear(&self) {
        self.pending.lock().take();
    }

    /// True while a submission is outstanding.
    pub fn is_busy(&self) -> bool {
        self.pending.lock().is_some()
    }
}
