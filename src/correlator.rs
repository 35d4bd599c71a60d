//! Response correlator: pairs outgoing requests with inbound responses by
//! CSeq. Modelled as one condvar-guarded slot per in-flight CSeq,
//! synchronised with `parking_lot` the same way session state is guarded
//! elsewhere in this client.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::message::RtspResponse;

struct Slot {
    method: String,
    response: Mutex<Option<RtspResponse>>,
    ready: Condvar,
}

/// Shared between the setup-phase caller thread and the post-PLAY
/// event-loop worker thread. The pending map is the only cross-thread
/// mutable structure in the whole client.
#[derive(Default)]
pub struct Correlator {
    pending: Mutex<HashMap<u32, std::sync::Arc<Slot>>>,
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending slot for `cseq`/`method`. Returns `false` if a
    /// slot for this CSeq is already registered (caller bug - CSeq values
    /// must be unique per session).
    pub fn register(&self, cseq: u32, method: &str) -> bool {
        let mut pending = self.pending.lock();
        if pending.contains_key(&cseq) {
            return false;
        }
        pending.insert(
            cseq,
            std::sync::Arc::new(Slot {
                method: method.to_string(),
                response: Mutex::new(None),
                ready: Condvar::new(),
            }),
        );
        true
    }

    /// Complete the slot matching `response`'s CSeq, if any is pending.
    /// A response with no matching slot is a stale/late arrival and is
    /// silently dropped. Returns the method name of the request this
    /// response answers, so a caller polling on behalf of another thread
    /// (see [`Correlator::wait`]) can react to e.g. a TEARDOWN completing.
    pub fn complete(&self, response: RtspResponse) -> Option<String> {
        let slot = {
            let pending = self.pending.lock();
            pending.get(&response.cseq).cloned()
        };
        let Some(slot) = slot else {
            tracing::debug!(cseq = response.cseq, "dropping response with no pending slot");
            return None;
        };
        self.pending.lock().remove(&response.cseq);
        let method = slot.method.clone();
        *slot.response.lock() = Some(response);
        slot.ready.notify_all();
        Some(method)
    }

    /// Block until the slot for `cseq` is completed or `timeout` elapses.
    /// On timeout the slot is removed and `None` is returned.
    pub fn wait(&self, cseq: u32, timeout: Duration) -> Option<RtspResponse> {
        let slot = {
            let pending = self.pending.lock();
            pending.get(&cseq).cloned()
        }?;

        let mut guard = slot.response.lock();
        if guard.is_none() {
            let result = slot.ready.wait_for(&mut guard, timeout);
            if result.timed_out() && guard.is_none() {
                self.pending.lock().remove(&cseq);
                return None;
            }
        }
        guard.take()
    }

    /// Used during synchronous setup, where the caller drains the socket
    /// directly instead of going through [`Correlator::wait`]. Removes the
    /// slot without waiting and returns the originating method name, if a
    /// slot was still pending.
    pub fn take_for_direct_receive(&self, cseq: u32) -> Option<String> {
        self.pending.lock().remove(&cseq).map(|slot| slot.method.clone())
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}
