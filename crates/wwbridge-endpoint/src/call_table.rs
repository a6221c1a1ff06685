use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use wwbridge_frame::CorrelationId;

use crate::error::CallError;

/// Terminal outcome of one call.
pub type CallOutcome = std::result::Result<Value, CallError>;

struct PendingCall {
    name: String,
    settle: oneshot::Sender<CallOutcome>,
}

/// In-flight outbound calls awaiting a response, keyed by correlation id.
///
/// Every entry settles exactly once: whichever of response, timeout or
/// disconnect reaches the table first removes the entry, and anything
/// arriving later finds nothing to do.
#[derive(Default)]
pub struct CallTable {
    pending: Mutex<HashMap<CorrelationId, PendingCall>>,
}

impl CallTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CorrelationId, PendingCall>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store the settle handle for `id`.
    ///
    /// Ids are never reused while outstanding; if one is, the newer entry
    /// replaces the older, which then settles as disconnected.
    pub fn register(
        &self,
        id: CorrelationId,
        name: impl Into<String>,
        settle: oneshot::Sender<CallOutcome>,
    ) {
        let name = name.into();
        let previous = self.lock().insert(id, PendingCall { name, settle });
        if let Some(previous) = previous {
            warn!(id, name = %previous.name, "correlation id registered twice");
        }
    }

    /// Settle `id` with `outcome`.
    ///
    /// Returns false if nothing is waiting on `id`, e.g. a response arriving
    /// after its call already timed out.
    pub fn settle(&self, id: CorrelationId, outcome: CallOutcome) -> bool {
        let Some(pending) = self.take(id) else {
            warn!(id, "no pending call for response (call timed out?)");
            return false;
        };
        debug!(id, name = %pending.name, ok = outcome.is_ok(), "settling call");
        deliver(id, pending, outcome);
        true
    }

    /// Arm a one-shot timer that fails `id` with a timeout.
    ///
    /// `None` or a zero duration arms nothing. Early settlement needs no
    /// cancel: the timer finds the entry gone and does nothing.
    pub fn schedule_timeout(
        self: &Arc<Self>,
        id: CorrelationId,
        timeout: Option<Duration>,
    ) -> Option<JoinHandle<()>> {
        let after = timeout.filter(|after| !after.is_zero())?;
        let table = Arc::downgrade(self);
        Some(tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let Some(table) = table.upgrade() else {
                return;
            };
            if let Some(pending) = table.take(id) {
                debug!(id, name = %pending.name, ?after, "call timed out");
                let name = pending.name.clone();
                deliver(id, pending, Err(CallError::Timeout { name, id, after }));
            }
        }))
    }

    /// Fail every outstanding call, returning how many were failed.
    pub fn fail_all(&self, reason: impl Fn(&str) -> CallError) -> usize {
        let drained: Vec<_> = self.lock().drain().collect();
        let count = drained.len();
        for (id, pending) in drained {
            let err = reason(&pending.name);
            deliver(id, pending, Err(err));
        }
        count
    }

    pub fn contains(&self, id: CorrelationId) -> bool {
        self.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn take(&self, id: CorrelationId) -> Option<PendingCall> {
        self.lock().remove(&id)
    }
}

fn deliver(id: CorrelationId, pending: PendingCall, outcome: CallOutcome) {
    if pending.settle.send(outcome).is_err() {
        debug!(id, name = %pending.name, "caller went away before settlement");
    }
}

impl std::fmt::Debug for CallTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallTable")
            .field("pending", &self.len())
            .finish()
    }
}
