use std::any::Any;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use wwbridge_frame::record::{PANIC_KIND, RANGE_KIND, REFERENCE_KIND};
use wwbridge_frame::{
    decode_error, encode_error, CorrelationId, FrameError, RaisedError, WireMessage,
};

use crate::adapter::ChannelAdapter;
use crate::call_table::{CallOutcome, CallTable};
use crate::error::{BridgeError, CallError, Result};
use crate::registry::{Dispatch, FunctionResult, InitHook, LocalFn, Route};
use crate::side::{IdSequence, Side};

/// State shared by every handle to one side of a bridge.
pub(crate) struct Endpoint {
    side: Side,
    dispatch: Dispatch,
    calls: Arc<CallTable>,
    ids: IdSequence,
    timeout: Option<Duration>,
    adapter: Box<dyn ChannelAdapter>,
    closed: CancellationToken,
}

impl Endpoint {
    /// Wire an endpoint to `adapter`, run `hooks` in order, then start
    /// routing inbound messages.
    ///
    /// Must be called within a Tokio runtime.
    pub(crate) fn start(
        mut adapter: Box<dyn ChannelAdapter>,
        dispatch: Dispatch,
        timeout: Option<Duration>,
        hooks: Vec<InitHook>,
    ) -> Result<Bridge> {
        let inbound = adapter.subscribe()?;
        let side = adapter.side();
        let bridge = Bridge {
            inner: Arc::new(Endpoint {
                side,
                dispatch,
                calls: Arc::new(CallTable::new()),
                ids: IdSequence::new(side),
                timeout,
                adapter,
                closed: CancellationToken::new(),
            }),
        };

        for hook in &hooks {
            hook(&bridge);
        }
        spawn_pump(&bridge.inner, inbound);

        info!(
            side = %side,
            local = ?bridge.inner.dispatch.local_names(),
            remote = ?bridge.inner.dispatch.remote_names(),
            timeout = ?timeout,
            "bridge ready"
        );
        Ok(bridge)
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        self.closed.cancel();
    }
}

/// Route inbound messages until the channel ends or the endpoint goes away.
///
/// The pump holds the endpoint weakly so dropping the last [`Bridge`]
/// closes it.
fn spawn_pump(endpoint: &Arc<Endpoint>, mut inbound: mpsc::UnboundedReceiver<WireMessage>) {
    let weak = Arc::downgrade(endpoint);
    let calls = Arc::clone(&endpoint.calls);
    let closed = endpoint.closed.clone();
    let side = endpoint.side;

    tokio::spawn(async move {
        loop {
            let message = tokio::select! {
                _ = closed.cancelled() => break,
                message = inbound.recv() => match message {
                    Some(message) => message,
                    None => break,
                },
            };
            let Some(inner) = weak.upgrade() else {
                break;
            };
            Bridge { inner }.on_message(message);
        }

        closed.cancel();
        let failed = calls.fail_all(|name| CallError::Disconnected {
            name: name.to_string(),
        });
        if failed > 0 {
            warn!(side = %side, failed, "channel closed with calls outstanding");
        }
        debug!(side = %side, "bridge closed");
    });
}

/// Handle to one side of a bridge.
///
/// Cheap to clone. Every registered function, local or remote, is invoked
/// through [`Bridge::call`] or a [`Function`], and the caller cannot tell
/// which side runs it.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<Endpoint>,
}

impl Bridge {
    pub fn side(&self) -> Side {
        self.inner.side
    }

    /// Bridge-wide call timeout; `None` when disabled.
    pub fn timeout(&self) -> Option<Duration> {
        self.inner.timeout
    }

    /// Invoke `name` with positional `args`.
    ///
    /// Returns immediately; the handle resolves once the implementation
    /// finishes, whichever side it runs on.
    pub fn call(&self, name: &str, args: Vec<Value>) -> CallHandle {
        match self.inner.dispatch.resolve(name) {
            Some(Route::Local(f)) => CallHandle::local(name, self.spawn_local(f, args)),
            Some(Route::Remote) => self.call_remote(name, args),
            None => CallHandle::ready(name, Err(CallError::UnknownFunction(name.to_string()))),
        }
    }

    /// A reusable handle to `name`, or `None` if nothing is registered
    /// under it.
    pub fn function(&self, name: &str) -> Option<Function> {
        self.inner.dispatch.resolve(name).map(|_| Function {
            bridge: self.clone(),
            name: name.to_string(),
        })
    }

    /// Names executed on this side, sorted.
    pub fn local_names(&self) -> Vec<String> {
        to_owned(self.inner.dispatch.local_names())
    }

    /// Names proxied to the other side, sorted.
    pub fn remote_names(&self) -> Vec<String> {
        to_owned(self.inner.dispatch.remote_names())
    }

    /// Outbound calls still waiting on the other side.
    pub fn pending_calls(&self) -> usize {
        self.inner.calls.len()
    }

    /// Resolves once the channel's inbound side has ended.
    pub async fn closed(&self) {
        self.inner.closed.cancelled().await;
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.is_cancelled()
    }

    fn spawn_local(&self, f: &LocalFn, args: Vec<Value>) -> JoinHandle<FunctionResult> {
        tokio::spawn(f(self.clone(), args))
    }

    fn call_remote(&self, name: &str, args: Vec<Value>) -> CallHandle {
        let inner = &self.inner;
        if self.is_closed() {
            return CallHandle::ready(name, Err(disconnected(name)));
        }

        let id = inner.ids.next_id();
        let (settle, outcome) = oneshot::channel();
        inner.calls.register(id, name, settle);
        inner.calls.schedule_timeout(id, inner.timeout);

        trace!(side = %inner.side, name, id, "call out");
        let message = WireMessage::Call {
            name: name.to_string(),
            id,
            args,
        };
        if let Err(err) = inner.adapter.send(message) {
            debug!(side = %inner.side, name, id, error = %err, "call could not be sent");
            inner.calls.settle(id, Err(send_failure(name, err)));
        } else if self.is_closed() && inner.calls.contains(id) {
            inner.calls.settle(id, Err(disconnected(name)));
        }

        CallHandle::remote(name, id, outcome)
    }

    fn on_message(&self, message: WireMessage) {
        match message {
            WireMessage::Call { name, id, args } => self.serve(name, id, args),
            WireMessage::Return { name, id, result } => {
                trace!(side = %self.side(), name = %name, id, "return in");
                self.settle_response(id, Ok(result));
            }
            WireMessage::Error { name, id, error } => {
                trace!(side = %self.side(), name = %name, id, kind = %error.name, "error in");
                self.settle_response(id, Err(CallError::Raised(decode_error(error))));
            }
        }
    }

    fn settle_response(&self, id: CorrelationId, outcome: CallOutcome) {
        if !self.side().issues(id) {
            warn!(side = %self.side(), id, "response id belongs to the other side");
        }
        self.inner.calls.settle(id, outcome);
    }

    /// Run a local function for the other side and send back its outcome.
    fn serve(&self, name: String, id: CorrelationId, args: Vec<Value>) {
        trace!(side = %self.side(), name = %name, id, "call in");
        let Some(f) = self.inner.dispatch.local(&name) else {
            warn!(side = %self.side(), name = %name, id, "call for a function not registered here");
            let err = RaisedError::bare(
                REFERENCE_KIND,
                format!("{name} is not a function on the {} side", self.side()),
            );
            self.reply(WireMessage::Error {
                name,
                id,
                error: encode_error(&err),
            });
            return;
        };

        let running = CallHandle::local(&name, self.spawn_local(f, args));
        let bridge = self.clone();
        tokio::spawn(async move {
            let reply = match running.await {
                Ok(result) => WireMessage::Return { name, id, result },
                Err(err) => WireMessage::Error {
                    name,
                    id,
                    error: encode_error(&err.into_raised()),
                },
            };
            bridge.reply(reply);
        });
    }

    /// Send a reply. One that cannot be framed is replaced by a `RangeError`
    /// so the caller still settles.
    fn reply(&self, message: WireMessage) {
        let (name, id) = (message.name().to_string(), message.id());
        let err = match self.inner.adapter.send(message) {
            Ok(()) => return,
            Err(BridgeError::Frame(err @ FrameError::PayloadTooLarge { .. })) => err,
            Err(err) => {
                debug!(side = %self.side(), name = %name, id, error = %err, "reply dropped");
                return;
            }
        };

        warn!(side = %self.side(), name = %name, id, error = %err, "reply too large for the channel");
        let raised = RaisedError::bare(RANGE_KIND, format!("{name} result cannot be sent: {err}"));
        let fallback = WireMessage::Error {
            name,
            id,
            error: encode_error(&raised),
        };
        if let Err(err) = self.inner.adapter.send(fallback) {
            debug!(side = %self.side(), id, error = %err, "reply dropped");
        }
    }
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("side", &self.inner.side)
            .field("timeout", &self.inner.timeout)
            .field("pending", &self.inner.calls.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn to_owned(names: Vec<&str>) -> Vec<String> {
    names.into_iter().map(str::to_string).collect()
}

/// Outcome of a call the channel refused to carry.
fn send_failure(name: &str, err: BridgeError) -> CallError {
    match err {
        BridgeError::Frame(err @ FrameError::PayloadTooLarge { .. }) => CallError::Raised(
            RaisedError::bare(RANGE_KIND, format!("{name} call cannot be sent: {err}")),
        ),
        _ => disconnected(name),
    }
}

fn disconnected(name: &str) -> CallError {
    CallError::Disconnected {
        name: name.to_string(),
    }
}

/// A named function on a bridge, callable any number of times.
#[derive(Clone, Debug)]
pub struct Function {
    bridge: Bridge,
    name: String,
}

impl Function {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if this side runs the implementation.
    pub fn is_local(&self) -> bool {
        matches!(
            self.bridge.inner.dispatch.resolve(&self.name),
            Some(Route::Local(_))
        )
    }

    pub fn call(&self, args: Vec<Value>) -> CallHandle {
        self.bridge.call(&self.name, args)
    }
}

enum HandleState {
    Local(JoinHandle<FunctionResult>),
    Remote {
        id: CorrelationId,
        outcome: oneshot::Receiver<CallOutcome>,
    },
    Ready(Option<CallOutcome>),
}

/// Outcome of one call, resolving exactly once.
///
/// Dropping the handle does not cancel the call.
pub struct CallHandle {
    name: String,
    state: HandleState,
}

impl CallHandle {
    fn local(name: &str, task: JoinHandle<FunctionResult>) -> Self {
        Self {
            name: name.to_string(),
            state: HandleState::Local(task),
        }
    }

    fn remote(name: &str, id: CorrelationId, outcome: oneshot::Receiver<CallOutcome>) -> Self {
        Self {
            name: name.to_string(),
            state: HandleState::Remote { id, outcome },
        }
    }

    fn ready(name: &str, outcome: CallOutcome) -> Self {
        Self {
            name: name.to_string(),
            state: HandleState::Ready(Some(outcome)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Correlation id of a proxied call; `None` for calls run on this side.
    pub fn id(&self) -> Option<CorrelationId> {
        match self.state {
            HandleState::Remote { id, .. } => Some(id),
            _ => None,
        }
    }
}

impl Future for CallHandle {
    type Output = CallOutcome;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let name = &this.name;
        match &mut this.state {
            HandleState::Local(task) => Pin::new(task).poll(cx).map(|joined| match joined {
                Ok(result) => result.map_err(CallError::Raised),
                Err(err) => Err(join_failure(name, err)),
            }),
            HandleState::Remote { outcome, .. } => Pin::new(outcome)
                .poll(cx)
                .map(|settled| settled.unwrap_or_else(|_| Err(disconnected(name)))),
            HandleState::Ready(outcome) => {
                Poll::Ready(outcome.take().unwrap_or_else(|| Err(disconnected(name))))
            }
        }
    }
}

impl fmt::Debug for CallHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallHandle")
            .field("name", &self.name)
            .field("id", &self.id())
            .finish()
    }
}

fn join_failure(name: &str, err: JoinError) -> CallError {
    if err.is_panic() {
        let message = panic_message(err.into_panic());
        warn!(name, panic = %message, "local function panicked");
        CallError::Raised(RaisedError::bare(PANIC_KIND, message))
    } else {
        disconnected(name)
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "function panicked".to_string()
    }
}
