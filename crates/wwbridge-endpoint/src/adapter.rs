use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;
use wwbridge_frame::{MessagePort, PortSender, WireMessage};
use wwbridge_transport::{Link, WorkerProcess};

use crate::error::{BridgeError, Result};
use crate::side::Side;

/// Per-side binding to the message channel.
///
/// Both variants share this contract and differ only in the transport
/// underneath and in the side (and so the id parity) they report.
pub trait ChannelAdapter: Send + Sync + 'static {
    /// The side this adapter binds.
    fn side(&self) -> Side;

    /// Queue a message for the other side without waiting on the transport.
    fn send(&self, message: WireMessage) -> Result<()>;

    /// Take the inbound message queue. Succeeds once.
    fn subscribe(&mut self) -> Result<mpsc::UnboundedReceiver<WireMessage>>;
}

/// Starts the worker half of an in-process bridge.
pub type WorkerEntry = Arc<dyn Fn(MessagePort) + Send + Sync>;

/// How the host finds and starts its worker.
#[derive(Clone)]
pub enum WorkerLocator {
    /// Spawn a worker process; it talks to the host over its stdin/stdout.
    Command {
        program: PathBuf,
        args: Vec<OsString>,
    },
    /// Hand the worker's port to an entry point in this process.
    InProcess(WorkerEntry),
}

impl WorkerLocator {
    pub fn command<I, S>(program: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        WorkerLocator::Command {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Re-run the current executable as the worker.
    pub fn current_exe<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let program = std::env::current_exe().map_err(wwbridge_transport::TransportError::Io)?;
        Ok(Self::command(program, args))
    }

    pub fn in_process<F>(entry: F) -> Self
    where
        F: Fn(MessagePort) + Send + Sync + 'static,
    {
        WorkerLocator::InProcess(Arc::new(entry))
    }
}

impl fmt::Debug for WorkerLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerLocator::Command { program, args } => f
                .debug_struct("Command")
                .field("program", program)
                .field("args", args)
                .finish(),
            WorkerLocator::InProcess(_) => f.write_str("InProcess"),
        }
    }
}

/// Host-side adapter. Owns the worker it launched.
pub struct HostAdapter {
    sender: PortSender,
    inbound: Option<mpsc::UnboundedReceiver<WireMessage>>,
    worker: Option<WorkerProcess>,
}

impl HostAdapter {
    /// Start the worker named by `locator` and bind to it.
    ///
    /// Must be called within a Tokio runtime.
    pub fn launch(locator: &WorkerLocator) -> Result<Self> {
        match locator {
            WorkerLocator::Command { program, args } => {
                let (process, link) = WorkerProcess::spawn(program, args.iter().cloned())?;
                Ok(Self::bind(MessagePort::from_link(link), Some(process)))
            }
            WorkerLocator::InProcess(entry) => {
                let (host, worker) = MessagePort::pair();
                entry(worker);
                info!("started in-process worker");
                Ok(Self::bind(host, None))
            }
        }
    }

    /// Bind to an already-connected port.
    pub fn from_port(port: MessagePort) -> Self {
        Self::bind(port, None)
    }

    fn bind(port: MessagePort, worker: Option<WorkerProcess>) -> Self {
        let (sender, inbound) = port.into_parts();
        Self {
            sender,
            inbound: Some(inbound),
            worker,
        }
    }

    /// The spawned worker process, if the locator named a command.
    pub fn worker_process(&self) -> Option<&WorkerProcess> {
        self.worker.as_ref()
    }
}

impl ChannelAdapter for HostAdapter {
    fn side(&self) -> Side {
        Side::Host
    }

    fn send(&self, message: WireMessage) -> Result<()> {
        Ok(self.sender.send(message)?)
    }

    fn subscribe(&mut self) -> Result<mpsc::UnboundedReceiver<WireMessage>> {
        self.inbound.take().ok_or(BridgeError::AlreadySubscribed)
    }
}

/// Worker-side adapter. Talks to the host that spawned it.
pub struct WorkerAdapter {
    sender: PortSender,
    inbound: Option<mpsc::UnboundedReceiver<WireMessage>>,
}

impl WorkerAdapter {
    /// Bind to this process's stdin/stdout.
    ///
    /// Must be called within a Tokio runtime.
    pub fn stdio() -> Self {
        Self::from_port(MessagePort::from_link(Link::stdio()))
    }

    /// Bind to an injected port, e.g. from [`WorkerLocator::InProcess`].
    pub fn from_port(port: MessagePort) -> Self {
        let (sender, inbound) = port.into_parts();
        Self {
            sender,
            inbound: Some(inbound),
        }
    }
}

impl ChannelAdapter for WorkerAdapter {
    fn side(&self) -> Side {
        Side::Worker
    }

    fn send(&self, message: WireMessage) -> Result<()> {
        Ok(self.sender.send(message)?)
    }

    fn subscribe(&mut self) -> Result<mpsc::UnboundedReceiver<WireMessage>> {
        self.inbound.take().ok_or(BridgeError::AlreadySubscribed)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn call(id: u64) -> WireMessage {
        WireMessage::Call {
            name: "f".to_string(),
            id,
            args: vec![json!(true)],
        }
    }

    #[tokio::test]
    async fn adapters_reach_each_other() {
        let (a, b) = MessagePort::pair();
        let mut host = HostAdapter::from_port(a);
        let mut worker = WorkerAdapter::from_port(b);
        assert_eq!(host.side(), Side::Host);
        assert_eq!(worker.side(), Side::Worker);

        let mut host_in = host.subscribe().unwrap();
        let mut worker_in = worker.subscribe().unwrap();

        host.send(call(3)).unwrap();
        worker.send(call(2)).unwrap();
        assert_eq!(worker_in.recv().await.unwrap().id(), 3);
        assert_eq!(host_in.recv().await.unwrap().id(), 2);
    }

    #[tokio::test]
    async fn subscribe_succeeds_once() {
        let (a, _b) = MessagePort::pair();
        let mut host = HostAdapter::from_port(a);
        assert!(host.subscribe().is_ok());
        assert!(matches!(
            host.subscribe(),
            Err(BridgeError::AlreadySubscribed)
        ));
    }

    #[tokio::test]
    async fn in_process_locator_hands_over_worker_port() {
        let (tx, rx) = std::sync::mpsc::channel();
        let locator = WorkerLocator::in_process(move |port| {
            let _ = tx.send(port);
        });
        let host = HostAdapter::launch(&locator).unwrap();
        assert!(host.worker_process().is_none());

        let mut worker_port = rx.recv().unwrap();
        host.send(call(5)).unwrap();
        assert_eq!(worker_port.recv().await.unwrap().id(), 5);
    }

    #[test]
    fn locator_debug_hides_entry() {
        let locator = WorkerLocator::in_process(|_port| {});
        assert_eq!(format!("{locator:?}"), "InProcess");
        let command = WorkerLocator::command("/bin/worker", ["--quiet"]);
        assert!(format!("{command:?}").contains("/bin/worker"));
    }
}
