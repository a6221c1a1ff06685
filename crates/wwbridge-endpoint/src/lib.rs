//! Symmetric async call bridge between a host and its worker.
//!
//! Each side registers the functions it implements and names the functions
//! the other side implements. Local functions run in place; remote ones are
//! proxied over the message channel and correlated by id. Either side may
//! call the other at any time, and neither ever blocks its message loop.

pub mod adapter;
pub mod call_table;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod factory;
pub mod registry;
pub mod side;

pub use adapter::{ChannelAdapter, HostAdapter, WorkerAdapter, WorkerEntry, WorkerLocator};
pub use call_table::{CallOutcome, CallTable};
pub use config::BridgeConfig;
pub use endpoint::{Bridge, CallHandle, Function};
pub use error::{BridgeError, CallError, ConfigError, Result};
pub use factory::{connect, create, in_memory, in_process_worker, Environment, ProcessEnvironment};
pub use registry::{BoxFuture, FunctionResult, FunctionSet, InitHook, Registration, INIT};
pub use side::{IdSequence, Side};

pub use wwbridge_frame::{CorrelationId, ErrorRecord, RaisedError, WireMessage};
