use std::time::Duration;

use wwbridge_frame::{CorrelationId, RaisedError};

use crate::side::Side;

/// Invalid bridge configuration. Raised at construction, never at call time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A function was registered under an empty name.
    #[error("{side} functions must have non-empty names")]
    EmptyName { side: Side },

    /// `init` was registered as an ordinary function.
    #[error("{side} function name 'init' is reserved for the initializer")]
    ReservedName { side: Side },

    /// The same name is registered twice across the two function sets.
    #[error("{side} function {name} found in {other} as well. Names must be unique.")]
    DuplicateName {
        name: String,
        side: Side,
        other: Side,
    },

    /// A name this side must execute has no implementation here.
    #[error("{side} entry '{name}' must be a function")]
    NotAFunction { name: String, side: Side },

    /// The host side has nothing to launch.
    #[error("host side requires a worker locator")]
    MissingLocator,
}

/// Errors that abort bridge construction.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Invalid configuration.
    #[error("invalid bridge configuration: {0}")]
    Config(#[from] ConfigError),

    /// Transport-level error, e.g. the worker failed to spawn.
    #[error("transport error: {0}")]
    Transport(#[from] wwbridge_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] wwbridge_frame::FrameError),

    /// The adapter's inbound queue was already taken.
    #[error("inbound channel already subscribed")]
    AlreadySubscribed,
}

pub type Result<T> = std::result::Result<T, BridgeError>;

/// Failure outcome of a single call. Never affects other calls.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CallError {
    /// The implementation raised, locally or on the other side.
    #[error(transparent)]
    Raised(#[from] RaisedError),

    /// No response arrived within the configured timeout.
    #[error("call timed out: {name} (id {id}) after {after:?}")]
    Timeout {
        name: String,
        id: CorrelationId,
        after: Duration,
    },

    /// Neither side registers a function under this name.
    #[error("no function named '{0}' on this bridge")]
    UnknownFunction(String),

    /// The channel closed before the call settled.
    #[error("bridge disconnected before {name} settled")]
    Disconnected { name: String },
}

impl CallError {
    /// The raised error, if the call failed inside an implementation.
    pub fn raised(&self) -> Option<&RaisedError> {
        match self {
            CallError::Raised(err) => Some(err),
            _ => None,
        }
    }

    /// The failure as a raised error, for a function that forwards the
    /// outcome of a call it made.
    #[track_caller]
    pub fn into_raised(self) -> RaisedError {
        match self {
            CallError::Raised(err) => err,
            other => RaisedError::from_error(&other),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, CallError::Timeout { .. })
    }
}
