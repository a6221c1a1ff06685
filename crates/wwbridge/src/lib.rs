//! Symmetric async function calls between a host and its worker.
//!
//! A host launches a worker and both sides register the functions they
//! implement. Either side calls any registered function the same way,
//! whether it runs locally or on the other side of the channel.
//!
//! # Crate Structure
//!
//! - [`transport`]: Byte links and worker process spawning
//! - [`frame`]: Wire messages, error records and framing
//! - [`endpoint`]: Bridge construction, dispatch and call correlation

/// Re-export transport types.
pub mod transport {
    pub use wwbridge_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use wwbridge_frame::*;
}

/// Re-export endpoint types.
pub mod endpoint {
    pub use wwbridge_endpoint::*;
}

pub use wwbridge_endpoint::{
    create, in_memory, Bridge, BridgeConfig, BridgeError, CallError, FunctionSet,
    ProcessEnvironment, RaisedError, Side, WorkerLocator,
};
