//! Wire messages and length-prefixed framing for wwbridge.
//!
//! Every message crossing the bridge is a JSON array carried in one frame:
//! - A 2-byte magic number ("WB") for stream synchronization
//! - A 4-byte little-endian payload length
//! - The JSON payload: `[op, name, id, payload]`
//!
//! Raised errors never cross as live values; they travel as an
//! [`ErrorRecord`] and are rebuilt on the far side.

pub mod codec;
pub mod error;
pub mod message;
pub mod port;
pub mod record;

pub use codec::{decode_frame, encode_frame, FrameConfig, WireCodec, DEFAULT_MAX_PAYLOAD, HEADER_SIZE};
pub use error::{FrameError, Result};
pub use message::{CorrelationId, Op, WireMessage};
pub use port::{MessagePort, PortSender};
pub use record::{decode_error, encode_error, ErrorRecord, RaisedError};
