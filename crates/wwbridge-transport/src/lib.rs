//! Byte links between the two sides of a wwbridge.
//!
//! This is the lowest layer of wwbridge. A [`Link`] is a pair of async byte
//! halves, regardless of what sits underneath:
//! - the piped stdin/stdout of a spawned worker process (host side)
//! - the process's own stdin/stdout (worker side)
//! - an in-memory duplex pipe (in-process workers, tests)
//!
//! Everything else builds on top of the [`Link`] type provided here.

pub mod error;
pub mod link;
pub mod process;

pub use error::{Result, TransportError};
pub use link::{Link, LinkReader, LinkWriter, DEFAULT_MEMORY_CAPACITY};
pub use process::{is_worker_process, WorkerProcess, ROLE_ENV, WORKER_ROLE};
