use std::path::PathBuf;

/// Errors that can occur while establishing or driving a link.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to spawn the worker process.
    #[error("failed to spawn worker {program}: {source}")]
    Spawn {
        program: PathBuf,
        source: std::io::Error,
    },

    /// The spawned process did not expose one of its stdio pipes.
    #[error("worker process has no {0} pipe")]
    MissingPipe(&'static str),

    /// An I/O error occurred on the link.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
