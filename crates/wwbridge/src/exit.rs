use std::fmt;
use std::io;

use wwbridge_endpoint::{BridgeError, CallError};
use wwbridge_frame::FrameError;
use wwbridge_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::BrokenPipe | io::ErrorKind::UnexpectedEof => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Spawn { program, source } => io_error(
            &format!("{context}: cannot start {}", program.display()),
            source,
        ),
        TransportError::Io(source) => io_error(context, source),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::PayloadTooLarge { .. } | FrameError::Json(_) | FrameError::InvalidMagic => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
    }
}

pub fn bridge_error(context: &str, err: BridgeError) -> CliError {
    match err {
        BridgeError::Config(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        BridgeError::Transport(err) => transport_error(context, err),
        BridgeError::Frame(err) => frame_error(context, err),
        BridgeError::AlreadySubscribed => CliError::new(INTERNAL, format!("{context}: {err}")),
    }
}

/// Exit code for the outcome of a single call.
pub fn call_code(err: &CallError) -> i32 {
    match err {
        CallError::Raised(_) | CallError::Disconnected { .. } => FAILURE,
        CallError::Timeout { .. } => TIMEOUT,
        CallError::UnknownFunction(_) => USAGE,
    }
}

/// Exit code for a failure caused by the bridge rather than raised by the
/// function itself.
pub fn bridge_code(err: &CallError) -> i32 {
    match err {
        CallError::Raised(_) => SUCCESS,
        other => call_code(other),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use wwbridge_endpoint::{ConfigError, RaisedError};

    use super::*;

    #[test]
    fn call_failures_map_to_distinct_codes() {
        let timeout = CallError::Timeout {
            name: "test1".to_string(),
            id: 3,
            after: Duration::from_millis(50),
        };
        assert_eq!(call_code(&timeout), TIMEOUT);
        assert_eq!(call_code(&CallError::UnknownFunction("x".into())), USAGE);
        assert_eq!(
            call_code(&CallError::Raised(RaisedError::msg("boom"))),
            FAILURE
        );
    }

    #[test]
    fn raised_errors_do_not_count_as_bridge_failures() {
        let raised = CallError::Raised(RaisedError::msg("1000 Error in promise"));
        assert_eq!(bridge_code(&raised), SUCCESS);
        let gone = CallError::Disconnected {
            name: "test1".to_string(),
        };
        assert_eq!(bridge_code(&gone), FAILURE);
    }

    #[test]
    fn spawn_failure_of_missing_program_is_internal() {
        let err = TransportError::Spawn {
            program: "/no/such/worker".into(),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        let cli = bridge_error("launch failed", err.into());
        assert_eq!(cli.code, INTERNAL);
        assert!(cli.message.contains("/no/such/worker"));
    }

    #[test]
    fn config_errors_are_data_invalid() {
        let cli = bridge_error("build failed", ConfigError::MissingLocator.into());
        assert_eq!(cli.code, DATA_INVALID);
    }
}
