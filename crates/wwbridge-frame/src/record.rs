use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt;
use std::panic::Location;

use serde::{Deserialize, Serialize};

/// Kind given to errors wrapped from arbitrary `std::error::Error` values.
pub const GENERIC_KIND: &str = "Error";

/// Kind given to a local function that panicked.
pub const PANIC_KIND: &str = "Panic";

/// Kind given to a call naming a function the receiving side does not own.
pub const REFERENCE_KIND: &str = "ReferenceError";

/// Kind given to a call or result too large to cross the channel.
pub const RANGE_KIND: &str = "RangeError";

fn default_kind() -> String {
    GENERIC_KIND.to_string()
}

/// Transportable shape of a raised error.
///
/// Only diagnostic text survives the crossing; absent fields stay absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    /// Error kind, e.g. `TypeError`.
    #[serde(default = "default_kind")]
    pub name: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// An error raised by a bridged function.
///
/// Local functions fail with this type, and a failure that crossed the
/// bridge is rebuilt as this type, so callers see the same shape either way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaisedError {
    kind: String,
    message: String,
    file_name: Option<String>,
    line_number: Option<u32>,
    column_number: Option<u32>,
    stack: Option<String>,
}

impl RaisedError {
    /// Raise an error of `kind`, located at the caller.
    ///
    /// A stack trace is attached only when backtraces are enabled for the
    /// process (`RUST_BACKTRACE`).
    #[track_caller]
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        let location = Location::caller();
        let backtrace = Backtrace::capture();
        let stack = match backtrace.status() {
            BacktraceStatus::Captured => Some(backtrace.to_string()),
            _ => None,
        };

        Self {
            kind: kind.into(),
            message: message.into(),
            file_name: Some(location.file().to_string()),
            line_number: Some(location.line()),
            column_number: Some(location.column()),
            stack,
        }
    }

    /// Raise a plain `Error` with `message`.
    #[track_caller]
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new(GENERIC_KIND, message)
    }

    /// Wrap any error, keeping its source chain in the message.
    #[track_caller]
    pub fn from_error<E>(err: &E) -> Self
    where
        E: std::error::Error + ?Sized,
    {
        let mut message = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        Self::new(GENERIC_KIND, message)
    }

    /// An error carrying only kind and message, with no diagnostics.
    pub fn bare(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            file_name: None,
            line_number: None,
            column_number: None,
            stack: None,
        }
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn line_number(&self) -> Option<u32> {
        self.line_number
    }

    pub fn column_number(&self) -> Option<u32> {
        self.column_number
    }

    pub fn stack(&self) -> Option<&str> {
        self.stack.as_deref()
    }
}

impl fmt::Display for RaisedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for RaisedError {}

/// Copy the diagnostic fields of `err` into a transportable record.
pub fn encode_error(err: &RaisedError) -> ErrorRecord {
    ErrorRecord {
        name: err.kind.clone(),
        message: err.message.clone(),
        file_name: err.file_name.clone(),
        line_number: err.line_number,
        column_number: err.column_number,
        stack: err.stack.clone(),
    }
}

/// Rebuild an error from a record received over the bridge.
pub fn decode_error(record: ErrorRecord) -> RaisedError {
    RaisedError {
        kind: record.name,
        message: record.message,
        file_name: record.file_name,
        line_number: record.line_number,
        column_number: record.column_number,
        stack: record.stack,
    }
}

impl From<&RaisedError> for ErrorRecord {
    fn from(err: &RaisedError) -> Self {
        encode_error(err)
    }
}

impl From<ErrorRecord> for RaisedError {
    fn from(record: ErrorRecord) -> Self {
        decode_error(record)
    }
}
