use std::io::IsTerminal;
use std::time::Duration;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serde_json::Value;
use wwbridge_endpoint::{CallError, CallOutcome, ErrorRecord};
use wwbridge_frame::encode_error;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// One finished call, as printed.
#[derive(Debug, Serialize)]
pub struct CallReport {
    pub schema_id: &'static str,
    pub name: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorRecord>,
    pub elapsed_ms: u64,
}

impl CallReport {
    pub fn new(name: &str, outcome: &CallOutcome, elapsed: Duration) -> Self {
        let (value, error) = match outcome {
            Ok(value) => (Some(value.clone()), None),
            Err(err) => (None, Some(error_record(err))),
        };
        Self {
            schema_id: "https://schemas.3leaps.dev/wwbridge/cli/v1/call-report.schema.json",
            name: name.to_string(),
            ok: outcome.is_ok(),
            value,
            error,
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        }
    }

    fn summary(&self) -> String {
        match (&self.value, &self.error) {
            (Some(value), _) => display_value(value),
            (None, Some(error)) => format!("{}: {}", error.name, error.message),
            (None, None) => String::new(),
        }
    }
}

/// Failures that never crossed the bridge still print as error records.
fn error_record(err: &CallError) -> ErrorRecord {
    match err {
        CallError::Raised(raised) => encode_error(raised),
        CallError::Timeout { .. } => bare_record("TimeoutError", err),
        CallError::UnknownFunction(_) => bare_record("ReferenceError", err),
        CallError::Disconnected { .. } => bare_record("DisconnectedError", err),
    }
}

fn bare_record(kind: &str, err: &CallError) -> ErrorRecord {
    ErrorRecord {
        name: kind.to_string(),
        message: err.to_string(),
        file_name: None,
        line_number: None,
        column_number: None,
        stack: None,
    }
}

pub fn print_reports(reports: &[CallReport], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for report in reports {
                println!(
                    "{}",
                    serde_json::to_string(report).unwrap_or_else(|_| "{}".to_string())
                );
            }
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FUNCTION", "STATUS", "ELAPSED", "RESULT"]);
            for report in reports {
                table.add_row(vec![
                    report.name.clone(),
                    status(report).to_string(),
                    format!("{}ms", report.elapsed_ms),
                    report.summary(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for report in reports {
                println!(
                    "{} {} ({}ms): {}",
                    report.name,
                    status(report),
                    report.elapsed_ms,
                    report.summary()
                );
            }
        }
    }
}

fn status(report: &CallReport) -> &'static str {
    if report.ok {
        "ok"
    } else {
        "error"
    }
}

/// Strings print bare; everything else prints as JSON.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wwbridge_endpoint::RaisedError;

    use super::*;

    #[test]
    fn report_carries_value_or_error() {
        let ok = CallReport::new("test3", &Ok(json!("1000 cba")), Duration::from_millis(4));
        assert!(ok.ok);
        assert_eq!(ok.summary(), "1000 cba");

        let failed = CallReport::new(
            "test4",
            &Err(CallError::Raised(RaisedError::bare("Error", "1001 Error in function"))),
            Duration::ZERO,
        );
        assert!(!failed.ok);
        assert_eq!(failed.summary(), "Error: 1001 Error in function");

        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["error"]["name"], "Error");
        assert!(json.get("value").is_none());
    }

    #[test]
    fn local_failures_get_a_kind() {
        let report = CallReport::new(
            "nope",
            &Err(CallError::UnknownFunction("nope".to_string())),
            Duration::ZERO,
        );
        assert_eq!(report.error.as_ref().map(|e| e.name.as_str()), Some("ReferenceError"));
    }

    #[test]
    fn display_value_unquotes_strings() {
        assert_eq!(display_value(&json!("abc")), "abc");
        assert_eq!(display_value(&json!([1, 2])), "[1,2]");
    }
}
