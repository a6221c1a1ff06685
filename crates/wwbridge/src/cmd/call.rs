use serde_json::Value;

use crate::cmd::{open_bridge, timed_call, CallArgs};
use crate::exit::{call_code, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_reports, OutputFormat};

pub fn parse_args(raw: &str) -> CliResult<Vec<Value>> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(args)) => Ok(args),
        Ok(_) => Err(CliError::new(USAGE, "--args must be a JSON array")),
        Err(err) => Err(CliError::new(
            USAGE,
            format!("--args is not valid JSON: {err}"),
        )),
    }
}

pub async fn run(args: CallArgs, format: OutputFormat) -> CliResult<i32> {
    let call_args = parse_args(&args.args)?;
    let Some(bridge) = open_bridge(&args.bridge).await? else {
        return Ok(SUCCESS);
    };

    let (report, failure) = timed_call(&bridge, &args.name, call_args).await;
    print_reports(&[report], format);
    Ok(failure.as_ref().map_or(SUCCESS, call_code))
}
