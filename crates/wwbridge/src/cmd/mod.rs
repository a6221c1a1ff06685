use std::time::{Duration, Instant};

use clap::{Args, Subcommand};
use serde_json::Value;
use tracing::{debug, info, warn};
use wwbridge_endpoint::{create, Bridge, CallError, ProcessEnvironment, Side, WorkerLocator};

use crate::exit::{bridge_error, io_error, CliError, CliResult, USAGE};
use crate::output::{CallReport, OutputFormat};

pub mod call;
pub mod demo;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Launch a worker and call each of its demo functions.
    ///
    /// Errors raised by the demo functions are expected and reported only.
    /// The exit status reflects timeouts, disconnects and unknown names.
    Demo(DemoArgs),
    /// Launch a worker and issue a single call.
    Call(CallArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Demo(args) => block_on(demo::run(args, format)),
        Command::Call(args) => block_on(call::run(args, format)),
        Command::Version(args) => version::run(args),
    }
}

fn block_on<F>(future: F) -> CliResult<i32>
where
    F: std::future::Future<Output = CliResult<i32>>,
{
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| io_error("runtime setup failed", err))?;
    let result = runtime.block_on(future);
    // A worker's stdin reader may still be parked on a blocking thread.
    runtime.shutdown_background();
    result
}

/// Options shared by both sides of the demo bridge.
///
/// The worker is this same command line re-run, so both sides parse
/// identical values.
#[derive(Args, Debug, Clone)]
pub struct BridgeArgs {
    /// Per-call timeout for proxied calls (e.g. 5s, 500ms). 0 disables it.
    #[arg(long, default_value = "0")]
    pub timeout: String,
    /// Delay before the slow demo functions settle (e.g. 250ms).
    #[arg(long, default_value = "250ms")]
    pub delay: String,
}

#[derive(Args, Debug)]
pub struct DemoArgs {
    #[command(flatten)]
    pub bridge: BridgeArgs,
}

#[derive(Args, Debug)]
pub struct CallArgs {
    /// Function to call.
    pub name: String,
    /// Positional arguments as a JSON array.
    #[arg(long, default_value = "[]")]
    pub args: String,
    #[command(flatten)]
    pub bridge: BridgeArgs,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Build this process's side of the demo bridge.
///
/// On the worker side this serves the host until it goes away, then
/// returns `None`.
async fn open_bridge(args: &BridgeArgs) -> CliResult<Option<Bridge>> {
    let timeout = parse_duration(&args.timeout)?;
    let delay = parse_duration(&args.delay)?;
    let locator = WorkerLocator::current_exe(std::env::args_os().skip(1))
        .map_err(|err| bridge_error("cannot locate worker executable", err))?;

    let config = demo::config(timeout, delay).locator(locator);
    let bridge = create(&config, &ProcessEnvironment)
        .map_err(|err| bridge_error("bridge setup failed", err))?;

    if bridge.side() == Side::Worker {
        serve(bridge).await;
        return Ok(None);
    }
    Ok(Some(bridge))
}

async fn serve(bridge: Bridge) {
    info!(functions = ?bridge.local_names(), "worker serving");
    tokio::select! {
        _ = bridge.closed() => debug!("host went away"),
        interrupted = tokio::signal::ctrl_c() => match interrupted {
            Ok(()) => info!("worker interrupted"),
            Err(err) => {
                warn!(error = %err, "cannot listen for interrupts");
                bridge.closed().await;
            }
        },
    }
}

/// Call `name` and report the outcome, keeping the failure for exit codes.
async fn timed_call(
    bridge: &Bridge,
    name: &str,
    args: Vec<Value>,
) -> (CallReport, Option<CallError>) {
    let started = Instant::now();
    let outcome = bridge.call(name, args).await;
    let report = CallReport::new(name, &outcome, started.elapsed());
    (report, outcome.err())
}

/// Parse "5s", "500ms" or a bare number of seconds. Zero is allowed.
fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
