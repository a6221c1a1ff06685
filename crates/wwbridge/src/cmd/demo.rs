use std::future::Future;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::info;
use wwbridge_endpoint::{Bridge, BridgeConfig, CallError, FunctionResult, FunctionSet, RaisedError};

use crate::cmd::{open_bridge, timed_call, DemoArgs};
use crate::exit::{bridge_code, CliResult, SUCCESS};
use crate::output::{print_reports, OutputFormat};

pub const HOST_COUNTER_START: i64 = 2000;
pub const WORKER_COUNTER_START: i64 = 1000;

/// State behind one side's demo functions.
#[derive(Debug)]
struct DemoState {
    counter: AtomicI64,
    delay: Duration,
}

impl DemoState {
    fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            counter: AtomicI64::new(0),
            delay,
        })
    }

    fn reset(&self, start: i64) {
        self.counter.store(start, Ordering::SeqCst);
    }

    fn next(&self) -> i64 {
        self.counter.fetch_add(1, Ordering::SeqCst)
    }
}

/// Adapt a demo function taking side state to a bridged function.
fn bind<F, Fut>(
    state: &Arc<DemoState>,
    f: F,
) -> impl Fn(Bridge, Vec<Value>) -> Fut + Send + Sync + 'static
where
    F: Fn(Bridge, Arc<DemoState>, Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = FunctionResult> + Send + 'static,
{
    let state = Arc::clone(state);
    move |bridge, args| f(bridge, Arc::clone(&state), args)
}

fn joined<'a>(args: impl Iterator<Item = &'a Value>) -> String {
    args.map(crate::output::display_value).collect()
}

async fn tset1(_bridge: Bridge, state: Arc<DemoState>, args: Vec<Value>) -> FunctionResult {
    Ok(json!(format!("{} {}", state.next(), joined(args.iter()))))
}

/// Answers by calling back into the host.
async fn test1(bridge: Bridge, state: Arc<DemoState>, args: Vec<Value>) -> FunctionResult {
    tokio::time::sleep(state.delay).await;
    bridge
        .call("tset1", args)
        .await
        .map_err(CallError::into_raised)
}

async fn test2(_bridge: Bridge, state: Arc<DemoState>, _args: Vec<Value>) -> FunctionResult {
    tokio::time::sleep(state.delay).await;
    Err(RaisedError::msg(format!("{} Error in promise", state.next())))
}

async fn test3(_bridge: Bridge, state: Arc<DemoState>, args: Vec<Value>) -> FunctionResult {
    Ok(json!(format!("{} {}", state.next(), joined(args.iter().rev()))))
}

async fn test4(_bridge: Bridge, state: Arc<DemoState>, _args: Vec<Value>) -> FunctionResult {
    Err(RaisedError::msg(format!("{} Error in function", state.next())))
}

/// The demo bridge: the host implements `tset1`, the worker `test1`..`test4`.
pub fn config(timeout: Duration, delay: Duration) -> BridgeConfig {
    let host = DemoState::new(delay);
    let worker = DemoState::new(delay);

    let host_set = FunctionSet::new()
        .init({
            let host = Arc::clone(&host);
            move |_bridge| host.reset(HOST_COUNTER_START)
        })
        .function("tset1", bind(&host, tset1));

    let worker_set = FunctionSet::new()
        .init({
            let worker = Arc::clone(&worker);
            move |_bridge| worker.reset(WORKER_COUNTER_START)
        })
        .function("test1", bind(&worker, test1))
        .function("test2", bind(&worker, test2))
        .function("test3", bind(&worker, test3))
        .function("test4", bind(&worker, test4));

    BridgeConfig::new()
        .timeout(timeout)
        .init(|bridge| info!(side = %bridge.side(), "demo bridge initialized"))
        .host(host_set)
        .worker(worker_set)
}

pub async fn run(args: DemoArgs, format: OutputFormat) -> CliResult<i32> {
    let Some(bridge) = open_bridge(&args.bridge).await? else {
        return Ok(SUCCESS);
    };

    let calls = [
        ("test1", vec![json!(1), json!(2), json!(3)]),
        ("test2", vec![]),
        ("test3", vec![json!("a"), json!("b"), json!("c")]),
        ("test4", vec![]),
    ];
    let mut reports = Vec::with_capacity(calls.len());
    let mut code = SUCCESS;
    for (name, call_args) in calls {
        let (report, failure) = timed_call(&bridge, name, call_args).await;
        code = code.max(failure.as_ref().map_or(SUCCESS, bridge_code));
        reports.push(report);
    }

    print_reports(&reports, format);
    Ok(code)
}

#[cfg(test)]
mod tests {
    use wwbridge_endpoint::in_memory;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn demo_functions_count_per_side() {
        let config = config(Duration::ZERO, Duration::from_millis(100));
        let (host, _worker) = in_memory(&config).expect("demo bridge should build");

        let echoed = host
            .call("test1", vec![json!(1), json!(2), json!(3)])
            .await
            .expect("test1 calls back into the host");
        assert_eq!(echoed, json!("2000 123"));

        let err = host.call("test2", vec![]).await.unwrap_err();
        assert_eq!(err.raised().map(RaisedError::message), Some("1000 Error in promise"));

        let reversed = host
            .call("test3", vec![json!("a"), json!("b"), json!("c")])
            .await
            .expect("test3");
        assert_eq!(reversed, json!("1001 cba"));

        let err = host.call("test4", vec![]).await.unwrap_err();
        assert_eq!(err.raised().map(RaisedError::kind), Some("Error"));
        assert_eq!(err.raised().map(RaisedError::message), Some("1002 Error in function"));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_demo_call_times_out() {
        let config = config(Duration::from_millis(50), Duration::from_secs(2));
        let (host, _worker) = in_memory(&config).expect("demo bridge should build");
        let err = host.call("test1", vec![]).await.unwrap_err();
        assert!(err.is_timeout());
    }
}
