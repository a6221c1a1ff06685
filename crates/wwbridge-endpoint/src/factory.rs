use tracing::debug;
use wwbridge_frame::MessagePort;
use wwbridge_transport::is_worker_process;

use crate::adapter::{ChannelAdapter, HostAdapter, WorkerAdapter, WorkerLocator};
use crate::config::BridgeConfig;
use crate::endpoint::{Bridge, Endpoint};
use crate::error::{ConfigError, Result};
use crate::registry::Dispatch;
use crate::side::Side;

/// Tells the factory which side of the bridge this process is.
pub trait Environment {
    fn side(&self) -> Side;
}

/// Detects the side from the role variable a host sets on its workers.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
    fn side(&self) -> Side {
        if is_worker_process() {
            Side::Worker
        } else {
            Side::Host
        }
    }
}

impl Environment for Side {
    fn side(&self) -> Side {
        *self
    }
}

/// Build the side `env` names.
///
/// A worker binds to its own stdin/stdout. A host launches the worker its
/// configuration locates. Configuration errors surface here, before any
/// message is sent.
pub fn create(config: &BridgeConfig, env: &dyn Environment) -> Result<Bridge> {
    let side = env.side();
    config.validate_for(side)?;
    debug!(side = %side, "creating bridge");

    match side {
        Side::Worker => start(config, Box::new(WorkerAdapter::stdio())),
        Side::Host => {
            let locator = config
                .worker_locator()
                .ok_or(ConfigError::MissingLocator)?;
            start(config, Box::new(HostAdapter::launch(locator)?))
        }
    }
}

/// Build the side `adapter` is bound to, over that adapter.
pub fn connect(config: &BridgeConfig, adapter: impl ChannelAdapter) -> Result<Bridge> {
    config.validate_for(adapter.side())?;
    start(config, Box::new(adapter))
}

/// Both sides of one bridge, wired together in memory.
///
/// Returns `(host, worker)`.
pub fn in_memory(config: &BridgeConfig) -> Result<(Bridge, Bridge)> {
    config.validate_for(Side::Host)?;
    config.validate_for(Side::Worker)?;

    let (host_port, worker_port) = MessagePort::pair();
    let worker = start(config, Box::new(WorkerAdapter::from_port(worker_port)))?;
    let host = start(config, Box::new(HostAdapter::from_port(host_port)))?;
    Ok((host, worker))
}

/// A locator that runs the worker side of `config` inside this process.
///
/// The worker bridge lives until the host side goes away.
pub fn in_process_worker(config: &BridgeConfig) -> WorkerLocator {
    let config = config.clone();
    WorkerLocator::in_process(move |port| {
        match connect(&config, WorkerAdapter::from_port(port)) {
            Ok(bridge) => {
                tokio::spawn(async move { bridge.closed().await });
            }
            Err(err) => tracing::error!(error = %err, "in-process worker failed to start"),
        }
    })
}

fn start(config: &BridgeConfig, adapter: Box<dyn ChannelAdapter>) -> Result<Bridge> {
    let side = adapter.side();
    let (local, remote) = config.sets_for(side);
    let hooks = config
        .init_hook()
        .into_iter()
        .chain(local.init_hook())
        .cloned()
        .collect();
    Endpoint::start(adapter, Dispatch::build(local, remote), config.call_timeout(), hooks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;

    #[test]
    fn side_is_its_own_environment() {
        assert_eq!(Side::Worker.side(), Side::Worker);
        assert_eq!(Side::Host.side(), Side::Host);
    }

    #[tokio::test]
    async fn host_without_locator_is_rejected() {
        let err = create(&BridgeConfig::new(), &Side::Host).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Config(ConfigError::MissingLocator)
        ));
    }
}
