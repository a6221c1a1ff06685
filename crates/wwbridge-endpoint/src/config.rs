use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::adapter::WorkerLocator;
use crate::endpoint::Bridge;
use crate::error::ConfigError;
use crate::registry::{FunctionSet, InitHook, INIT};
use crate::side::Side;

/// Everything needed to build either side of a bridge.
///
/// Host and worker build from the same configuration; each side executes
/// its own set and proxies the other.
#[derive(Clone, Default)]
pub struct BridgeConfig {
    host: FunctionSet,
    worker: FunctionSet,
    timeout: Duration,
    init: Option<InitHook>,
    locator: Option<WorkerLocator>,
}

impl BridgeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Functions implemented by the host.
    pub fn host(mut self, set: FunctionSet) -> Self {
        self.host = set;
        self
    }

    /// Functions implemented by the worker.
    pub fn worker(mut self, set: FunctionSet) -> Self {
        self.worker = set;
        self
    }

    /// Per-call timeout for proxied calls. `Duration::ZERO` disables it.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Hook run on both sides before that side's own initializer.
    pub fn init<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Bridge) + Send + Sync + 'static,
    {
        self.init = Some(Arc::new(hook));
        self
    }

    /// How the host starts its worker.
    pub fn locator(mut self, locator: WorkerLocator) -> Self {
        self.locator = Some(locator);
        self
    }

    /// The set implemented by `side`.
    pub fn functions(&self, side: Side) -> &FunctionSet {
        match side {
            Side::Host => &self.host,
            Side::Worker => &self.worker,
        }
    }

    /// `(local, remote)` as seen from `side`.
    pub fn sets_for(&self, side: Side) -> (&FunctionSet, &FunctionSet) {
        (self.functions(side), self.functions(side.peer()))
    }

    /// Configured timeout; `None` when disabled.
    pub fn call_timeout(&self) -> Option<Duration> {
        Some(self.timeout).filter(|timeout| !timeout.is_zero())
    }

    pub fn init_hook(&self) -> Option<&InitHook> {
        self.init.as_ref()
    }

    pub fn worker_locator(&self) -> Option<&WorkerLocator> {
        self.locator.as_ref()
    }

    /// Check names in both sets.
    ///
    /// Names must be non-empty, must not be `init`, and must be unique
    /// within and across the two sets.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_names(&self.host, Side::Host)?;
        check_names(&self.worker, Side::Worker)?;

        if let Some(name) = self.host.names().find(|name| self.worker.contains(name)) {
            return Err(ConfigError::DuplicateName {
                name: name.to_string(),
                side: Side::Host,
                other: Side::Worker,
            });
        }
        Ok(())
    }

    /// [`validate`](Self::validate), plus: every entry `side` must execute
    /// has an implementation.
    pub fn validate_for(&self, side: Side) -> Result<(), ConfigError> {
        self.validate()?;
        let declared = self
            .functions(side)
            .entries()
            .find(|(_, registration)| !registration.is_function());
        match declared {
            Some((name, _)) => Err(ConfigError::NotAFunction {
                name: name.to_string(),
                side,
            }),
            None => Ok(()),
        }
    }
}

fn check_names(set: &FunctionSet, side: Side) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for name in set.names() {
        if name.is_empty() {
            return Err(ConfigError::EmptyName { side });
        }
        if name == INIT {
            return Err(ConfigError::ReservedName { side });
        }
        if !seen.insert(name) {
            return Err(ConfigError::DuplicateName {
                name: name.to_string(),
                side,
                other: side,
            });
        }
    }
    Ok(())
}

impl fmt::Debug for BridgeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeConfig")
            .field("host", &self.host)
            .field("worker", &self.worker)
            .field("timeout", &self.timeout)
            .field("init", &self.init.is_some())
            .field("locator", &self.locator)
            .finish()
    }
}
