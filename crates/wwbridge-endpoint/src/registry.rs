use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use wwbridge_frame::RaisedError;

use crate::endpoint::Bridge;

/// Reserved name of the per-side initializer. Never proxied.
pub const INIT: &str = "init";

/// Boxed, sendable future.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// What a bridged function produces.
pub type FunctionResult = std::result::Result<Value, RaisedError>;

/// Type-erased local implementation.
pub type LocalFn = Arc<dyn Fn(Bridge, Vec<Value>) -> BoxFuture<FunctionResult> + Send + Sync>;

/// One-time setup hook, run with the freshly built bridge.
pub type InitHook = Arc<dyn Fn(&Bridge) + Send + Sync>;

/// One entry of a [`FunctionSet`].
#[derive(Clone)]
pub enum Registration {
    /// An implementation that runs on the side owning this set.
    Function(LocalFn),
    /// A name only; the body is linked into the owning side's binary alone.
    Declared,
}

impl Registration {
    pub fn is_function(&self) -> bool {
        matches!(self, Registration::Function(_))
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Registration::Function(_) => f.write_str("Function"),
            Registration::Declared => f.write_str("Declared"),
        }
    }
}

/// The functions one side owns, plus that side's initializer.
///
/// The same set is local on its owning side and remote on the other.
#[derive(Clone, Default)]
pub struct FunctionSet {
    entries: Vec<(String, Registration)>,
    init: Option<InitHook>,
}

impl FunctionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an implementation under `name`.
    ///
    /// The function receives the bridge it runs on, so it can call any
    /// other registered function, local or remote.
    pub fn function<F, Fut>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Bridge, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FunctionResult> + Send + 'static,
    {
        let f: LocalFn = Arc::new(
            move |bridge: Bridge, args: Vec<Value>| -> BoxFuture<FunctionResult> {
                Box::pin(f(bridge, args))
            },
        );
        self.entries.push((name.into(), Registration::Function(f)));
        self
    }

    /// Name a function without providing its body.
    pub fn declare(mut self, name: impl Into<String>) -> Self {
        self.entries.push((name.into(), Registration::Declared));
        self
    }

    /// Set the initializer run once on the side owning this set.
    pub fn init<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Bridge) + Send + Sync + 'static,
    {
        self.init = Some(Arc::new(hook));
        self
    }

    pub fn init_hook(&self) -> Option<&InitHook> {
        self.init.as_ref()
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&Registration> {
        self.entries
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, registration)| registration)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &Registration)> {
        self.entries
            .iter()
            .map(|(name, registration)| (name.as_str(), registration))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for FunctionSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionSet")
            .field("entries", &self.entries)
            .field("init", &self.init.is_some())
            .finish()
    }
}

/// Where a name resolves on one endpoint.
pub(crate) enum Route<'a> {
    Local(&'a LocalFn),
    Remote,
}

/// Name → implementation table, built once per endpoint.
pub(crate) struct Dispatch {
    local: HashMap<String, LocalFn>,
    remote: HashSet<String>,
}

impl Dispatch {
    /// Build from validated sets.
    pub(crate) fn build(local: &FunctionSet, remote: &FunctionSet) -> Self {
        let local = local
            .entries()
            .filter_map(|(name, registration)| match registration {
                Registration::Function(f) => Some((name.to_string(), Arc::clone(f))),
                Registration::Declared => None,
            })
            .collect();
        let remote = remote
            .names()
            .filter(|name| *name != INIT)
            .map(str::to_string)
            .collect();
        Self { local, remote }
    }

    pub(crate) fn resolve(&self, name: &str) -> Option<Route<'_>> {
        if let Some(f) = self.local.get(name) {
            return Some(Route::Local(f));
        }
        self.remote.contains(name).then_some(Route::Remote)
    }

    pub(crate) fn local(&self, name: &str) -> Option<&LocalFn> {
        self.local.get(name)
    }

    pub(crate) fn local_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.local.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub(crate) fn remote_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.remote.iter().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_set() -> FunctionSet {
        FunctionSet::new()
            .function("ping", |_bridge, _args| async { Ok(Value::Null) })
            .declare("pong")
            .init(|_bridge| {})
    }

    #[test]
    fn set_keeps_registration_order() {
        let set = noop_set();
        assert_eq!(set.names().collect::<Vec<_>>(), vec!["ping", "pong"]);
        assert!(set.get("ping").is_some_and(Registration::is_function));
        assert!(set.get("pong").is_some_and(|r| !r.is_function()));
        assert!(set.init_hook().is_some());
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn dispatch_routes_local_before_remote() {
        let local = FunctionSet::new().function("a", |_b, _args| async { Ok(Value::Null) });
        let remote = FunctionSet::new().declare("b").declare(INIT);
        let dispatch = Dispatch::build(&local, &remote);

        assert!(matches!(dispatch.resolve("a"), Some(Route::Local(_))));
        assert!(matches!(dispatch.resolve("b"), Some(Route::Remote)));
        assert!(dispatch.resolve(INIT).is_none());
        assert!(dispatch.resolve("c").is_none());
        assert_eq!(dispatch.local_names(), vec!["a"]);
        assert_eq!(dispatch.remote_names(), vec!["b"]);
    }
}
