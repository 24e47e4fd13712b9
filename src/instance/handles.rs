//! Typed handles behind the inbuilt identities.
//!
//! Each handle is what a spec receives when it declares the corresponding
//! inbuilt identity as a dependency:
//!
//! | identity      | handle         | call                                   |
//! |---------------|----------------|----------------------------------------|
//! | `$get`        | [`Get`]        | `call(identity)` → memoized value      |
//! | `$invoke`     | [`Invoke`]     | `call(&spec)` → spec result            |
//! | `$construct`  | [`Construct`]  | `call(identity)` → fresh value         |
//! | `$on`         | [`On`]         | `call(event, spec)` → [`Unsubscribe`]  |
//! | `$once`       | [`Once`]       | `call(event, spec)` → [`Unsubscribe`]  |
//! | `$publish`    | [`Publish`]    | `call(event, args)`                    |
//! | `$terminate`  | [`Terminate`]  | `call(args)`                           |
//! | `$terminated` | [`Terminated`] | `get()` / `wait().await`               |
//!
//! `$logger` and `$executor` resolve to [`Logger`](crate::Logger) and
//! [`Executor`](crate::Executor) clones directly.
//!
//! Handles hold weak references: once the instance is gone, calls fail with
//! [`Error::Dropped`].

use std::rc::Weak;

use tokio_util::sync::CancellationToken;

use super::instance::{Instance, InstanceInner};
use crate::core::eventual::Eventual;
use crate::error::{Error, Result};
use crate::identity::{Identity, Value};
use crate::module::Spec;
use crate::subscribers::Unsubscribe;

#[derive(Clone)]
pub(crate) struct WeakInstance(pub(crate) Weak<InstanceInner>);

impl WeakInstance {
    fn upgrade(&self) -> Result<Instance> {
        self.0
            .upgrade()
            .map(Instance::from_inner)
            .ok_or(Error::Dropped)
    }
}

/// `$get`: resolves an identity through the root scope.
#[derive(Clone)]
pub struct Get(pub(crate) WeakInstance);

impl Get {
    /// Memoized value of `identity`.
    pub fn call(&self, identity: impl Into<Identity>) -> Result<Eventual<Value>> {
        self.0.upgrade()?.get(identity)
    }
}

/// `$invoke`: calls a spec with resolved dependencies.
#[derive(Clone)]
pub struct Invoke(pub(crate) WeakInstance);

impl Invoke {
    /// Result of `spec`.
    pub fn call(&self, spec: &Spec) -> Result<Eventual<Value>> {
        self.0.upgrade()?.invoke(spec)
    }
}

/// `$construct`: builds an identity in a fresh child scope.
#[derive(Clone)]
pub struct Construct(pub(crate) WeakInstance);

impl Construct {
    /// A new value of `identity`, not shared with the root memo.
    pub fn call(&self, identity: impl Into<Identity>) -> Result<Eventual<Value>> {
        self.0.upgrade()?.construct(identity)
    }
}

/// `$on`: subscribes to an event type.
#[derive(Clone)]
pub struct On(pub(crate) WeakInstance);

impl On {
    /// Registers `spec` for every `event`.
    pub fn call(&self, event: impl Into<String>, spec: Spec) -> Result<Unsubscribe> {
        Ok(self.0.upgrade()?.on(event, spec))
    }
}

/// `$once`: subscribes to the next occurrence of an event type.
#[derive(Clone)]
pub struct Once(pub(crate) WeakInstance);

impl Once {
    /// Registers `spec` for the next `event` only.
    pub fn call(&self, event: impl Into<String>, spec: Spec) -> Result<Unsubscribe> {
        Ok(self.0.upgrade()?.once(event, spec))
    }
}

/// `$publish`: delivers an event to its subscribers.
#[derive(Clone)]
pub struct Publish(pub(crate) WeakInstance);

impl Publish {
    /// Publishes `event` with `args` appended to each subscriber's dependencies.
    pub fn call(&self, event: &str, args: Vec<Value>) -> Result<()> {
        self.0.upgrade()?.publish(event, args);
        Ok(())
    }
}

/// `$terminate`: requests termination.
#[derive(Clone)]
pub struct Terminate(pub(crate) WeakInstance);

impl Terminate {
    /// Terminates the instance; `args` are passed to `exit` subscribers.
    pub fn call(&self, args: Vec<Value>) -> Result<()> {
        self.0.upgrade()?.terminate(args);
        Ok(())
    }
}

/// `$terminated`: termination state.
#[derive(Clone)]
pub struct Terminated(pub(crate) CancellationToken);

impl Terminated {
    /// True once `terminate` has been called.
    pub fn get(&self) -> bool {
        self.0.is_cancelled()
    }

    /// Completes once `terminate` has been called.
    pub async fn wait(&self) {
        self.0.cancelled().await;
    }
}
