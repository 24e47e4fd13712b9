//! # Instance: one running execution of a module.
//!
//! The [`Instance`] binds an immutable template snapshot to a root [`Scope`]
//! (pre-seeded with the inbuilt handles), an [`Executor`] and a
//! [`SubscriberSet`].
//!
//! ## Lifecycle
//! ```text
//! Created ──run()──► Running ──terminate()──► Terminating ──exit drain──► Terminated
//!
//! run():
//!   ├─► post every scheduled entry point
//!   ├─► primary drain: executor.run(cfg.budget)     (first error retained)
//!   │     └─ optional: OS signal ─► terminate(signal name)
//!   ├─► terminate()                                 (idempotent; publishes "exit")
//!   ├─► exit drain: executor.run(cfg.grace)         (exit subscribers flush)
//!   └─► Terminated; return retained error, if any
//! ```
//!
//! ## Rules
//! - `terminate()` publishes `exit` exactly once, with its arguments.
//! - Subscribers without dependencies are posted with the event arguments;
//!   subscribers with dependencies are resolved then invoked through the
//!   executor, so their failures surface from `run()`.
//! - A budget stops waiting; in-flight futures are not cancelled.

use std::cell::Cell;
use std::rc::Rc;

use tokio_util::sync::CancellationToken;

use super::handles::{
    Construct, Get, Invoke, On, Once, Publish, Terminate, Terminated, WeakInstance,
};
use super::scope::{Overlay, Scope};
use crate::config::Config;
use crate::core::eventual::Eventual;
use crate::core::executor::Executor;
use crate::error::Result;
use crate::identity::{Identity, Value, unit, value};
use crate::logger::Logger;
use crate::module::{Args, Spec, Template};
use crate::subscribers::{SubscriberSet, Unsubscribe};

/// Event published once on termination.
pub const EXIT: &str = "exit";

/// Lifecycle state of an [`Instance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Built, not yet running.
    Created,
    /// Draining scheduled work.
    Running,
    /// `terminate()` was called; exit work is draining.
    Terminating,
    /// Exit drain finished.
    Terminated,
}

pub(crate) struct InstanceInner {
    executor: Executor,
    subscribers: Rc<SubscriberSet>,
    scope: Rc<Scope>,
    template: Rc<Template>,
    token: CancellationToken,
    state: Cell<LifecycleState>,
    started: Cell<bool>,
    logger: Logger,
    config: Config,
}

/// One running execution of a module. Cheap to clone.
#[derive(Clone)]
pub struct Instance {
    inner: Rc<InstanceInner>,
}

impl Instance {
    /// Builds an instance over `template` with its own executor.
    pub fn new(template: Rc<Template>, config: Config) -> Self {
        let inner = Rc::new_cyclic(|weak| {
            let executor = Executor::new();
            let token = CancellationToken::new();
            let logger = Logger::new(config.log_capacity_clamped());
            let handle = WeakInstance(weak.clone());

            let seeds: [(&'static str, Value); 10] = [
                ("$get", value(Get(handle.clone()))),
                ("$invoke", value(Invoke(handle.clone()))),
                ("$construct", value(Construct(handle.clone()))),
                ("$on", value(On(handle.clone()))),
                ("$once", value(Once(handle.clone()))),
                ("$publish", value(Publish(handle.clone()))),
                ("$terminate", value(Terminate(handle))),
                ("$terminated", value(Terminated(token.clone()))),
                ("$logger", value(logger.clone())),
                ("$executor", value(executor.clone())),
            ];
            let objects: Overlay = seeds
                .into_iter()
                .map(|(name, v)| (Identity::from(name), Eventual::Ready(v)))
                .collect();

            InstanceInner {
                executor,
                subscribers: SubscriberSet::new(),
                scope: Scope::root(Rc::clone(&template), objects),
                template,
                token,
                state: Cell::new(LifecycleState::Created),
                started: Cell::new(false),
                logger,
                config,
            }
        });
        Self { inner }
    }

    pub(crate) fn from_inner(inner: Rc<InstanceInner>) -> Self {
        Self { inner }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.inner.state.get()
    }

    /// True once `terminate` has been called.
    pub fn is_terminated(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Handle observing termination.
    pub fn terminated(&self) -> Terminated {
        Terminated(self.inner.token.clone())
    }

    /// The instance's executor.
    pub fn executor(&self) -> &Executor {
        &self.inner.executor
    }

    /// The instance's logger (also available as `$logger`).
    pub fn logger(&self) -> &Logger {
        &self.inner.logger
    }

    /// Resolves `identity` through the root scope (memoized).
    pub fn get(&self, identity: impl Into<Identity>) -> Result<Eventual<Value>> {
        let identity = identity.into();
        let scope = Rc::clone(&self.inner.scope);
        self.inner.executor.exec(move || scope.get(&identity))
    }

    /// Builds `identity` in a fresh child scope, bypassing the root memo.
    pub fn construct(&self, identity: impl Into<Identity>) -> Result<Eventual<Value>> {
        let identity = identity.into();
        let scope = self.inner.scope.create_child_scope(Overlay::new());
        self.inner.executor.exec(move || scope.construct(&identity))
    }

    /// Calls `spec` with its dependencies resolved through the root scope.
    pub fn invoke(&self, spec: &Spec) -> Result<Eventual<Value>> {
        let spec = spec.clone();
        let scope = Rc::clone(&self.inner.scope);
        self.inner
            .executor
            .exec(move || scope.invoke(&spec, &Overlay::new()))
    }

    /// Subscribes `spec` to `event`.
    pub fn on(&self, event: impl Into<String>, spec: Spec) -> Unsubscribe {
        self.inner.subscribers.insert(event, spec)
    }

    /// Subscribes `spec` to the next `event`; it unsubscribes before running.
    ///
    /// Deliveries already queued when the first one runs are skipped.
    pub fn once(&self, event: impl Into<String>, spec: Spec) -> Unsubscribe {
        self.inner.subscribers.insert_with(event, |unsubscribe| {
            let unsubscribe = unsubscribe.clone();
            let inject = spec.inject().to_vec();
            Spec::with_deps(inject, move |args: Args| {
                if !unsubscribe.unsubscribe() {
                    return Ok(Eventual::Ready(unit()));
                }
                spec.call(args)
            })
        })
    }

    /// Delivers `event` to its subscribers in registration order.
    pub fn publish(&self, event: &str, args: Vec<Value>) {
        let specs = self.inner.subscribers.snapshot(event);
        tracing::debug!(event, subscribers = specs.len(), "instance.publish");
        for spec in specs {
            let args = args.clone();
            if spec.inject().is_empty() {
                self.inner.executor.post(move || spec.call(Args::new(args)));
            } else {
                let scope = Rc::clone(&self.inner.scope);
                self.inner
                    .executor
                    .dispatch(move || scope.invoke_with(&spec, &Overlay::new(), args));
            }
        }
    }

    /// Requests termination and publishes [`EXIT`] with `args`.
    ///
    /// Only the first call has an effect.
    pub fn terminate(&self, args: Vec<Value>) {
        if self.inner.token.is_cancelled() {
            return;
        }
        self.inner.token.cancel();
        if self.state() != LifecycleState::Terminated {
            self.inner.state.set(LifecycleState::Terminating);
        }
        tracing::debug!("instance.terminate");
        self.publish(EXIT, args);
    }

    /// Runs scheduled work, terminates, and drains exit work.
    ///
    /// Returns the first failure of the primary drain, otherwise the first
    /// failure of the exit drain. Calling it again is a no-op.
    pub async fn run(&self) -> Result<()> {
        let inner = &self.inner;
        if inner.started.replace(true) {
            return Ok(());
        }
        if self.state() == LifecycleState::Created {
            inner.state.set(LifecycleState::Running);
        }

        for spec in inner.template.schedule() {
            let spec = spec.clone();
            let scope = Rc::clone(&inner.scope);
            inner
                .executor
                .post(move || scope.invoke(&spec, &Overlay::new()));
        }
        tracing::debug!(
            scheduled = inner.template.schedule().len(),
            "instance.run started"
        );

        let primary = self.drain().await;
        if let Err(err) = &primary {
            tracing::warn!(label = err.as_label(), error = %err, "instance.run failed");
        }

        self.terminate(Vec::new());
        let exit = inner.executor.run(inner.config.exit_budget()).await;
        inner.state.set(LifecycleState::Terminated);
        tracing::debug!(
            pending = inner.executor.pending(),
            queued = inner.executor.len(),
            "instance.run finished"
        );

        primary?;
        exit?;
        Ok(())
    }

    #[cfg(feature = "signals")]
    async fn drain(&self) -> Result<usize> {
        let inner = &self.inner;
        let run = inner.executor.run(inner.config.run_budget());
        if !inner.config.handle_signals {
            return run.await;
        }

        let mut run = std::pin::pin!(run);
        tokio::select! {
            res = &mut run => return res,
            sig = super::shutdown::wait_for_shutdown_signal() => match sig {
                Ok(name) => {
                    tracing::info!(signal = name, "instance.signal received");
                    self.terminate(vec![value(name)]);
                }
                Err(err) => tracing::warn!(error = %err, "instance.signal handler unavailable"),
            },
        }
        run.await
    }

    #[cfg(not(feature = "signals"))]
    async fn drain(&self) -> Result<usize> {
        let inner = &self.inner;
        inner.executor.run(inner.config.run_budget()).await
    }
}
