//! # taskscope
//!
//! **Taskscope** is a cooperative task executor paired with a scoped
//! dependency-injection lifecycle container.
//!
//! Independently authored [`Module`]s declare factories, constants, scheduled
//! entry points and before/after hooks. Composed modules run as a single
//! [`Instance`] with deterministic startup, time-bounded draining of
//! asynchronous work and orderly shutdown. Everything runs on one thread:
//! values are `Rc`-shared and futures are `!Send`.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │    Module    │   │    Module    │   │    Module    │
//!     │  (logging)   │   │  (storage)   │   │    (app)     │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            └─────────── extends() ───────────────┘
//!                               ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Instance (one per initiate())                                    │
//! │  - Template snapshot (identity → ObjectDescriptor, schedule)      │
//! │  - Root Scope (memo, pre-seeded with $get, $invoke, $on, ...)     │
//! │  - Executor (task queue + outstanding futures)                    │
//! │  - SubscriberSet (event type → ordered specs)                     │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!   scheduled spec     scheduled spec     exit subscriber
//!        │                  │
//!        └─► Scope::invoke ─► get(dep) ─► construct(dep)
//!                                         ├─ before hooks
//!                                         ├─ constant | factory(deps...)
//!                                         └─ after hooks (dep ↦ value)
//! ```
//!
//! ### Lifecycle
//! ```text
//! Module::initiate() ──► Instance::new(snapshot) ──► Instance::run()
//!
//! run():
//!   ├─► post every scheduled spec
//!   ├─► Executor::run(budget)
//!   │     loop {
//!   │       ├─► poll(remaining): full passes over the queue
//!   │       ├─► nothing ran: wait for { a pending future settles | post() | budget }
//!   │       └─► queue empty and nothing pending ─► done
//!   │     }
//!   ├─► terminate() ─► publish("exit", args)       (exactly once)
//!   ├─► Executor::run(grace)                       (exit work flushes)
//!   └─► return the first retained error, if any
//! ```
//!
//! ## Features
//! | Area             | Description                                                   | Key types                              |
//! |------------------|---------------------------------------------------------------|----------------------------------------|
//! | **Scheduling**   | Cooperative queue with budgets and self-wakeup                | [`Executor`], [`DeadlineTimer`]        |
//! | **Values**       | Ready-or-pending values chained without blocking              | [`Eventual`], [`IntoEventual`]         |
//! | **Modules**      | Factories, constants, hooks, schedules, extension             | [`Module`], [`Spec`], [`Injectable`]   |
//! | **Resolution**   | Parent-chained memoizing scopes                               | [`Scope`]                              |
//! | **Lifecycle**    | Publish/subscribe, idempotent termination                     | [`Instance`], [`LifecycleState`]       |
//! | **Errors**       | Typed errors for resolution and user work                     | [`Error`]                              |
//! | **Configuration**| Budgets, log retention, signal handling                       | [`Config`]                             |
//!
//! ## Optional features
//! - `signals` (default): instances with `Config::handle_signals` terminate on
//!   SIGINT/SIGTERM/SIGQUIT (Ctrl-C elsewhere).
//!
//! ## Example
//! ```rust
//! use taskscope::{Args, Error, Module, Spec, Terminate, later, value};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Error> {
//!     let module = Module::new()
//!         .factory("answer", Spec::bare(|_| {
//!             later(async { Ok(42u32) })
//!         }))?
//!         .schedule(Spec::with_deps(["answer", "$terminate"], |args: Args| {
//!             let answer = args.get::<u32>(0)?;
//!             let terminate = args.get::<Terminate>(1)?;
//!             terminate.call(vec![value(*answer)])
//!         }))?;
//!
//!     module.initiate().await
//! }
//! ```
mod config;
mod core;
mod error;
mod identity;
mod instance;
mod logger;
mod module;
mod subscribers;

// ---- Public re-exports ----

pub use config::Config;
pub use crate::core::{
    DeadlineTimer, Eventual, Executor, IntoEventual, MAX_ARM, Queue, SharedFuture, Task,
    join_all, join_settled, later,
};
pub use error::{Error, Result};
pub use identity::{INBUILT, Identity, RESERVED, Value, downcast, is_unit, unit, value};
pub use instance::{
    Construct, EXIT, Get, Instance, Invoke, LifecycleState, On, Once, Overlay, Publish, Scope,
    Terminate, Terminated,
};
#[cfg(feature = "signals")]
pub use instance::wait_for_shutdown_signal;
pub use logger::{Level, LogRecord, Logger};
pub use module::{Args, Injectable, Module, ObjectDescriptor, Spec, SpecFn, SpecSet, Template};
pub use subscribers::{SubscriberSet, Unsubscribe};
