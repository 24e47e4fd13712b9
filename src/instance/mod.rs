//! Running modules: scopes, instances and the inbuilt handles.
//!
//! - [`scope`]: parent-chained, memoizing dependency resolution;
//! - `instance`: lifecycle, publish/subscribe and termination;
//! - [`handles`]: typed values behind `$get`, `$invoke`, `$on`, ...;
//! - `shutdown`: OS signal helper (feature `signals`).

pub mod handles;
#[allow(clippy::module_inception)]
mod instance;
pub mod scope;
#[cfg(feature = "signals")]
mod shutdown;

pub use handles::{Construct, Get, Invoke, On, Once, Publish, Terminate, Terminated};
pub use instance::{EXIT, Instance, LifecycleState};
pub use scope::{Overlay, Scope};
#[cfg(feature = "signals")]
pub use shutdown::wait_for_shutdown_signal;
