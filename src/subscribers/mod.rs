//! # Event subscribers for instances.
//!
//! Instances deliver events (the built-in `exit`, plus anything published via
//! `$publish`) to specs registered with `$on`/`$once`.
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   publish("exit", args) ──► SubscriberSet::snapshot("exit")
//!                                   │
//!                      ┌────────────┴────────────┐
//!                      ▼                         ▼
//!               no dependencies           declared dependencies
//!          post(spec(args...)) on         dispatch(resolve deps, then
//!            the executor queue             spec(deps..., args...))
//! ```
//!
//! Delivery order follows registration order; completion order of
//! asynchronous handlers is not guaranteed.

mod set;

pub use set::{SubscriberSet, Unsubscribe};
