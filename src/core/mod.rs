//! Runtime core: scheduling primitives.
//!
//! - [`queue`]: growable ring buffer backing the task FIFO and the log buffer;
//! - [`timer`]: one-shot deadline timer with long-delay re-arming;
//! - [`eventual`]: "ready now or settles later" values and their combinators;
//! - [`executor`]: cooperative scheduler draining tasks under a time budget.

pub mod eventual;
pub mod executor;
pub mod queue;
pub mod timer;

pub use eventual::{Eventual, IntoEventual, SharedFuture, join_all, join_settled, later};
pub use executor::{Executor, Task};
pub use queue::Queue;
pub use timer::{DeadlineTimer, MAX_ARM};
