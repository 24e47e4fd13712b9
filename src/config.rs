//! # Instance configuration.
//!
//! Provides [`Config`], the settings an [`Instance`](crate::Instance) runs with.
//!
//! Config is used in two ways:
//! 1. **Module entry point**: `Module::initiate_with(config)`
//! 2. **Manual driving**: `Module::instantiate_with(config)` then `Instance::run()`
//!
//! ## Sentinel values
//! - `budget = 0s` → unlimited primary drain
//! - `grace = 0s` → unlimited post-terminate drain

use std::time::Duration;

/// Configuration for one instance run.
///
/// ## Field semantics
/// - `budget`: Time budget for draining scheduled work (`0s` = unlimited)
/// - `grace`: Time budget for exit-triggered work after termination (`0s` = unlimited)
/// - `log_capacity`: Records kept by the `$logger` ring buffer (min 1)
/// - `handle_signals`: Terminate on OS shutdown signals during the primary drain
///
/// ## Notes
/// All fields are public. Prefer the helper accessors over checking for `0`
/// at call sites.
#[derive(Clone, Debug)]
pub struct Config {
    /// Time budget for the primary drain.
    ///
    /// When it elapses the instance stops waiting for outstanding work and
    /// terminates; in-flight futures are not cancelled.
    pub budget: Duration,

    /// Time budget for the drain that follows `terminate()`.
    ///
    /// Gives `exit` subscribers time to flush and release resources.
    pub grace: Duration,

    /// Number of recent records kept by the injectable logger.
    pub log_capacity: usize,

    /// Whether SIGINT/SIGTERM/SIGQUIT (Ctrl-C elsewhere) terminate the instance.
    ///
    /// Only effective with the `signals` cargo feature.
    pub handle_signals: bool,
}

impl Config {
    /// Budget for the primary drain; `Duration::MAX` when unlimited.
    #[inline]
    pub fn run_budget(&self) -> Duration {
        unlimited_if_zero(self.budget)
    }

    /// Budget for the post-terminate drain; `Duration::MAX` when unlimited.
    #[inline]
    pub fn exit_budget(&self) -> Duration {
        unlimited_if_zero(self.grace)
    }

    /// Log buffer capacity clamped to a minimum of 1.
    #[inline]
    pub fn log_capacity_clamped(&self) -> usize {
        self.log_capacity.max(1)
    }
}

fn unlimited_if_zero(d: Duration) -> Duration {
    if d.is_zero() { Duration::MAX } else { d }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `budget = 0s` (drain until idle)
    /// - `grace = 60s` (bounded exit window)
    /// - `log_capacity = 1024`
    /// - `handle_signals = false` (embedding code owns the process signals)
    fn default() -> Self {
        Self {
            budget: Duration::ZERO,
            grace: Duration::from_secs(60),
            log_capacity: 1024,
            handle_signals: false,
        }
    }
}
