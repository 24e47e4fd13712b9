//! # Deadline timer.
//!
//! [`DeadlineTimer`] completes at-or-after an absolute deadline computed once
//! at construction. A single timer entry cannot represent arbitrarily long
//! delays, so the timer arms itself in slices of at most [`MAX_ARM`] and
//! re-arms until the deadline is actually reached.
//!
//! ```text
//! new(cb, delay) ─► deadline = now + delay
//!   poll ─► slice elapsed? ── now < deadline ─► re-arm min(remaining, MAX_ARM)
//!                          └─ now ≥ deadline ─► cb() once, Ready
//! abort() ─► callback dropped, completes without firing
//! ```
//!
//! The timer is a future: whoever awaits it (typically the executor's run
//! loop) drives it.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::time::{Instant, Sleep, sleep_until};

/// Longest single slice the timer arms at once (the timer wheel's range).
pub const MAX_ARM: Duration = Duration::from_millis((1 << 36) - 1);

/// Deadline used when `now + delay` is not representable.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

type Callback = Box<dyn FnOnce()>;

/// One-shot timer firing at-or-after an absolute deadline.
pub struct DeadlineTimer {
    callback: Option<Callback>,
    deadline: Option<Instant>,
    sleep: Pin<Box<Sleep>>,
}

impl DeadlineTimer {
    /// Arms a timer that invokes `callback` once `delay` has passed.
    pub fn new(delay: Duration, callback: impl FnOnce() + 'static) -> Self {
        let mut timer = Self::after(delay);
        timer.callback = Some(Box::new(callback));
        timer
    }

    /// Arms a timer without a callback; awaiting it just waits out `delay`.
    pub fn after(delay: Duration) -> Self {
        let now = Instant::now();
        let deadline = deadline_from(now, delay);
        Self {
            callback: None,
            deadline: Some(deadline),
            sleep: Box::pin(sleep_until(now + delay.min(MAX_ARM))),
        }
    }

    /// The absolute deadline, or `None` once fired or aborted.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// True until the timer fires or is aborted.
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Cancels the timer; the callback is dropped without running.
    pub fn abort(&mut self) {
        self.callback = None;
        self.deadline = None;
    }

    /// Replaces callback and deadline in one step.
    pub fn reset(&mut self, delay: Duration, callback: impl FnOnce() + 'static) {
        let now = Instant::now();
        self.callback = Some(Box::new(callback));
        self.deadline = Some(deadline_from(now, delay));
        self.sleep.as_mut().reset(now + delay.min(MAX_ARM));
    }
}

fn deadline_from(now: Instant, delay: Duration) -> Instant {
    now.checked_add(delay).unwrap_or_else(|| now + FAR_FUTURE)
}

impl Future for DeadlineTimer {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        loop {
            let Some(deadline) = this.deadline else {
                return Poll::Ready(());
            };
            if this.sleep.as_mut().poll(cx).is_pending() {
                return Poll::Pending;
            }
            let now = Instant::now();
            if now < deadline {
                let slice = (deadline - now).min(MAX_ARM);
                this.sleep.as_mut().reset(now + slice);
                continue;
            }
            this.deadline = None;
            if let Some(callback) = this.callback.take() {
                callback();
            }
            return Poll::Ready(());
        }
    }
}
