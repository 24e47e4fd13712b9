//! # Values that are either ready now or settle later.
//!
//! [`Eventual`] is the currency of the runtime: resolving an identity,
//! invoking a spec or running a task yields either a ready value or a shared
//! future. Work chained on a ready value runs inline; work chained on a
//! pending one is deferred until it settles.
//!
//! ```text
//! Ready(v)   ── and_then(f) ──► f(v)                      (same call stack)
//! Pending(p) ── and_then(f) ──► Pending(p.await → f(v))   (deferred)
//! ```
//!
//! Pending values wrap a [`Shared`] future so that one in-flight result can
//! be awaited by the scope memo, the executor bookkeeping and any caller at
//! the same time.

use std::fmt;
use std::future::Future;
use std::rc::Rc;

use futures::future::{self, FutureExt, LocalBoxFuture, Shared};

use crate::error::{Error, Result};
use crate::identity::{Value, downcast, unit, value};

/// Shared, single-threaded future of a fallible result.
pub type SharedFuture<T> = Shared<LocalBoxFuture<'static, Result<T>>>;

/// A value that is ready now, or a future that will produce it.
#[derive(Clone)]
pub enum Eventual<T = Value> {
    /// Available immediately.
    Ready(T),
    /// Settles later; may be awaited by many holders.
    Pending(SharedFuture<T>),
}

impl<T> fmt::Debug for Eventual<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Eventual::Ready(_) => f.write_str("Eventual::Ready"),
            Eventual::Pending(_) => f.write_str("Eventual::Pending"),
        }
    }
}

impl<T: Clone + 'static> Eventual<T> {
    /// Wraps a future into a shared pending value.
    pub fn from_future<F>(fut: F) -> Self
    where
        F: Future<Output = Result<T>> + 'static,
    {
        Eventual::Pending(fut.boxed_local().shared())
    }

    /// True if the value is not available synchronously.
    pub fn is_pending(&self) -> bool {
        matches!(self, Eventual::Pending(_))
    }

    /// Returns the outcome if it is already known, without driving anything.
    pub fn peek(&self) -> Option<Result<T>> {
        match self {
            Eventual::Ready(v) => Some(Ok(v.clone())),
            Eventual::Pending(fut) => fut.peek().cloned(),
        }
    }

    /// Collapses a successfully settled future into `Ready`.
    pub fn settled(self) -> Self {
        if let Eventual::Pending(fut) = &self {
            if let Some(Ok(v)) = fut.peek() {
                return Eventual::Ready(v.clone());
            }
        }
        self
    }

    /// Waits for the outcome.
    pub async fn resolve(self) -> Result<T> {
        match self {
            Eventual::Ready(v) => Ok(v),
            Eventual::Pending(fut) => fut.await,
        }
    }

    /// Chains `f` on the value: inline when ready, deferred when pending.
    ///
    /// An error returned by `f` on the ready path is returned immediately;
    /// on the pending path it becomes the outcome of the returned future.
    pub fn and_then<U, F>(self, f: F) -> Result<Eventual<U>>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> Result<Eventual<U>> + 'static,
    {
        match self {
            Eventual::Ready(v) => f(v),
            Eventual::Pending(fut) => Ok(Eventual::from_future(async move {
                let v = fut.await?;
                f(v)?.resolve().await
            })),
        }
    }

    /// Maps the value: inline when ready, deferred when pending.
    pub fn map<U, F>(self, f: F) -> Eventual<U>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> U + 'static,
    {
        match self {
            Eventual::Ready(v) => Eventual::Ready(f(v)),
            Eventual::Pending(fut) => Eventual::from_future(async move { fut.await.map(f) }),
        }
    }
}

impl Eventual<Value> {
    /// Waits for the outcome and recovers its concrete type.
    pub async fn resolve_as<T: 'static>(self) -> Result<Rc<T>> {
        downcast(self.resolve().await?)
    }
}

/// Waits for every item; ready when all inputs are ready.
///
/// Items are awaited concurrently and every one is driven to settlement,
/// even after another has failed. The first failure in input order wins.
pub fn join_all<T: Clone + 'static>(items: Vec<Eventual<T>>) -> Eventual<Vec<T>> {
    if items.iter().any(Eventual::is_pending) {
        return Eventual::from_future(settle_all(items.into_iter().map(Ok).collect()));
    }
    Eventual::Ready(
        items
            .into_iter()
            .filter_map(|item| match item {
                Eventual::Ready(v) => Some(v),
                Eventual::Pending(_) => None,
            })
            .collect(),
    )
}

/// Like [`join_all`] over items that may have failed synchronously.
///
/// A synchronous failure is returned at once only when nothing is pending;
/// otherwise it is reported after the pending items have settled.
pub fn join_settled<T: Clone + 'static>(
    items: Vec<Result<Eventual<T>>>,
) -> Result<Eventual<Vec<T>>> {
    if items.iter().any(|item| matches!(item, Ok(Eventual::Pending(_)))) {
        return Ok(Eventual::from_future(settle_all(items)));
    }
    let mut values = Vec::with_capacity(items.len());
    for item in items {
        if let Eventual::Ready(v) = item? {
            values.push(v);
        }
    }
    Ok(Eventual::Ready(values))
}

async fn settle_all<T: Clone + 'static>(items: Vec<Result<Eventual<T>>>) -> Result<Vec<T>> {
    future::join_all(items.into_iter().map(|item| async move {
        match item {
            Ok(eventual) => eventual.resolve().await,
            Err(err) => Err(err),
        }
    }))
    .await
    .into_iter()
    .collect()
}

/// Anything a task or spec may return.
///
/// Implemented for `()`, [`Value`], [`Eventual<Value>`] and `Result`s of those,
/// so closures can return whatever is most natural:
///
/// ```
/// use taskscope::{Error, Eventual, IntoEventual, value};
///
/// assert!(!().into_eventual().unwrap().is_pending());
/// assert!(Ok::<_, Error>(value(1)).into_eventual().is_ok());
/// assert!(Err::<(), _>(Error::fail("x")).into_eventual().is_err());
/// let later = Eventual::from_future(async { Ok(value(2)) });
/// assert!(later.into_eventual().unwrap().is_pending());
/// ```
pub trait IntoEventual {
    /// Converts into the runtime's value-or-future form.
    fn into_eventual(self) -> Result<Eventual<Value>>;
}

impl IntoEventual for () {
    fn into_eventual(self) -> Result<Eventual<Value>> {
        Ok(Eventual::Ready(unit()))
    }
}

impl IntoEventual for Value {
    fn into_eventual(self) -> Result<Eventual<Value>> {
        Ok(Eventual::Ready(self))
    }
}

impl IntoEventual for Eventual<Value> {
    fn into_eventual(self) -> Result<Eventual<Value>> {
        Ok(self)
    }
}

impl<T: IntoEventual> IntoEventual for Result<T, Error> {
    fn into_eventual(self) -> Result<Eventual<Value>> {
        self.and_then(IntoEventual::into_eventual)
    }
}

/// Shorthand for a pending value produced by `fut`.
pub fn later<F, T>(fut: F) -> Eventual<Value>
where
    F: Future<Output = Result<T>> + 'static,
    T: 'static,
{
    Eventual::from_future(async move { fut.await.map(value) })
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::time::Duration;

    use super::*;

    #[test]
    fn ready_chains_inline() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let out = Eventual::Ready(2)
            .and_then(move |v| {
                s.borrow_mut().push(v);
                Ok(Eventual::Ready(v * 10))
            })
            .unwrap();
        assert_eq!(*seen.borrow(), vec![2]);
        assert_eq!(out.peek(), Some(Ok(20)));
    }

    #[test]
    fn ready_chain_error_is_immediate() {
        let out = Eventual::Ready(1).and_then(|_| Err::<Eventual<u8>, _>(Error::fail("no")));
        assert_eq!(out.unwrap_err(), Error::fail("no"));
    }

    #[tokio::test]
    async fn pending_chain_is_deferred() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let out = Eventual::from_future(async { Ok(3) })
            .and_then(move |v| {
                s.borrow_mut().push(v);
                Ok(Eventual::Ready(v + 1))
            })
            .unwrap();
        assert!(out.is_pending());
        assert!(seen.borrow().is_empty());
        assert_eq!(out.clone().resolve().await, Ok(4));
        assert_eq!(*seen.borrow(), vec![3]);
        assert!(!out.settled().is_pending());
    }

    #[tokio::test]
    async fn join_all_mixes_ready_and_pending() {
        let all = join_all(vec![
            Eventual::Ready(1),
            Eventual::from_future(async { Ok(2) }),
            Eventual::Ready(3),
        ]);
        assert!(all.is_pending());
        assert_eq!(all.resolve().await, Ok(vec![1, 2, 3]));

        let ready = join_all(vec![Eventual::Ready(1), Eventual::Ready(2)]);
        assert_eq!(ready.peek(), Some(Ok(vec![1, 2])));
    }

    #[tokio::test(start_paused = true)]
    async fn join_all_settles_every_item_before_failing() {
        let done = Rc::new(Cell::new(false));
        let d = Rc::clone(&done);
        let all = join_all(vec![
            Eventual::from_future(async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                d.set(true);
                Err::<i32, _>(Error::fail("slow"))
            }),
            Eventual::from_future(async { Err::<i32, _>(Error::fail("fast")) }),
        ]);
        assert_eq!(all.resolve().await, Err(Error::fail("slow")));
        assert!(done.get());
    }

    #[tokio::test(start_paused = true)]
    async fn join_settled_defers_sync_failure_behind_pending() {
        let done = Rc::new(Cell::new(false));
        let d = Rc::clone(&done);
        let all = join_settled(vec![
            Ok(Eventual::from_future(async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                d.set(true);
                Ok(1)
            })),
            Err(Error::fail("now")),
        ])
        .unwrap();
        assert!(all.is_pending());
        assert_eq!(all.resolve().await, Err(Error::fail("now")));
        assert!(done.get());

        let ready = join_settled(vec![Ok(Eventual::Ready(1)), Err(Error::fail("now"))]);
        assert_eq!(ready.unwrap_err(), Error::fail("now"));
    }

    #[test]
    fn map_is_inline_when_ready() {
        assert_eq!(Eventual::Ready(2).map(|v| v * 3).peek(), Some(Ok(6)));
    }

    #[tokio::test]
    async fn resolve_as_downcasts() {
        let v = later(async { Ok("hi".to_string()) });
        assert_eq!(*v.resolve_as::<String>().await.unwrap(), "hi");
    }
}
