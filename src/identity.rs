//! # Identities and dynamically typed values.
//!
//! An [`Identity`] names one constructible value inside a module template.
//! A [`Value`] is whatever a factory produced, shared behind an `Rc`.
//!
//! The unit value `()` plays the role of "nothing": a factory producing it
//! fails construction with [`Error::UndefinedConstructionResult`](crate::Error).

use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::rc::Rc;

use crate::error::{Error, Result};

/// Inbuilt identities wired to instance handles.
pub const INBUILT: &[&str] = &[
    "$get",
    "$invoke",
    "$construct",
    "$on",
    "$once",
    "$publish",
    "$terminate",
    "$terminated",
    "$logger",
    "$executor",
];

/// Reserved names that are not wired to behavior but may not be registered either.
pub const RESERVED: &[&str] = &[
    "$set",
    "$ready",
    "$onExit",
    "$schedule",
    "$subscribe",
    "$isRunning",
    "$isTerminated",
];

/// Name of a constructible value.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity(Cow<'static, str>);

impl Identity {
    /// Creates a new identity.
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// Returns the identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if the identity is an inbuilt or reserved name.
    pub fn is_reserved(&self) -> bool {
        let name = self.as_str();
        INBUILT.contains(&name) || RESERVED.contains(&name)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for Identity {
    fn from(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }
}

impl From<String> for Identity {
    fn from(name: String) -> Self {
        Self(Cow::Owned(name))
    }
}

impl From<&Identity> for Identity {
    fn from(identity: &Identity) -> Self {
        identity.clone()
    }
}

/// Dynamically typed, shared value.
pub type Value = Rc<dyn Any>;

/// Wraps `v` into a [`Value`].
pub fn value<T: 'static>(v: T) -> Value {
    Rc::new(v)
}

/// The "nothing" value.
pub fn unit() -> Value {
    Rc::new(())
}

/// Recovers the concrete type behind a [`Value`].
///
/// ```
/// use taskscope::{downcast, value};
///
/// let v = value(7u32);
/// assert_eq!(*downcast::<u32>(v.clone()).unwrap(), 7);
/// assert!(downcast::<String>(v).is_err());
/// ```
pub fn downcast<T: 'static>(v: Value) -> Result<Rc<T>> {
    v.downcast::<T>().map_err(|_| Error::TypeMismatch {
        expected: std::any::type_name::<T>(),
    })
}

/// True if `v` is the unit value.
pub fn is_unit(v: &Value) -> bool {
    v.is::<()>()
}
