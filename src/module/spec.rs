//! # Specs: callables with declared dependencies.
//!
//! A [`Spec`] is the unit the runtime invokes for factories, hooks,
//! scheduled entry points and subscribers. It couples a function with the
//! ordered list of identities whose resolved values it receives as [`Args`].
//!
//! Three shapes are supported:
//! - [`Spec::Bare`]: no dependencies;
//! - [`Spec::WithDeps`]: dependency list plus closure;
//! - [`Spec::Described`]: a user type implementing [`Injectable`].
//!
//! Specs compare by pointer identity ([`Spec::ptr_eq`]): registering the same
//! spec (or a clone of it) twice in a [`SpecSet`] is a no-op.

use std::fmt;
use std::rc::Rc;

use crate::core::eventual::{Eventual, IntoEventual};
use crate::error::{Error, Result};
use crate::identity::{Identity, Value, downcast};

/// Type-erased spec body.
pub type SpecFn = Rc<dyn Fn(Args) -> Result<Eventual<Value>>>;

/// User-defined callable exposing its own dependency list.
///
/// ## Example
/// ```
/// use taskscope::{Args, Eventual, Identity, Injectable, Result, Spec, Value, value};
///
/// struct Greeter {
///     inject: Vec<Identity>,
/// }
///
/// impl Injectable for Greeter {
///     fn inject(&self) -> &[Identity] {
///         &self.inject
///     }
///
///     fn call(&self, args: Args) -> Result<Eventual<Value>> {
///         let name = args.get::<String>(0)?;
///         Ok(Eventual::Ready(value(format!("hello {name}"))))
///     }
/// }
///
/// let spec = Spec::described(Greeter { inject: vec!["name".into()] });
/// assert_eq!(spec.inject(), &[Identity::from("name")]);
/// ```
pub trait Injectable {
    /// Identities resolved (in order) before [`call`](Injectable::call).
    fn inject(&self) -> &[Identity];

    /// Runs with the resolved dependencies (plus any appended event arguments).
    fn call(&self, args: Args) -> Result<Eventual<Value>>;
}

/// Callable plus declared dependencies, resolved once at construction.
#[derive(Clone)]
pub enum Spec {
    /// Function without dependencies.
    Bare(SpecFn),
    /// Dependency identities followed by the function receiving them.
    WithDeps(Rc<[Identity]>, SpecFn),
    /// User type carrying its own dependency list.
    Described(Rc<dyn Injectable>),
}

impl Spec {
    /// Spec without dependencies.
    pub fn bare<R, F>(f: F) -> Self
    where
        R: IntoEventual,
        F: Fn(Args) -> R + 'static,
    {
        Spec::Bare(erase(f))
    }

    /// Spec receiving the values of `deps`, in order.
    pub fn with_deps<I, D, R, F>(deps: D, f: F) -> Self
    where
        I: Into<Identity>,
        D: IntoIterator<Item = I>,
        R: IntoEventual,
        F: Fn(Args) -> R + 'static,
    {
        let deps: Rc<[Identity]> = deps.into_iter().map(Into::into).collect();
        Spec::WithDeps(deps, erase(f))
    }

    /// Spec backed by an [`Injectable`] implementation.
    pub fn described(d: impl Injectable + 'static) -> Self {
        Spec::Described(Rc::new(d))
    }

    /// Declared dependency identities.
    pub fn inject(&self) -> &[Identity] {
        match self {
            Spec::Bare(_) => &[],
            Spec::WithDeps(deps, _) => deps,
            Spec::Described(d) => d.inject(),
        }
    }

    /// Calls the function with already resolved arguments.
    pub fn call(&self, args: Args) -> Result<Eventual<Value>> {
        match self {
            Spec::Bare(f) | Spec::WithDeps(_, f) => f(args),
            Spec::Described(d) => d.call(args),
        }
    }

    /// True if both specs are the same registration (clones compare equal).
    pub fn ptr_eq(&self, other: &Spec) -> bool {
        match (self, other) {
            (Spec::Bare(a), Spec::Bare(b)) => Rc::ptr_eq(a, b),
            (Spec::WithDeps(da, a), Spec::WithDeps(db, b)) => {
                Rc::ptr_eq(a, b) && Rc::ptr_eq(da, db)
            }
            (Spec::Described(a), Spec::Described(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

fn erase<R, F>(f: F) -> SpecFn
where
    R: IntoEventual,
    F: Fn(Args) -> R + 'static,
{
    Rc::new(move |args| f(args).into_eventual())
}

impl fmt::Debug for Spec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Spec::Bare(_) => "Bare",
            Spec::WithDeps(..) => "WithDeps",
            Spec::Described(_) => "Described",
        };
        f.debug_struct("Spec")
            .field("kind", &kind)
            .field("inject", &self.inject())
            .finish()
    }
}

/// Resolved arguments passed to a spec.
///
/// Dependencies come first, in declared order; event arguments (for
/// subscribers) are appended after them.
#[derive(Clone, Default)]
pub struct Args {
    values: Vec<Value>,
}

impl Args {
    /// Wraps resolved values.
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// Number of arguments.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if there are no arguments.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Untyped argument at `index`.
    pub fn value(&self, index: usize) -> Result<Value> {
        self.values
            .get(index)
            .cloned()
            .ok_or(Error::MissingArgument {
                index,
                len: self.values.len(),
            })
    }

    /// Typed argument at `index`.
    pub fn get<T: 'static>(&self, index: usize) -> Result<Rc<T>> {
        downcast(self.value(index)?)
    }

    /// Iterates over the raw values.
    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.values.iter()
    }

    /// Returns the raw values.
    pub fn into_vec(self) -> Vec<Value> {
        self.values
    }
}

impl fmt::Debug for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Args").field("len", &self.len()).finish()
    }
}

impl From<Vec<Value>> for Args {
    fn from(values: Vec<Value>) -> Self {
        Self::new(values)
    }
}

impl IntoIterator for Args {
    type Item = Value;
    type IntoIter = std::vec::IntoIter<Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

/// Insertion-ordered set of specs keyed by pointer identity.
#[derive(Clone, Default, Debug)]
pub struct SpecSet(Vec<Spec>);

impl SpecSet {
    /// Adds `spec` unless it is already present. Returns true if inserted.
    pub fn insert(&mut self, spec: Spec) -> bool {
        if self.contains(&spec) {
            return false;
        }
        self.0.push(spec);
        true
    }

    /// True if `spec` (or a clone of it) is present.
    pub fn contains(&self, spec: &Spec) -> bool {
        self.0.iter().any(|s| s.ptr_eq(spec))
    }

    /// Adds every spec of `other` not yet present, keeping its order.
    pub fn merge(&mut self, other: &SpecSet) {
        for spec in other.iter() {
            self.insert(spec.clone());
        }
    }

    /// Iterates in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Spec> {
        self.0.iter()
    }

    /// Number of specs.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a SpecSet {
    type Item = &'a Spec;
    type IntoIter = std::slice::Iter<'a, Spec>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
