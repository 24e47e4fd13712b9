//! # Scope: hierarchical, memoizing dependency resolution.
//!
//! A [`Scope`] resolves identities against its own memo, then its ancestors,
//! and finally constructs them from the shared template.
//!
//! ```text
//! get(id):
//!   self.objects ─► parent.objects ─► ... ─► root.objects   (first hit wins)
//!   miss ─► construct(id) ─► memoize in self
//!                            └─ pending: overwrite memo with the value once settled
//!
//! construct(id):
//!   before hooks ─► (all settled) ─► constant | factory(deps...) ─► unit? error
//!                                                        └─► after hooks (id ↦ value) ─► value
//! ```
//!
//! A memoized in-flight future is returned as is, never re-triggered.
//! Re-entering an identity that is still being constructed on the same call
//! stack fails with [`Error::Cycle`].

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::core::eventual::{Eventual, join_settled};
use crate::error::{Error, Result};
use crate::identity::{Identity, Value, is_unit};
use crate::module::{Args, ObjectDescriptor, Spec, SpecSet, Template};

/// Ad-hoc bindings consulted before the scope chain.
pub type Overlay = HashMap<Identity, Eventual<Value>>;

/// Resolution context chained to zero or one parent.
pub struct Scope {
    parent: Option<Rc<Scope>>,
    template: Rc<Template>,
    objects: RefCell<HashMap<Identity, Eventual<Value>>>,
    constructing: RefCell<HashSet<Identity>>,
}

impl Scope {
    /// Root scope pre-seeded with `objects` (the inbuilt handles).
    pub fn root(template: Rc<Template>, objects: Overlay) -> Rc<Self> {
        Rc::new(Self {
            parent: None,
            template,
            objects: RefCell::new(objects),
            constructing: RefCell::default(),
        })
    }

    /// Child sharing the template, seeded with `overlay`.
    pub fn create_child_scope(self: &Rc<Self>, overlay: Overlay) -> Rc<Scope> {
        Rc::new(Self {
            parent: Some(Rc::clone(self)),
            template: Rc::clone(&self.template),
            objects: RefCell::new(overlay),
            constructing: RefCell::default(),
        })
    }

    /// Memoized value for `identity` in this scope or an ancestor.
    pub fn lookup(&self, identity: &Identity) -> Option<Eventual<Value>> {
        let mut scope = Some(self);
        while let Some(current) = scope {
            if let Some(found) = current.objects.borrow().get(identity) {
                return Some(found.clone().settled());
            }
            scope = current.parent.as_deref();
        }
        None
    }

    /// Resolves `identity`, constructing and memoizing it on a miss.
    pub fn get(self: &Rc<Self>, identity: &Identity) -> Result<Eventual<Value>> {
        if let Some(found) = self.lookup(identity) {
            return Ok(found);
        }
        let memo = match self.construct(identity)? {
            Eventual::Ready(v) => Eventual::Ready(v),
            Eventual::Pending(fut) => {
                let scope = Rc::downgrade(self);
                let key = identity.clone();
                Eventual::from_future(async move {
                    let v = fut.await?;
                    if let Some(scope) = scope.upgrade() {
                        scope
                            .objects
                            .borrow_mut()
                            .insert(key, Eventual::Ready(v.clone()));
                    }
                    Ok(v)
                })
            }
        };
        self.objects
            .borrow_mut()
            .insert(identity.clone(), memo.clone());
        Ok(memo)
    }

    /// Builds `identity` from its descriptor, running its hooks.
    pub fn construct(self: &Rc<Self>, identity: &Identity) -> Result<Eventual<Value>> {
        let descriptor = self
            .template
            .descriptor(identity)
            .cloned()
            .ok_or_else(|| Error::MissingIdentity {
                identity: identity.clone(),
            })?;
        let _entered = Constructing::enter(self, identity)?;
        tracing::trace!(%identity, "scope.construct");

        let before = self.run_through(&descriptor.before, &Overlay::new())?;
        let scope = Rc::clone(self);
        let identity = identity.clone();
        before.and_then(move |_| scope.produce(identity, descriptor))
    }

    fn produce(
        self: &Rc<Self>,
        identity: Identity,
        descriptor: ObjectDescriptor,
    ) -> Result<Eventual<Value>> {
        let result = match (&descriptor.value, &descriptor.factory) {
            (Some(v), _) => Eventual::Ready(v.clone()),
            (None, Some(factory)) => self.invoke(factory, &Overlay::new())?,
            (None, None) => return Err(Error::UndefinedConstructionResult { identity }),
        };

        let scope = Rc::clone(self);
        result.and_then(move |value| {
            if is_unit(&value) {
                return Err(Error::UndefinedConstructionResult { identity });
            }
            let mut overlay = Overlay::new();
            overlay.insert(identity, Eventual::Ready(Rc::clone(&value)));
            Ok(scope
                .run_through(&descriptor.after, &overlay)?
                .map(move |_| value))
        })
    }

    /// Calls `spec` with its dependencies resolved from `overlay`, then the scope.
    pub fn invoke(self: &Rc<Self>, spec: &Spec, overlay: &Overlay) -> Result<Eventual<Value>> {
        self.invoke_with(spec, overlay, Vec::new())
    }

    /// Like [`invoke`](Scope::invoke), appending `extra` after the dependencies.
    ///
    /// Runs synchronously when every dependency is ready; otherwise the call
    /// is deferred until all of them settle.
    pub fn invoke_with(
        self: &Rc<Self>,
        spec: &Spec,
        overlay: &Overlay,
        extra: Vec<Value>,
    ) -> Result<Eventual<Value>> {
        let mut deps = Vec::with_capacity(spec.inject().len());
        for identity in spec.inject() {
            let dep = match overlay.get(identity) {
                Some(bound) => Ok(bound.clone()),
                None => self.get(identity),
            };
            let failed = dep.is_err();
            deps.push(dep);
            if failed {
                break;
            }
        }
        let spec = spec.clone();
        join_settled(deps)?.and_then(move |mut values| {
            values.extend(extra);
            spec.call(Args::new(values))
        })
    }

    /// Invokes every spec in registration order; settles when all have.
    ///
    /// A synchronous failure stops further invocations, but specs already
    /// started still run to completion before it is reported.
    fn run_through(
        self: &Rc<Self>,
        specs: &SpecSet,
        overlay: &Overlay,
    ) -> Result<Eventual<Vec<Value>>> {
        let mut results = Vec::with_capacity(specs.len());
        for spec in specs {
            let result = self.invoke(spec, overlay);
            let failed = result.is_err();
            results.push(result);
            if failed {
                break;
            }
        }
        join_settled(results)
    }
}

/// Marks an identity as under construction for the current call stack.
struct Constructing<'a> {
    scope: &'a Scope,
    identity: Identity,
}

impl<'a> Constructing<'a> {
    fn enter(scope: &'a Scope, identity: &Identity) -> Result<Self> {
        if !scope.constructing.borrow_mut().insert(identity.clone()) {
            return Err(Error::Cycle {
                identity: identity.clone(),
            });
        }
        Ok(Self {
            scope,
            identity: identity.clone(),
        })
    }
}

impl Drop for Constructing<'_> {
    fn drop(&mut self) {
        self.scope.constructing.borrow_mut().remove(&self.identity);
    }
}
