//! # Modules: declarative registries of factories, hooks and entry points.
//!
//! A [`Module`] maps identities to [`ObjectDescriptor`]s and keeps a set of
//! scheduled entry points. Modules compose with [`Module::extends`] and are
//! turned into running [`Instance`]s with [`Module::initiate`].
//!
//! ## Mutability
//! ```text
//! immutable.factory(..) ─► copy template ─► mutate copy ─► new immutable Module
//! mutable.factory(..)   ─► mutate in place ─────────────► same Module (shared handle)
//! ```
//! Every registration goes through one choke point (`with_mutations`), so a
//! holder of an immutable module never observes a partial mutation.
//!
//! ## Example
//! ```
//! use taskscope::{Args, Module, Spec, value};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> taskscope::Result<()> {
//! let module = Module::new()
//!     .constant("greeting", value("hello"))?
//!     .factory("message", Spec::with_deps(["greeting"], |args: Args| {
//!         let greeting = args.get::<&str>(0)?;
//!         Ok::<_, taskscope::Error>(value(format!("{greeting} world")))
//!     }))?
//!     .schedule(Spec::with_deps(["message", "$logger"], |args: Args| {
//!         let logger = args.get::<taskscope::Logger>(1)?;
//!         logger.info(args.get::<String>(0)?);
//!         Ok::<_, taskscope::Error>(())
//!     }))?;
//!
//! module.initiate().await?;
//! # Ok(())
//! # }
//! ```

mod descriptor;
mod spec;

#[cfg(test)]
mod tests;

use std::any::{Any, type_name};
use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::rc::Rc;

pub use descriptor::{ObjectDescriptor, Template};
pub use spec::{Args, Injectable, Spec, SpecFn, SpecSet};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::identity::{Identity, Value};
use crate::instance::Instance;

struct ModuleState {
    mutable: bool,
    template: Template,
}

/// Declarative registry of descriptors and scheduled entry points.
///
/// Cheap to clone. Immutable by default: registration methods return a new
/// module and leave `self` untouched. After [`as_mutable`](Module::as_mutable)
/// they mutate in place and return a handle to the same module.
#[derive(Clone)]
pub struct Module {
    state: Rc<RefCell<ModuleState>>,
}

impl Default for Module {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Module")
            .field("mutable", &state.mutable)
            .field("objects", &state.template.objects.len())
            .field("schedule", &state.template.schedule.len())
            .finish()
    }
}

impl Module {
    /// Creates an empty immutable module.
    pub fn new() -> Self {
        Self::from_template(Template::default(), false)
    }

    fn from_template(template: Template, mutable: bool) -> Self {
        Self {
            state: Rc::new(RefCell::new(ModuleState { mutable, template })),
        }
    }

    /// True if registrations mutate this module in place.
    pub fn is_mutable(&self) -> bool {
        self.state.borrow().mutable
    }

    /// True if registrations produce new modules.
    pub fn is_immutable(&self) -> bool {
        !self.is_mutable()
    }

    /// Mutable version of this module (`self` if already mutable, else a copy).
    pub fn as_mutable(&self) -> Module {
        if self.is_mutable() {
            return self.clone();
        }
        Self::from_template(self.template(), true)
    }

    /// Immutable version of this module (`self` if already immutable, else a copy).
    pub fn as_immutable(&self) -> Module {
        if self.is_immutable() {
            return self.clone();
        }
        Self::from_template(self.template(), false)
    }

    /// Copy of the current template.
    pub fn template(&self) -> Template {
        self.state.borrow().template.clone()
    }

    /// True if a descriptor exists for `identity`.
    pub fn has(&self, identity: impl Into<Identity>) -> bool {
        self.state
            .borrow()
            .template
            .objects
            .contains_key(&identity.into())
    }

    /// Registers `spec` as the factory of `identity`, clearing any constant.
    pub fn factory(&self, identity: impl Into<Identity>, spec: Spec) -> Result<Module> {
        let identity = registrable(identity.into())?;
        Ok(self.with_mutations(|t| {
            let descriptor = t.entry(identity);
            descriptor.value = None;
            descriptor.factory = Some(spec);
        }))
    }

    /// Registers a constant value for `identity`.
    pub fn constant(&self, identity: impl Into<Identity>, value: Value) -> Result<Module> {
        let identity = registrable(identity.into())?;
        Ok(self.with_mutations(|t| t.entry(identity).value = Some(value)))
    }

    /// Adds a hook settled before `identity` is produced.
    pub fn before(&self, identity: impl Into<Identity>, spec: Spec) -> Result<Module> {
        let identity = registrable(identity.into())?;
        Ok(self.with_mutations(|t| {
            t.entry(identity).before.insert(spec);
        }))
    }

    /// Adds a hook run after `identity` is produced.
    ///
    /// The hook may declare `identity` itself as a dependency to receive the
    /// value that was just constructed.
    pub fn after(&self, identity: impl Into<Identity>, spec: Spec) -> Result<Module> {
        let identity = registrable(identity.into())?;
        Ok(self.with_mutations(|t| {
            t.entry(identity).after.insert(spec);
        }))
    }

    /// Adds a scheduled entry point.
    pub fn schedule(&self, spec: Spec) -> Result<Module> {
        Ok(self.with_mutations(|t| {
            t.schedule.insert(spec);
        }))
    }

    /// Removes `identity` along with its hooks.
    pub fn delete(&self, identity: impl Into<Identity>) -> Result<Module> {
        let identity = identity.into();
        Ok(self.with_mutations(|t| {
            t.objects.remove(&identity);
        }))
    }

    /// Merges `other`'s schedule and descriptors into this module.
    ///
    /// Schedules are deduplicated by spec identity; descriptors replace ours
    /// for the same identity (last write wins). Hook sets are copied, so
    /// later registrations on either module do not leak into the other.
    pub fn extends(&self, other: &Module) -> Result<Module> {
        let theirs = other.template();
        Ok(self.with_mutations(move |t| {
            t.schedule.merge(&theirs.schedule);
            for (identity, descriptor) in theirs.objects {
                t.objects.insert(identity, descriptor);
            }
        }))
    }

    /// Like [`extends`](Module::extends) for a dynamically typed source.
    ///
    /// Fails with [`Error::InvalidModule`], naming `T`, unless `other` is a
    /// [`Module`].
    pub fn extends_dyn<T: Any>(&self, other: &T) -> Result<Module> {
        match (other as &dyn Any).downcast_ref::<Module>() {
            Some(module) => self.extends(module),
            None => Err(Error::InvalidModule {
                got: type_name::<T>(),
            }),
        }
    }

    /// Builds an instance from an immutable snapshot, without running it.
    pub fn instantiate(&self) -> Instance {
        self.instantiate_with(Config::default())
    }

    /// Like [`instantiate`](Module::instantiate) with an explicit config.
    pub fn instantiate_with(&self, config: Config) -> Instance {
        Instance::new(Rc::new(self.template()), config)
    }

    /// Runs an instance of this module to completion.
    ///
    /// The snapshot is taken when this is called: registrations made on a
    /// mutable module afterwards do not affect the returned future.
    pub fn initiate(&self) -> impl Future<Output = Result<()>> + 'static {
        self.initiate_with(Config::default())
    }

    /// Like [`initiate`](Module::initiate) with an explicit config.
    pub fn initiate_with(&self, config: Config) -> impl Future<Output = Result<()>> + 'static {
        let instance = self.instantiate_with(config);
        async move { instance.run().await }
    }

    fn with_mutations(&self, mutate: impl FnOnce(&mut Template)) -> Module {
        let mut state = self.state.borrow_mut();
        if state.mutable {
            mutate(&mut state.template);
            return self.clone();
        }
        let mut template = state.template.clone();
        drop(state);
        mutate(&mut template);
        Self::from_template(template, false)
    }
}

fn registrable(identity: Identity) -> Result<Identity> {
    if identity.is_reserved() {
        return Err(Error::InvalidFactory {
            reason: format!("{identity} is a reserved inbuilt identity"),
            identity,
        });
    }
    Ok(identity)
}
