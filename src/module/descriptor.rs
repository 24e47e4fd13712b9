//! Construction recipes held by a module template.

use std::collections::HashMap;

use super::spec::{Spec, SpecSet};
use crate::identity::{Identity, Value};

/// Recipe for one identity: constant or factory, plus lifecycle hooks.
///
/// A constant takes precedence over the factory. A descriptor with neither
/// fails construction with `UndefinedConstructionResult`, which is what a
/// hook registered for an identity nobody provides ends up with.
#[derive(Clone, Default, Debug)]
pub struct ObjectDescriptor {
    /// Constant value, if registered with `constant`.
    pub value: Option<Value>,
    /// Factory producing the value, if registered with `factory`.
    pub factory: Option<Spec>,
    /// Hooks settled before the value is produced.
    pub before: SpecSet,
    /// Hooks run after the value is produced, able to resolve it by identity.
    pub after: SpecSet,
}

impl ObjectDescriptor {
    /// Dependencies of the factory (empty for constants).
    pub fn inject(&self) -> &[Identity] {
        self.factory.as_ref().map(Spec::inject).unwrap_or(&[])
    }
}

/// Registered descriptors and scheduled entry points of a module.
#[derive(Clone, Default, Debug)]
pub struct Template {
    pub(crate) objects: HashMap<Identity, ObjectDescriptor>,
    pub(crate) schedule: SpecSet,
}

impl Template {
    /// Descriptor registered for `identity`.
    pub fn descriptor(&self, identity: &Identity) -> Option<&ObjectDescriptor> {
        self.objects.get(identity)
    }

    /// Scheduled entry points in registration order.
    pub fn schedule(&self) -> &SpecSet {
        &self.schedule
    }

    /// Registered identities, in no particular order.
    pub fn identities(&self) -> impl Iterator<Item = &Identity> {
        self.objects.keys()
    }

    pub(crate) fn entry(&mut self, identity: Identity) -> &mut ObjectDescriptor {
        self.objects.entry(identity).or_default()
    }
}
