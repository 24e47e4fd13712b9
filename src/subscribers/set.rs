//! # SubscriberSet: per-event ordered handler lists.
//!
//! [`SubscriberSet`] keeps, for every event type, the specs registered with
//! `on`/`once` in registration order. Publishing takes a snapshot, so
//! handlers added or removed while an event is being delivered only affect
//! later deliveries.
//!
//! ## Diagram
//! ```text
//!   insert("exit", spec) ──► ["exit"] = [e1, e2, ...] ──► Unsubscribe { "exit", id }
//!   snapshot("exit")     ──► [spec1, spec2, ...]        (registration order)
//!   unsubscribe()        ──► remove id (idempotent; no-op once the set is gone)
//! ```

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::module::Spec;

struct Entry {
    id: u64,
    spec: Spec,
}

/// Event type → ordered subscriber specs.
#[derive(Default)]
pub struct SubscriberSet {
    entries: RefCell<HashMap<String, Vec<Entry>>>,
    next_id: Cell<u64>,
}

impl SubscriberSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Appends `spec` to the subscribers of `event`.
    pub fn insert(self: &Rc<Self>, event: impl Into<String>, spec: Spec) -> Unsubscribe {
        self.insert_with(event, |_| spec)
    }

    /// Appends the spec built by `make`, which receives the registration's
    /// own [`Unsubscribe`] (used by self-removing handlers).
    pub fn insert_with(
        self: &Rc<Self>,
        event: impl Into<String>,
        make: impl FnOnce(&Unsubscribe) -> Spec,
    ) -> Unsubscribe {
        let event = event.into();
        let id = self.next_id.get();
        self.next_id.set(id + 1);

        let unsubscribe = Unsubscribe {
            set: Rc::downgrade(self),
            event: event.clone(),
            id,
        };
        let spec = make(&unsubscribe);
        self.entries
            .borrow_mut()
            .entry(event)
            .or_default()
            .push(Entry { id, spec });
        unsubscribe
    }

    /// Removes one registration. Returns true if it was present.
    pub fn remove(&self, event: &str, id: u64) -> bool {
        let mut entries = self.entries.borrow_mut();
        let Some(list) = entries.get_mut(event) else {
            return false;
        };
        let Some(pos) = list.iter().position(|e| e.id == id) else {
            return false;
        };
        list.remove(pos);
        if list.is_empty() {
            entries.remove(event);
        }
        true
    }

    /// Current subscribers of `event`, in registration order.
    #[must_use]
    pub fn snapshot(&self, event: &str) -> Vec<Spec> {
        self.entries
            .borrow()
            .get(event)
            .map(|list| list.iter().map(|e| e.spec.clone()).collect())
            .unwrap_or_default()
    }

    /// Number of subscribers of `event`.
    #[must_use]
    pub fn len(&self, event: &str) -> usize {
        self.entries.borrow().get(event).map_or(0, Vec::len)
    }

    /// True if nobody subscribed to any event.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

/// Removes one subscription; returned by `on`/`once`.
#[derive(Clone, Debug)]
pub struct Unsubscribe {
    set: Weak<SubscriberSet>,
    event: String,
    id: u64,
}

impl Unsubscribe {
    /// Removes the subscription. Idempotent: returns false if already removed.
    pub fn unsubscribe(&self) -> bool {
        match self.set.upgrade() {
            Some(set) => set.remove(&self.event, self.id),
            None => false,
        }
    }

    /// Event type of the subscription.
    pub fn event(&self) -> &str {
        &self.event
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_keeps_registration_order() {
        let set = SubscriberSet::new();
        let a = Spec::bare(|_| ());
        let b = Spec::bare(|_| ());
        set.insert("exit", a.clone());
        set.insert("exit", b.clone());
        let snap = set.snapshot("exit");
        assert_eq!(snap.len(), 2);
        assert!(snap[0].ptr_eq(&a));
        assert!(snap[1].ptr_eq(&b));
        assert!(set.snapshot("other").is_empty());
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let set = SubscriberSet::new();
        let first = set.insert("exit", Spec::bare(|_| ()));
        let second = set.insert("exit", Spec::bare(|_| ()));
        assert!(first.unsubscribe());
        assert!(!first.unsubscribe());
        assert_eq!(set.len("exit"), 1);
        assert!(second.unsubscribe());
        assert!(set.is_empty());
    }

    #[test]
    fn insert_with_sees_its_own_handle() {
        let set = SubscriberSet::new();
        let unsubscribe = set.insert_with("tick", |u| {
            assert_eq!(u.event(), "tick");
            Spec::bare(|_| ())
        });
        assert!(unsubscribe.unsubscribe());
    }

    #[test]
    fn unsubscribe_after_drop_is_noop() {
        let set = SubscriberSet::new();
        let unsubscribe = set.insert("exit", Spec::bare(|_| ()));
        drop(set);
        assert!(!unsubscribe.unsubscribe());
    }
}
