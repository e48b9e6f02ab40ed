//! [`ContextProperty`] — identity-keyed, per-request scratch storage.
//!
//! Unlike [`crate::accessor::Accessor`], a property has no decoder: it is a
//! plain typed slot that middleware sets and a downstream handler reads.
//! Storage is keyed by the property's identity, not its name, so two
//! properties declared with the same name never collide.

use crate::error::{RelicError, Result};
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PropertyId(u64);

impl PropertyId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        PropertyId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// A typed, named slot for attaching values to a request's lifetime.
///
/// Construct once (typically held in a `static` alongside the middleware
/// that sets it) and reuse the same instance everywhere that property is
/// read or written.
#[derive(Clone)]
pub struct ContextProperty<T> {
    id: PropertyId,
    name: &'static str,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T: Clone + Send + Sync + 'static> ContextProperty<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            id: PropertyId::next(),
            name,
            _marker: std::marker::PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn set(&self, store: &PropertyStore, value: T) {
        let mut entries = store.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(self.id, Box::new(value));
    }

    pub fn get(&self, store: &PropertyStore) -> Result<T> {
        let entries = store.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .get(&self.id)
            .and_then(|v| v.downcast_ref::<T>())
            .cloned()
            .ok_or(RelicError::MissingProperty { name: self.name })
    }

    pub fn try_get(&self, store: &PropertyStore) -> Option<T> {
        self.get(store).ok()
    }
}

/// The per-request table [`ContextProperty`] reads and writes against.
#[derive(Debug, Default)]
pub struct PropertyStore {
    entries: Mutex<HashMap<PropertyId, Box<dyn Any + Send + Sync>>>,
}

impl PropertyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_value() {
        let prop: ContextProperty<u32> = ContextProperty::new("count");
        let store = PropertyStore::new();
        prop.set(&store, 7);
        assert_eq!(prop.get(&store).unwrap(), 7);
    }

    #[test]
    fn unset_property_is_missing() {
        let prop: ContextProperty<u32> = ContextProperty::new("count");
        let store = PropertyStore::new();
        assert!(matches!(prop.get(&store), Err(RelicError::MissingProperty { .. })));
    }

    #[test]
    fn same_name_different_instances_do_not_collide() {
        let a: ContextProperty<u32> = ContextProperty::new("dup");
        let b: ContextProperty<u32> = ContextProperty::new("dup");
        let store = PropertyStore::new();
        a.set(&store, 1);
        assert!(b.get(&store).is_err());
    }
}
