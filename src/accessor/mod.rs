//! The flyweight accessor pattern used by [`path_param`] and [`query_param`].
//!
//! An `Accessor<T, K, R>` pairs a lookup key of type `K` with a decoder from
//! the raw captured value `R` to the typed value `T`. Each `Accessor::new`
//! call mints a fresh identity; decoded values are memoized per request
//! *per identity*, not per key-and-decoder pair, so two accessors built from
//! the same name and the same decoding logic still decode (and cache)
//! independently. Cloning an existing `Accessor` preserves its identity —
//! only construction mints a new one.

pub mod path_param;
pub mod query_param;

use crate::error::{RelicError, Result};
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccessorId(u64);

impl AccessorId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        AccessorId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// The request-scoped table of captured raw values an accessor reads from.
#[derive(Debug, Clone, Default)]
pub struct RawStore<K, R> {
    values: HashMap<K, R>,
}

impl<K: std::hash::Hash + Eq, R> RawStore<K, R> {
    pub fn new() -> Self {
        Self { values: HashMap::new() }
    }

    pub fn insert(&mut self, key: K, value: R) {
        self.values.insert(key, value);
    }

    pub fn raw(&self, key: &K) -> Option<&R> {
        self.values.get(key)
    }
}

impl<K: std::hash::Hash + Eq, R> FromIterator<(K, R)> for RawStore<K, R> {
    fn from_iter<I: IntoIterator<Item = (K, R)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Per-request memoization cache, type-erased per [`AccessorId`]. Only
/// successfully decoded values are ever stored — a failed decode is
/// recomputed (and re-observed) on every call.
#[derive(Debug, Default)]
pub struct AccessorCache {
    entries: Mutex<HashMap<AccessorId, Box<dyn Any + Send + Sync>>>,
}

impl AccessorCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn get<T: Clone + Send + Sync + 'static>(&self, id: AccessorId) -> Option<T> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(&id).and_then(|v| v.downcast_ref::<T>()).cloned()
    }

    fn set<T: Clone + Send + Sync + 'static>(&self, id: AccessorId, value: T) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(id, Box::new(value));
    }
}

type Decode<T, R> = Arc<dyn Fn(&R) -> Result<T> + Send + Sync>;

/// A named, typed view over a raw captured value.
#[derive(Clone)]
pub struct Accessor<T, K, R> {
    id: AccessorId,
    key: K,
    decode: Decode<T, R>,
}

impl<T, K, R> Accessor<T, K, R>
where
    K: std::hash::Hash + Eq + Clone,
    T: Clone + Send + Sync + 'static,
{
    pub fn new(key: K, decode: impl Fn(&R) -> Result<T> + Send + Sync + 'static) -> Self {
        Self {
            id: AccessorId::next(),
            key,
            decode: Arc::new(decode),
        }
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    /// The raw captured value, undecoded.
    pub fn raw<'a>(&self, store: &'a RawStore<K, R>) -> Option<&'a R> {
        store.raw(&self.key)
    }

    /// Decode and memoize. Fails with `Missing` if nothing was captured for
    /// this key, or with the decoder's own error otherwise.
    pub fn call(&self, store: &RawStore<K, R>, cache: &AccessorCache) -> Result<T> {
        if let Some(cached) = cache.get::<T>(self.id) {
            return Ok(cached);
        }
        let raw = self.raw(store).ok_or(RelicError::Missing)?;
        let decoded = (self.decode)(raw)?;
        cache.set(self.id, decoded.clone());
        Ok(decoded)
    }

    /// Decode and memoize, treating an absent raw value as `Ok(None)` rather
    /// than `Missing` — a decoder failure on a *present* value still
    /// propagates. Use this when the caller distinguishes "not supplied"
    /// from "supplied but malformed"; `call` collapses both into an error.
    pub fn get(&self, store: &RawStore<K, R>, cache: &AccessorCache) -> Result<Option<T>> {
        if let Some(cached) = cache.get::<T>(self.id) {
            return Ok(Some(cached));
        }
        match self.raw(store) {
            None => Ok(None),
            Some(raw) => {
                let decoded = (self.decode)(raw)?;
                cache.set(self.id, decoded.clone());
                Ok(Some(decoded))
            }
        }
    }

    /// Like `call`, but swallows any failure — absence or decode error —
    /// into `None` instead of propagating it. A swallowed failure is not
    /// cached and is re-observed on the next call.
    pub fn try_get(&self, store: &RawStore<K, R>, cache: &AccessorCache) -> Option<T> {
        self.call(store, cache).ok()
    }
}
