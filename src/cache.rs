//! Lazily evaluated quantities with an explicit stale/clean state.
//!
//! Models keep one cache per quantity and invalidate all of them once per integration point.
//! Between two invalidations an accessor returns the cached value without re-evaluating it, even
//! if the inputs it was computed from have changed in the meantime. Callers are responsible for
//! invalidating before moving on to a new point or new field values.
use rustc_hash::FxHashMap;
use std::collections::hash_map::Entry;
use std::hash::Hash;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum EvalState {
    #[default]
    Stale,
    Clean,
}

/// A single cached value.
#[derive(Debug, Clone)]
pub struct Cached<V> {
    state: EvalState,
    value: Option<V>,
}

impl<V> Default for Cached<V> {
    fn default() -> Self {
        Self {
            state: EvalState::Stale,
            value: None,
        }
    }
}

impl<V> Cached<V> {
    pub fn state(&self) -> EvalState {
        self.state
    }

    pub fn is_stale(&self) -> bool {
        self.state == EvalState::Stale
    }

    pub fn invalidate(&mut self) {
        self.state = EvalState::Stale;
    }

    /// Stores a freshly evaluated value and marks the cache clean.
    pub fn set(&mut self, value: V) -> &V {
        self.state = EvalState::Clean;
        self.value.insert(value)
    }

    /// Returns the cached value.
    ///
    /// # Panics
    ///
    /// Panics if nothing has ever been stored.
    pub fn value(&self) -> &V {
        match &self.value {
            Some(value) => value,
            None => panic!("Cached value accessed before it was evaluated."),
        }
    }
}

/// Cached values keyed by e.g. a dof type, sharing a single state.
#[derive(Debug, Clone)]
pub struct DofCached<K, V> {
    values: FxHashMap<K, V>,
}

impl<K, V> Default for DofCached<K, V> {
    fn default() -> Self {
        Self {
            values: FxHashMap::default(),
        }
    }
}

impl<K: Eq + Hash, V> DofCached<K, V> {
    pub fn is_stale(&self, key: &K) -> bool {
        !self.values.contains_key(key)
    }

    pub fn state(&self, key: &K) -> EvalState {
        if self.is_stale(key) {
            EvalState::Stale
        } else {
            EvalState::Clean
        }
    }

    pub fn invalidate(&mut self) {
        self.values.clear();
    }

    pub fn set(&mut self, key: K, value: V) -> &V {
        match self.values.entry(key) {
            Entry::Occupied(mut entry) => {
                entry.insert(value);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(value),
        }
    }

    /// # Panics
    ///
    /// Panics if no value is cached for `key`.
    pub fn value(&self, key: &K) -> &V {
        &self.values[key]
    }
}
