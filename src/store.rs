//! Key/value stores backing context-scoped resolution.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::key::{downcast, AnyArc};

/// External storage of one context (a request, a session, ...).
///
/// Context-scoped strategies read and write their cached values here under
/// `"{type}_{selector}"` keys. The strategy takes no lock of its own around
/// these calls; an implementation must be safe to call from several threads,
/// but two first resolutions of the same key racing inside one context are
/// the caller's responsibility.
pub trait ContextStore: Send + Sync {
    fn has_value(&self, key: &str) -> bool;

    fn get_value(&self, key: &str) -> Option<AnyArc>;

    fn set_value(&self, key: &str, value: AnyArc);

    /// Removes and returns the value under `key`.
    fn remove_value(&self, key: &str) -> Option<AnyArc>;
}

/// Typed access to a [`ContextStore`].
///
/// # Examples
///
/// ```rust
/// use lifewire::{ContextStore, ContextStoreExt, MemoryContextStore};
///
/// let store = MemoryContextStore::new();
/// store.set("request_id", String::from("r-17"));
///
/// assert!(store.has_value("request_id"));
/// assert_eq!(store.get::<String>("request_id").as_deref().map(String::as_str), Some("r-17"));
/// assert!(store.get::<u32>("request_id").is_none());
/// ```
pub trait ContextStoreExt: ContextStore {
    /// The value under `key`, if present and of type `T`.
    fn get<T: Send + Sync + 'static>(&self, key: &str) -> Option<Arc<T>> {
        self.get_value(key).and_then(|value| downcast::<T>(value).ok())
    }

    fn set<T: Send + Sync + 'static>(&self, key: &str, value: T) {
        self.set_value(key, Arc::new(value));
    }
}

impl<S: ContextStore + ?Sized> ContextStoreExt for S {}

/// In-memory [`ContextStore`], the default store of a context scope.
#[derive(Default)]
pub struct MemoryContextStore {
    values: RwLock<HashMap<String, AnyArc>>,
}

impl MemoryContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }

    /// Keys currently held, in no particular order.
    pub fn keys(&self) -> Vec<String> {
        self.values.read().keys().cloned().collect()
    }
}

impl ContextStore for MemoryContextStore {
    fn has_value(&self, key: &str) -> bool {
        self.values.read().contains_key(key)
    }

    fn get_value(&self, key: &str) -> Option<AnyArc> {
        self.values.read().get(key).cloned()
    }

    fn set_value(&self, key: &str, value: AnyArc) {
        self.values.write().insert(key.to_string(), value);
    }

    fn remove_value(&self, key: &str) -> Option<AnyArc> {
        self.values.write().remove(key)
    }
}

impl std::fmt::Debug for MemoryContextStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryContextStore")
            .field("keys", &self.keys())
            .finish()
    }
}
