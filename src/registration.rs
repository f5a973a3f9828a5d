//! Strategy registry shared by a container and its scopes.

use std::collections::HashMap;
use std::sync::Arc;

use crate::key::ResolutionKey;
use crate::lifetime::Lifetime;
use crate::strategy::ResolutionStrategy;

/// Builds a fresh inner strategy for each context scope.
pub(crate) type InnerFactory = Arc<dyn Fn() -> Box<dyn ResolutionStrategy> + Send + Sync>;

pub(crate) enum Entry {
    /// One strategy shared by the root and every scope
    Shared(Arc<dyn ResolutionStrategy>),
    /// One context wrapper per scope, kept in the scope's slot
    Context { slot: usize, make_inner: InnerFactory },
}

impl Entry {
    pub(crate) fn lifetime(&self) -> Lifetime {
        match self {
            Entry::Shared(strategy) => strategy.lifetime(),
            Entry::Context { .. } => Lifetime::ContextScoped,
        }
    }
}

/// Registrations in registration order. Re-registering a key replaces the
/// entry in place, keeping its original position.
#[derive(Default)]
pub(crate) struct Registry {
    entries: Vec<(ResolutionKey, Entry)>,
    index: HashMap<ResolutionKey, usize>,
    context_slots: usize,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert_shared(&mut self, key: ResolutionKey, strategy: Arc<dyn ResolutionStrategy>) {
        self.insert(key, Entry::Shared(strategy));
    }

    pub(crate) fn insert_context(&mut self, key: ResolutionKey, make_inner: InnerFactory) {
        let existing = match self.get(&key) {
            Some(Entry::Context { slot, .. }) => Some(*slot),
            _ => None,
        };
        let slot = match existing {
            Some(slot) => slot,
            None => {
                self.context_slots += 1;
                self.context_slots - 1
            }
        };
        self.insert(key, Entry::Context { slot, make_inner });
    }

    fn insert(&mut self, key: ResolutionKey, entry: Entry) {
        match self.index.get(&key) {
            Some(&pos) => {
                tracing::debug!(key = %key, "replacing registration");
                self.entries[pos].1 = entry;
            }
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, entry));
            }
        }
    }

    #[inline]
    pub(crate) fn get(&self, key: &ResolutionKey) -> Option<&Entry> {
        self.index.get(key).map(|&pos| &self.entries[pos].1)
    }

    pub(crate) fn contains(&self, key: &ResolutionKey) -> bool {
        self.index.contains_key(key)
    }

    pub(crate) fn context_slots(&self) -> usize {
        self.context_slots
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Entries in registration order.
    #[cfg(any(test, feature = "diagnostics"))]
    pub(crate) fn iter(&self) -> impl DoubleEndedIterator<Item = (&ResolutionKey, &Entry)> {
        self.entries.iter().map(|(key, entry)| (key, entry))
    }

    /// Shared strategies in registration order.
    pub(crate) fn shared(&self) -> impl DoubleEndedIterator<Item = (&ResolutionKey, &Arc<dyn ResolutionStrategy>)> {
        self.entries.iter().filter_map(|(key, entry)| match entry {
            Entry::Shared(strategy) => Some((key, strategy)),
            Entry::Context { .. } => None,
        })
    }
}
