use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::cancellation::CancellationToken;
use crate::error::DependencyResult;
use crate::key::{AnyArc, ResolutionKey};
use crate::lifecycle::{Lifecycle, LifecycleCell};
use crate::lifetime::Lifetime;
use crate::store::ContextStore;
use crate::traits::DependencyManager;

use super::ResolutionStrategy;

/// Caches values of its inner strategy in a per-context [`ContextStore`].
///
/// Values live under [`ResolutionKey::context_key`]. The wrapper remembers
/// which keys it wrote and, on dispose, removes exactly those from the store
/// one by one before disposing the inner strategy.
///
/// The store is not locked around the check-then-insert. Two first
/// resolutions of the same key racing inside one context may both call the
/// inner strategy; keeping one context on one logical flow is up to the
/// caller.
///
/// # Examples
///
/// ```rust
/// use lifewire::{
///     ContextStrategy, FactoryStrategy, Lifecycle, MemoryContextStore, ResolutionStrategyExt,
///     StrategyCollection,
/// };
/// use std::sync::Arc;
///
/// let container = StrategyCollection::new().build().unwrap();
/// let store = Arc::new(MemoryContextStore::new());
/// let per_request = ContextStrategy::new(FactoryStrategy::new(|| 0u64), store.clone());
///
/// let a = per_request.resolve_typed::<u64>(&container, "").unwrap();
/// let b = per_request.resolve_typed::<u64>(&container, "").unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
/// assert_eq!(store.len(), 1);
///
/// per_request.dispose().unwrap();
/// assert!(store.is_empty());
/// ```
pub struct ContextStrategy {
    lifecycle: LifecycleCell,
    inner: Box<dyn ResolutionStrategy>,
    store: Arc<dyn ContextStore>,
    tracked: Mutex<Vec<String>>,
}

impl ContextStrategy {
    pub fn new<S: ResolutionStrategy + 'static>(inner: S, store: Arc<dyn ContextStore>) -> Self {
        Self::from_boxed(Box::new(inner), store)
    }

    pub fn from_boxed(inner: Box<dyn ResolutionStrategy>, store: Arc<dyn ContextStore>) -> Self {
        Self {
            lifecycle: LifecycleCell::new(),
            inner,
            store,
            tracked: Mutex::new(Vec::new()),
        }
    }

    pub fn inner(&self) -> &dyn ResolutionStrategy {
        self.inner.as_ref()
    }

    /// Store keys this wrapper has written and not yet removed.
    pub fn tracked_keys(&self) -> Vec<String> {
        self.tracked.lock().clone()
    }

    fn cached(&self, cache_key: &str) -> Option<AnyArc> {
        let value = self.store.get_value(cache_key);
        if value.is_some() {
            tracing::trace!(cache_key, "context store hit");
        }
        value
    }

    fn remember(&self, cache_key: String, value: &AnyArc) {
        self.store.set_value(&cache_key, value.clone());
        let mut tracked = self.tracked.lock();
        if !tracked.contains(&cache_key) {
            tracked.push(cache_key);
        }
    }

    fn forget_all(&self) {
        let keys = std::mem::take(&mut *self.tracked.lock());
        for key in keys {
            self.store.remove_value(&key);
            tracing::trace!(cache_key = %key, "context value removed");
        }
    }
}

#[async_trait]
impl Lifecycle for ContextStrategy {
    fn lifecycle(&self) -> &LifecycleCell {
        &self.lifecycle
    }

    fn on_create(&self, _creating: bool) -> DependencyResult<()> {
        self.inner.create()
    }

    fn on_dispose(&self) -> DependencyResult<()> {
        self.forget_all();
        self.inner.dispose()
    }

    async fn on_create_async(&self, _creating: bool) -> DependencyResult<()> {
        self.inner.create_async().await
    }

    async fn on_dispose_async(&self) -> DependencyResult<()> {
        self.forget_all();
        self.inner.dispose_async().await
    }
}

#[async_trait]
impl ResolutionStrategy for ContextStrategy {
    fn lifetime(&self) -> Lifetime {
        Lifetime::ContextScoped
    }

    fn core_resolve(&self, manager: &dyn DependencyManager, key: &ResolutionKey) -> DependencyResult<AnyArc> {
        let cache_key = key.context_key();
        if let Some(value) = self.cached(&cache_key) {
            return Ok(value);
        }
        let value = self.inner.resolve(manager, key)?;
        self.remember(cache_key, &value);
        Ok(value)
    }

    async fn core_resolve_async(
        &self,
        manager: &dyn DependencyManager,
        key: &ResolutionKey,
        cancel: &CancellationToken,
    ) -> DependencyResult<AnyArc> {
        cancel.check()?;
        let cache_key = key.context_key();
        if let Some(value) = self.cached(&cache_key) {
            return Ok(value);
        }
        let value = self.inner.resolve_async(manager, key, cancel).await?;
        self.remember(cache_key, &value);
        Ok(value)
    }
}
