//! Context scopes.
//!
//! A scope owns one [`ContextStrategy`] per context-scoped registration,
//! built lazily on first use and backed by the scope's [`ContextStore`].
//! Everything else is delegated: instances and singletons resolve against the
//! root container, transients resolve with the scope as their manager so
//! their own dependencies can reach context-scoped values.

use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::cancellation::CancellationToken;
use crate::error::{DependencyError, DependencyResult};
use crate::internal::circular;
use crate::key::{AnyArc, ResolutionKey};
use crate::lifecycle::{Lifecycle, LifecycleCell};
use crate::lifetime::Lifetime;
use crate::registration::{Entry, InnerFactory};
use crate::store::ContextStore;
use crate::strategy::{ContextStrategy, ResolutionStrategy};
use crate::traits::DependencyManager;

use super::{missing, DependencyContainer};

/// One logical context (a request, a job, a session) over a container.
///
/// Context-scoped values are cached in the scope's store and are shared by
/// every resolution through this scope. Disposing the scope disposes its
/// wrappers in reverse creation order, which removes their values from the
/// store; the store itself and the root container stay usable.
///
/// # Examples
///
/// ```rust
/// use lifewire::{DependencyManagerExt, Lifecycle, StrategyCollection};
/// use std::sync::Arc;
///
/// struct RequestId(u64);
///
/// let mut strategies = StrategyCollection::new();
/// strategies.add_context_factory::<RequestId, _>("", |_| Ok(RequestId(7)));
/// let container = strategies.build().unwrap();
///
/// let scope = container.create_scope();
/// let a = scope.resolve::<RequestId>("").unwrap();
/// let b = scope.resolve::<RequestId>("").unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
///
/// let other = container.create_scope();
/// assert!(!Arc::ptr_eq(&a, &other.resolve::<RequestId>("").unwrap()));
///
/// scope.dispose().unwrap();
/// other.dispose().unwrap();
/// container.dispose().unwrap();
/// ```
pub struct ContextScope {
    root: DependencyContainer,
    store: Arc<dyn ContextStore>,
    slots: Box<[OnceCell<ContextStrategy>]>,
    created: Mutex<Vec<usize>>,
    lifecycle: LifecycleCell,
}

impl ContextScope {
    pub(crate) fn new(root: DependencyContainer, store: Arc<dyn ContextStore>) -> Self {
        let slots = (0..root.inner().registry.context_slots())
            .map(|_| OnceCell::new())
            .collect();
        Self {
            root,
            store,
            slots,
            created: Mutex::new(Vec::new()),
            lifecycle: LifecycleCell::new(),
        }
    }

    /// The container this scope was opened on.
    pub fn root(&self) -> &DependencyContainer {
        &self.root
    }

    pub fn store(&self) -> &Arc<dyn ContextStore> {
        &self.store
    }

    /// Number of context wrappers built so far.
    pub fn active_wrappers(&self) -> usize {
        self.created.lock().len()
    }

    fn ensure_live(&self) -> DependencyResult<()> {
        if self.lifecycle.is_disposed() {
            return Err(DependencyError::state("context scope has been disposed"));
        }
        self.root.inner().ensure_live()
    }

    fn slot(&self, slot: usize) -> DependencyResult<&OnceCell<ContextStrategy>> {
        self.slots
            .get(slot)
            .ok_or_else(|| DependencyError::state(format!("context slot {} is out of range", slot)))
    }

    /// The wrapper for `slot`, built and created on first use. Other threads
    /// wait on the slot until creation has finished.
    fn wrapper(&self, slot: usize, make_inner: &InnerFactory) -> DependencyResult<&ContextStrategy> {
        self.slot(slot)?.get_or_try_init(|| {
            let wrapper = ContextStrategy::from_boxed(make_inner(), self.store.clone());
            wrapper.create()?;
            self.created.lock().push(slot);
            Ok(wrapper)
        })
    }

    /// Async form of [`wrapper`](Self::wrapper). The wrapper is only
    /// published once `create_async` has finished; a task that loses the race
    /// to publish disposes its own copy and uses the winner.
    async fn wrapper_async(&self, slot: usize, make_inner: &InnerFactory) -> DependencyResult<&ContextStrategy> {
        let cell = self.slot(slot)?;
        if let Some(wrapper) = cell.get() {
            return Ok(wrapper);
        }
        let wrapper = ContextStrategy::from_boxed(make_inner(), self.store.clone());
        wrapper.create_async().await?;
        match cell.try_insert(wrapper) {
            Ok(published) => {
                self.created.lock().push(slot);
                Ok(published)
            }
            Err((published, lost)) => {
                if let Err(err) = lost.dispose_async().await {
                    tracing::warn!(error = %err, "discarded context wrapper failed to dispose");
                }
                Ok(published)
            }
        }
    }

    fn delegates_to_root(strategy: &dyn ResolutionStrategy) -> bool {
        matches!(strategy.lifetime(), Lifetime::Instance | Lifetime::Singleton)
    }

    async fn resolve_scoped_async(
        &self,
        key: &ResolutionKey,
        required: bool,
        cancel: &CancellationToken,
    ) -> DependencyResult<Option<AnyArc>> {
        cancel.check()?;
        self.ensure_live()?;
        let inner = self.root.inner();
        match inner.registry.get(key) {
            None => missing(key, required),
            Some(Entry::Shared(strategy)) if Self::delegates_to_root(strategy.as_ref()) => {
                self.root.resolve_dependency_async(key, required, cancel).await
            }
            Some(Entry::Shared(strategy)) => inner
                .run_async(key, strategy.resolve_async(self, key, cancel))
                .await
                .map(Some),
            Some(Entry::Context { slot, make_inner }) => inner
                .run_async(key, async {
                    let wrapper = self.wrapper_async(*slot, make_inner).await?;
                    wrapper.resolve_async(self, key, cancel).await
                })
                .await
                .map(Some),
        }
    }

    fn wrappers_in_reverse(&self) -> Vec<&ContextStrategy> {
        let created = self.created.lock().clone();
        created
            .into_iter()
            .rev()
            .filter_map(|slot| self.slots.get(slot).and_then(OnceCell::get))
            .collect()
    }
}

#[async_trait]
impl DependencyManager for ContextScope {
    fn resolve_dependency(&self, key: &ResolutionKey, required: bool) -> DependencyResult<Option<AnyArc>> {
        self.ensure_live()?;
        let inner = self.root.inner();
        match inner.registry.get(key) {
            None => missing(key, required),
            Some(Entry::Shared(strategy)) if Self::delegates_to_root(strategy.as_ref()) => {
                self.root.resolve_dependency(key, required)
            }
            Some(Entry::Shared(strategy)) => inner.run(key, || strategy.resolve(self, key)).map(Some),
            Some(Entry::Context { slot, make_inner }) => inner
                .run(key, || self.wrapper(*slot, make_inner)?.resolve(self, key))
                .map(Some),
        }
    }

    async fn resolve_dependency_async(
        &self,
        key: &ResolutionKey,
        required: bool,
        cancel: &CancellationToken,
    ) -> DependencyResult<Option<AnyArc>> {
        circular::with_task_stack(self.resolve_scoped_async(key, required, cancel)).await
    }

    fn contains(&self, key: &ResolutionKey) -> bool {
        self.root.contains(key)
    }
}

#[async_trait]
impl Lifecycle for ContextScope {
    fn lifecycle(&self) -> &LifecycleCell {
        &self.lifecycle
    }

    fn on_dispose(&self) -> DependencyResult<()> {
        let mut first = None;
        for wrapper in self.wrappers_in_reverse() {
            if let Err(err) = wrapper.dispose() {
                tracing::warn!(error = %err, "context wrapper failed to dispose");
                first.get_or_insert(err);
            }
        }
        first.map_or(Ok(()), Err)
    }

    async fn on_dispose_async(&self) -> DependencyResult<()> {
        let mut first = None;
        for wrapper in self.wrappers_in_reverse() {
            if let Err(err) = wrapper.dispose_async().await {
                tracing::warn!(error = %err, "context wrapper failed to dispose");
                first.get_or_insert(err);
            }
        }
        first.map_or(Ok(()), Err)
    }
}

impl Drop for ContextScope {
    fn drop(&mut self) {
        if self.root.options().warn_on_undisposed_drop
            && !self.lifecycle.is_disposed()
            && !self.created.get_mut().is_empty()
        {
            tracing::warn!(
                wrappers = self.created.get_mut().len(),
                "context scope dropped without dispose; its values stay in the store"
            );
        }
    }
}

impl std::fmt::Debug for ContextScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextScope")
            .field("slots", &self.slots.len())
            .field("active_wrappers", &self.active_wrappers())
            .field("state", &self.lifecycle.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::StrategyCollection;
    use crate::error::ErrorKind;
    use crate::traits::DependencyManagerExt;

    #[test]
    fn disposed_scope_refuses_resolution_and_clears_store() {
        let mut strategies = StrategyCollection::new();
        strategies.add_context_factory::<u32, _>("", |_| Ok(3));
        let container = strategies.build().unwrap();

        let scope = container.create_scope();
        scope.resolve::<u32>("").unwrap();
        assert!(scope.store().get_value("u32_").is_some());

        scope.dispose().unwrap();
        assert!(scope.store().get_value("u32_").is_none());
        assert_eq!(scope.resolve::<u32>("").unwrap_err().kind(), ErrorKind::State);
        container.dispose().unwrap();
    }

    #[test]
    fn wrappers_are_built_lazily() {
        let mut strategies = StrategyCollection::new();
        strategies.add_context_factory::<u32, _>("", |_| Ok(3));
        strategies.add_context_factory::<u64, _>("", |_| Ok(4));
        let container = strategies.build().unwrap();

        let scope = container.create_scope();
        assert_eq!(scope.active_wrappers(), 0);
        scope.resolve::<u64>("").unwrap();
        assert_eq!(scope.active_wrappers(), 1);
        scope.dispose().unwrap();
        container.dispose().unwrap();
    }
}
