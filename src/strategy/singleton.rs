use async_trait::async_trait;

use crate::cancellation::CancellationToken;
use crate::error::DependencyResult;
use crate::internal::FreezeCell;
use crate::key::{AnyArc, ResolutionKey};
use crate::lifecycle::{Lifecycle, LifecycleCell};
use crate::lifetime::Lifetime;
use crate::traits::DependencyManager;

use super::ResolutionStrategy;

/// Freezes the first value its inner strategy produces.
///
/// The inner strategy runs at most once per successful freeze, even under
/// concurrent first resolutions: one caller wins and every other caller
/// waits for it, blocking threads on a condition variable and async tasks on
/// a notification. Once frozen, resolution only takes a read lock.
///
/// A failed first resolution does not freeze. Callers that were waiting for
/// that attempt receive the same error; the next caller tries again.
///
/// # Examples
///
/// ```rust
/// use lifewire::{FactoryStrategy, ResolutionStrategyExt, SingletonStrategy, StrategyCollection};
/// use std::sync::Arc;
///
/// let container = StrategyCollection::new().build().unwrap();
/// let singleton = SingletonStrategy::new(FactoryStrategy::new(|| vec![1, 2, 3]));
///
/// let a = singleton.resolve_typed::<Vec<i32>>(&container, "").unwrap();
/// let b = singleton.resolve_typed::<Vec<i32>>(&container, "").unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
/// ```
pub struct SingletonStrategy {
    lifecycle: LifecycleCell,
    inner: Box<dyn ResolutionStrategy>,
    cell: FreezeCell<AnyArc>,
}

impl SingletonStrategy {
    pub fn new<S: ResolutionStrategy + 'static>(inner: S) -> Self {
        Self::from_boxed(Box::new(inner))
    }

    pub fn from_boxed(inner: Box<dyn ResolutionStrategy>) -> Self {
        Self {
            lifecycle: LifecycleCell::new(),
            inner,
            cell: FreezeCell::new(),
        }
    }

    pub fn inner(&self) -> &dyn ResolutionStrategy {
        self.inner.as_ref()
    }

    pub fn is_frozen(&self) -> bool {
        self.cell.is_frozen()
    }
}

#[async_trait]
impl Lifecycle for SingletonStrategy {
    fn lifecycle(&self) -> &LifecycleCell {
        &self.lifecycle
    }

    fn on_create(&self, _creating: bool) -> DependencyResult<()> {
        self.inner.create()
    }

    fn on_dispose(&self) -> DependencyResult<()> {
        self.cell.clear();
        self.inner.dispose()
    }

    async fn on_create_async(&self, _creating: bool) -> DependencyResult<()> {
        self.inner.create_async().await
    }

    async fn on_dispose_async(&self) -> DependencyResult<()> {
        self.cell.clear();
        self.inner.dispose_async().await
    }
}

#[async_trait]
impl ResolutionStrategy for SingletonStrategy {
    fn lifetime(&self) -> Lifetime {
        Lifetime::Singleton
    }

    fn core_resolve(&self, manager: &dyn DependencyManager, key: &ResolutionKey) -> DependencyResult<AnyArc> {
        self.cell.get_or_try_init(|| {
            tracing::trace!(key = %key, "freezing singleton");
            self.inner.resolve(manager, key)
        })
    }

    async fn core_resolve_async(
        &self,
        manager: &dyn DependencyManager,
        key: &ResolutionKey,
        cancel: &CancellationToken,
    ) -> DependencyResult<AnyArc> {
        self.cell
            .get_or_try_init_async(cancel, || {
                tracing::trace!(key = %key, "freezing singleton");
                self.inner.resolve_async(manager, key, cancel)
            })
            .await
    }
}
