//! The dependency container and its context scopes.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use crate::cancellation::CancellationToken;
use crate::config::ContainerOptions;
use crate::error::{DependencyError, DependencyResult};
use crate::internal::circular;
use crate::key::{AnyArc, ResolutionKey};
use crate::lifecycle::{Lifecycle, LifecycleCell, LifecycleState};
use crate::lifetime::Lifetime;
use crate::observer::Observers;
use crate::registration::{Entry, Registry};
use crate::store::{ContextStore, MemoryContextStore};
use crate::strategy::ResolutionStrategy;
use crate::traits::DependencyManager;

pub mod scope;
pub use scope::ContextScope;

/// Resolves keys through their registered strategies.
///
/// Built by [`StrategyCollection::build`](crate::StrategyCollection::build),
/// which also creates every strategy. The container is cheap to clone; all
/// clones share the same strategies. Each resolution runs under a cycle and
/// depth guard and is reported to the registered observers.
///
/// Context-scoped registrations can only be resolved from a
/// [`ContextScope`]; see [`create_scope`](Self::create_scope).
///
/// Call [`dispose`](Lifecycle::dispose) (or its async twin) at teardown. It
/// disposes strategies in reverse registration order, keeps going when one
/// fails and returns the first failure.
///
/// # Examples
///
/// ```rust
/// use lifewire::{
///     DependencyManagerExt, ErrorKind, FactoryStrategy, Lifecycle, ResolutionKey,
///     StrategyCollection,
/// };
/// use std::sync::Arc;
///
/// let mut strategies = StrategyCollection::new();
/// strategies.add_singleton(ResolutionKey::of::<String>("name"), FactoryStrategy::new(|| "svc".to_string()));
/// strategies.add_context_factory::<Vec<u8>, _>("", |_| Ok(Vec::new()));
///
/// let container = strategies.build().unwrap();
/// let a = container.resolve::<String>("name").unwrap();
/// let b = container.resolve::<String>("name").unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
///
/// let err = container.resolve::<Vec<u8>>("").unwrap_err();
/// assert_eq!(err.kind(), ErrorKind::State);
///
/// container.dispose().unwrap();
/// ```
#[derive(Clone)]
pub struct DependencyContainer {
    inner: Arc<ContainerInner>,
}

pub(crate) struct ContainerInner {
    pub(crate) registry: Registry,
    pub(crate) observers: Observers,
    pub(crate) options: ContainerOptions,
    lifecycle: LifecycleCell,
}

impl DependencyContainer {
    pub(crate) fn new(registry: Registry, observers: Observers, options: ContainerOptions) -> Self {
        Self {
            inner: Arc::new(ContainerInner {
                registry,
                observers,
                options,
                lifecycle: LifecycleCell::new(),
            }),
        }
    }

    #[inline]
    pub(crate) fn inner(&self) -> &ContainerInner {
        &self.inner
    }

    /// Opens a context scope backed by a fresh in-memory store.
    pub fn create_scope(&self) -> ContextScope {
        self.create_scope_with(Arc::new(MemoryContextStore::new()))
    }

    /// Opens a context scope backed by `store`.
    pub fn create_scope_with(&self, store: Arc<dyn ContextStore>) -> ContextScope {
        ContextScope::new(self.clone(), store)
    }

    pub fn options(&self) -> &ContainerOptions {
        &self.inner.options
    }

    /// Lifetime of the strategy registered for `T` under `selector`.
    pub fn lifetime_of<T: ?Sized + 'static>(&self, selector: &str) -> Option<Lifetime> {
        self.lifetime_of_key(&ResolutionKey::of::<T>(selector))
    }

    pub fn lifetime_of_key(&self, key: &ResolutionKey) -> Option<Lifetime> {
        self.inner.registry.get(key).map(Entry::lifetime)
    }

    /// Number of registered keys.
    pub fn len(&self) -> usize {
        self.inner.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every registered key with its lifetime, in registration order.
    #[cfg(feature = "diagnostics")]
    pub fn registrations(&self) -> Vec<(ResolutionKey, Lifetime)> {
        self.inner
            .registry
            .iter()
            .map(|(key, entry)| (key.clone(), entry.lifetime()))
            .collect()
    }

    async fn resolve_root_async(
        &self,
        key: &ResolutionKey,
        required: bool,
        cancel: &CancellationToken,
    ) -> DependencyResult<Option<AnyArc>> {
        cancel.check()?;
        self.inner.ensure_live()?;
        match self.inner.registry.get(key) {
            None => missing(key, required),
            Some(Entry::Shared(strategy)) => self
                .inner
                .run_async(key, strategy.resolve_async(self, key, cancel))
                .await
                .map(Some),
            Some(Entry::Context { .. }) => Err(context_from_root(key)),
        }
    }
}

impl ContainerInner {
    pub(crate) fn ensure_live(&self) -> DependencyResult<()> {
        if self.lifecycle.is_disposed() {
            return Err(DependencyError::state("dependency container has been disposed"));
        }
        Ok(())
    }

    /// Runs a blocking resolution of `key` under the guard and observers.
    pub(crate) fn run<F>(&self, key: &ResolutionKey, resolve: F) -> DependencyResult<AnyArc>
    where
        F: FnOnce() -> DependencyResult<AnyArc>,
    {
        let _guard = circular::enter_blocking(key, &self.options)?;
        let started = self.start(key);
        let result = resolve();
        self.finish(key, started, &result);
        result
    }

    /// Async twin of [`run`](Self::run). Must be awaited inside
    /// `circular::with_task_stack`.
    pub(crate) async fn run_async<Fut>(&self, key: &ResolutionKey, resolve: Fut) -> DependencyResult<AnyArc>
    where
        Fut: Future<Output = DependencyResult<AnyArc>>,
    {
        let _guard = circular::enter_async(key, &self.options)?;
        let started = self.start(key);
        let result = resolve.await;
        self.finish(key, started, &result);
        result
    }

    fn start(&self, key: &ResolutionKey) -> Option<Instant> {
        if !self.observers.has_observers() {
            return None;
        }
        self.observers.resolving(key);
        Some(Instant::now())
    }

    fn finish(&self, key: &ResolutionKey, started: Option<Instant>, result: &DependencyResult<AnyArc>) {
        if let Err(err) = result {
            tracing::debug!(key = %key, kind = %err.kind(), "resolution failed");
        }
        if let Some(started) = started {
            let elapsed = started.elapsed();
            match result {
                Ok(_) => self.observers.resolved(key, elapsed),
                Err(err) => self.observers.failed(key, err, elapsed),
            }
        }
    }
}

impl Drop for ContainerInner {
    fn drop(&mut self) {
        if self.options.warn_on_undisposed_drop && self.lifecycle.state() == LifecycleState::Created {
            tracing::warn!(
                registrations = self.registry.len(),
                "dependency container dropped without dispose; call dispose() or dispose_async() first"
            );
        }
    }
}

pub(crate) fn missing(key: &ResolutionKey, required: bool) -> DependencyResult<Option<AnyArc>> {
    if required {
        Err(DependencyError::not_registered(key))
    } else {
        Ok(None)
    }
}

fn context_from_root(key: &ResolutionKey) -> DependencyError {
    DependencyError::state(format!(
        "{} is context-scoped and must be resolved from a ContextScope",
        key
    ))
    .with_key(key)
}

#[async_trait]
impl DependencyManager for DependencyContainer {
    fn resolve_dependency(&self, key: &ResolutionKey, required: bool) -> DependencyResult<Option<AnyArc>> {
        self.inner.ensure_live()?;
        match self.inner.registry.get(key) {
            None => missing(key, required),
            Some(Entry::Shared(strategy)) => self
                .inner
                .run(key, || strategy.resolve(self, key))
                .map(Some),
            Some(Entry::Context { .. }) => Err(context_from_root(key)),
        }
    }

    async fn resolve_dependency_async(
        &self,
        key: &ResolutionKey,
        required: bool,
        cancel: &CancellationToken,
    ) -> DependencyResult<Option<AnyArc>> {
        circular::with_task_stack(self.resolve_root_async(key, required, cancel)).await
    }

    fn contains(&self, key: &ResolutionKey) -> bool {
        self.inner.registry.contains(key)
    }
}

fn first_error(first: &mut Option<DependencyError>, key: &ResolutionKey, result: DependencyResult<()>) {
    if let Err(err) = result {
        tracing::warn!(key = %key, error = %err, "strategy failed to dispose");
        first.get_or_insert(err);
    }
}

#[async_trait]
impl Lifecycle for DependencyContainer {
    fn lifecycle(&self) -> &LifecycleCell {
        &self.inner.lifecycle
    }

    fn on_create(&self, _creating: bool) -> DependencyResult<()> {
        let mut created: Vec<&Arc<dyn ResolutionStrategy>> = Vec::new();
        for (key, strategy) in self.inner.registry.shared() {
            if let Err(err) = strategy.create() {
                tracing::error!(key = %key, error = %err, "strategy failed to create");
                for strategy in created.iter().rev() {
                    let _ = strategy.dispose();
                }
                return Err(err);
            }
            created.push(strategy);
        }
        tracing::debug!(strategies = created.len(), "container created");
        Ok(())
    }

    fn on_dispose(&self) -> DependencyResult<()> {
        let mut first = None;
        for (key, strategy) in self.inner.registry.shared().rev() {
            first_error(&mut first, key, strategy.dispose());
        }
        tracing::debug!("container disposed");
        first.map_or(Ok(()), Err)
    }

    async fn on_create_async(&self, _creating: bool) -> DependencyResult<()> {
        let mut created: Vec<&Arc<dyn ResolutionStrategy>> = Vec::new();
        for (key, strategy) in self.inner.registry.shared() {
            if let Err(err) = strategy.create_async().await {
                tracing::error!(key = %key, error = %err, "strategy failed to create");
                for strategy in created.iter().rev() {
                    let _ = strategy.dispose_async().await;
                }
                return Err(err);
            }
            created.push(strategy);
        }
        tracing::debug!(strategies = created.len(), "container created");
        Ok(())
    }

    async fn on_dispose_async(&self) -> DependencyResult<()> {
        let mut first = None;
        for (key, strategy) in self.inner.registry.shared().rev() {
            first_error(&mut first, key, strategy.dispose_async().await);
        }
        tracing::debug!("container disposed");
        first.map_or(Ok(()), Err)
    }
}

impl std::fmt::Debug for DependencyContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyContainer")
            .field("registrations", &self.inner.registry.len())
            .field("state", &self.inner.lifecycle.state())
            .finish()
    }
}
