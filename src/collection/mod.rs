//! Strategy collection: programmatic registration and container building.

use std::sync::Arc;

use crate::autowire::{AutowireStrategy, Injectable};
use crate::config::ContainerOptions;
use crate::error::DependencyResult;
use crate::key::ResolutionKey;
use crate::lifecycle::Lifecycle;
use crate::observer::{Observers, ResolutionObserver};
use crate::provider::DependencyContainer;
use crate::registration::{InnerFactory, Registry};
use crate::strategy::{
    DefaultConstructStrategy, FactoryStrategy, InstanceStrategy, ResolutionStrategy, SingletonStrategy,
};
use crate::traits::DependencyManager;

/// Registrations waiting to be built into a [`DependencyContainer`].
///
/// Each `add_*` call binds one [`ResolutionKey`] (the service type plus a
/// selector; `""` is the default selector) to a strategy. Registering a key
/// again replaces the earlier strategy.
///
/// # Examples
///
/// ```rust
/// use lifewire::{StrategyCollection, DependencyManagerExt, Lifecycle};
/// use std::sync::Arc;
///
/// struct Database {
///     url: String,
/// }
///
/// struct UserService {
///     db: Arc<Database>,
/// }
///
/// let mut strategies = StrategyCollection::new();
/// strategies.add_instance("", Database { url: "postgres://localhost".into() });
/// strategies.add_transient_factory::<UserService, _>("", |manager| {
///     Ok(UserService { db: manager.resolve::<Database>("")? })
/// });
///
/// let container = strategies.build().unwrap();
/// let users = container.resolve::<UserService>("").unwrap();
/// assert_eq!(users.db.url, "postgres://localhost");
/// container.dispose().unwrap();
/// ```
pub struct StrategyCollection {
    registry: Registry,
    observers: Observers,
    options: ContainerOptions,
}

impl StrategyCollection {
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
            observers: Observers::new(),
            options: ContainerOptions::default(),
        }
    }

    // ----- Raw strategies -----

    /// Registers any strategy under `key`.
    pub fn add_strategy<S: ResolutionStrategy + 'static>(&mut self, key: ResolutionKey, strategy: S) -> &mut Self {
        self.registry.insert_shared(key, Arc::new(strategy));
        self
    }

    /// Registers `strategy` unless `key` is already taken. Returns whether
    /// it was added.
    pub fn try_add_strategy<S: ResolutionStrategy + 'static>(&mut self, key: ResolutionKey, strategy: S) -> bool {
        if self.registry.contains(&key) {
            return false;
        }
        self.add_strategy(key, strategy);
        true
    }

    // ----- Instance -----

    pub fn add_instance<T: Send + Sync + 'static>(&mut self, selector: &str, value: T) -> &mut Self {
        self.add_strategy(ResolutionKey::of::<T>(selector), InstanceStrategy::new(value))
    }

    pub fn add_instance_trait<T: ?Sized + Send + Sync + 'static>(&mut self, selector: &str, value: Arc<T>) -> &mut Self {
        self.add_strategy(ResolutionKey::of::<T>(selector), InstanceStrategy::from_trait(value))
    }

    // ----- Transient -----

    /// A new `T::default()` on every resolution.
    pub fn add_transient<T: Default + Send + Sync + 'static>(&mut self, selector: &str) -> &mut Self {
        self.add_strategy(ResolutionKey::of::<T>(selector), DefaultConstructStrategy::of::<T>())
    }

    pub fn add_transient_factory<T, F>(&mut self, selector: &str, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&dyn DependencyManager) -> DependencyResult<T> + Send + Sync + 'static,
    {
        self.add_strategy(ResolutionKey::of::<T>(selector), FactoryStrategy::with_manager(factory))
    }

    /// A transient built by an async factory; resolve it with the async API.
    pub fn add_transient_async<T, E, F, Fut>(&mut self, selector: &str, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        E: std::error::Error + Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<T, E>> + Send + 'static,
    {
        self.add_strategy(ResolutionKey::of::<T>(selector), FactoryStrategy::from_async(factory))
    }

    /// `T` built through its marked constructor for `selector`.
    pub fn add_autowired<T: Injectable>(&mut self, selector: &str) -> &mut Self {
        self.add_strategy(ResolutionKey::of::<T>(selector), AutowireStrategy::of::<T>())
    }

    /// Trait service `S` served by auto-wired `T`s.
    pub fn add_autowired_trait<S, T, F>(&mut self, selector: &str, upcast: F) -> &mut Self
    where
        S: ?Sized + Send + Sync + 'static,
        T: Injectable,
        F: Fn(Arc<T>) -> Arc<S> + Send + Sync + 'static,
    {
        self.add_strategy(ResolutionKey::of::<S>(selector), AutowireStrategy::bind::<S, T, F>(upcast))
    }

    // ----- Singleton -----

    /// Wraps `inner` so its first value is frozen.
    pub fn add_singleton<S: ResolutionStrategy + 'static>(&mut self, key: ResolutionKey, inner: S) -> &mut Self {
        self.add_strategy(key, SingletonStrategy::new(inner))
    }

    pub fn add_singleton_factory<T, F>(&mut self, selector: &str, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&dyn DependencyManager) -> DependencyResult<T> + Send + Sync + 'static,
    {
        self.add_singleton(ResolutionKey::of::<T>(selector), FactoryStrategy::with_manager(factory))
    }

    pub fn add_singleton_autowired<T: Injectable>(&mut self, selector: &str) -> &mut Self {
        self.add_singleton(ResolutionKey::of::<T>(selector), AutowireStrategy::of::<T>())
    }

    // ----- Context-scoped -----

    /// One value per context scope. `make_inner` builds the inner strategy
    /// of each scope's wrapper.
    pub fn add_context_scoped<F>(&mut self, key: ResolutionKey, make_inner: F) -> &mut Self
    where
        F: Fn() -> Box<dyn ResolutionStrategy> + Send + Sync + 'static,
    {
        let make_inner: InnerFactory = Arc::new(make_inner);
        self.registry.insert_context(key, make_inner);
        self
    }

    pub fn add_context_factory<T, F>(&mut self, selector: &str, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&dyn DependencyManager) -> DependencyResult<T> + Send + Sync + 'static,
    {
        let factory = Arc::new(factory);
        self.add_context_scoped(ResolutionKey::of::<T>(selector), move || {
            let factory = factory.clone();
            Box::new(FactoryStrategy::with_manager(move |manager: &dyn DependencyManager| {
                factory(manager)
            }))
        })
    }

    pub fn add_context_autowired<T: Injectable>(&mut self, selector: &str) -> &mut Self {
        self.add_context_scoped(ResolutionKey::of::<T>(selector), || {
            Box::new(AutowireStrategy::of::<T>())
        })
    }

    // ----- Container wiring -----

    /// Adds an observer notified around every resolution.
    pub fn add_observer(&mut self, observer: Arc<dyn ResolutionObserver>) -> &mut Self {
        self.observers.add(observer);
        self
    }

    pub fn with_options(&mut self, options: ContainerOptions) -> &mut Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &ContainerOptions {
        &self.options
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.len() == 0
    }

    pub fn contains(&self, key: &ResolutionKey) -> bool {
        self.registry.contains(key)
    }

    fn into_container(self) -> DependencyResult<DependencyContainer> {
        self.options.validate()?;
        Ok(DependencyContainer::new(self.registry, self.observers, self.options))
    }

    /// Builds the container and creates every registered strategy in
    /// registration order.
    pub fn build(self) -> DependencyResult<DependencyContainer> {
        let container = self.into_container()?;
        container.create()?;
        Ok(container)
    }

    /// Async twin of [`build`](Self::build).
    pub async fn build_async(self) -> DependencyResult<DependencyContainer> {
        let container = self.into_container()?;
        container.create_async().await?;
        Ok(container)
    }
}

impl Default for StrategyCollection {
    fn default() -> Self {
        Self::new()
    }
}
