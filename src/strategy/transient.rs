//! Leaf strategies that build a new value on every resolution.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;

use crate::cancellation::CancellationToken;
use crate::error::{DependencyError, DependencyResult};
use crate::key::{erase_trait, AnyArc, ResolutionKey, TypeToken};
use crate::lifecycle::{Lifecycle, LifecycleCell};
use crate::lifetime::Lifetime;
use crate::traits::DependencyManager;

use super::{activate, activate_async, activation_failed, check_assignable, ResolutionStrategy};

/// Builds values with `Default::default()`.
///
/// # Examples
///
/// ```rust
/// use lifewire::{DefaultConstructStrategy, ResolutionStrategyExt, StrategyCollection};
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct Widget;
///
/// let container = StrategyCollection::new().build().unwrap();
/// let strategy = DefaultConstructStrategy::of::<Widget>();
///
/// let a = strategy.resolve_typed::<Widget>(&container, "").unwrap();
/// let b = strategy.resolve_typed::<Widget>(&container, "").unwrap();
/// assert!(!Arc::ptr_eq(&a, &b));
/// ```
pub struct DefaultConstructStrategy {
    lifecycle: LifecycleCell,
    produces: TypeToken,
    target: &'static str,
    make: Arc<dyn Fn() -> AnyArc + Send + Sync>,
}

impl DefaultConstructStrategy {
    pub fn of<T: Default + Send + Sync + 'static>() -> Self {
        Self {
            lifecycle: LifecycleCell::new(),
            produces: TypeToken::of::<T>(),
            target: std::any::type_name::<T>(),
            make: Arc::new(|| Arc::new(T::default()) as AnyArc),
        }
    }

    /// Serves the trait service `S` with default-constructed `T`s.
    pub fn bind<S, T, F>(upcast: F) -> Self
    where
        S: ?Sized + Send + Sync + 'static,
        T: Default + Send + Sync + 'static,
        F: Fn(Arc<T>) -> Arc<S> + Send + Sync + 'static,
    {
        Self {
            lifecycle: LifecycleCell::new(),
            produces: TypeToken::of::<S>(),
            target: std::any::type_name::<T>(),
            make: Arc::new(move || erase_trait(upcast(Arc::new(T::default())))),
        }
    }
}

impl Lifecycle for DefaultConstructStrategy {
    fn lifecycle(&self) -> &LifecycleCell {
        &self.lifecycle
    }
}

impl ResolutionStrategy for DefaultConstructStrategy {
    fn lifetime(&self) -> Lifetime {
        Lifetime::Transient
    }

    fn core_resolve(&self, _manager: &dyn DependencyManager, key: &ResolutionKey) -> DependencyResult<AnyArc> {
        check_assignable(self.produces, key)?;
        activate(self.target, || Ok((self.make)()))
    }
}

type BlockingFactory = Arc<dyn Fn(&dyn DependencyManager) -> DependencyResult<AnyArc> + Send + Sync>;
type AsyncFactory = Arc<dyn Fn() -> BoxFuture<'static, DependencyResult<AnyArc>> + Send + Sync>;

enum Produce {
    Blocking(BlockingFactory),
    Async(AsyncFactory),
}

/// Builds values with a caller-supplied callback.
///
/// The callback may be plain, fallible, take the manager to resolve its own
/// dependencies, or return a future. Panics inside the callback surface as
/// activation errors.
///
/// # Examples
///
/// ```rust
/// use lifewire::{
///     CancellationToken, DependencyManagerExt, FactoryStrategy, ResolutionStrategyExt,
///     StrategyCollection,
/// };
///
/// struct Endpoint(String);
///
/// let mut strategies = StrategyCollection::new();
/// strategies.add_instance("host", String::from("db.local"));
/// let container = strategies.build().unwrap();
///
/// let endpoint = FactoryStrategy::with_manager(|manager| {
///     let host = manager.resolve::<String>("host")?;
///     Ok(Endpoint(format!("{}:5432", host)))
/// });
/// assert_eq!(endpoint.resolve_typed::<Endpoint>(&container, "").unwrap().0, "db.local:5432");
///
/// let ticket = FactoryStrategy::from_async(|| async { Ok::<_, std::io::Error>(42u64) });
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let value = ticket
///     .resolve_typed_async::<u64>(&container, "", &CancellationToken::none())
///     .await
///     .unwrap();
/// assert_eq!(*value, 42);
/// # });
/// ```
pub struct FactoryStrategy {
    lifecycle: LifecycleCell,
    produces: TypeToken,
    target: &'static str,
    produce: Produce,
}

impl FactoryStrategy {
    fn blocking(produces: TypeToken, target: &'static str, factory: BlockingFactory) -> Self {
        Self {
            lifecycle: LifecycleCell::new(),
            produces,
            target,
            produce: Produce::Blocking(factory),
        }
    }

    /// Infallible callback.
    pub fn new<T, F>(factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::blocking(
            TypeToken::of::<T>(),
            std::any::type_name::<T>(),
            Arc::new(move |_: &dyn DependencyManager| Ok(Arc::new(factory()) as AnyArc)),
        )
    }

    /// Fallible callback; its error becomes the cause of an activation error.
    pub fn try_new<T, E, F>(factory: F) -> Self
    where
        T: Send + Sync + 'static,
        E: std::error::Error + Send + Sync + 'static,
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
    {
        let target = std::any::type_name::<T>();
        Self::blocking(
            TypeToken::of::<T>(),
            target,
            Arc::new(move |_: &dyn DependencyManager| match factory() {
                Ok(value) => Ok(Arc::new(value) as AnyArc),
                Err(err) => Err(activation_failed(target, err)),
            }),
        )
    }

    /// Callback that resolves its own dependencies through the manager.
    pub fn with_manager<T, F>(factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&dyn DependencyManager) -> DependencyResult<T> + Send + Sync + 'static,
    {
        Self::blocking(
            TypeToken::of::<T>(),
            std::any::type_name::<T>(),
            Arc::new(move |manager: &dyn DependencyManager| {
                factory(manager).map(|value| Arc::new(value) as AnyArc)
            }),
        )
    }

    /// Callback producing a trait-object service.
    pub fn bind_trait<S, F>(factory: F) -> Self
    where
        S: ?Sized + Send + Sync + 'static,
        F: Fn() -> Arc<S> + Send + Sync + 'static,
    {
        Self::blocking(
            TypeToken::of::<S>(),
            std::any::type_name::<S>(),
            Arc::new(move |_: &dyn DependencyManager| Ok(erase_trait(factory()))),
        )
    }

    /// Callback returning a future. The future is awaited before the value
    /// is checked and erased.
    pub fn from_async<T, E, F, Fut>(factory: F) -> Self
    where
        T: Send + Sync + 'static,
        E: std::error::Error + Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let target = std::any::type_name::<T>();
        let produce: AsyncFactory = Arc::new(move || {
            let fut = factory();
            async move {
                match fut.await {
                    Ok(value) => Ok(Arc::new(value) as AnyArc),
                    Err(err) => Err(activation_failed(target, err)),
                }
            }
            .boxed()
        });
        Self {
            lifecycle: LifecycleCell::new(),
            produces: TypeToken::of::<T>(),
            target,
            produce: Produce::Async(produce),
        }
    }

    pub fn is_async(&self) -> bool {
        matches!(self.produce, Produce::Async(_))
    }
}

impl Lifecycle for FactoryStrategy {
    fn lifecycle(&self) -> &LifecycleCell {
        &self.lifecycle
    }
}

#[async_trait]
impl ResolutionStrategy for FactoryStrategy {
    fn lifetime(&self) -> Lifetime {
        Lifetime::Transient
    }

    fn core_resolve(&self, manager: &dyn DependencyManager, key: &ResolutionKey) -> DependencyResult<AnyArc> {
        check_assignable(self.produces, key)?;
        match &self.produce {
            Produce::Blocking(factory) => activate(self.target, || factory(manager)),
            Produce::Async(factory) => {
                if tokio::runtime::Handle::try_current().is_ok() {
                    return Err(DependencyError::configuration(format!(
                        "{} has an async factory; use resolve_async inside a tokio runtime",
                        self.target
                    )));
                }
                let pending = activate(self.target, || Ok(factory()))?;
                futures::executor::block_on(activate_async(self.target, pending))
            }
        }
    }

    async fn core_resolve_async(
        &self,
        manager: &dyn DependencyManager,
        key: &ResolutionKey,
        cancel: &CancellationToken,
    ) -> DependencyResult<AnyArc> {
        cancel.check()?;
        check_assignable(self.produces, key)?;
        match &self.produce {
            Produce::Blocking(factory) => activate(self.target, || factory(manager)),
            Produce::Async(factory) => {
                let pending = activate(self.target, || Ok(factory()))?;
                activate_async(self.target, pending).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::StrategyCollection;
    use crate::error::ErrorKind;
    use crate::strategy::ResolutionStrategyExt;

    trait Shape: Send + Sync {
        fn sides(&self) -> u8;
    }

    #[derive(Default)]
    struct Square;

    impl Shape for Square {
        fn sides(&self) -> u8 {
            4
        }
    }

    #[test]
    fn bound_default_construct_serves_the_trait() {
        let container = StrategyCollection::new().build().unwrap();
        let strategy = DefaultConstructStrategy::bind::<dyn Shape, Square, _>(|sq| sq as Arc<dyn Shape>);
        let shape = strategy.resolve_trait_typed::<dyn Shape>(&container, "").unwrap();
        assert_eq!(shape.sides(), 4);
    }

    #[test]
    fn unassignable_type_is_configuration_error() {
        let container = StrategyCollection::new().build().unwrap();
        let strategy = FactoryStrategy::new(|| 5u32);
        let err = strategy.resolve_typed::<u64>(&container, "").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Resolution);
        assert!(err.find_kind(ErrorKind::Configuration).is_some());
    }

    #[test]
    fn fallible_factory_error_is_the_cause() {
        let container = StrategyCollection::new().build().unwrap();
        let strategy = FactoryStrategy::try_new(|| {
            Err::<u32, _>(std::io::Error::new(std::io::ErrorKind::Other, "disk gone"))
        });
        let err = strategy.resolve_typed::<u32>(&container, "").unwrap_err();
        let activation = err.find_kind(ErrorKind::Activation).unwrap();
        assert_eq!(activation.cause().map(|c| c.to_string()), Some("disk gone".to_string()));
    }

    #[test]
    fn async_factory_runs_blocking_outside_a_runtime() {
        let container = StrategyCollection::new().build().unwrap();
        let strategy = FactoryStrategy::from_async(|| async { Ok::<_, std::io::Error>(String::from("late")) });
        assert!(strategy.is_async());
        let value = strategy.resolve_typed::<String>(&container, "").unwrap();
        assert_eq!(value.as_str(), "late");
    }

    #[tokio::test]
    async fn async_factory_refuses_blocking_resolution_inside_a_runtime() {
        let container = StrategyCollection::new().build().unwrap();
        let strategy = FactoryStrategy::from_async(|| async { Ok::<_, std::io::Error>(1u8) });
        let err = strategy.resolve_typed::<u8>(&container, "").unwrap_err();
        assert!(err.find_kind(ErrorKind::Configuration).is_some());

        let value = strategy
            .resolve_typed_async::<u8>(&container, "", &CancellationToken::none())
            .await
            .unwrap();
        assert_eq!(*value, 1);
    }

    #[tokio::test]
    async fn async_factory_panicking_before_its_future_is_activation_error() {
        let container = StrategyCollection::new().build().unwrap();
        let strategy = FactoryStrategy::from_async(|| {
            if true {
                panic!("no socket");
            }
            async { Ok::<u8, std::io::Error>(0) }
        });
        let err = strategy
            .resolve_typed_async::<u8>(&container, "", &CancellationToken::none())
            .await
            .unwrap_err();
        assert!(err.find_kind(ErrorKind::Activation).is_some());
    }

    #[test]
    fn eager_panic_in_async_factory_is_caught_outside_a_runtime() {
        let container = StrategyCollection::new().build().unwrap();
        let strategy = FactoryStrategy::from_async(|| {
            if true {
                panic!("no socket");
            }
            async { Ok::<u8, std::io::Error>(0) }
        });
        let err = strategy.resolve_typed::<u8>(&container, "").unwrap_err();
        assert!(err.find_kind(ErrorKind::Activation).is_some());
    }

    #[tokio::test]
    async fn async_factory_panic_is_activation_error() {
        let container = StrategyCollection::new().build().unwrap();
        let strategy = FactoryStrategy::from_async(|| async {
            if true {
                panic!("socket closed");
            }
            Ok::<u8, std::io::Error>(0)
        });
        let err = strategy
            .resolve_typed_async::<u8>(&container, "", &CancellationToken::none())
            .await
            .unwrap_err();
        assert!(err.find_kind(ErrorKind::Activation).is_some());
    }
}
