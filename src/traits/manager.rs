//! The dependency manager interface consumed by strategies.

use std::sync::Arc;

use async_trait::async_trait;

use crate::cancellation::CancellationToken;
use crate::error::{DependencyError, DependencyResult};
use crate::key::{downcast, downcast_trait, AnyArc, ResolutionKey};

/// Object-safe resolution entry point.
///
/// Strategies receive a `&dyn DependencyManager` and use it to resolve their
/// own dependencies, most notably the parameter thunks of auto-wired
/// constructors. Both [`DependencyContainer`](crate::DependencyContainer) and
/// [`ContextScope`](crate::ContextScope) implement it.
///
/// Most callers want the typed helpers of [`DependencyManagerExt`].
#[async_trait]
pub trait DependencyManager: Send + Sync {
    /// Resolves `key`.
    ///
    /// With `required = false` an unregistered key yields `Ok(None)`; every
    /// other failure is still an error.
    fn resolve_dependency(
        &self,
        key: &ResolutionKey,
        required: bool,
    ) -> DependencyResult<Option<AnyArc>>;

    /// Async twin of [`resolve_dependency`](Self::resolve_dependency).
    async fn resolve_dependency_async(
        &self,
        key: &ResolutionKey,
        required: bool,
        cancel: &CancellationToken,
    ) -> DependencyResult<Option<AnyArc>>;

    /// Whether a strategy is registered for `key`.
    fn contains(&self, key: &ResolutionKey) -> bool;
}

/// Typed helpers over any [`DependencyManager`].
///
/// # Examples
///
/// ```rust
/// use lifewire::{StrategyCollection, DependencyManagerExt};
/// use std::sync::Arc;
///
/// trait Greeter: Send + Sync {
///     fn greet(&self) -> String;
/// }
///
/// struct English;
/// impl Greeter for English {
///     fn greet(&self) -> String {
///         "hello".into()
///     }
/// }
///
/// let mut strategies = StrategyCollection::new();
/// strategies.add_instance("port", 8080u16);
/// strategies.add_instance_trait::<dyn Greeter>("", Arc::new(English));
///
/// let container = strategies.build().unwrap();
/// assert_eq!(*container.resolve::<u16>("port").unwrap(), 8080);
/// assert_eq!(container.resolve_trait::<dyn Greeter>("").unwrap().greet(), "hello");
/// assert!(container.try_resolve::<u16>("missing").unwrap().is_none());
/// ```
#[async_trait]
pub trait DependencyManagerExt: DependencyManager {
    fn resolve<T: Send + Sync + 'static>(&self, selector: &str) -> DependencyResult<Arc<T>> {
        let key = ResolutionKey::of::<T>(selector);
        let value = required(&key, self.resolve_dependency(&key, true)?)?;
        downcast::<T>(value)
    }

    fn try_resolve<T: Send + Sync + 'static>(&self, selector: &str) -> DependencyResult<Option<Arc<T>>> {
        let key = ResolutionKey::of::<T>(selector);
        self.resolve_dependency(&key, false)?
            .map(downcast::<T>)
            .transpose()
    }

    fn resolve_trait<T: ?Sized + Send + Sync + 'static>(&self, selector: &str) -> DependencyResult<Arc<T>> {
        let key = ResolutionKey::of::<T>(selector);
        let value = required(&key, self.resolve_dependency(&key, true)?)?;
        downcast_trait::<T>(value)
    }

    fn try_resolve_trait<T: ?Sized + Send + Sync + 'static>(
        &self,
        selector: &str,
    ) -> DependencyResult<Option<Arc<T>>> {
        let key = ResolutionKey::of::<T>(selector);
        self.resolve_dependency(&key, false)?
            .map(downcast_trait::<T>)
            .transpose()
    }

    /// Resolves `T` or panics with the error.
    ///
    /// # Panics
    ///
    /// Panics when resolution fails for any reason.
    fn resolve_required<T: Send + Sync + 'static>(&self, selector: &str) -> Arc<T> {
        match self.resolve::<T>(selector) {
            Ok(value) => value,
            Err(err) => panic!("required dependency {} unavailable: {}", std::any::type_name::<T>(), err),
        }
    }

    async fn resolve_async<T: Send + Sync + 'static>(
        &self,
        selector: &str,
        cancel: &CancellationToken,
    ) -> DependencyResult<Arc<T>> {
        let key = ResolutionKey::of::<T>(selector);
        let value = self.resolve_dependency_async(&key, true, cancel).await?;
        downcast::<T>(required(&key, value)?)
    }

    async fn resolve_trait_async<T: ?Sized + Send + Sync + 'static>(
        &self,
        selector: &str,
        cancel: &CancellationToken,
    ) -> DependencyResult<Arc<T>> {
        let key = ResolutionKey::of::<T>(selector);
        let value = self.resolve_dependency_async(&key, true, cancel).await?;
        downcast_trait::<T>(required(&key, value)?)
    }
}

impl<M: DependencyManager + ?Sized> DependencyManagerExt for M {}

fn required(key: &ResolutionKey, value: Option<AnyArc>) -> DependencyResult<AnyArc> {
    value.ok_or_else(|| DependencyError::not_registered(key))
}
