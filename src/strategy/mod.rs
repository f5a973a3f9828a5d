//! Resolution strategies.
//!
//! A strategy knows how to produce the value for a [`ResolutionKey`] and
//! carries a [`Lifetime`] policy. Leaf strategies construct values
//! ([`InstanceStrategy`], [`DefaultConstructStrategy`], [`FactoryStrategy`],
//! [`AutowireStrategy`]); wrappers own exactly one inner strategy and add
//! caching on top of it ([`SingletonStrategy`], [`ContextStrategy`]).
//! Disposing a wrapper disposes its inner strategy.

use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;

use crate::cancellation::CancellationToken;
use crate::error::{ActivationPanic, DependencyError, DependencyResult};
use crate::key::{downcast, downcast_trait, AnyArc, ResolutionKey, TypeToken};
use crate::lifecycle::Lifecycle;
use crate::lifetime::Lifetime;
use crate::traits::DependencyManager;

mod context;
mod instance;
mod singleton;
mod transient;

pub use context::ContextStrategy;
pub use instance::InstanceStrategy;
pub use singleton::SingletonStrategy;
pub use transient::{DefaultConstructStrategy, FactoryStrategy};

pub use crate::autowire::AutowireStrategy;

/// How a value for a key is produced.
///
/// Implementors override [`core_resolve`](Self::core_resolve) and, when they
/// can suspend, [`core_resolve_async`](Self::core_resolve_async). Callers
/// use [`resolve`](Self::resolve) and
/// [`resolve_async`](Self::resolve_async), which refuse to run on a disposed
/// strategy and turn every failure into one `Resolution` error for the key.
///
/// # Examples
///
/// ```rust
/// use lifewire::{
///     AnyArc, DependencyManager, DependencyResult, Lifecycle, LifecycleCell, Lifetime,
///     ResolutionKey, ResolutionStrategy, ResolutionStrategyExt, StrategyCollection,
/// };
/// use std::sync::atomic::{AtomicU64, Ordering};
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct Sequence {
///     lifecycle: LifecycleCell,
///     next: AtomicU64,
/// }
///
/// impl Lifecycle for Sequence {
///     fn lifecycle(&self) -> &LifecycleCell {
///         &self.lifecycle
///     }
/// }
///
/// impl ResolutionStrategy for Sequence {
///     fn lifetime(&self) -> Lifetime {
///         Lifetime::Transient
///     }
///
///     fn core_resolve(&self, _: &dyn DependencyManager, _: &ResolutionKey) -> DependencyResult<AnyArc> {
///         Ok(Arc::new(self.next.fetch_add(1, Ordering::SeqCst)))
///     }
/// }
///
/// let container = StrategyCollection::new().build().unwrap();
/// let sequence = Sequence::default();
/// assert_eq!(*sequence.resolve_typed::<u64>(&container, "").unwrap(), 0);
/// assert_eq!(*sequence.resolve_typed::<u64>(&container, "").unwrap(), 1);
///
/// sequence.dispose().unwrap();
/// assert!(sequence.resolve_typed::<u64>(&container, "").is_err());
/// ```
#[async_trait]
pub trait ResolutionStrategy: Lifecycle {
    fn lifetime(&self) -> Lifetime;

    /// Produces the value. Errors may be of any kind; [`resolve`](Self::resolve)
    /// normalizes them.
    fn core_resolve(&self, manager: &dyn DependencyManager, key: &ResolutionKey) -> DependencyResult<AnyArc>;

    async fn core_resolve_async(
        &self,
        manager: &dyn DependencyManager,
        key: &ResolutionKey,
        cancel: &CancellationToken,
    ) -> DependencyResult<AnyArc> {
        cancel.check()?;
        self.core_resolve(manager, key)
    }

    fn resolve(&self, manager: &dyn DependencyManager, key: &ResolutionKey) -> DependencyResult<AnyArc> {
        ensure_live(self, key)?;
        self.core_resolve(manager, key)
            .map_err(|err| DependencyError::resolution(key, err))
    }

    async fn resolve_async(
        &self,
        manager: &dyn DependencyManager,
        key: &ResolutionKey,
        cancel: &CancellationToken,
    ) -> DependencyResult<AnyArc> {
        ensure_live(self, key)?;
        self.core_resolve_async(manager, key, cancel)
            .await
            .map_err(|err| DependencyError::resolution(key, err))
    }
}

fn ensure_live<S: ResolutionStrategy + ?Sized>(strategy: &S, key: &ResolutionKey) -> DependencyResult<()> {
    if strategy.lifecycle().is_disposed() {
        let err = DependencyError::state(format!(
            "{} strategy for {} has been disposed",
            strategy.lifetime(),
            key
        ));
        return Err(DependencyError::resolution(key, err));
    }
    Ok(())
}

/// Typed resolution helpers over any strategy.
#[async_trait]
pub trait ResolutionStrategyExt: ResolutionStrategy {
    fn resolve_typed<T: Send + Sync + 'static>(
        &self,
        manager: &dyn DependencyManager,
        selector: &str,
    ) -> DependencyResult<Arc<T>> {
        let key = ResolutionKey::of::<T>(selector);
        downcast::<T>(self.resolve(manager, &key)?)
    }

    fn resolve_trait_typed<T: ?Sized + Send + Sync + 'static>(
        &self,
        manager: &dyn DependencyManager,
        selector: &str,
    ) -> DependencyResult<Arc<T>> {
        let key = ResolutionKey::of::<T>(selector);
        downcast_trait::<T>(self.resolve(manager, &key)?)
    }

    async fn resolve_typed_async<T: Send + Sync + 'static>(
        &self,
        manager: &dyn DependencyManager,
        selector: &str,
        cancel: &CancellationToken,
    ) -> DependencyResult<Arc<T>> {
        let key = ResolutionKey::of::<T>(selector);
        downcast::<T>(self.resolve_async(manager, &key, cancel).await?)
    }

    async fn resolve_trait_typed_async<T: ?Sized + Send + Sync + 'static>(
        &self,
        manager: &dyn DependencyManager,
        selector: &str,
        cancel: &CancellationToken,
    ) -> DependencyResult<Arc<T>> {
        let key = ResolutionKey::of::<T>(selector);
        downcast_trait::<T>(self.resolve_async(manager, &key, cancel).await?)
    }
}

impl<S: ResolutionStrategy + ?Sized> ResolutionStrategyExt for S {}

/// Fails unless the requested service is the type a leaf strategy produces.
pub(crate) fn check_assignable(produces: TypeToken, key: &ResolutionKey) -> DependencyResult<()> {
    if produces != key.service() {
        return Err(DependencyError::configuration(format!(
            "{} is not assignable to requested type {}",
            produces.name(),
            key.service().name()
        ))
        .with_key(key));
    }
    Ok(())
}

/// Runs a construction step, turning a panic into an activation error.
pub(crate) fn activate<T, F>(target: &str, f: F) -> DependencyResult<T>
where
    F: FnOnce() -> DependencyResult<T>,
{
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| Err(panicked(target, payload)))
}

/// Async form of [`activate`].
pub(crate) async fn activate_async<T, Fut>(target: &str, fut: Fut) -> DependencyResult<T>
where
    Fut: Future<Output = DependencyResult<T>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(panicked(target, payload)),
    }
}

fn panicked(target: &str, payload: Box<dyn std::any::Any + Send>) -> DependencyError {
    let panic = ActivationPanic::from_payload(payload);
    tracing::warn!(target_type = target, message = %panic.message, "constructor panicked");
    DependencyError::activation(format!("constructing {} panicked", target)).with_cause(panic)
}

/// Wraps a user error as the activation failure of `target`.
pub(crate) fn activation_failed<E>(target: &str, err: E) -> DependencyError
where
    E: std::error::Error + Send + Sync + 'static,
{
    DependencyError::activation(format!("constructing {} failed", target)).with_cause(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn panics_become_activation_errors_with_cause() {
        let err = activate::<(), _>("Widget", || panic!("wheels missing")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Activation);
        let cause = err.cause().and_then(|c| c.downcast_ref::<ActivationPanic>()).unwrap();
        assert_eq!(cause.message, "wheels missing");
    }

    #[test]
    fn assignability_compares_service_types() {
        let key = ResolutionKey::of::<String>("");
        assert!(check_assignable(TypeToken::of::<String>(), &key).is_ok());
        let err = check_assignable(TypeToken::of::<u8>(), &key).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
