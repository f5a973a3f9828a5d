//! Constructor auto-wiring.
//!
//! For a requested `(type, selector)` the strategy picks the one constructor
//! of the type that carries the injection marker for that selector, turns
//! each of its parameters into a deferred resolution through the manager,
//! forces those in declaration order and activates the constructor with the
//! results. Constructor metadata comes from [`Injectable`].

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;

use crate::cancellation::CancellationToken;
use crate::error::DependencyResult;
use crate::key::{erase_trait, AnyArc, ResolutionKey, TypeToken};
use crate::lifecycle::{Lifecycle, LifecycleCell};
use crate::lifetime::Lifetime;
use crate::strategy::{check_assignable, ResolutionStrategy};
use crate::traits::DependencyManager;

mod marker;
mod plan;

pub use marker::{Arguments, Constructor, Injectable, InjectMarker, Parameter};
pub use plan::{ArgumentThunk, ConstructionPlan};

#[async_trait]
trait Assemble: Send + Sync {
    fn assemble(&self, manager: &dyn DependencyManager, key: &ResolutionKey) -> DependencyResult<AnyArc>;

    async fn assemble_async(
        &self,
        manager: &dyn DependencyManager,
        key: &ResolutionKey,
        cancel: &CancellationToken,
    ) -> DependencyResult<AnyArc>;
}

struct Direct<T>(PhantomData<fn() -> T>);

#[async_trait]
impl<T: Injectable> Assemble for Direct<T> {
    fn assemble(&self, manager: &dyn DependencyManager, key: &ResolutionKey) -> DependencyResult<AnyArc> {
        plan::construct::<T>(manager, key).map(|value| Arc::new(value) as AnyArc)
    }

    async fn assemble_async(
        &self,
        manager: &dyn DependencyManager,
        key: &ResolutionKey,
        cancel: &CancellationToken,
    ) -> DependencyResult<AnyArc> {
        let value = plan::construct_async::<T>(manager, key, cancel).await?;
        Ok(Arc::new(value) as AnyArc)
    }
}

struct Bound<S: ?Sized, T, F> {
    upcast: F,
    _types: PhantomData<fn() -> (Arc<S>, T)>,
}

#[async_trait]
impl<S, T, F> Assemble for Bound<S, T, F>
where
    S: ?Sized + Send + Sync + 'static,
    T: Injectable,
    F: Fn(Arc<T>) -> Arc<S> + Send + Sync + 'static,
{
    fn assemble(&self, manager: &dyn DependencyManager, key: &ResolutionKey) -> DependencyResult<AnyArc> {
        let value = plan::construct::<T>(manager, key)?;
        Ok(erase_trait((self.upcast)(Arc::new(value))))
    }

    async fn assemble_async(
        &self,
        manager: &dyn DependencyManager,
        key: &ResolutionKey,
        cancel: &CancellationToken,
    ) -> DependencyResult<AnyArc> {
        let value = plan::construct_async::<T>(manager, key, cancel).await?;
        Ok(erase_trait((self.upcast)(Arc::new(value))))
    }
}

/// Transient strategy that builds values through their marked constructor.
///
/// The requested selector picks the constructor; the constructor's own
/// parameter markers pick the keys its arguments resolve under. The async
/// form awaits each argument before resolving the next.
///
/// # Examples
///
/// ```rust
/// use lifewire::{
///     AutowireStrategy, Constructor, DependencyManagerExt, Injectable, StrategyCollection,
/// };
/// use std::sync::Arc;
///
/// trait Notifier: Send + Sync {
///     fn channel(&self) -> String;
/// }
///
/// struct Email {
///     relay: Arc<String>,
/// }
///
/// impl Notifier for Email {
///     fn channel(&self) -> String {
///         format!("smtp via {}", self.relay)
///     }
/// }
///
/// impl Injectable for Email {
///     fn constructors() -> Vec<Constructor<Self>> {
///         vec![Constructor::inject("")
///             .param::<String>("relay", "smtp")
///             .activate(|args| Ok(Email { relay: args.next()? }))]
///     }
/// }
///
/// let mut strategies = StrategyCollection::new();
/// strategies.add_instance("smtp", String::from("mail.local"));
/// strategies.add_strategy(
///     lifewire::ResolutionKey::of::<dyn Notifier>(""),
///     AutowireStrategy::bind::<dyn Notifier, Email, _>(|email| email as Arc<dyn Notifier>),
/// );
///
/// let container = strategies.build().unwrap();
/// let notifier = container.resolve_trait::<dyn Notifier>("").unwrap();
/// assert_eq!(notifier.channel(), "smtp via mail.local");
/// ```
pub struct AutowireStrategy {
    lifecycle: LifecycleCell,
    produces: TypeToken,
    assembler: Box<dyn Assemble>,
}

impl AutowireStrategy {
    pub fn of<T: Injectable>() -> Self {
        Self {
            lifecycle: LifecycleCell::new(),
            produces: TypeToken::of::<T>(),
            assembler: Box::new(Direct::<T>(PhantomData)),
        }
    }

    /// Serves the trait service `S` with auto-wired `T`s.
    pub fn bind<S, T, F>(upcast: F) -> Self
    where
        S: ?Sized + Send + Sync + 'static,
        T: Injectable,
        F: Fn(Arc<T>) -> Arc<S> + Send + Sync + 'static,
    {
        Self {
            lifecycle: LifecycleCell::new(),
            produces: TypeToken::of::<S>(),
            assembler: Box::new(Bound::<S, T, F> {
                upcast,
                _types: PhantomData,
            }),
        }
    }
}

impl Lifecycle for AutowireStrategy {
    fn lifecycle(&self) -> &LifecycleCell {
        &self.lifecycle
    }
}

#[async_trait]
impl ResolutionStrategy for AutowireStrategy {
    fn lifetime(&self) -> Lifetime {
        Lifetime::Transient
    }

    fn core_resolve(&self, manager: &dyn DependencyManager, key: &ResolutionKey) -> DependencyResult<AnyArc> {
        check_assignable(self.produces, key)?;
        self.assembler.assemble(manager, key)
    }

    async fn core_resolve_async(
        &self,
        manager: &dyn DependencyManager,
        key: &ResolutionKey,
        cancel: &CancellationToken,
    ) -> DependencyResult<AnyArc> {
        cancel.check()?;
        check_assignable(self.produces, key)?;
        self.assembler.assemble_async(manager, key, cancel).await
    }
}
