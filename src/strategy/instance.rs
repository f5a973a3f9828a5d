use std::sync::Arc;

use crate::error::DependencyResult;
use crate::key::{erase_trait, AnyArc, ResolutionKey, TypeToken};
use crate::lifecycle::{Lifecycle, LifecycleCell};
use crate::lifetime::Lifetime;
use crate::traits::DependencyManager;

use super::{check_assignable, ResolutionStrategy};

/// Hands out one pre-built value.
///
/// The value is owned by whoever supplied it; create and dispose do not touch
/// it. Every resolution returns a clone of the same `Arc`.
pub struct InstanceStrategy {
    lifecycle: LifecycleCell,
    produces: TypeToken,
    value: AnyArc,
}

impl InstanceStrategy {
    pub fn new<T: Send + Sync + 'static>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    pub fn from_arc<T: Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self {
            lifecycle: LifecycleCell::new(),
            produces: TypeToken::of::<T>(),
            value,
        }
    }

    /// Instance of a trait-object service.
    pub fn from_trait<S: ?Sized + Send + Sync + 'static>(value: Arc<S>) -> Self {
        Self {
            lifecycle: LifecycleCell::new(),
            produces: TypeToken::of::<S>(),
            value: erase_trait(value),
        }
    }
}

impl Lifecycle for InstanceStrategy {
    fn lifecycle(&self) -> &LifecycleCell {
        &self.lifecycle
    }
}

impl ResolutionStrategy for InstanceStrategy {
    fn lifetime(&self) -> Lifetime {
        Lifetime::Instance
    }

    fn core_resolve(&self, _manager: &dyn DependencyManager, key: &ResolutionKey) -> DependencyResult<AnyArc> {
        check_assignable(self.produces, key)?;
        Ok(self.value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::StrategyCollection;
    use crate::strategy::ResolutionStrategyExt;

    #[test]
    fn returns_the_same_arc_every_time() {
        let container = StrategyCollection::new().build().unwrap();
        let original = Arc::new(String::from("cfg"));
        let strategy = InstanceStrategy::from_arc(original.clone());

        let a = strategy.resolve_typed::<String>(&container, "").unwrap();
        let b = strategy.resolve_typed::<String>(&container, "x").unwrap();
        assert!(Arc::ptr_eq(&a, &original));
        assert!(Arc::ptr_eq(&a, &b));
    }
}
