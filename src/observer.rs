//! Resolution observers.
//!
//! Observers are notified synchronously around every resolution a container
//! performs. Keep implementations light; they run on the resolving thread.

use std::sync::Arc;
use std::time::Duration;

use crate::error::DependencyError;
use crate::key::ResolutionKey;

/// Hook into the resolution pipeline of a container.
///
/// # Examples
///
/// ```rust
/// use lifewire::{ResolutionObserver, ResolutionKey, StrategyCollection, DependencyManagerExt};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// #[derive(Default)]
/// struct Counter(AtomicUsize);
///
/// impl ResolutionObserver for Counter {
///     fn resolved(&self, _key: &ResolutionKey, _elapsed: Duration) {
///         self.0.fetch_add(1, Ordering::SeqCst);
///     }
/// }
///
/// let counter = Arc::new(Counter::default());
/// let mut strategies = StrategyCollection::new();
/// strategies.add_instance("", String::from("ready"));
/// strategies.add_observer(counter.clone());
///
/// let container = strategies.build().unwrap();
/// container.resolve::<String>("").unwrap();
/// assert_eq!(counter.0.load(Ordering::SeqCst), 1);
/// ```
pub trait ResolutionObserver: Send + Sync {
    /// Called before a strategy is asked for a value.
    fn resolving(&self, _key: &ResolutionKey) {}

    /// Called after a value was produced.
    fn resolved(&self, _key: &ResolutionKey, _elapsed: Duration) {}

    /// Called when resolution failed.
    fn failed(&self, _key: &ResolutionKey, _error: &DependencyError, _elapsed: Duration) {}
}

/// Observer that forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl TracingObserver {
    pub fn new() -> Self {
        Self
    }
}

impl ResolutionObserver for TracingObserver {
    fn resolving(&self, key: &ResolutionKey) {
        tracing::debug!(key = %key, "resolving");
    }

    fn resolved(&self, key: &ResolutionKey, elapsed: Duration) {
        tracing::debug!(key = %key, ?elapsed, "resolved");
    }

    fn failed(&self, key: &ResolutionKey, error: &DependencyError, elapsed: Duration) {
        tracing::warn!(key = %key, kind = %error.kind(), %error, ?elapsed, "resolution failed");
    }
}

#[derive(Default, Clone)]
pub(crate) struct Observers {
    observers: Vec<Arc<dyn ResolutionObserver>>,
}

impl Observers {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&mut self, observer: Arc<dyn ResolutionObserver>) {
        self.observers.push(observer);
    }

    #[inline]
    pub(crate) fn has_observers(&self) -> bool {
        !self.observers.is_empty()
    }

    #[inline]
    pub(crate) fn resolving(&self, key: &ResolutionKey) {
        for observer in &self.observers {
            observer.resolving(key);
        }
    }

    #[inline]
    pub(crate) fn resolved(&self, key: &ResolutionKey, elapsed: Duration) {
        for observer in &self.observers {
            observer.resolved(key, elapsed);
        }
    }

    #[inline]
    pub(crate) fn failed(&self, key: &ResolutionKey, error: &DependencyError, elapsed: Duration) {
        for observer in &self.observers {
            observer.failed(key, error, elapsed);
        }
    }
}
