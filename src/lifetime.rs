//! Lifetime policies of resolution strategies.

use std::fmt;

/// When a resolution strategy may hand out a previously produced instance.
///
/// # Examples
///
/// ```rust
/// use lifewire::{StrategyCollection, DependencyManagerExt, Lifetime};
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct Clock;
///
/// let mut strategies = StrategyCollection::new();
/// strategies.add_transient::<Clock>("");
/// strategies.add_singleton_factory::<String, _>("", |_| Ok("shared".to_string()));
///
/// let container = strategies.build().unwrap();
/// assert_eq!(container.lifetime_of::<Clock>(""), Some(Lifetime::Transient));
///
/// // Transient: a new value every call
/// let a = container.resolve::<Clock>("").unwrap();
/// let b = container.resolve::<Clock>("").unwrap();
/// assert!(!Arc::ptr_eq(&a, &b));
///
/// // Singleton: the first value is frozen
/// let x = container.resolve::<String>("").unwrap();
/// let y = container.resolve::<String>("").unwrap();
/// assert!(Arc::ptr_eq(&x, &y));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifetime {
    /// A pre-built value supplied at registration, owned by the caller
    Instance,
    /// A new value on every resolution, nothing cached
    Transient,
    /// The first successful value is frozen for the life of the wrapper
    Singleton,
    /// One value per context scope, removed when the scope is disposed
    ContextScoped,
}

impl Lifetime {
    /// Whether strategies with this lifetime reuse earlier values.
    pub fn is_cached(&self) -> bool {
        !matches!(self, Lifetime::Transient)
    }
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Lifetime::Instance => "instance",
            Lifetime::Transient => "transient",
            Lifetime::Singleton => "singleton",
            Lifetime::ContextScoped => "context-scoped",
        };
        f.write_str(name)
    }
}
