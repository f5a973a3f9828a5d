//! Resolution keys and type-erased value helpers.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::error::{DependencyError, DependencyResult};

/// Type-erased shared value produced by every strategy.
pub type AnyArc = Arc<dyn Any + Send + Sync>;

/// Identifier of a requested service type.
///
/// Wraps a `TypeId` together with the type name for diagnostics. Works for
/// unsized types too, so `TypeToken::of::<dyn Logger>()` names a trait
/// service. Equality and hashing only look at the `TypeId`.
///
/// # Examples
///
/// ```rust
/// use lifewire::TypeToken;
///
/// trait Logger: Send + Sync {}
///
/// let a = TypeToken::of::<String>();
/// let b = TypeToken::of::<String>();
/// assert_eq!(a, b);
/// assert_ne!(a, TypeToken::of::<dyn Logger>());
/// assert_eq!(a.name(), "alloc::string::String");
/// ```
#[derive(Clone, Copy)]
pub struct TypeToken {
    id: TypeId,
    name: &'static str,
}

impl TypeToken {
    #[inline(always)]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeToken {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeToken {}

impl Hash for TypeToken {
    #[inline(always)]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// What is being asked for: a requested type plus a selector key.
///
/// Selector keys tell apart several registrations of the same type. The
/// empty selector is the default registration; it is a key like any other.
///
/// # Examples
///
/// ```rust
/// use lifewire::ResolutionKey;
///
/// let primary = ResolutionKey::of::<u16>("primary");
/// let replica = ResolutionKey::of::<u16>("replica");
/// assert_ne!(primary, replica);
/// assert_eq!(primary, ResolutionKey::of::<u16>("primary"));
///
/// assert!(ResolutionKey::default_of::<u16>().is_default());
/// assert_eq!(primary.context_key(), "u16_primary");
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ResolutionKey {
    service: TypeToken,
    selector: String,
}

impl ResolutionKey {
    pub fn new(service: TypeToken, selector: impl Into<String>) -> Self {
        Self {
            service,
            selector: selector.into(),
        }
    }

    /// Key for `T` under `selector`.
    pub fn of<T: ?Sized + 'static>(selector: impl Into<String>) -> Self {
        Self::new(TypeToken::of::<T>(), selector)
    }

    /// Key for `T` under the default (empty) selector.
    pub fn default_of<T: ?Sized + 'static>() -> Self {
        Self::new(TypeToken::of::<T>(), String::new())
    }

    pub fn service(&self) -> TypeToken {
        self.service
    }

    pub fn selector(&self) -> &str {
        &self.selector
    }

    pub fn is_default(&self) -> bool {
        self.selector.is_empty()
    }

    /// Cache key used by context-scoped strategies: `"{type}_{selector}"`.
    pub fn context_key(&self) -> String {
        format!("{}_{}", self.service.name(), self.selector)
    }
}

impl fmt::Debug for ResolutionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResolutionKey({}, {:?})", self.service.name(), self.selector)
    }
}

impl fmt::Display for ResolutionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.selector.is_empty() {
            f.write_str(self.service.name())
        } else {
            write!(f, "{}[{:?}]", self.service.name(), self.selector)
        }
    }
}

/// Erases a sized service value.
#[inline]
pub fn erase<T: Send + Sync + 'static>(value: T) -> AnyArc {
    Arc::new(value)
}

/// Erases a trait-object service. Stored as `Arc<Arc<T>>` inside the `Any`.
#[inline]
pub fn erase_trait<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> AnyArc {
    Arc::new(value)
}

/// Recovers a sized service from an erased value.
pub fn downcast<T: Send + Sync + 'static>(value: AnyArc) -> DependencyResult<Arc<T>> {
    value
        .downcast::<T>()
        .map_err(|_| DependencyError::type_mismatch(std::any::type_name::<T>()))
}

/// Recovers a trait-object service from an erased value.
pub fn downcast_trait<T: ?Sized + Send + Sync + 'static>(value: AnyArc) -> DependencyResult<Arc<T>> {
    value
        .downcast::<Arc<T>>()
        .map(|outer| (*outer).clone())
        .map_err(|_| DependencyError::type_mismatch(std::any::type_name::<T>()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    trait Greeter: Send + Sync {
        fn greet(&self) -> &'static str;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self) -> &'static str {
            "hello"
        }
    }

    #[test]
    fn trait_values_round_trip_through_any() {
        let value = erase_trait::<dyn Greeter>(Arc::new(English));
        let greeter = downcast_trait::<dyn Greeter>(value).unwrap();
        assert_eq!(greeter.greet(), "hello");
    }

    #[test]
    fn wrong_downcast_is_type_mismatch() {
        let value = erase(7u8);
        let err = downcast::<u16>(value).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn display_includes_selector_only_when_present() {
        assert_eq!(ResolutionKey::default_of::<u8>().to_string(), "u8");
        assert_eq!(ResolutionKey::of::<u8>("x").to_string(), "u8[\"x\"]");
    }
}
