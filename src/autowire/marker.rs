//! Constructor metadata for auto-wiring.
//!
//! Rust has no runtime reflection, so a type lists its constructors
//! explicitly through [`Injectable`]. Each [`Constructor`] records whether it
//! carries the injection marker, its parameters in declaration order and the
//! function that builds the value from the resolved arguments.

use std::fmt;
use std::sync::Arc;

use crate::error::{DependencyError, DependencyResult};
use crate::key::{downcast, downcast_trait, AnyArc, ResolutionKey};

/// The injection marker: opts a constructor or parameter into auto-wiring
/// under a selector key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InjectMarker {
    selector: String,
}

impl InjectMarker {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
        }
    }

    pub fn selector(&self) -> &str {
        &self.selector
    }
}

/// A type whose values can be built by auto-wiring.
///
/// # Examples
///
/// ```rust
/// use lifewire::{Constructor, Injectable, StrategyCollection, DependencyManagerExt};
/// use std::sync::Arc;
///
/// struct Config {
///     url: String,
/// }
///
/// struct Repository {
///     config: Arc<Config>,
/// }
///
/// impl Injectable for Repository {
///     fn constructors() -> Vec<Constructor<Self>> {
///         vec![Constructor::inject("")
///             .param::<Config>("config", "")
///             .activate(|args| Ok(Repository { config: args.next::<Config>()? }))]
///     }
/// }
///
/// let mut strategies = StrategyCollection::new();
/// strategies.add_instance("", Config { url: "postgres://local".into() });
/// strategies.add_autowired::<Repository>("");
///
/// let container = strategies.build().unwrap();
/// let repo = container.resolve::<Repository>("").unwrap();
/// assert_eq!(repo.config.url, "postgres://local");
/// ```
pub trait Injectable: Sized + Send + Sync + 'static {
    /// Every public constructor of the type, marked or not.
    fn constructors() -> Vec<Constructor<Self>>;
}

/// One constructor parameter.
#[derive(Debug, Clone)]
pub struct Parameter {
    name: &'static str,
    service: ResolutionKey,
    marker: Option<InjectMarker>,
    required: bool,
}

impl Parameter {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn marker(&self) -> Option<&InjectMarker> {
        self.marker.as_ref()
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Key the parameter resolves; `None` for an unmarked parameter.
    pub fn key(&self) -> Option<ResolutionKey> {
        self.marker
            .as_ref()
            .map(|marker| ResolutionKey::new(self.service.service(), marker.selector()))
    }

    pub(crate) fn type_name(&self) -> &'static str {
        self.service.service().name()
    }
}

type Activator<T> = Arc<dyn Fn(&mut Arguments) -> DependencyResult<T> + Send + Sync>;

/// Description of one constructor of `T`.
pub struct Constructor<T> {
    name: &'static str,
    marker: Option<InjectMarker>,
    params: Vec<Parameter>,
    activator: Option<Activator<T>>,
}

impl<T> Constructor<T> {
    /// A constructor carrying the injection marker for `selector`.
    pub fn inject(selector: impl Into<String>) -> Self {
        Self {
            name: "new",
            marker: Some(InjectMarker::new(selector)),
            params: Vec::new(),
            activator: None,
        }
    }

    /// A constructor without the marker. Never selected for auto-wiring.
    pub fn unmarked(name: &'static str) -> Self {
        Self {
            name,
            marker: None,
            params: Vec::new(),
            activator: None,
        }
    }

    pub fn named(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Adds a marked parameter resolved as `P` under `selector`.
    pub fn param<P: ?Sized + 'static>(self, name: &'static str, selector: impl Into<String>) -> Self {
        self.push(name, ResolutionKey::default_of::<P>(), Some(InjectMarker::new(selector)), true)
    }

    /// Adds a marked parameter that resolves to nothing when unregistered.
    pub fn optional_param<P: ?Sized + 'static>(self, name: &'static str, selector: impl Into<String>) -> Self {
        self.push(name, ResolutionKey::default_of::<P>(), Some(InjectMarker::new(selector)), false)
    }

    /// Adds a parameter without the marker. A constructor with one cannot be
    /// auto-wired.
    pub fn unmarked_param<P: ?Sized + 'static>(self, name: &'static str) -> Self {
        self.push(name, ResolutionKey::default_of::<P>(), None, true)
    }

    fn push(mut self, name: &'static str, service: ResolutionKey, marker: Option<InjectMarker>, required: bool) -> Self {
        self.params.push(Parameter {
            name,
            service,
            marker,
            required,
        });
        self
    }

    /// Sets the function that builds `T` from the forced arguments.
    pub fn activate<F>(mut self, activator: F) -> Self
    where
        F: Fn(&mut Arguments) -> DependencyResult<T> + Send + Sync + 'static,
    {
        self.activator = Some(Arc::new(activator));
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn marker(&self) -> Option<&InjectMarker> {
        self.marker.as_ref()
    }

    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    pub(crate) fn activator(&self) -> Option<&Activator<T>> {
        self.activator.as_ref()
    }
}

impl<T> fmt::Debug for Constructor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constructor")
            .field("name", &self.name)
            .field("marker", &self.marker)
            .field("params", &self.params)
            .finish()
    }
}

/// Resolved constructor arguments, consumed in declaration order.
pub struct Arguments {
    values: std::vec::IntoIter<(&'static str, Option<AnyArc>)>,
    len: usize,
}

impl Arguments {
    pub(crate) fn new(values: Vec<(&'static str, Option<AnyArc>)>) -> Self {
        Self {
            len: values.len(),
            values: values.into_iter(),
        }
    }

    /// Total number of arguments.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Arguments not consumed yet.
    pub fn remaining(&self) -> usize {
        self.values.len()
    }

    fn take(&mut self) -> DependencyResult<(&'static str, Option<AnyArc>)> {
        self.values.next().ok_or_else(|| {
            DependencyError::configuration(format!("constructor consumed more than its {} arguments", self.len))
        })
    }

    fn present(name: &'static str, value: Option<AnyArc>) -> DependencyResult<AnyArc> {
        value.ok_or_else(|| {
            DependencyError::configuration(format!("argument `{}` is optional; use next_optional", name))
        })
    }

    /// Next argument as a sized service.
    pub fn next<P: Send + Sync + 'static>(&mut self) -> DependencyResult<Arc<P>> {
        let (name, value) = self.take()?;
        downcast::<P>(Self::present(name, value)?)
    }

    /// Next argument as a trait-object service.
    pub fn next_trait<P: ?Sized + Send + Sync + 'static>(&mut self) -> DependencyResult<Arc<P>> {
        let (name, value) = self.take()?;
        downcast_trait::<P>(Self::present(name, value)?)
    }

    /// Next argument of an optional parameter.
    pub fn next_optional<P: Send + Sync + 'static>(&mut self) -> DependencyResult<Option<Arc<P>>> {
        let (_, value) = self.take()?;
        value.map(downcast::<P>).transpose()
    }
}

impl fmt::Debug for Arguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arguments")
            .field("len", &self.len)
            .field("remaining", &self.remaining())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn parameter_key_uses_marker_selector() {
        let ctor = Constructor::<u8>::inject("").param::<String>("name", "primary");
        let key = ctor.params()[0].key().unwrap();
        assert_eq!(key, ResolutionKey::of::<String>("primary"));
    }

    #[test]
    fn unmarked_parameter_has_no_key() {
        let ctor = Constructor::<u8>::inject("").unmarked_param::<String>("raw");
        assert!(ctor.params()[0].key().is_none());
    }

    #[test]
    fn arguments_are_consumed_in_order() {
        let mut args = Arguments::new(vec![
            ("a", Some(Arc::new(1u8) as AnyArc)),
            ("b", None),
        ]);
        assert_eq!(*args.next::<u8>().unwrap(), 1);
        assert!(args.next_optional::<u16>().unwrap().is_none());
        assert_eq!(args.next::<u8>().unwrap_err().kind(), ErrorKind::Configuration);
        assert_eq!(args.len(), 2);
    }
}
