//! Error types for resolution strategies and the lifecycle state machine.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use crate::key::ResolutionKey;

/// Classification of a [`DependencyError`].
///
/// Every failure surfaces as one `DependencyError`; the kind only tells a
/// caller which part of the pipeline produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No strategy registered for the requested key
    NotRegistered,
    /// Missing injection marker, ambiguous constructor, unassignable type
    Configuration,
    /// The construction step itself failed or panicked
    Activation,
    /// A resolved value could not be downcast to the requested type
    TypeMismatch,
    /// A key was re-entered while it was still being resolved
    Circular,
    /// Nested resolution went deeper than the configured limit
    DepthExceeded,
    /// Operation on an object in the wrong lifecycle state
    State,
    /// The caller's cancellation token fired
    Cancelled,
    /// Wrapper added by a strategy boundary around any of the above
    Resolution,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::NotRegistered => "not registered",
            ErrorKind::Configuration => "configuration error",
            ErrorKind::Activation => "activation error",
            ErrorKind::TypeMismatch => "type mismatch",
            ErrorKind::Circular => "circular dependency",
            ErrorKind::DepthExceeded => "depth exceeded",
            ErrorKind::State => "state error",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Resolution => "resolution failed",
        };
        f.write_str(name)
    }
}

/// The single error type of the crate.
///
/// Carries a human-readable message, the key being resolved when one is
/// known, and the causing error. Cloning is cheap: the cause is shared.
///
/// # Examples
///
/// ```rust
/// use lifewire::{DependencyError, ErrorKind, ResolutionKey};
/// use std::error::Error;
///
/// let inner = DependencyError::activation("constructor failed");
/// let key = ResolutionKey::of::<String>("main");
/// let outer = DependencyError::resolution(&key, inner);
///
/// assert_eq!(outer.kind(), ErrorKind::Resolution);
/// assert!(outer.source().is_some());
/// assert_eq!(outer.root_cause().kind(), ErrorKind::Activation);
/// ```
#[derive(Clone)]
pub struct DependencyError {
    kind: ErrorKind,
    message: String,
    key: Option<ResolutionKey>,
    cause: Option<Arc<dyn Error + Send + Sync + 'static>>,
}

impl DependencyError {
    /// Creates an error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            key: None,
            cause: None,
        }
    }

    pub fn not_registered(key: &ResolutionKey) -> Self {
        Self::new(ErrorKind::NotRegistered, format!("no strategy registered for {}", key)).with_key(key)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    pub fn activation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Activation, message)
    }

    pub fn type_mismatch(expected: &'static str) -> Self {
        Self::new(ErrorKind::TypeMismatch, format!("resolved value is not a {}", expected))
    }

    pub fn circular(path: &[String]) -> Self {
        Self::new(ErrorKind::Circular, path.join(" -> "))
    }

    pub fn depth_exceeded(depth: usize) -> Self {
        Self::new(ErrorKind::DepthExceeded, format!("max depth {} exceeded", depth))
    }

    pub fn state(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::State, message)
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "operation was cancelled")
    }

    /// Wraps whatever a strategy's core resolution raised.
    ///
    /// A cause that is already the `Resolution` error for the same key is
    /// returned unchanged, so a wrapper and the strategy it owns do not both
    /// add a layer for one registration.
    pub fn resolution(key: &ResolutionKey, cause: DependencyError) -> Self {
        if cause.kind == ErrorKind::Resolution && cause.key.as_ref() == Some(key) {
            return cause;
        }
        Self::new(ErrorKind::Resolution, format!("failed to resolve {}", key))
            .with_key(key)
            .with_cause(cause)
    }

    /// Attaches the key being resolved.
    pub fn with_key(mut self, key: &ResolutionKey) -> Self {
        self.key = Some(key.clone());
        self
    }

    /// Attaches the causing error.
    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        self.cause = Some(Arc::new(cause));
        self
    }

    /// Attaches an already boxed cause.
    pub fn with_boxed_cause(mut self, cause: Box<dyn Error + Send + Sync + 'static>) -> Self {
        self.cause = Some(Arc::from(cause));
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn key(&self) -> Option<&ResolutionKey> {
        self.key.as_ref()
    }

    /// The directly wrapped error, if any.
    pub fn cause(&self) -> Option<&(dyn Error + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    /// Walks the chain of wrapped `DependencyError`s, starting with `self`.
    pub fn chain(&self) -> impl Iterator<Item = &DependencyError> {
        std::iter::successors(Some(self), |err| {
            err.cause
                .as_deref()
                .and_then(|cause| cause.downcast_ref::<DependencyError>())
        })
    }

    /// First error in the chain with the given kind.
    pub fn find_kind(&self, kind: ErrorKind) -> Option<&DependencyError> {
        self.chain().find(|err| err.kind == kind)
    }

    /// Innermost `DependencyError` of the chain.
    pub fn root_cause(&self) -> &DependencyError {
        self.chain().last().unwrap_or(self)
    }
}

impl fmt::Debug for DependencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("DependencyError");
        s.field("kind", &self.kind).field("message", &self.message);
        if let Some(key) = &self.key {
            s.field("key", &format_args!("{}", key));
        }
        if let Some(cause) = &self.cause {
            s.field("cause", &format_args!("{}", cause));
        }
        s.finish()
    }
}

impl fmt::Display for DependencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if let Some(cause) = &self.cause {
            write!(f, " (caused by: {})", cause)?;
        }
        Ok(())
    }
}

impl Error for DependencyError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause.as_deref().map(|cause| cause as &(dyn Error + 'static))
    }
}

/// Panic raised by a constructor or factory, captured as an error value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationPanic {
    pub message: String,
}

impl ActivationPanic {
    pub(crate) fn from_payload(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self { message }
    }
}

impl fmt::Display for ActivationPanic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "panicked: {}", self.message)
    }
}

impl Error for ActivationPanic {}

/// Result type for resolution and lifecycle operations.
pub type DependencyResult<T> = Result<T, DependencyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_does_not_double_wrap_same_key() {
        let key = ResolutionKey::of::<u32>("");
        let once = DependencyError::resolution(&key, DependencyError::activation("boom"));
        let twice = DependencyError::resolution(&key, once.clone());

        assert_eq!(twice.chain().count(), 2);
        assert_eq!(twice.message(), once.message());
    }

    #[test]
    fn resolution_wraps_foreign_key() {
        let inner_key = ResolutionKey::of::<u32>("inner");
        let outer_key = ResolutionKey::of::<u64>("outer");
        let inner = DependencyError::resolution(&inner_key, DependencyError::activation("boom"));
        let outer = DependencyError::resolution(&outer_key, inner);

        assert_eq!(outer.chain().count(), 3);
        assert_eq!(outer.root_cause().kind(), ErrorKind::Activation);
        assert_eq!(outer.find_kind(ErrorKind::Activation).map(|e| e.message()), Some("boom"));
    }

    #[test]
    fn panic_payload_text_is_kept() {
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("bad wiring"));
        let panic = ActivationPanic::from_payload(payload);
        assert_eq!(panic.to_string(), "panicked: bad wiring");
    }
}
