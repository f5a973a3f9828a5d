//! Constructor selection and argument resolution.

use crate::cancellation::CancellationToken;
use crate::error::{DependencyError, DependencyResult, ErrorKind};
use crate::key::{AnyArc, ResolutionKey};
use crate::strategy::activate;
use crate::traits::DependencyManager;

use super::marker::{Arguments, Constructor};

/// Deferred resolution of one constructor parameter.
#[derive(Debug, Clone)]
pub struct ArgumentThunk {
    name: &'static str,
    key: ResolutionKey,
    required: bool,
}

impl ArgumentThunk {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn key(&self) -> &ResolutionKey {
        &self.key
    }

    pub fn force(&self, manager: &dyn DependencyManager) -> DependencyResult<Option<AnyArc>> {
        manager.resolve_dependency(&self.key, self.required)
    }

    pub async fn force_async(
        &self,
        manager: &dyn DependencyManager,
        cancel: &CancellationToken,
    ) -> DependencyResult<Option<AnyArc>> {
        manager.resolve_dependency_async(&self.key, self.required, cancel).await
    }
}

/// The selected constructor of `T` and one thunk per parameter.
///
/// Built for a single resolution call and dropped afterwards.
pub struct ConstructionPlan<'c, T> {
    target: &'static str,
    constructor: &'c Constructor<T>,
    thunks: Vec<ArgumentThunk>,
}

impl<'c, T> ConstructionPlan<'c, T> {
    /// Selects the single marked constructor for `selector` and checks that
    /// every one of its parameters is marked, before anything is resolved.
    pub fn select(constructors: &'c [Constructor<T>], selector: &str) -> DependencyResult<Self> {
        let target = std::any::type_name::<T>();
        let mut eligible = constructors
            .iter()
            .filter(|ctor| ctor.marker().map(|m| m.selector() == selector).unwrap_or(false));

        let constructor = match (eligible.next(), eligible.next()) {
            (Some(only), None) => only,
            (None, _) => {
                return Err(DependencyError::configuration(format!(
                    "no eligible constructor on {} carries the injection marker for selector {:?}",
                    target, selector
                )))
            }
            (Some(_), Some(_)) => {
                return Err(DependencyError::configuration(format!(
                    "ambiguous constructor on {}: several carry the injection marker for selector {:?}",
                    target, selector
                )))
            }
        };

        let mut thunks = Vec::with_capacity(constructor.params().len());
        for param in constructor.params() {
            let key = param.key().ok_or_else(|| {
                DependencyError::configuration(format!(
                    "parameter `{}: {}` of {}::{} is missing the injection marker",
                    param.name(),
                    param.type_name(),
                    target,
                    constructor.name()
                ))
            })?;
            thunks.push(ArgumentThunk {
                name: param.name(),
                key,
                required: param.is_required(),
            });
        }

        Ok(Self {
            target,
            constructor,
            thunks,
        })
    }

    pub fn constructor(&self) -> &Constructor<T> {
        self.constructor
    }

    pub fn thunks(&self) -> &[ArgumentThunk] {
        &self.thunks
    }

    /// Forces the thunks in declaration order, then activates.
    pub fn execute(&self, manager: &dyn DependencyManager) -> DependencyResult<T> {
        let mut values = Vec::with_capacity(self.thunks.len());
        for thunk in &self.thunks {
            values.push((thunk.name, thunk.force(manager)?));
        }
        self.run(values)
    }

    /// Awaits the thunks one after another, then activates.
    pub async fn execute_async(
        &self,
        manager: &dyn DependencyManager,
        cancel: &CancellationToken,
    ) -> DependencyResult<T> {
        let mut values = Vec::with_capacity(self.thunks.len());
        for thunk in &self.thunks {
            cancel.check()?;
            values.push((thunk.name, thunk.force_async(manager, cancel).await?));
        }
        self.run(values)
    }

    fn run(&self, values: Vec<(&'static str, Option<AnyArc>)>) -> DependencyResult<T> {
        let activator = self.constructor.activator().ok_or_else(|| {
            DependencyError::configuration(format!(
                "constructor {}::{} has no activation function",
                self.target,
                self.constructor.name()
            ))
        })?;
        let mut arguments = Arguments::new(values);
        activate(self.target, || activator(&mut arguments)).map_err(|err| {
            if err.kind() == ErrorKind::Activation {
                err
            } else {
                DependencyError::activation(format!(
                    "constructor {}::{} failed",
                    self.target,
                    self.constructor.name()
                ))
                .with_cause(err)
            }
        })
    }
}

/// Builds `T` through its marked constructor for `key`'s selector.
pub(crate) fn construct<T: super::Injectable>(
    manager: &dyn DependencyManager,
    key: &ResolutionKey,
) -> DependencyResult<T> {
    let constructors = T::constructors();
    ConstructionPlan::select(&constructors, key.selector())?.execute(manager)
}

pub(crate) async fn construct_async<T: super::Injectable>(
    manager: &dyn DependencyManager,
    key: &ResolutionKey,
    cancel: &CancellationToken,
) -> DependencyResult<T> {
    let constructors = T::constructors();
    let plan = ConstructionPlan::select(&constructors, key.selector())?;
    plan.execute_async(manager, cancel).await
}
