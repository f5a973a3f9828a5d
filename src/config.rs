//! Container options and their environment/JSON loaders.

use std::env;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use crate::error::{DependencyError, DependencyResult};

pub const ENV_DETECT_CYCLES: &str = "LIFEWIRE_DETECT_CYCLES";
pub const ENV_MAX_DEPTH: &str = "LIFEWIRE_MAX_DEPTH";
pub const ENV_WARN_UNDISPOSED: &str = "LIFEWIRE_WARN_UNDISPOSED";

/// Tunables of a [`DependencyContainer`](crate::DependencyContainer).
///
/// # Examples
///
/// ```rust
/// use lifewire::{ContainerOptions, StrategyCollection};
///
/// let options = ContainerOptions::default()
///     .with_max_depth(32)
///     .with_warn_on_undisposed_drop(false);
///
/// let mut strategies = StrategyCollection::new();
/// strategies.with_options(options);
/// assert_eq!(strategies.options().max_depth, 32);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct ContainerOptions {
    /// Fail re-entrant resolution of a key with a circular error
    pub detect_cycles: bool,
    /// Deepest allowed chain of nested resolutions
    pub max_depth: usize,
    /// Log a warning when a container is dropped without `dispose`
    pub warn_on_undisposed_drop: bool,
}

impl Default for ContainerOptions {
    fn default() -> Self {
        Self {
            detect_cycles: true,
            max_depth: 256,
            warn_on_undisposed_drop: true,
        }
    }
}

impl ContainerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_detect_cycles(mut self, enabled: bool) -> Self {
        self.detect_cycles = enabled;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_warn_on_undisposed_drop(mut self, enabled: bool) -> Self {
        self.warn_on_undisposed_drop = enabled;
        self
    }

    /// Defaults overridden by the `LIFEWIRE_*` environment variables.
    ///
    /// Unset variables keep their default. A value that does not parse is a
    /// configuration error naming the variable.
    pub fn from_env() -> DependencyResult<Self> {
        let mut options = Self::default();
        if let Some(value) = read_var(ENV_DETECT_CYCLES) {
            options.detect_cycles = parse_bool(ENV_DETECT_CYCLES, &value)?;
        }
        if let Some(value) = read_var(ENV_MAX_DEPTH) {
            options.max_depth = parse_depth(&value)?;
        }
        if let Some(value) = read_var(ENV_WARN_UNDISPOSED) {
            options.warn_on_undisposed_drop = parse_bool(ENV_WARN_UNDISPOSED, &value)?;
        }
        tracing::debug!(?options, "container options loaded from environment");
        Ok(options)
    }

    /// Parses options from JSON; missing fields keep their defaults.
    #[cfg(feature = "config")]
    pub fn from_json_str(json: &str) -> DependencyResult<Self> {
        let options: Self = serde_json::from_str(json).map_err(|err| {
            DependencyError::configuration("invalid container options JSON").with_cause(err)
        })?;
        options.validate()?;
        Ok(options)
    }

    pub(crate) fn validate(&self) -> DependencyResult<()> {
        if self.max_depth == 0 {
            return Err(DependencyError::configuration("max_depth must be at least 1"));
        }
        Ok(())
    }
}

fn read_var(name: &str) -> Option<String> {
    env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_bool(name: &str, value: &str) -> DependencyResult<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(DependencyError::configuration(format!(
            "{} must be a boolean, got {:?}",
            name, value
        ))),
    }
}

fn parse_depth(value: &str) -> DependencyResult<usize> {
    let depth = value.parse::<usize>().map_err(|err| {
        DependencyError::configuration(format!(
            "{} must be a positive integer, got {:?}",
            ENV_MAX_DEPTH, value
        ))
        .with_cause(err)
    })?;
    if depth == 0 {
        return Err(DependencyError::configuration(format!(
            "{} must be at least 1",
            ENV_MAX_DEPTH
        )));
    }
    Ok(depth)
}
