//! Core traits of the resolution runtime.

mod manager;

pub use manager::{DependencyManager, DependencyManagerExt};
