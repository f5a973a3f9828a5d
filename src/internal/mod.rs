//! Internal implementation details.

pub(crate) mod circular;
pub(crate) mod freeze;

pub(crate) use freeze::FreezeCell;
