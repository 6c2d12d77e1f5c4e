//! Cache lookup, population, and pruning operations on [`DriverCache`].
//!
//! [`DriverCache`]: crate::cache::DriverCache

mod lookup;
mod populate;
mod prune;

pub use lookup::{CacheLookupResult, MissReason};
pub use populate::select_binary;
