//! Memory policies.

/// The generational large object space.
pub mod largeobjectspace;
