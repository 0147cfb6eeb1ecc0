//! Utilities used by the large object space.

/// The address type.
pub mod address;
/// Constants for word and page sizes.
pub mod constants;
/// Calculation, conversion and alignment for addresses and sizes.
pub mod conversions;
/// Errors returned by allocation.
pub mod error;
/// Lists of large objects.
pub mod generation_list;
/// Per-object metadata.
pub mod header;
/// Page resources and page accounting.
pub mod heap;
/// Logger initialization.
pub mod logger;
/// Wrappers for OS memory mapping.
pub mod memory;
/// Options.
pub mod options;

#[cfg(test)]
pub(crate) mod test_util;

pub use self::address::Address;
