use crate::util::error::AllocationError;
use crate::util::Address;
use enum_map::Enum;
use strum_macros::{Display, EnumString};

/// A page-level attribute of a region. A tracer uses it to recognise pointers into
/// large objects while scanning roots.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Enum, Display, EnumString)]
pub enum PageKind {
    /// Pages that no attribute was attached to yet.
    Untagged,
    /// Pages that hold exactly one large object.
    LargeObject,
}

/// What the page resource knows about a region it handed out.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RegionDescriptor {
    pub start: Address,
    pub bytes: usize,
    pub generation: usize,
    pub kind: PageKind,
}

impl RegionDescriptor {
    pub fn contains(&self, addr: Address) -> bool {
        addr.is_in_range(self.start, self.bytes)
    }
}

/// The page allocator that backs the large object space.
///
/// It is shared with the rest of the collector, so the space never owns it: every
/// operation that needs memory takes the page resource as an argument. All regions
/// are page aligned and their sizes are multiples of the page size.
pub trait PageResource {
    /// Get a page-aligned region of `bytes` bytes whose pages are tagged with `generation`.
    fn alloc_region(&mut self, bytes: usize, generation: usize) -> Result<Address, AllocationError>;

    /// Attach a page-level attribute to a region returned by [`PageResource::alloc_region`].
    fn tag_region(&mut self, start: Address, bytes: usize, kind: PageKind);

    /// Change the generation of a region without moving it. This must be O(1) per region.
    fn retag_generation(&mut self, start: Address, bytes: usize, generation: usize);

    /// Give a region back. The region must not be accessed afterwards.
    fn free_region(&mut self, start: Address, bytes: usize);

    /// Find the region that contains `addr`, if any.
    fn region_of(&self, addr: Address) -> Option<RegionDescriptor>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn page_kind_names() {
        assert_eq!(PageKind::LargeObject.to_string(), "LargeObject");
        assert_eq!(PageKind::from_str("Untagged"), Ok(PageKind::Untagged));
        assert!(PageKind::from_str("Small").is_err());
    }
}
