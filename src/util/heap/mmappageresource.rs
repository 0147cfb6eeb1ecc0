use std::collections::HashMap;

use enum_map::EnumMap;

use super::accounting::PageAccounting;
use super::pageresource::{PageKind, PageResource, RegionDescriptor};
use crate::util::constants::BYTES_IN_PAGE;
use crate::util::conversions;
use crate::util::error::AllocationError;
use crate::util::memory;
use crate::util::options::Options;
use crate::util::Address;

/// A page resource that maps every region separately with an anonymous mmap.
///
/// Regions are recorded in a table keyed by their start address, so tagging,
/// retagging and freeing a region is O(1) regardless of its size. A second table
/// maps every page back to the start of its region to answer [`PageResource::region_of`]
/// for interior addresses.
pub struct MmapPageResource {
    accounting: PageAccounting,
    regions: HashMap<Address, RegionDescriptor>,
    page_to_region: HashMap<usize, Address>,
    pages_by_kind: EnumMap<PageKind, usize>,
    pages_by_generation: Vec<usize>,
    regions_freed: usize,
}

impl MmapPageResource {
    /// Create a page resource that hands out at most `heap_size` bytes (rounded down to whole pages).
    pub fn new(heap_size: usize) -> Self {
        let limit = heap_size / BYTES_IN_PAGE;
        debug!("MmapPageResource: budget of {} pages", limit);
        MmapPageResource {
            accounting: PageAccounting::new(limit),
            regions: HashMap::new(),
            page_to_region: HashMap::new(),
            pages_by_kind: EnumMap::default(),
            pages_by_generation: vec![],
            regions_freed: 0,
        }
    }

    pub fn from_options(options: &Options) -> Self {
        Self::new(options.heap_size)
    }

    pub fn reserved_pages(&self) -> usize {
        self.accounting.get_reserved_pages()
    }

    pub fn committed_pages(&self) -> usize {
        self.accounting.get_committed_pages()
    }

    pub fn available_pages(&self) -> usize {
        self.accounting.get_available_pages()
    }

    /// Number of committed pages that carry the given attribute.
    pub fn pages_of_kind(&self, kind: PageKind) -> usize {
        self.pages_by_kind[kind]
    }

    /// Number of committed pages tagged with the given generation.
    pub fn pages_in_generation(&self, generation: usize) -> usize {
        self.pages_by_generation
            .get(generation)
            .copied()
            .unwrap_or(0)
    }

    /// Number of regions currently handed out.
    pub fn live_regions(&self) -> usize {
        self.regions.len()
    }

    /// Number of regions given back since this page resource was created.
    pub fn regions_freed(&self) -> usize {
        self.regions_freed
    }

    fn generation_pages_mut(&mut self, generation: usize) -> &mut usize {
        if generation >= self.pages_by_generation.len() {
            self.pages_by_generation.resize(generation + 1, 0);
        }
        &mut self.pages_by_generation[generation]
    }

    fn region_mut(&mut self, start: Address, bytes: usize, op: &str) -> &mut RegionDescriptor {
        match self.regions.get_mut(&start) {
            Some(region) => {
                assert_eq!(
                    region.bytes, bytes,
                    "{}: region {} has {} bytes, not {}",
                    op, start, region.bytes, bytes
                );
                region
            }
            None => panic!("{}: {} is not the start of a live region", op, start),
        }
    }
}

impl PageResource for MmapPageResource {
    fn alloc_region(&mut self, bytes: usize, generation: usize) -> Result<Address, AllocationError> {
        debug_assert!(bytes > 0 && conversions::raw_is_aligned(bytes, BYTES_IN_PAGE));
        let pages = conversions::bytes_to_pages_up(bytes);
        if let Err(available_pages) = self.accounting.try_reserve(pages) {
            return Err(AllocationError::HeapOutOfMemory {
                requested_pages: pages,
                available_pages,
            });
        }

        let start = match memory::dzmmap_anywhere(bytes) {
            Ok(start) => start,
            Err(e) => {
                self.accounting.clear_reserved(pages);
                let errno = e.raw_os_error();
                if !errno.is_some_and(memory::is_mmap_oom) {
                    warn!("Unexpected mmap failure for {} bytes: {}", bytes, e);
                }
                return Err(AllocationError::MmapOutOfMemory { bytes, errno });
            }
        };
        self.accounting.commit(pages);
        debug_assert!(start.is_aligned_to(BYTES_IN_PAGE));

        let first_page = conversions::address_to_page_index(start);
        for page in first_page..first_page + pages {
            self.page_to_region.insert(page, start);
        }
        self.regions.insert(
            start,
            RegionDescriptor {
                start,
                bytes,
                generation,
                kind: PageKind::Untagged,
            },
        );
        self.pages_by_kind[PageKind::Untagged] += pages;
        *self.generation_pages_mut(generation) += pages;
        trace!(
            "MmapPageResource: mapped {} pages at {} for generation {}",
            pages,
            start,
            generation
        );
        Ok(start)
    }

    fn tag_region(&mut self, start: Address, bytes: usize, kind: PageKind) {
        let region = self.region_mut(start, bytes, "tag_region");
        let old = region.kind;
        region.kind = kind;
        let pages = conversions::bytes_to_pages_up(bytes);
        self.pages_by_kind[old] -= pages;
        self.pages_by_kind[kind] += pages;
    }

    fn retag_generation(&mut self, start: Address, bytes: usize, generation: usize) {
        let region = self.region_mut(start, bytes, "retag_generation");
        let old = region.generation;
        region.generation = generation;
        let pages = conversions::bytes_to_pages_up(bytes);
        *self.generation_pages_mut(old) -= pages;
        *self.generation_pages_mut(generation) += pages;
    }

    fn free_region(&mut self, start: Address, bytes: usize) {
        let region = *self.region_mut(start, bytes, "free_region");
        self.regions.remove(&start);
        let pages = conversions::bytes_to_pages_up(bytes);
        let first_page = conversions::address_to_page_index(start);
        for page in first_page..first_page + pages {
            self.page_to_region.remove(&page);
        }
        self.pages_by_kind[region.kind] -= pages;
        *self.generation_pages_mut(region.generation) -= pages;

        if let Err(e) = memory::munmap(start, bytes) {
            panic!("free_region: failed to unmap {} ({} bytes): {}", start, bytes, e);
        }
        self.accounting.release(pages);
        self.regions_freed += 1;
        trace!("MmapPageResource: unmapped {} pages at {}", pages, start);
    }

    fn region_of(&self, addr: Address) -> Option<RegionDescriptor> {
        let page = conversions::address_to_page_index(addr);
        self.page_to_region
            .get(&page)
            .and_then(|start| self.regions.get(start))
            .filter(|region| region.contains(addr))
            .copied()
    }
}

impl Drop for MmapPageResource {
    fn drop(&mut self) {
        for region in self.regions.values() {
            if let Err(e) = memory::munmap(region.start, region.bytes) {
                warn!("Failed to unmap {} on drop: {}", region.start, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::constants::BYTES_IN_MBYTE;

    #[test]
    fn alloc_tag_and_free() {
        let mut pr = MmapPageResource::new(BYTES_IN_MBYTE);
        let bytes = 3 * BYTES_IN_PAGE;
        let start = pr.alloc_region(bytes, 1).unwrap();
        assert!(start.is_aligned_to(BYTES_IN_PAGE));
        assert_eq!(pr.committed_pages(), 3);
        assert_eq!(pr.pages_of_kind(PageKind::Untagged), 3);
        assert_eq!(pr.pages_in_generation(1), 3);

        pr.tag_region(start, bytes, PageKind::LargeObject);
        assert_eq!(pr.pages_of_kind(PageKind::Untagged), 0);
        assert_eq!(pr.pages_of_kind(PageKind::LargeObject), 3);

        pr.free_region(start, bytes);
        assert_eq!(pr.committed_pages(), 0);
        assert_eq!(pr.reserved_pages(), 0);
        assert_eq!(pr.pages_of_kind(PageKind::LargeObject), 0);
        assert_eq!(pr.pages_in_generation(1), 0);
        assert_eq!(pr.live_regions(), 0);
        assert_eq!(pr.regions_freed(), 1);
    }

    #[test]
    fn retag_moves_pages_between_generations() {
        let mut pr = MmapPageResource::new(BYTES_IN_MBYTE);
        let bytes = 2 * BYTES_IN_PAGE;
        let start = pr.alloc_region(bytes, 0).unwrap();
        pr.retag_generation(start, bytes, 2);
        assert_eq!(pr.pages_in_generation(0), 0);
        assert_eq!(pr.pages_in_generation(2), 2);
        assert_eq!(pr.region_of(start).unwrap().generation, 2);
        pr.free_region(start, bytes);
    }

    #[test]
    fn region_of_interior_address() {
        let mut pr = MmapPageResource::new(BYTES_IN_MBYTE);
        let bytes = 2 * BYTES_IN_PAGE;
        let start = pr.alloc_region(bytes, 0).unwrap();
        let region = pr.region_of(start + (BYTES_IN_PAGE + 17)).unwrap();
        assert_eq!(region.start, start);
        assert_eq!(region.bytes, bytes);
        assert!(pr.region_of(start + bytes).map_or(true, |r| r.start != start));
        pr.free_region(start, bytes);
        assert!(pr.region_of(start).is_none());
    }

    #[test]
    fn budget_is_enforced() {
        let mut pr = MmapPageResource::new(4 * BYTES_IN_PAGE);
        let start = pr.alloc_region(3 * BYTES_IN_PAGE, 0).unwrap();
        let err = pr.alloc_region(2 * BYTES_IN_PAGE, 0).unwrap_err();
        assert_eq!(
            err,
            AllocationError::HeapOutOfMemory {
                requested_pages: 2,
                available_pages: 1,
            }
        );
        assert_eq!(pr.reserved_pages(), 3);
        pr.free_region(start, 3 * BYTES_IN_PAGE);
        assert!(pr.alloc_region(4 * BYTES_IN_PAGE, 0).is_ok());
    }

    #[test]
    #[should_panic(expected = "free_region")]
    fn free_unknown_region_panics() {
        let mut pr = MmapPageResource::new(BYTES_IN_MBYTE);
        pr.free_region(unsafe { Address::from_usize(0x1000_0000) }, BYTES_IN_PAGE);
    }
}
