// Some helpers are only used by a subset of the tests.
#![allow(dead_code)]

use crate::util::constants::BYTES_IN_MBYTE;
use crate::util::error::AllocationError;
use crate::util::heap::{MmapPageResource, PageKind, PageResource, RegionDescriptor};
use crate::util::Address;

/// A page resource that forwards to [`MmapPageResource`] and records every call that
/// changes a region, so tests can check what the space asked for.
pub struct RecordingPageResource {
    pub inner: MmapPageResource,
    pub allocated: Vec<(Address, usize, usize)>,
    pub tagged: Vec<(Address, PageKind)>,
    pub retagged: Vec<(Address, usize, usize)>,
    pub freed: Vec<(Address, usize)>,
}

impl RecordingPageResource {
    pub fn new(heap_size: usize) -> Self {
        RecordingPageResource {
            inner: MmapPageResource::new(heap_size),
            allocated: vec![],
            tagged: vec![],
            retagged: vec![],
            freed: vec![],
        }
    }

    pub fn was_freed(&self, region: Address) -> bool {
        self.freed.iter().any(|(start, _)| *start == region)
    }
}

impl Default for RecordingPageResource {
    fn default() -> Self {
        Self::new(16 * BYTES_IN_MBYTE)
    }
}

impl PageResource for RecordingPageResource {
    fn alloc_region(&mut self, bytes: usize, generation: usize) -> Result<Address, AllocationError> {
        let start = self.inner.alloc_region(bytes, generation)?;
        self.allocated.push((start, bytes, generation));
        Ok(start)
    }

    fn tag_region(&mut self, start: Address, bytes: usize, kind: PageKind) {
        self.inner.tag_region(start, bytes, kind);
        self.tagged.push((start, kind));
    }

    fn retag_generation(&mut self, start: Address, bytes: usize, generation: usize) {
        self.inner.retag_generation(start, bytes, generation);
        self.retagged.push((start, bytes, generation));
    }

    fn free_region(&mut self, start: Address, bytes: usize) {
        self.inner.free_region(start, bytes);
        self.freed.push((start, bytes));
    }

    fn region_of(&self, addr: Address) -> Option<RegionDescriptor> {
        self.inner.region_of(addr)
    }
}
