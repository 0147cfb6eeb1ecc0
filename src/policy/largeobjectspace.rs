use std::fmt;

use crate::plan::CollectionCycle;
use crate::util::constants::{BYTES_IN_PAGE, HEADER_BYTES};
use crate::util::conversions;
use crate::util::error::LosError;
use crate::util::generation_list::{GenerationList, NodeArena, NodeIndex, ObjectInfo};
use crate::util::header::{self, HeaderPrefix, MarkState};
use crate::util::heap::{PageKind, PageResource};
use crate::util::options::Options;
use crate::util::Address;

/// A handle to a large object.
///
/// The handle stays valid until the object is swept or released. After that,
/// [`LargeObjectSpace::is_live`] returns false for it and the other accessors panic, even if
/// a new object reuses the same node.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct LargeObject {
    node: NodeIndex,
    epoch: u32,
    start: Address,
}

impl LargeObject {
    /// The address of the first data word.
    pub fn start(&self) -> Address {
        self.start
    }

    pub fn node(&self) -> NodeIndex {
        self.node
    }
}

impl fmt::Display for LargeObject {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} (node {})", self.start, self.node)
    }
}

/// Names one of the lists of a [`LargeObjectSpace`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ListId {
    Generation(usize),
    /// Objects marked in the current collection cycle.
    Marked,
}

impl ListId {
    /// The generation this list belongs to, if it is a generation list.
    pub fn generation(self) -> Option<usize> {
        match self {
            ListId::Generation(g) => Some(g),
            ListId::Marked => None,
        }
    }
}

impl fmt::Display for ListId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ListId::Generation(g) => write!(f, "generation {}", g),
            ListId::Marked => write!(f, "marked"),
        }
    }
}

/// What a sweep gave back to the page resource.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub objects_freed: usize,
    pub bytes_freed: usize,
}

impl SweepSummary {
    pub(crate) fn merge(&mut self, other: SweepSummary) {
        self.objects_freed += other.objects_freed;
        self.bytes_freed += other.bytes_freed;
    }
}

/// Size of one list.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ListStats {
    pub bytes: usize,
    pub objects: usize,
}

/// A snapshot of the sizes of all lists of a space.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LosStats {
    pub generations: Vec<ListStats>,
    pub marked: ListStats,
}

impl LosStats {
    /// Bytes on all lists, including the marked list.
    pub fn total_bytes(&self) -> usize {
        self.generations.iter().map(|g| g.bytes).sum::<usize>() + self.marked.bytes
    }

    pub fn total_objects(&self) -> usize {
        self.generations.iter().map(|g| g.objects).sum::<usize>() + self.marked.objects
    }
}

/// The large object space.
///
/// Every large object lives in a page-aligned region of its own, and is never moved. The
/// space keeps one list per generation and a list of objects marked in the current
/// collection. Promotion moves objects between generations by relinking them and
/// retagging their pages.
///
/// Outside a collection the marked list is empty and every object is on the list of the
/// generation its pages are tagged with. The page resource is shared with the rest of the
/// collector and is passed to the operations that need it.
pub struct LargeObjectSpace {
    arena: NodeArena,
    generations: Vec<GenerationList>,
    marked: GenerationList,
    verify_on_collection: bool,
}

impl LargeObjectSpace {
    /// Create a space with `generations` empty generation lists.
    pub fn new(generations: usize) -> Result<Self, LosError> {
        if generations == 0 {
            return Err(LosError::InvalidGenerationCount(generations));
        }
        let mut arena = NodeArena::new();
        let lists = (0..generations)
            .map(|_| GenerationList::new(&mut arena))
            .collect();
        let marked = GenerationList::new(&mut arena);
        debug!("LargeObjectSpace: created with {} generations", generations);
        Ok(LargeObjectSpace {
            arena,
            generations: lists,
            marked,
            verify_on_collection: false,
        })
    }

    pub fn from_options(options: &Options) -> Result<Self, LosError> {
        let mut space = Self::new(options.generations)?;
        space.verify_on_collection = options.verify_on_collection;
        Ok(space)
    }

    /// Verify every list when a collection cycle finishes.
    pub fn set_verify_on_collection(&mut self, verify: bool) {
        self.verify_on_collection = verify;
    }

    pub fn generations(&self) -> usize {
        self.generations.len()
    }

    fn check_generation(&self, generation: usize) -> Result<(), LosError> {
        if generation < self.generations.len() {
            Ok(())
        } else {
            Err(LosError::InvalidGeneration {
                generation,
                generations: self.generations.len(),
            })
        }
    }

    fn generation_list(&self, generation: usize, op: &str) -> &GenerationList {
        match self.generations.get(generation) {
            Some(list) => list,
            None => panic!(
                "{}: invalid generation {} (the space has {} generations)",
                op,
                generation,
                self.generations.len()
            ),
        }
    }

    fn list(&self, list: ListId, op: &str) -> &GenerationList {
        match list {
            ListId::Generation(g) => self.generation_list(g, op),
            ListId::Marked => &self.marked,
        }
    }

    /// Bytes occupied by the objects of a generation, including headers and padding.
    pub fn bytes_used(&self, generation: usize) -> usize {
        self.generation_list(generation, "bytes_used").bytes()
    }

    /// Number of objects in a generation.
    pub fn objects_in(&self, generation: usize) -> usize {
        self.generation_list(generation, "objects_in").objects()
    }

    /// Bytes on the marked list.
    pub fn marked_bytes(&self) -> usize {
        self.marked.bytes()
    }

    /// Number of objects on the marked list.
    pub fn marked_objects(&self) -> usize {
        self.marked.objects()
    }

    /// Allocate a large object of at least `nbytes` bytes in `generation`.
    ///
    /// The region holds the header prefix followed by the data, rounded up to whole pages.
    /// The returned handle points at the first data word, which is zeroed.
    pub fn allocate<PR: PageResource>(
        &mut self,
        pr: &mut PR,
        nbytes: usize,
        generation: usize,
    ) -> Result<LargeObject, LosError> {
        if nbytes == 0 || nbytes > usize::MAX - BYTES_IN_PAGE - HEADER_BYTES {
            return Err(LosError::InvalidSize(nbytes));
        }
        self.check_generation(generation)?;

        let bytes = conversions::large_object_bytes(nbytes);
        let region = pr.alloc_region(bytes, generation)?;
        pr.tag_region(region, bytes, PageKind::LargeObject);

        let node = self.arena.alloc_object(bytes, ObjectInfo { region, generation });
        let epoch = self.arena.epoch(node);
        // SAFETY: the page resource just handed out `bytes` bytes at `region`, and
        // `bytes` is at least one page.
        unsafe {
            HeaderPrefix::write(
                region,
                HeaderPrefix {
                    size: bytes,
                    node,
                    epoch,
                },
            )
        };
        self.generations[generation].insert_at_end(&mut self.arena, node);
        trace!(
            "Allocated large object of {} bytes ({} requested) at {} in generation {}",
            bytes,
            nbytes,
            region,
            generation
        );
        self.assert_lists("allocate");

        Ok(LargeObject {
            node,
            epoch,
            start: header::data_of_region(region),
        })
    }

    fn check_handle(&self, object: LargeObject, op: &str) {
        if !self.arena.is_live_object(object.node, object.epoch) {
            panic!("{}: large object {} is no longer live", op, object);
        }
    }

    fn handle(&self, node: NodeIndex) -> LargeObject {
        LargeObject {
            node,
            epoch: self.arena.epoch(node),
            start: header::data_of_region(self.arena.object(node).region),
        }
    }

    /// Mark an object of `generation` as reachable, moving it to the marked list.
    ///
    /// Returns true if the object was already marked, in which case nothing changes.
    pub(crate) fn mark(&mut self, object: LargeObject, generation: usize) -> bool {
        self.check_handle(object, "mark");
        if self.arena.mark(object.node) == MarkState::Marked {
            return true;
        }
        let actual = self.arena.object(object.node).generation;
        if actual != generation {
            panic!(
                "mark: large object {} is in generation {}, not generation {}",
                object, actual, generation
            );
        }
        let list = match self.generations.get_mut(generation) {
            Some(list) => list,
            None => panic!("mark: invalid generation {}", generation),
        };
        list.detach_and_account(&mut self.arena, object.node);
        self.marked.insert_at_end(&mut self.arena, object.node);
        self.arena.set_mark(object.node, MarkState::Marked);
        self.assert_lists("mark");
        false
    }

    /// Free every object that is still on the list of `generation`.
    pub(crate) fn sweep<PR: PageResource>(&mut self, pr: &mut PR, generation: usize) -> SweepSummary {
        let sentinel = self.generation_list(generation, "sweep").sentinel();
        let mut summary = SweepSummary::default();
        loop {
            let node = self.arena.next(sentinel);
            if node == sentinel {
                break;
            }
            debug_assert_eq!(self.arena.mark(node), MarkState::Unmarked);
            GenerationList::detach(&mut self.arena, node);
            summary.bytes_freed += self.free_object(pr, node, "sweep");
            summary.objects_freed += 1;
        }

        let list = &mut self.generations[generation];
        debug_assert_eq!(list.bytes(), summary.bytes_freed);
        list.clear(&mut self.arena);
        debug!(
            "Swept generation {}: freed {} objects, {} bytes",
            generation, summary.objects_freed, summary.bytes_freed
        );
        self.assert_lists("sweep");
        summary
    }

    /// Give the region of a detached object back to the page resource and release its node.
    /// Returns the size of the object.
    fn free_object<PR: PageResource>(&mut self, pr: &mut PR, node: NodeIndex, op: &str) -> usize {
        let size = self.arena.size(node);
        let info = self.arena.release_object(node);
        // SAFETY: the region is still mapped, it is freed below.
        match unsafe { HeaderPrefix::read(info.region) } {
            Some(prefix) if prefix.node == node && prefix.size == size => {}
            found => panic!(
                "{}: large object at {} (node {}, generation {}) fails the header check: {:?}",
                op, info.region, node, info.generation, found
            ),
        }
        // SAFETY: as above.
        unsafe { HeaderPrefix::clear(info.region) };
        pr.free_region(info.region, size);
        trace!(
            "Freed large object of {} bytes at {} in generation {}",
            size,
            info.region,
            info.generation
        );
        size
    }

    /// Move every object of `list` to generation `to_generation`.
    ///
    /// The pages of every object are retagged and its mark is cleared, then the whole list is
    /// spliced onto the end of the target generation and left empty. Moving a generation
    /// onto itself does nothing.
    pub fn append_and_clear_list<PR: PageResource>(
        &mut self,
        pr: &mut PR,
        list: ListId,
        to_generation: usize,
    ) {
        let generations = self.generations.len();
        let op = "append_and_clear_list";
        let src_sentinel = self.list(list, op).sentinel();
        self.generation_list(to_generation, op);
        if list == ListId::Generation(to_generation) {
            return;
        }

        let mut node = self.arena.next(src_sentinel);
        while node != src_sentinel {
            let ObjectInfo { region, generation } = *self.arena.object(node);
            let size = self.arena.size(node);
            pr.retag_generation(region, size, to_generation);
            self.arena.set_generation(node, to_generation);
            self.arena.set_mark(node, MarkState::Unmarked);
            trace!(
                "Promoted large object at {} from generation {} to {}",
                region,
                generation,
                to_generation
            );
            node = self.arena.next(node);
        }

        let (dst, src) = match list {
            ListId::Marked => (&mut self.generations[to_generation], &mut self.marked),
            ListId::Generation(from) => {
                let (low, high) = self.generations.split_at_mut(from.max(to_generation));
                if from < to_generation {
                    (&mut high[0], &mut low[from])
                } else {
                    (&mut low[to_generation], &mut high[0])
                }
            }
        };
        let moved = src.bytes();
        dst.append_and_clear(&mut self.arena, src);
        debug!(
            "Appended {} bytes of the {} list to generation {} (of {})",
            moved, list, to_generation, generations
        );
        self.assert_lists(op);
    }

    /// The object after `cursor` on `list`, or the first object if `cursor` is `None`.
    ///
    /// The list must not change between calls, and `cursor` must be on `list`.
    pub fn walk_list(&self, list: ListId, cursor: Option<LargeObject>) -> Option<LargeObject> {
        let walked = self.list(list, "walk_list");
        if let Some(cursor) = cursor {
            self.check_handle(cursor, "walk_list");
            if !self.is_on_list(cursor.node, list) {
                panic!(
                    "walk_list: cursor {} (generation {}, {}) is not on the {} list",
                    cursor,
                    self.arena.object(cursor.node).generation,
                    self.arena.mark(cursor.node),
                    list
                );
            }
        }
        walked
            .walk(&self.arena, cursor.map(|object| object.node))
            .map(|node| self.handle(node))
    }

    /// Does the node belong on `list`, going by its generation and mark state?
    fn is_on_list(&self, node: NodeIndex, list: ListId) -> bool {
        let mark = self.arena.mark(node);
        match list {
            ListId::Generation(g) => {
                self.arena.object(node).generation == g && mark == MarkState::Unmarked
            }
            ListId::Marked => mark == MarkState::Marked,
        }
    }

    /// Iterate over the objects of a list, in list order.
    pub fn iter_list(&self, list: ListId) -> impl Iterator<Item = LargeObject> + '_ {
        self.list(list, "iter_list")
            .iter(&self.arena)
            .map(move |node| self.handle(node))
    }

    /// Is the object still allocated?
    pub fn is_live(&self, object: LargeObject) -> bool {
        self.arena.is_live_object(object.node, object.epoch)
    }

    /// Size of the object in bytes, including the header prefix and the page padding.
    pub fn object_size(&self, object: LargeObject) -> usize {
        self.check_handle(object, "object_size");
        self.arena.size(object.node)
    }

    pub fn generation_of(&self, object: LargeObject) -> usize {
        self.check_handle(object, "generation_of");
        self.arena.object(object.node).generation
    }

    pub fn is_marked(&self, object: LargeObject) -> bool {
        self.check_handle(object, "is_marked");
        self.arena.mark(object.node) == MarkState::Marked
    }

    /// The start of the region the object occupies.
    pub fn region_of(&self, object: LargeObject) -> Address {
        self.check_handle(object, "region_of");
        self.arena.object(object.node).region
    }

    /// Find the large object of this space that contains `addr`.
    ///
    /// Any address from the first data word to the end of the region resolves to the
    /// object. Addresses in other kinds of pages, in the header prefix, or in objects of
    /// another space resolve to `None`.
    pub fn resolve<PR: PageResource>(&self, pr: &PR, addr: Address) -> Option<LargeObject> {
        let region = pr.region_of(addr)?;
        if region.kind != PageKind::LargeObject {
            return None;
        }
        if addr < header::data_of_region(region.start) {
            return None;
        }
        // SAFETY: the page resource says the region is live, and large object regions are
        // at least one page long.
        let prefix = unsafe { HeaderPrefix::read(region.start) }?;
        if !self.arena.is_live_object(prefix.node, prefix.epoch)
            || self.arena.object(prefix.node).region != region.start
        {
            return None;
        }
        debug_assert_eq!(prefix.size, region.bytes);
        Some(self.handle(prefix.node))
    }

    /// Check every list and panic at the first inconsistency.
    pub fn verify(&self) {
        let lists = (0..self.generations.len())
            .map(ListId::Generation)
            .chain(std::iter::once(ListId::Marked));
        for id in lists {
            let list = self.list(id, "verify");
            let check = list.check(&self.arena);
            if !check.is_consistent() {
                list.dump(&self.arena, &id.to_string());
                panic!("verify: the {} list is inconsistent: {:?}", id, check);
            }
            for node in list.iter(&self.arena) {
                if !self.is_on_list(node, id) {
                    let info = self.arena.object(node);
                    panic!(
                        "verify: large object at {} (generation {}, {}) is on the {} list",
                        info.region,
                        info.generation,
                        self.arena.mark(node),
                        id
                    );
                }
            }
        }
        let total = self.stats().total_objects();
        assert_eq!(
            total,
            self.arena.live_objects(),
            "verify: {} objects on lists, {} allocated",
            total,
            self.arena.live_objects()
        );
    }

    #[cfg(feature = "extreme_assertions")]
    fn assert_lists(&self, op: &str) {
        trace!("Verifying large object lists after {}", op);
        self.verify();
    }

    #[cfg(not(feature = "extreme_assertions"))]
    fn assert_lists(&self, _op: &str) {}

    /// Log the objects of a list, and what a forward and a backward walk find.
    pub fn dump_list(&self, list: ListId, tag: &str) {
        self.list(list, "dump_list").dump(&self.arena, tag);
    }

    pub fn stats(&self) -> LosStats {
        let of = |list: &GenerationList| ListStats {
            bytes: list.bytes(),
            objects: list.objects(),
        };
        LosStats {
            generations: self.generations.iter().map(of).collect(),
            marked: of(&self.marked),
        }
    }

    /// Free every object on every list, including the marked list.
    pub fn release_all<PR: PageResource>(&mut self, pr: &mut PR) -> SweepSummary {
        let mut summary = SweepSummary::default();
        for generation in 0..self.generations.len() {
            summary.merge(self.sweep(pr, generation));
        }
        let sentinel = self.marked.sentinel();
        loop {
            let node = self.arena.next(sentinel);
            if node == sentinel {
                break;
            }
            self.marked.detach_and_account(&mut self.arena, node);
            summary.bytes_freed += self.free_object(pr, node, "release_all");
            summary.objects_freed += 1;
        }
        debug!(
            "Released all large objects: {} objects, {} bytes",
            summary.objects_freed, summary.bytes_freed
        );
        summary
    }

    /// Start a collection cycle. The cycle borrows the space until it is finished, so
    /// nothing can be allocated in the meantime.
    #[must_use = "a collection cycle must be finished"]
    pub fn begin_collection(&mut self) -> CollectionCycle<'_> {
        let verify = self.verify_on_collection;
        CollectionCycle::new(self, verify)
    }
}
