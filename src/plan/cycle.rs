use crate::policy::largeobjectspace::{LargeObject, LargeObjectSpace, ListId, SweepSummary};
use crate::util::heap::PageResource;
use strum_macros::Display;

/// The phases of a collection, in the order they happen.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Display)]
pub enum Phase {
    Marking,
    Sweeping,
    Promoting,
}

/// What a finished collection cycle did.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub swept: SweepSummary,
    pub objects_marked: usize,
    pub bytes_promoted: usize,
}

/// One collection of a [`LargeObjectSpace`].
///
/// The cycle borrows the space mutably until [`CollectionCycle::finish`], so allocation
/// cannot happen in the middle of a collection. All marking happens before the first sweep,
/// each generation is swept at most once, and nothing is marked or swept once promotion has
/// started. Violations panic, and so does dropping a cycle that still has marked objects.
#[must_use = "a collection cycle must be finished"]
pub struct CollectionCycle<'a> {
    space: &'a mut LargeObjectSpace,
    phase: Phase,
    swept: Vec<bool>,
    verify: bool,
    summary: CycleSummary,
}

impl<'a> CollectionCycle<'a> {
    pub(crate) fn new(space: &'a mut LargeObjectSpace, verify: bool) -> Self {
        assert_eq!(
            space.marked_objects(),
            0,
            "begin_collection: the marked list is not empty"
        );
        let swept = vec![false; space.generations()];
        debug!("Collection cycle started");
        CollectionCycle {
            space,
            phase: Phase::Marking,
            swept,
            verify,
            summary: CycleSummary::default(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The space being collected, for queries.
    pub fn space(&self) -> &LargeObjectSpace {
        self.space
    }

    /// Mark a reachable object of `generation`. Returns true if it was already marked.
    ///
    /// The object is moved to the marked list. It must currently be in `generation`.
    pub fn mark(&mut self, object: LargeObject, generation: usize) -> bool {
        if self.phase != Phase::Marking {
            panic!(
                "mark: cannot mark {} in generation {} during {}",
                object, generation, self.phase
            );
        }
        let already_marked = self.space.mark(object, generation);
        if !already_marked {
            self.summary.objects_marked += 1;
        }
        already_marked
    }

    /// Free every unmarked object of `generation`.
    pub fn sweep<PR: PageResource>(&mut self, pr: &mut PR, generation: usize) -> SweepSummary {
        if self.phase > Phase::Sweeping {
            panic!("sweep: cannot sweep generation {} during {}", generation, self.phase);
        }
        match self.swept.get(generation) {
            Some(false) => {}
            Some(true) => panic!("sweep: generation {} was already swept", generation),
            None => panic!(
                "sweep: invalid generation {} (the space has {} generations)",
                generation,
                self.swept.len()
            ),
        }
        self.phase = Phase::Sweeping;
        self.swept[generation] = true;
        let summary = self.space.sweep(pr, generation);
        self.summary.swept.merge(summary);
        summary
    }

    /// Sweep every generation that was not swept yet.
    pub fn sweep_all<PR: PageResource>(&mut self, pr: &mut PR) -> SweepSummary {
        let mut summary = SweepSummary::default();
        for generation in 0..self.swept.len() {
            if !self.swept[generation] {
                summary.merge(self.sweep(pr, generation));
            }
        }
        summary
    }

    /// Move every object of `list` to `to_generation`.
    /// See [`LargeObjectSpace::append_and_clear_list`].
    pub fn append_and_clear_list<PR: PageResource>(
        &mut self,
        pr: &mut PR,
        list: ListId,
        to_generation: usize,
    ) {
        let generations = self.swept.len();
        for generation in [Some(to_generation), list.generation()].into_iter().flatten() {
            if generation >= generations {
                panic!(
                    "append_and_clear_list: invalid generation {} (the space has {} generations)",
                    generation, generations
                );
            }
        }
        self.phase = Phase::Promoting;
        let bytes = match list {
            ListId::Marked => self.space.marked_bytes(),
            ListId::Generation(g) if g == to_generation => 0,
            ListId::Generation(g) => self.space.bytes_used(g),
        };
        self.space.append_and_clear_list(pr, list, to_generation);
        self.summary.bytes_promoted += bytes;
    }

    /// End the cycle. Every marked object must have been promoted.
    pub fn finish(self) -> CycleSummary {
        let left = self.space.marked_objects();
        if left != 0 {
            panic!("finish: {} marked objects were not promoted", left);
        }
        if self.verify {
            self.space.verify();
        }
        debug!(
            "Collection cycle finished: {} marked, {} objects ({} bytes) freed, {} bytes promoted",
            self.summary.objects_marked,
            self.summary.swept.objects_freed,
            self.summary.swept.bytes_freed,
            self.summary.bytes_promoted
        );
        self.summary
    }
}

impl Drop for CollectionCycle<'_> {
    fn drop(&mut self) {
        let left = self.space.marked_objects();
        if left != 0 && !std::thread::panicking() {
            panic!(
                "collection cycle dropped with {} marked objects that were not promoted",
                left
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::constants::BYTES_IN_PAGE;
    use crate::util::test_util::RecordingPageResource;

    #[test]
    fn full_cycle() {
        let mut los = LargeObjectSpace::new(2).unwrap();
        los.set_verify_on_collection(true);
        let mut pr = RecordingPageResource::default();
        let a = los.allocate(&mut pr, 100, 0).unwrap();
        let b = los.allocate(&mut pr, 200, 0).unwrap();
        let c = los.allocate(&mut pr, 50, 1).unwrap();

        let mut cycle = los.begin_collection();
        assert_eq!(cycle.phase(), Phase::Marking);
        assert!(!cycle.mark(b, 0));
        assert!(cycle.mark(b, 0));
        assert!(!cycle.mark(c, 1));
        cycle.sweep_all(&mut pr);
        assert_eq!(cycle.phase(), Phase::Sweeping);
        cycle.append_and_clear_list(&mut pr, ListId::Marked, 1);
        let summary = cycle.finish();

        assert_eq!(
            summary,
            CycleSummary {
                swept: SweepSummary {
                    objects_freed: 1,
                    bytes_freed: BYTES_IN_PAGE
                },
                objects_marked: 2,
                bytes_promoted: 2 * BYTES_IN_PAGE,
            }
        );
        assert!(!los.is_live(a));
        assert_eq!(los.generation_of(b), 1);
        assert_eq!(los.bytes_used(0), 0);
        assert_eq!(los.bytes_used(1), 2 * BYTES_IN_PAGE);
        assert_eq!(
            los.iter_list(ListId::Generation(1)).collect::<Vec<_>>(),
            vec![b, c]
        );
    }

    #[test]
    #[should_panic(expected = "mark: cannot mark")]
    fn mark_after_sweep_panics() {
        let mut los = LargeObjectSpace::new(2).unwrap();
        let mut pr = RecordingPageResource::default();
        let a = los.allocate(&mut pr, 100, 1).unwrap();
        let mut cycle = los.begin_collection();
        cycle.sweep(&mut pr, 0);
        cycle.mark(a, 1);
    }

    #[test]
    #[should_panic(expected = "already swept")]
    fn double_sweep_panics() {
        let mut los = LargeObjectSpace::new(1).unwrap();
        let mut pr = RecordingPageResource::default();
        let mut cycle = los.begin_collection();
        cycle.sweep(&mut pr, 0);
        cycle.sweep(&mut pr, 0);
    }

    #[test]
    #[should_panic(expected = "cannot sweep")]
    fn sweep_after_promotion_panics() {
        let mut los = LargeObjectSpace::new(2).unwrap();
        let mut pr = RecordingPageResource::default();
        let mut cycle = los.begin_collection();
        cycle.append_and_clear_list(&mut pr, ListId::Marked, 1);
        cycle.sweep(&mut pr, 0);
    }

    #[test]
    #[should_panic(expected = "were not promoted")]
    fn finish_with_marked_objects_panics() {
        let mut los = LargeObjectSpace::new(1).unwrap();
        let mut pr = RecordingPageResource::default();
        let a = los.allocate(&mut pr, 100, 0).unwrap();
        let mut cycle = los.begin_collection();
        cycle.mark(a, 0);
        cycle.finish();
    }

    #[test]
    #[should_panic(expected = "dropped with 1 marked objects")]
    fn drop_with_marked_objects_panics() {
        let mut los = LargeObjectSpace::new(2).unwrap();
        let mut pr = RecordingPageResource::default();
        let a = los.allocate(&mut pr, 100, 0).unwrap();
        let mut cycle = los.begin_collection();
        cycle.mark(a, 0);
        drop(cycle);
    }

    #[test]
    fn drop_without_marked_objects_is_fine() {
        let mut los = LargeObjectSpace::new(2).unwrap();
        let mut pr = RecordingPageResource::default();
        let a = los.allocate(&mut pr, 100, 0).unwrap();
        let mut cycle = los.begin_collection();
        cycle.sweep(&mut pr, 1);
        drop(cycle);
        assert_eq!(los.marked_objects(), 0);
        assert!(los.is_live(a));

        // The next cycle starts clean.
        let mut cycle = los.begin_collection();
        cycle.sweep(&mut pr, 0);
        cycle.finish();
        assert!(!los.is_live(a));
    }

    #[test]
    #[should_panic(expected = "append_and_clear_list: invalid generation 2")]
    fn promote_to_invalid_generation_names_the_operation() {
        let mut los = LargeObjectSpace::new(2).unwrap();
        let mut pr = RecordingPageResource::default();
        let mut cycle = los.begin_collection();
        cycle.append_and_clear_list(&mut pr, ListId::Marked, 2);
    }

    #[test]
    #[should_panic(expected = "append_and_clear_list: invalid generation 5")]
    fn promote_from_invalid_generation_names_the_operation() {
        let mut los = LargeObjectSpace::new(2).unwrap();
        let mut pr = RecordingPageResource::default();
        let mut cycle = los.begin_collection();
        cycle.append_and_clear_list(&mut pr, ListId::Generation(5), 0);
    }

    #[test]
    fn promote_young_generation_without_marking() {
        let mut los = LargeObjectSpace::new(3).unwrap();
        let mut pr = RecordingPageResource::default();
        let a = los.allocate(&mut pr, 100, 0).unwrap();
        let mut cycle = los.begin_collection();
        cycle.append_and_clear_list(&mut pr, ListId::Generation(0), 1);
        cycle.append_and_clear_list(&mut pr, ListId::Generation(2), 2);
        let summary = cycle.finish();
        assert_eq!(summary.bytes_promoted, BYTES_IN_PAGE);
        assert_eq!(summary.swept, SweepSummary::default());
        assert_eq!(los.generation_of(a), 1);
    }
}
