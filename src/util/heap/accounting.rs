use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

/// Page usage of a page resource, checked against a fixed budget.
///
/// Pages are reserved before memory is requested from the OS, and committed once
/// the memory is mapped. A failed request gives its reservation back.
pub struct PageAccounting {
    /// The page budget. Reservations beyond it are refused.
    limit: usize,
    /// The reserved pages. This should be incremented when we are about to allocate pages.
    reserved: AtomicUsize,
    /// The committed pages. This should be incremented when we successfully allocate pages from the OS.
    committed: AtomicUsize,
}

impl PageAccounting {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            reserved: AtomicUsize::new(0),
            committed: AtomicUsize::new(0),
        }
    }

    /// Try to reserve a certain number of pages within the budget. Returns the
    /// number of pages still available if the reservation does not fit.
    pub fn try_reserve(&self, pages: usize) -> Result<(), usize> {
        self.reserved
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |reserved| {
                reserved
                    .checked_add(pages)
                    .filter(|&total| total <= self.limit)
            })
            .map(|_| ())
            .map_err(|reserved| self.limit.saturating_sub(reserved))
    }

    /// Inform of clearing some reserved pages. This is used when we have reserved some pages but
    /// the allocation cannot be satisfied.
    pub fn clear_reserved(&self, pages: usize) {
        let _prev = self.reserved.fetch_sub(pages, Ordering::Relaxed);
        debug_assert!(_prev >= pages);
    }

    /// Inform of successfully committing a certain number of pages. This is used after we have reserved
    /// pages and successfully allocated those memory.
    pub fn commit(&self, pages: usize) {
        self.committed.fetch_add(pages, Ordering::Relaxed);
    }

    /// Inform of releasing a certain number of pages. The number of pages will be deducted from
    /// both reserved and committed pages.
    pub fn release(&self, pages: usize) {
        let _prev_reserved = self.reserved.fetch_sub(pages, Ordering::Relaxed);
        debug_assert!(_prev_reserved >= pages);

        let _prev_committed = self.committed.fetch_sub(pages, Ordering::Relaxed);
        debug_assert!(_prev_committed >= pages);
    }

    pub fn get_reserved_pages(&self) -> usize {
        self.reserved.load(Ordering::Relaxed)
    }

    pub fn get_committed_pages(&self) -> usize {
        self.committed.load(Ordering::Relaxed)
    }

    pub fn get_available_pages(&self) -> usize {
        self.limit.saturating_sub(self.get_reserved_pages())
    }
}
