//! A generational large object space.
//!
//! Objects that are too large to be copied cheaply by a copying collector are allocated in
//! page-aligned regions of their own and never move. The [`LargeObjectSpace`] keeps them on
//! one doubly linked list per generation. A collection marks the reachable ones, sweeps what
//! is left on the generation lists, and promotes the marked objects by splicing them onto the
//! list of their new generation and retagging their pages.
//!
//! The space does not own any memory. Every region comes from a [`PageResource`] that the
//! host collector shares with its other spaces and passes to each operation that needs it.
//! [`MmapPageResource`] is a page resource that maps every region from the operating system.
//!
//! A typical cycle:
//!
//! ```ignore
//! let mut pr = MmapPageResource::from_options(&options);
//! let mut los = LargeObjectSpace::from_options(&options)?;
//! let object = los.allocate(&mut pr, 64 * 1024, 0)?;
//!
//! let mut cycle = los.begin_collection();
//! cycle.mark(object, 0);
//! cycle.sweep(&mut pr, 0);
//! cycle.append_and_clear_list(&mut pr, ListId::Marked, 1);
//! cycle.finish();
//! ```
//!
//! Diagnostics go through the [`log`](https://docs.rs/log) facade. The `builtin_env_logger`
//! feature provides [`util::logger::try_init`] to install `env_logger`.

#[macro_use]
extern crate log;

pub mod plan;
pub mod policy;
pub mod util;

pub use crate::plan::{CollectionCycle, CycleSummary, Phase};
pub use crate::policy::largeobjectspace::{
    LargeObject, LargeObjectSpace, ListId, ListStats, LosStats, SweepSummary,
};
pub use crate::util::error::{AllocationError, LosError};
pub use crate::util::heap::{MmapPageResource, PageKind, PageResource, RegionDescriptor};
pub use crate::util::options::Options;
pub use crate::util::Address;
