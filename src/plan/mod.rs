//! Collection plans: how the operations of a space are sequenced during a collection.

mod cycle;

pub use self::cycle::CollectionCycle;
pub use self::cycle::CycleSummary;
pub use self::cycle::Phase;
