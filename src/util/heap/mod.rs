mod accounting;
mod mmappageresource;
mod pageresource;

pub use self::accounting::PageAccounting;
pub use self::mmappageresource::MmapPageResource;
pub use self::pageresource::{PageKind, PageResource, RegionDescriptor};
