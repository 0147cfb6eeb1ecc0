//! Large object headers.
//!
//! Every large object has two pieces of metadata:
//!
//! * An [`ObjectHeader`] record in the node arena of the space. It holds the size and the
//!   structural links of the object, and its mark state. This is what list operations and
//!   the collector read and write.
//! * A [`HeaderPrefix`] of [`HEADER_WORDS`] words stored in the object's own region, right
//!   before its first data word. It lets a tracer that only has a raw address find the node
//!   of the object. [`HeaderPrefix::write`] and [`HeaderPrefix::read`] are the only code that
//!   interprets raw bytes as a header.

use crate::util::constants::{BYTES_IN_WORD, HEADER_BYTES, HEADER_WORDS};
use crate::util::generation_list::NodeIndex;
use crate::util::Address;
use strum_macros::Display;

/// Whether a collection reached an object in the current cycle.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Display)]
pub enum MarkState {
    Unmarked,
    Marked,
}

/// Size, links and mark state of a node. Sentinel nodes carry a zero-size header so
/// list code can treat them like objects.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ObjectHeader {
    size: usize,
    next: NodeIndex,
    prev: NodeIndex,
    mark: MarkState,
}

impl ObjectHeader {
    /// A header for a node that is not linked into any list: both links point to the node itself.
    pub fn detached(node: NodeIndex, size: usize) -> Self {
        ObjectHeader {
            size,
            next: node,
            prev: node,
            mark: MarkState::Unmarked,
        }
    }

    /// Total size of the object in bytes, including the prefix and the page padding.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn next(&self) -> NodeIndex {
        self.next
    }

    pub fn prev(&self) -> NodeIndex {
        self.prev
    }

    pub fn mark(&self) -> MarkState {
        self.mark
    }

    pub fn set_next(&mut self, next: NodeIndex) {
        self.next = next;
    }

    pub fn set_prev(&mut self, prev: NodeIndex) {
        self.prev = prev;
    }

    pub fn set_mark(&mut self, mark: MarkState) {
        self.mark = mark;
    }
}

/// The tag stored in the first word of every prefix.
pub const HEADER_TAG: usize = 0x4c4f_5348;

/// Does this word look like the first word of a large object prefix?
pub fn looks_like_header(word: usize) -> bool {
    word == HEADER_TAG
}

const TAG_WORD: usize = 0;
const SIZE_WORD: usize = 1;
const NODE_WORD: usize = 2;
const EPOCH_WORD: usize = 3;

/// The words at the start of a large object region: tag, size, node index and epoch.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct HeaderPrefix {
    pub size: usize,
    pub node: NodeIndex,
    pub epoch: u32,
}

impl HeaderPrefix {
    /// Write the prefix at the start of a region.
    ///
    /// # Safety
    /// `region` must be the start of a mapped, writable region of at least [`HEADER_BYTES`] bytes.
    pub unsafe fn write(region: Address, prefix: HeaderPrefix) {
        word(region, TAG_WORD).store::<usize>(HEADER_TAG);
        word(region, SIZE_WORD).store::<usize>(prefix.size);
        word(region, NODE_WORD).store::<usize>(prefix.node.as_usize());
        word(region, EPOCH_WORD).store::<usize>(prefix.epoch as usize);
    }

    /// Read the prefix at the start of a region. Returns `None` if the tag check fails.
    ///
    /// # Safety
    /// `region` must be the start of a mapped, readable region of at least [`HEADER_BYTES`] bytes.
    pub unsafe fn read(region: Address) -> Option<HeaderPrefix> {
        if !looks_like_header(word(region, TAG_WORD).load::<usize>()) {
            return None;
        }
        Some(HeaderPrefix {
            size: word(region, SIZE_WORD).load::<usize>(),
            node: NodeIndex::from_usize(word(region, NODE_WORD).load::<usize>()),
            epoch: word(region, EPOCH_WORD).load::<usize>() as u32,
        })
    }

    /// Wipe the tag, so the region no longer passes the header check.
    ///
    /// # Safety
    /// Same as [`HeaderPrefix::write`].
    pub unsafe fn clear(region: Address) {
        word(region, TAG_WORD).store::<usize>(0);
    }
}

/// The address of the first data word of a large object, given its region start.
pub fn data_of_region(region: Address) -> Address {
    region + HEADER_BYTES
}

fn word(region: Address, index: usize) -> Address {
    debug_assert!(index < HEADER_WORDS);
    region + index * BYTES_IN_WORD
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::constants::BYTES_IN_PAGE;
    use crate::util::memory;

    #[test]
    fn detached_header_links_to_itself() {
        let node = NodeIndex::from_usize(7);
        let header = ObjectHeader::detached(node, 4096);
        assert_eq!(header.next(), node);
        assert_eq!(header.prev(), node);
        assert_eq!(header.size(), 4096);
        assert_eq!(header.mark(), MarkState::Unmarked);
    }

    #[test]
    fn prefix_write_then_read() {
        let region = memory::dzmmap_anywhere(BYTES_IN_PAGE).unwrap();
        // Fresh zeroed memory does not look like a header.
        assert_eq!(unsafe { HeaderPrefix::read(region) }, None);

        let prefix = HeaderPrefix {
            size: BYTES_IN_PAGE,
            node: NodeIndex::from_usize(3),
            epoch: 9,
        };
        unsafe { HeaderPrefix::write(region, prefix) };
        assert!(looks_like_header(unsafe { region.load::<usize>() }));
        assert_eq!(unsafe { HeaderPrefix::read(region) }, Some(prefix));

        unsafe { HeaderPrefix::clear(region) };
        assert_eq!(unsafe { HeaderPrefix::read(region) }, None);
        memory::munmap(region, BYTES_IN_PAGE).unwrap();
    }

    #[test]
    fn data_and_region_addresses() {
        let region = unsafe { Address::from_usize(0x10000) };
        let data = data_of_region(region);
        assert_eq!(data - region, HEADER_BYTES);
    }
}
