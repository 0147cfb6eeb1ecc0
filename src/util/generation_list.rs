//! Doubly linked circular lists of large objects.
//!
//! Nodes live in a [`NodeArena`] and refer to each other by [`NodeIndex`]. Each
//! [`GenerationList`] owns one sentinel node in the arena: the sentinel is never an object
//! and is never swept, so splicing never has to special-case a null link. An empty list
//! is a sentinel whose links point to itself.
//!
//! List operations that take an arena argument rely on the caller (the large object
//! space) to pass the arena the list was created in.

use std::fmt;

use crate::util::header::{MarkState, ObjectHeader};
use crate::util::Address;

/// The index of a node in a [`NodeArena`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(u32);

impl NodeIndex {
    pub fn from_usize(index: usize) -> Self {
        debug_assert!(index <= u32::MAX as usize, "node index {} overflows", index);
        NodeIndex(index as u32)
    }

    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where an object lives and which generation it is attributed to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ObjectInfo {
    /// Start of the object's region. The data starts after the header prefix.
    pub region: Address,
    /// The generation the object belongs to. It matches the generation of its region in
    /// the page resource.
    pub generation: usize,
}

#[derive(Debug)]
enum NodeKind {
    Sentinel,
    Object(ObjectInfo),
    Free { next_free: Option<NodeIndex> },
}

#[derive(Debug)]
struct Node {
    header: ObjectHeader,
    /// Bumped every time the slot is released, so stale handles can be told apart from the
    /// object that reuses the slot.
    epoch: u32,
    kind: NodeKind,
}

/// Storage for all nodes of a large object space: the objects and the list sentinels.
/// Slots of released objects are reused.
#[derive(Debug, Default)]
pub struct NodeArena {
    nodes: Vec<Node>,
    free_head: Option<NodeIndex>,
    live_objects: usize,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, kind: NodeKind, size: usize) -> NodeIndex {
        let index = NodeIndex::from_usize(self.nodes.len());
        self.nodes.push(Node {
            header: ObjectHeader::detached(index, size),
            epoch: 0,
            kind,
        });
        index
    }

    /// Create a sentinel node. Sentinels have a zero-size header and are never released.
    pub fn alloc_sentinel(&mut self) -> NodeIndex {
        self.push(NodeKind::Sentinel, 0)
    }

    /// Create a detached node for an object of `size` bytes.
    pub fn alloc_object(&mut self, size: usize, info: ObjectInfo) -> NodeIndex {
        self.live_objects += 1;
        match self.free_head {
            Some(index) => {
                let node = &mut self.nodes[index.as_usize()];
                let NodeKind::Free { next_free } = node.kind else {
                    panic!("alloc_object: free list points to {} which is not free", index);
                };
                self.free_head = next_free;
                node.header = ObjectHeader::detached(index, size);
                node.kind = NodeKind::Object(info);
                index
            }
            None => self.push(NodeKind::Object(info), size),
        }
    }

    /// Release the node of a detached object. Its handles become stale.
    pub fn release_object(&mut self, index: NodeIndex) -> ObjectInfo {
        let info = *self.object(index);
        assert!(
            self.next(index) == index && self.prev(index) == index,
            "release_object: {} is still linked",
            index
        );
        let next_free = self.free_head;
        let node = &mut self.nodes[index.as_usize()];
        node.epoch = node.epoch.wrapping_add(1);
        node.kind = NodeKind::Free { next_free };
        self.free_head = Some(index);
        self.live_objects -= 1;
        info
    }

    fn node(&self, index: NodeIndex) -> &Node {
        match self.nodes.get(index.as_usize()) {
            Some(node) => node,
            None => panic!("node {} is out of range ({} nodes)", index, self.nodes.len()),
        }
    }

    /// The header of a sentinel or object node. Panics for released nodes.
    pub fn header(&self, index: NodeIndex) -> &ObjectHeader {
        let node = self.node(index);
        if let NodeKind::Free { .. } = node.kind {
            panic!("node {} was released", index);
        }
        &node.header
    }

    fn header_mut(&mut self, index: NodeIndex) -> &mut ObjectHeader {
        let len = self.nodes.len();
        match self.nodes.get_mut(index.as_usize()) {
            Some(Node {
                kind: NodeKind::Free { .. },
                ..
            }) => panic!("node {} was released", index),
            Some(node) => &mut node.header,
            None => panic!("node {} is out of range ({} nodes)", index, len),
        }
    }

    /// Placement and generation of an object node. Panics for sentinels and released nodes.
    pub fn object(&self, index: NodeIndex) -> &ObjectInfo {
        match &self.node(index).kind {
            NodeKind::Object(info) => info,
            NodeKind::Sentinel => panic!("node {} is a list sentinel, not an object", index),
            NodeKind::Free { .. } => panic!("node {} was released", index),
        }
    }

    pub fn set_generation(&mut self, index: NodeIndex, generation: usize) {
        match &mut self.nodes[index.as_usize()].kind {
            NodeKind::Object(info) => info.generation = generation,
            _ => panic!("set_generation: node {} is not an object", index),
        }
    }

    pub fn size(&self, index: NodeIndex) -> usize {
        self.header(index).size()
    }

    pub fn next(&self, index: NodeIndex) -> NodeIndex {
        self.header(index).next()
    }

    pub fn prev(&self, index: NodeIndex) -> NodeIndex {
        self.header(index).prev()
    }

    pub fn mark(&self, index: NodeIndex) -> MarkState {
        self.header(index).mark()
    }

    pub fn set_next(&mut self, index: NodeIndex, next: NodeIndex) {
        self.header_mut(index).set_next(next);
    }

    pub fn set_prev(&mut self, index: NodeIndex, prev: NodeIndex) {
        self.header_mut(index).set_prev(prev);
    }

    pub fn set_mark(&mut self, index: NodeIndex, mark: MarkState) {
        self.header_mut(index).set_mark(mark);
    }

    pub fn epoch(&self, index: NodeIndex) -> u32 {
        self.node(index).epoch
    }

    pub fn is_sentinel(&self, index: NodeIndex) -> bool {
        matches!(self.node(index).kind, NodeKind::Sentinel)
    }

    /// Does `index` denote an object that was allocated in `epoch` and not released since?
    pub fn is_live_object(&self, index: NodeIndex, epoch: u32) -> bool {
        match self.nodes.get(index.as_usize()) {
            Some(node) => matches!(node.kind, NodeKind::Object(_)) && node.epoch == epoch,
            None => false,
        }
    }

    /// Is the node linked into a list? Detached nodes link to themselves.
    pub fn is_linked(&self, index: NodeIndex) -> bool {
        self.next(index) != index
    }

    /// Number of object nodes that have not been released.
    pub fn live_objects(&self) -> usize {
        self.live_objects
    }

    /// Number of slots, including sentinels and released slots.
    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }
}

/// A doubly linked circular list of object nodes with a sentinel, and the total size of
/// its members.
///
/// `bytes` and `objects` are kept in step by [`GenerationList::insert_at_end`],
/// [`GenerationList::detach_and_account`] and [`GenerationList::append_and_clear`].
/// [`GenerationList::detach`] does not touch any total.
#[derive(Debug)]
pub struct GenerationList {
    sentinel: NodeIndex,
    bytes: usize,
    objects: usize,
}

impl GenerationList {
    /// Create an empty list with a fresh sentinel.
    pub fn new(arena: &mut NodeArena) -> Self {
        GenerationList {
            sentinel: arena.alloc_sentinel(),
            bytes: 0,
            objects: 0,
        }
    }

    pub fn sentinel(&self) -> NodeIndex {
        self.sentinel
    }

    /// Total size of the members, in bytes.
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    /// Number of members.
    pub fn objects(&self) -> usize {
        self.objects
    }

    pub fn is_empty(&self, arena: &NodeArena) -> bool {
        let empty = arena.next(self.sentinel) == self.sentinel;
        debug_assert!(
            !empty || arena.prev(self.sentinel) == self.sentinel,
            "list {} is half empty",
            self.sentinel
        );
        empty
    }

    /// Link a detached node between the last member and the sentinel.
    pub fn insert_at_end(&mut self, arena: &mut NodeArena, node: NodeIndex) {
        debug_assert!(!arena.is_linked(node), "insert_at_end: {} is linked", node);
        let last = arena.prev(self.sentinel);
        arena.set_next(last, node);
        arena.set_prev(node, last);
        arena.set_next(node, self.sentinel);
        arena.set_prev(self.sentinel, node);
        self.bytes += arena.size(node);
        self.objects += 1;
    }

    /// Unlink a node from whichever list contains it, by joining its neighbours. The node is
    /// left detached.
    ///
    /// This does not update the totals of the list the node was on: the caller either
    /// subtracts the size itself or resets the whole list afterwards. Use
    /// [`GenerationList::detach_and_account`] when the owning list is known.
    pub fn detach(arena: &mut NodeArena, node: NodeIndex) {
        debug_assert!(!arena.is_sentinel(node), "detach: {} is a sentinel", node);
        let next = arena.next(node);
        let prev = arena.prev(node);
        assert!(
            next != node,
            "detach: {} is not on any list",
            node
        );
        arena.set_next(prev, next);
        arena.set_prev(next, prev);
        arena.set_next(node, node);
        arena.set_prev(node, node);
    }

    /// Unlink a member of this list and subtract it from the totals.
    pub fn detach_and_account(&mut self, arena: &mut NodeArena, node: NodeIndex) {
        let size = arena.size(node);
        Self::detach(arena, node);
        debug_assert!(self.bytes >= size && self.objects > 0);
        self.bytes -= size;
        self.objects -= 1;
    }

    /// Move all members of `src` to the end of this list, in O(1), and leave `src` empty.
    pub fn append_and_clear(&mut self, arena: &mut NodeArena, src: &mut GenerationList) {
        debug_assert_ne!(self.sentinel, src.sentinel, "append_and_clear: same list");
        let src_first = arena.next(src.sentinel);
        let src_last = arena.prev(src.sentinel);
        if src_first == src.sentinel {
            // Nothing to move. The destination is left untouched.
            return;
        }

        // The last node of this list is the sentinel itself when the list is empty, so the
        // same two stores join the lists in both cases.
        let dst_last = arena.prev(self.sentinel);
        arena.set_next(dst_last, src_first);
        arena.set_prev(src_first, dst_last);

        // Close the circle.
        arena.set_next(src_last, self.sentinel);
        arena.set_prev(self.sentinel, src_last);

        self.bytes += src.bytes;
        self.objects += src.objects;
        src.clear(arena);
    }

    /// Reset to empty. Members keep their links, so the caller must have moved or
    /// detached them already.
    pub(crate) fn clear(&mut self, arena: &mut NodeArena) {
        arena.set_next(self.sentinel, self.sentinel);
        arena.set_prev(self.sentinel, self.sentinel);
        self.bytes = 0;
        self.objects = 0;
    }

    /// The member after `cursor`, or the first member if `cursor` is `None`. Returns `None`
    /// at the end of the list.
    ///
    /// The cursor must still be a member of this list. A detached or released cursor panics.
    /// A cursor linked into another list is not detected here. `LargeObjectSpace::walk_list`
    /// checks membership.
    pub fn walk(&self, arena: &NodeArena, cursor: Option<NodeIndex>) -> Option<NodeIndex> {
        let from = match cursor {
            Some(node) => {
                assert!(
                    !arena.is_sentinel(node) && arena.is_linked(node),
                    "walk: cursor {} is not on list {}",
                    node,
                    self.sentinel
                );
                node
            }
            None => self.sentinel,
        };
        let next = arena.next(from);
        if next == self.sentinel {
            None
        } else {
            assert!(
                !arena.is_sentinel(next),
                "walk: list {} runs into foreign sentinel {}",
                self.sentinel,
                next
            );
            Some(next)
        }
    }

    /// Iterate over the members. The shared borrow of the arena keeps the list from being
    /// mutated while the iterator is alive.
    pub fn iter<'a>(&self, arena: &'a NodeArena) -> ListIter<'a> {
        ListIter {
            arena,
            sentinel: self.sentinel,
            current: self.sentinel,
        }
    }

    /// Walk the list forwards and backwards and compare what both walks see with the totals.
    pub fn check(&self, arena: &NodeArena) -> ListCheck {
        let mut check = ListCheck {
            recorded_bytes: self.bytes,
            recorded_objects: self.objects,
            ..ListCheck::default()
        };
        // A well-formed list cannot have more members than the arena has slots.
        let limit = arena.capacity();

        let mut node = self.sentinel;
        loop {
            let Some(next) = Self::checked_link(arena, node, true) else {
                check.broken_at = Some(node);
                break;
            };
            if Self::checked_link(arena, next, false) != Some(node) {
                check.broken_at = Some(node);
                break;
            }
            if next == self.sentinel {
                break;
            }
            if arena.is_sentinel(next) || check.forward_objects > limit {
                check.broken_at = Some(next);
                break;
            }
            check.forward_objects += 1;
            check.forward_bytes += arena.size(next);
            node = next;
        }

        if check.broken_at.is_none() {
            let mut node = arena.prev(self.sentinel);
            while node != self.sentinel && check.backward_objects <= limit {
                check.backward_objects += 1;
                check.backward_bytes += arena.size(node);
                node = arena.prev(node);
            }
        }
        check
    }

    fn checked_link(arena: &NodeArena, node: NodeIndex, forward: bool) -> Option<NodeIndex> {
        match arena.nodes.get(node.as_usize()) {
            Some(Node {
                kind: NodeKind::Free { .. },
                ..
            })
            | None => None,
            Some(n) => Some(if forward { n.header.next() } else { n.header.prev() }),
        }
    }

    /// Log the members of the list and the result of [`GenerationList::check`].
    pub fn dump(&self, arena: &NodeArena, tag: &str) {
        info!("{{LOS}} list dump {} ({} bytes)", tag, self.bytes);
        info!("{{LOS}}   sentinel {}", self.sentinel);
        let check = self.check(arena);
        if check.broken_at.is_none() {
            for node in self.iter(arena) {
                let info = arena.object(node);
                info!(
                    "{{LOS}}   > {} bytes at {} (node {}, generation {}, {})",
                    arena.size(node),
                    info.region,
                    node,
                    info.generation,
                    arena.mark(node)
                );
            }
        }
        info!(
            "{{LOS}}   bytes={}, fwd={}/{}, backwd={}/{}",
            self.bytes,
            check.forward_objects,
            check.forward_bytes,
            check.backward_objects,
            check.backward_bytes
        );
        if !check.is_consistent() {
            warn!("{{LOS}}    sizes computed differently! {:?}", check);
        }
    }
}

/// Iterator over the members of a [`GenerationList`].
pub struct ListIter<'a> {
    arena: &'a NodeArena,
    sentinel: NodeIndex,
    current: NodeIndex,
}

impl Iterator for ListIter<'_> {
    type Item = NodeIndex;

    fn next(&mut self) -> Option<NodeIndex> {
        let next = self.arena.next(self.current);
        if next == self.sentinel {
            None
        } else {
            self.current = next;
            Some(next)
        }
    }
}

/// What a forward and a backward walk of a list found.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ListCheck {
    pub recorded_bytes: usize,
    pub recorded_objects: usize,
    pub forward_bytes: usize,
    pub forward_objects: usize,
    pub backward_bytes: usize,
    pub backward_objects: usize,
    /// The node where the forward walk found a released node, a foreign sentinel, an
    /// asymmetric link or no end.
    pub broken_at: Option<NodeIndex>,
}

impl ListCheck {
    pub fn is_consistent(&self) -> bool {
        self.broken_at.is_none()
            && self.forward_bytes == self.recorded_bytes
            && self.backward_bytes == self.recorded_bytes
            && self.forward_objects == self.recorded_objects
            && self.backward_objects == self.recorded_objects
    }
}
