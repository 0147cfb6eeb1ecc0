use crate::util::constants::*;
use crate::util::Address;

/* Alignment */

pub const fn raw_align_up(val: usize, align: usize) -> usize {
    // See https://github.com/rust-lang/rust/blob/e620d0f337d0643c757bab791fc7d88d63217704/src/libcore/alloc.rs#L192
    val.wrapping_add(align).wrapping_sub(1) & !align.wrapping_sub(1)
}

pub const fn raw_is_aligned(val: usize, align: usize) -> bool {
    val & align.wrapping_sub(1) == 0
}

/// Round a byte size up to the page granularity of the page resource.
pub const fn roundup_page(bytes: usize) -> usize {
    raw_align_up(bytes, BYTES_IN_PAGE)
}

/// The rounded size of a large object whose data is `nbytes` long: data plus the
/// header prefix, padded to whole pages.
pub const fn large_object_bytes(nbytes: usize) -> usize {
    roundup_page(nbytes + HEADER_BYTES)
}

/* Conversion */

pub fn bytes_to_pages_up(bytes: usize) -> usize {
    (bytes + BYTES_IN_PAGE - 1) >> LOG_BYTES_IN_PAGE
}

/// The page index of an address, i.e. the address with the in-page offset dropped.
pub fn address_to_page_index(address: Address) -> usize {
    address >> LOG_BYTES_IN_PAGE as usize
}
