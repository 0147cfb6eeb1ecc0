/// log2 of the number of bytes in a megabyte
pub const LOG_BYTES_IN_MBYTE: u8 = 20;
/// The number of bytes in a megabyte
pub const BYTES_IN_MBYTE: usize = 1 << LOG_BYTES_IN_MBYTE;

#[cfg(target_pointer_width = "32")]
/// log2 of the number of bytes in a word
pub const LOG_BYTES_IN_WORD: u8 = 2;
#[cfg(target_pointer_width = "64")]
/// log2 of the number of bytes in a word
pub const LOG_BYTES_IN_WORD: u8 = 3;
/// The number of bytes in a word
pub const BYTES_IN_WORD: usize = 1 << LOG_BYTES_IN_WORD;

/// log2 of the number of bytes in a page
pub const LOG_BYTES_IN_PAGE: u8 = 12;
/// The number of bytes in a page
pub const BYTES_IN_PAGE: usize = 1 << LOG_BYTES_IN_PAGE;

/// The number of words in the prefix that precedes the data of every large object.
pub const HEADER_WORDS: usize = 4;
/// The number of bytes in the large object prefix.
pub const HEADER_BYTES: usize = HEADER_WORDS << LOG_BYTES_IN_WORD;

/// The default number of generations of a large object space.
pub const DEFAULT_GENERATIONS: usize = 3;
/// The default page budget of the page resource, in bytes.
pub const DEFAULT_HEAP_SIZE: usize = 512 << LOG_BYTES_IN_MBYTE;

static_assertions::const_assert!(HEADER_BYTES < BYTES_IN_PAGE);
static_assertions::const_assert_eq!(BYTES_IN_WORD, std::mem::size_of::<usize>());
