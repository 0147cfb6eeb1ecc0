use std::fmt;

/// The page resource could not satisfy a request. There is no fallback: the host
/// runtime is expected to report the error and terminate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationError {
    /// The page budget of the page resource is exhausted.
    HeapOutOfMemory {
        requested_pages: usize,
        available_pages: usize,
    },
    /// The operating system refused to map more memory.
    MmapOutOfMemory { bytes: usize, errno: Option<i32> },
}

impl fmt::Display for AllocationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AllocationError::HeapOutOfMemory {
                requested_pages,
                available_pages,
            } => write!(
                f,
                "heap out of memory: requested {} pages, {} available",
                requested_pages, available_pages
            ),
            AllocationError::MmapOutOfMemory { bytes, errno } => match errno {
                Some(errno) => write!(f, "failed to map {} bytes (errno {})", bytes, errno),
                None => write!(f, "failed to map {} bytes", bytes),
            },
        }
    }
}

impl std::error::Error for AllocationError {}

/// Errors reported by the fallible operations of the large object space.
///
/// Misuse (bad generation index, bad size, bad generation count) and resource
/// exhaustion are distinct variants, so callers can tell them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LosError {
    /// A space needs at least one generation.
    InvalidGenerationCount(usize),
    /// The generation index is not below the number of generations.
    InvalidGeneration {
        generation: usize,
        generations: usize,
    },
    /// Large objects must have a positive size.
    InvalidSize(usize),
    /// The page resource could not provide memory.
    Allocation(AllocationError),
}

impl LosError {
    /// Is this a resource exhaustion, rather than a misuse of the space?
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, LosError::Allocation(_))
    }
}

impl fmt::Display for LosError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LosError::InvalidGenerationCount(count) => {
                write!(f, "invalid generation count {}", count)
            }
            LosError::InvalidGeneration {
                generation,
                generations,
            } => write!(
                f,
                "invalid generation {} (the space has {} generations)",
                generation, generations
            ),
            LosError::InvalidSize(size) => write!(f, "invalid large object size {}", size),
            LosError::Allocation(err) => write!(f, "large object allocation failed: {}", err),
        }
    }
}

impl std::error::Error for LosError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LosError::Allocation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<AllocationError> for LosError {
    fn from(err: AllocationError) -> Self {
        LosError::Allocation(err)
    }
}
