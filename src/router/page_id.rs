use std::sync::atomic::{AtomicU64, Ordering};

/// Maximum number of pages alive at the same time.
pub const MAX_PAGE_ID_SIZE: u32 = u64::BITS;

/// Identifier of a page, unique among live pages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(u32);

impl PageId {
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for PageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "page-{}", self.0)
    }
}

/// Allocation bitmask for page ids. A set bit means the id is in use.
#[derive(Debug, Default)]
pub struct PageIdPool {
    bits: AtomicU64,
}

impl PageIdPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the lowest free id, or `None` when all ids are in use.
    pub fn generate_next_page_id(&self) -> Option<PageId> {
        for idx in 0..MAX_PAGE_ID_SIZE {
            let mask = 1u64 << idx;
            if self.bits.fetch_or(mask, Ordering::Relaxed) & mask == 0 {
                return Some(PageId(idx));
            }
        }
        None
    }

    /// Makes the id available again. Out of range ids are ignored.
    pub fn recycle_page_id(&self, id: PageId) {
        if id.0 >= MAX_PAGE_ID_SIZE {
            return;
        }
        self.bits.fetch_and(!(1u64 << id.0), Ordering::Relaxed);
    }

    pub fn in_use(&self) -> u32 {
        self.bits.load(Ordering::Relaxed).count_ones()
    }
}
