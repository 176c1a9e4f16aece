//! Physical page allocator
//!
//! A singly-linked free list threaded through the first 8 bytes of each free
//! frame. Pop on alloc, push on free, O(1) both ways. Frames come back
//! zeroed so fresh page-table nodes and user pages start clean.

use spin::Mutex;

use super::{PhysAddr, PAGE_SIZE};

/// Free-list physical frame allocator.
///
/// Instance-constructible: the kernel owns one global instance over the RAM
/// above the image, and callers that need isolation can run their own over
/// any exclusively-owned region.
pub struct PageAllocator {
    /// Address of the first free frame (0 = empty)
    head: usize,
    /// Number of frames on the list
    free: usize,
    /// Managed range, for sanity checks on free()
    start: usize,
    end: usize,
}

impl PageAllocator {
    pub const fn empty() -> Self {
        Self {
            head: 0,
            free: 0,
            start: 0,
            end: 0,
        }
    }

    /// Take ownership of `[start, end)` and thread the free list through it.
    /// `start` is rounded up to a page boundary.
    ///
    /// # Safety
    ///
    /// The region must be exclusively owned by this allocator, mapped, and
    /// writable for its whole lifetime.
    pub unsafe fn init(&mut self, start: usize, end: usize) {
        let start = super::page_round_up(start);
        self.start = start;
        self.end = end;
        self.head = 0;
        self.free = 0;

        let mut page = start;
        while page + PAGE_SIZE <= end {
            // SAFETY: page lies within the exclusively-owned range.
            unsafe { self.push(PhysAddr::new(page)) };
            page += PAGE_SIZE;
        }
    }

    /// Pop a frame, zero it. `None` when exhausted.
    pub fn alloc(&mut self) -> Option<PhysAddr> {
        if self.head == 0 {
            return None;
        }

        let page = self.head;
        // SAFETY: head always points at a frame previously threaded onto the
        // list, whose first word is the next-frame link.
        unsafe {
            self.head = core::ptr::read(page as *const usize);
            core::ptr::write_bytes(page as *mut u8, 0, PAGE_SIZE);
        }
        self.free -= 1;
        Some(PhysAddr::new(page))
    }

    /// Return a frame to the pool.
    ///
    /// Freeing a frame outside the managed range, or one that is not
    /// page-aligned, is a kernel bug and panics.
    pub fn free(&mut self, page: PhysAddr) {
        assert!(
            page.is_page_aligned(),
            "free: unaligned frame {:#x}",
            page.as_usize()
        );
        assert!(
            page.as_usize() >= self.start && page.as_usize() + PAGE_SIZE <= self.end,
            "free: frame {:#x} outside managed range",
            page.as_usize()
        );
        // SAFETY: the range check above confirms the frame belongs to this
        // allocator; ownership returns to the free list.
        unsafe { self.push(page) };
    }

    /// Frames currently on the free list.
    pub fn free_pages(&self) -> usize {
        self.free
    }

    /// Link a frame onto the head of the list.
    ///
    /// # Safety
    ///
    /// `page` must be an exclusively-owned, writable frame.
    unsafe fn push(&mut self, page: PhysAddr) {
        // SAFETY: per contract, the frame is ours; its first word becomes the
        // link to the previous head.
        unsafe { core::ptr::write(page.as_mut_ptr::<usize>(), self.head) };
        self.head = page.as_usize();
        self.free += 1;
    }
}

/// Global frame allocator instance
pub static PAGE_ALLOCATOR: Mutex<PageAllocator> = Mutex::new(PageAllocator::empty());

#[cfg(all(test, not(target_os = "none")))]
mod tests {
    use super::super::test_support::arena;
    use super::*;

    #[test]
    fn alloc_free_round_trip() {
        let a = arena(8);
        let mut pa = PageAllocator::empty();
        // SAFETY: the arena is exclusively owned by this test.
        unsafe { pa.init(a.start, a.end) };
        assert_eq!(pa.free_pages(), 8);

        let p1 = pa.alloc().expect("allocation from a fresh pool");
        let p2 = pa.alloc().expect("second allocation");
        assert_ne!(p1, p2);
        assert_eq!(pa.free_pages(), 6);

        pa.free(p1);
        pa.free(p2);
        assert_eq!(pa.free_pages(), 8);
    }

    #[test]
    fn allocated_frames_are_zeroed() {
        let a = arena(2);
        let mut pa = PageAllocator::empty();
        // SAFETY: the arena is exclusively owned by this test.
        unsafe { pa.init(a.start, a.end) };

        // Dirty a frame through the free path, then check it comes back clean.
        let p = pa.alloc().expect("allocation");
        // SAFETY: p is a live frame owned by this test.
        unsafe { core::ptr::write_bytes(p.as_mut_ptr::<u8>(), 0xAB, PAGE_SIZE) };
        pa.free(p);

        let q = pa.alloc().expect("reallocation");
        // SAFETY: q is a live frame owned by this test.
        let bytes = unsafe { core::slice::from_raw_parts(q.as_ptr::<u8>(), PAGE_SIZE) };
        assert!(bytes.iter().all(|&b| b == 0));
    }

    #[test]
    fn exhaustion_returns_none() {
        let a = arena(2);
        let mut pa = PageAllocator::empty();
        // SAFETY: the arena is exclusively owned by this test.
        unsafe { pa.init(a.start, a.end) };

        assert!(pa.alloc().is_some());
        assert!(pa.alloc().is_some());
        assert!(pa.alloc().is_none());
    }

    #[test]
    #[should_panic(expected = "outside managed range")]
    fn foreign_frame_free_panics() {
        let a = arena(2);
        let mut pa = PageAllocator::empty();
        // SAFETY: the arena is exclusively owned by this test.
        unsafe { pa.init(a.start, a.end) };
        pa.free(PhysAddr::new(a.end + PAGE_SIZE));
    }
}
