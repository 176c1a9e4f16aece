//! Kernel bump heap
//!
//! Linear allocator over the linker-provided heap region. Kernel metadata
//! allocated here is long-lived, so `dealloc` is a no-op; anything that
//! genuinely needs to return memory must go through the page allocator.

use core::alloc::{GlobalAlloc, Layout};

use spin::Mutex;

/// Minimum allocation alignment
const MIN_ALIGN: usize = 8;

/// Bump allocator over a fixed region.
pub struct BumpAllocator {
    start: usize,
    end: usize,
    next: usize,
    allocations: usize,
}

impl BumpAllocator {
    pub const fn empty() -> Self {
        Self {
            start: 0,
            end: 0,
            next: 0,
            allocations: 0,
        }
    }

    /// Hand the region `[start, start + size)` to the allocator.
    ///
    /// # Safety
    ///
    /// The region must be exclusively owned, mapped, and writable for the
    /// allocator's whole lifetime.
    pub unsafe fn init(&mut self, start: usize, size: usize) {
        self.start = start;
        self.end = start + size;
        self.next = start;
        self.allocations = 0;
    }

    /// Carve the next aligned slice off the region. `None` when exhausted.
    pub fn alloc(&mut self, layout: Layout) -> Option<*mut u8> {
        if self.start == 0 || layout.size() == 0 {
            return None;
        }

        let align = layout.align().max(MIN_ALIGN);
        let base = (self.next + align - 1) & !(align - 1);
        let end = base.checked_add(layout.size())?;
        if end > self.end {
            return None;
        }

        self.next = end;
        self.allocations += 1;
        Some(base as *mut u8)
    }

    /// (allocated, remaining, allocation count)
    pub fn stats(&self) -> (usize, usize, usize) {
        (
            self.next - self.start,
            self.end - self.next,
            self.allocations,
        )
    }
}

/// Lock wrapper making the bump heap usable as the global allocator.
pub struct LockedHeap {
    inner: Mutex<BumpAllocator>,
}

impl LockedHeap {
    pub const fn empty() -> Self {
        Self {
            inner: Mutex::new(BumpAllocator::empty()),
        }
    }

    /// # Safety
    ///
    /// See [`BumpAllocator::init`].
    pub unsafe fn init(&self, start: usize, size: usize) {
        // SAFETY: contract forwarded to the caller.
        unsafe { self.inner.lock().init(start, size) };
    }

    pub fn stats(&self) -> (usize, usize, usize) {
        self.inner.lock().stats()
    }
}

// SAFETY: allocation takes the spin lock; dealloc is a no-op by design, so
// there is no aliasing hazard from reuse.
unsafe impl GlobalAlloc for LockedHeap {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        self.inner
            .lock()
            .alloc(layout)
            .unwrap_or(core::ptr::null_mut())
    }

    unsafe fn dealloc(&self, _ptr: *mut u8, _layout: Layout) {
        // Bump heap never frees.
    }
}
