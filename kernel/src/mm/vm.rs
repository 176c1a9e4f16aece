//! SV39 virtual memory
//!
//! Three-level page tables, 512 entries each. The kernel identity map makes
//! every physical frame directly addressable, so table nodes are read and
//! written through raw pointers at their physical addresses.

use bitflags::bitflags;

use super::{page_alloc::PageAllocator, PhysAddr, VirtAddr, MAXVA, PAGE_SIZE};
use crate::error::{KernelError, Result};

/// Entries per page-table node
pub const PT_ENTRIES: usize = 512;

bitflags! {
    /// SV39 PTE permission bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PteFlags: u64 {
        /// Valid
        const V = 1 << 0;
        /// Readable
        const R = 1 << 1;
        /// Writable
        const W = 1 << 2;
        /// Executable
        const X = 1 << 3;
        /// User accessible
        const U = 1 << 4;
        /// Global
        const G = 1 << 5;
        /// Accessed
        const A = 1 << 6;
        /// Dirty
        const D = 1 << 7;
    }
}

/// One 64-bit page table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct Pte(u64);

impl Pte {
    pub const EMPTY: Self = Self(0);

    /// Leaf entry: valid mapping of a frame with the given permissions.
    pub fn leaf(pa: PhysAddr, perm: PteFlags) -> Self {
        Self(((pa.as_usize() as u64 >> 12) << 10) | (perm | PteFlags::V).bits())
    }

    /// Interior entry: valid pointer to a child table, no R/W/X.
    pub fn table(pa: PhysAddr) -> Self {
        Self(((pa.as_usize() as u64 >> 12) << 10) | PteFlags::V.bits())
    }

    pub fn is_valid(&self) -> bool {
        self.0 & PteFlags::V.bits() != 0
    }

    /// A valid entry with any of R/W/X set maps a frame; without them it
    /// points to the next level.
    pub fn is_leaf(&self) -> bool {
        self.is_valid() && self.0 & (PteFlags::R | PteFlags::W | PteFlags::X).bits() != 0
    }

    pub fn flags(&self) -> PteFlags {
        PteFlags::from_bits_truncate(self.0 & 0x3FF)
    }

    pub fn phys_addr(&self) -> PhysAddr {
        PhysAddr::new(((self.0 >> 10) << 12) as usize)
    }
}

/// A page-table tree rooted at one frame.
///
/// The root is either the global kernel map or owned by exactly one process;
/// interior nodes are reachable only through their root.
pub struct AddressSpace {
    root: PhysAddr,
}

impl AddressSpace {
    /// Allocate an empty root node.
    pub fn new(frames: &mut PageAllocator) -> Result<Self> {
        let root = frames.alloc().ok_or(KernelError::OutOfMemory)?;
        Ok(Self { root })
    }

    /// Physical address of the root node (what goes into SATP).
    pub fn root(&self) -> PhysAddr {
        self.root
    }

    /// Descend to the level-0 entry for `va`, allocating missing interior
    /// nodes from `frames` when provided. `None` for addresses past MAXVA,
    /// for holes when not allocating, and on frame exhaustion.
    fn walk(&self, va: VirtAddr, mut frames: Option<&mut PageAllocator>) -> Option<*mut Pte> {
        if va.as_usize() >= MAXVA {
            return None;
        }

        let mut table = self.root;
        for level in [2, 1] {
            // SAFETY: table is a live page-table node (the root, or a child
            // installed below); vpn() indexes within its 512 entries.
            let entry_ptr = unsafe { table.as_mut_ptr::<Pte>().add(va.vpn(level)) };
            // SAFETY: entry_ptr is in-bounds per above.
            let entry = unsafe { *entry_ptr };

            if entry.is_valid() {
                debug_assert!(!entry.is_leaf(), "superpage in walk path");
                table = entry.phys_addr();
            } else {
                let frame = frames.as_deref_mut()?.alloc()?;
                // SAFETY: entry_ptr is in-bounds; the freshly allocated frame
                // becomes an interior node owned by this tree.
                unsafe { *entry_ptr = Pte::table(frame) };
                table = frame;
            }
        }

        // SAFETY: table is the level-0 node for this address.
        Some(unsafe { table.as_mut_ptr::<Pte>().add(va.vpn(0)) })
    }

    /// Install leaf mappings for `[va, va + size)` onto `[pa, pa + size)`.
    ///
    /// Mapping over a live entry is a kernel bug and panics.
    pub fn map_pages(
        &mut self,
        frames: &mut PageAllocator,
        va: VirtAddr,
        size: usize,
        pa: PhysAddr,
        perm: PteFlags,
    ) -> Result<()> {
        assert!(size > 0, "map_pages: zero size");
        if va.as_usize() + size - 1 >= MAXVA {
            return Err(KernelError::InvalidAddress { addr: va.as_usize() });
        }

        let mut a = va.page_round_down().as_usize();
        let last = VirtAddr::new(va.as_usize() + size - 1)
            .page_round_down()
            .as_usize();
        let mut pa = pa.as_usize();

        loop {
            let pte = self
                .walk(VirtAddr::new(a), Some(frames))
                .ok_or(KernelError::OutOfMemory)?;
            // SAFETY: walk returned an in-bounds level-0 entry.
            let entry = unsafe { *pte };
            assert!(!entry.is_valid(), "map_pages: remap at {:#x}", a);
            // SAFETY: same entry; writing a leaf hands the target frame to
            // this mapping.
            unsafe { *pte = Pte::leaf(PhysAddr::new(pa), perm) };

            if a == last {
                break;
            }
            a += PAGE_SIZE;
            pa += PAGE_SIZE;
        }
        Ok(())
    }

    /// Remove the leaf mappings covering `[va, va + size)`.
    ///
    /// Unmapping a hole is a kernel bug and panics. Interior nodes are kept;
    /// `destroy` reclaims them.
    pub fn unmap_pages(&mut self, va: VirtAddr, size: usize) {
        if size == 0 {
            return;
        }

        let mut a = va.page_round_down().as_usize();
        let last = VirtAddr::new(va.as_usize() + size - 1)
            .page_round_down()
            .as_usize();

        loop {
            let pte = self
                .walk(VirtAddr::new(a), None)
                .unwrap_or_else(|| panic!("unmap_pages: not mapped at {:#x}", a));
            // SAFETY: walk returned an in-bounds level-0 entry.
            let entry = unsafe { *pte };
            assert!(entry.is_valid(), "unmap_pages: not mapped at {:#x}", a);
            // SAFETY: same entry; clearing it detaches the frame from this
            // tree without freeing it (it belongs to another owner).
            unsafe { *pte = Pte::EMPTY };

            if a == last {
                break;
            }
            a += PAGE_SIZE;
        }
    }

    /// Translate to the physical frame backing `va`, or `None` if unmapped.
    pub fn translate(&self, va: VirtAddr) -> Option<PhysAddr> {
        let pte = self.walk(va, None)?;
        // SAFETY: walk returned an in-bounds level-0 entry.
        let entry = unsafe { *pte };
        if entry.is_valid() {
            Some(entry.phys_addr())
        } else {
            None
        }
    }

    /// Tear the tree down post-order, returning every interior node to the
    /// frame pool. Leaf frames are not freed here; they belong to whoever
    /// mapped them.
    pub fn destroy(self, frames: &mut PageAllocator) {
        Self::free_subtree(self.root, frames);
    }

    fn free_subtree(table: PhysAddr, frames: &mut PageAllocator) {
        for i in 0..PT_ENTRIES {
            // SAFETY: table is a live node of the tree being destroyed.
            let entry = unsafe { *table.as_ptr::<Pte>().add(i) };
            if entry.is_valid() && !entry.is_leaf() {
                Self::free_subtree(entry.phys_addr(), frames);
            }
        }
        frames.free(table);
    }
}

/// Build the kernel identity map: image + RAM executable, MMIO windows
/// read/write.
pub fn kernel_map(frames: &mut PageAllocator) -> Result<AddressSpace> {
    use super::{
        CLINT_BASE, CLINT_SIZE, KERNBASE, PHYSTOP, PLIC_BASE, PLIC_SIZE, UART0_BASE,
        VIRT_TEST_BASE, VIRT_TEST_SIZE,
    };

    let mut space = AddressSpace::new(frames)?;

    let rwx = PteFlags::R | PteFlags::W | PteFlags::X;
    let rw = PteFlags::R | PteFlags::W;

    space.map_pages(
        frames,
        VirtAddr::new(KERNBASE),
        PHYSTOP - KERNBASE,
        PhysAddr::new(KERNBASE),
        rwx,
    )?;
    space.map_pages(
        frames,
        VirtAddr::new(UART0_BASE),
        PAGE_SIZE,
        PhysAddr::new(UART0_BASE),
        rw,
    )?;
    space.map_pages(
        frames,
        VirtAddr::new(PLIC_BASE),
        PLIC_SIZE,
        PhysAddr::new(PLIC_BASE),
        rw,
    )?;
    space.map_pages(
        frames,
        VirtAddr::new(CLINT_BASE),
        CLINT_SIZE,
        PhysAddr::new(CLINT_BASE),
        rw,
    )?;
    space.map_pages(
        frames,
        VirtAddr::new(VIRT_TEST_BASE),
        VIRT_TEST_SIZE,
        PhysAddr::new(VIRT_TEST_BASE),
        rw,
    )?;

    Ok(space)
}

/// The global kernel page table, built once at boot.
#[cfg(target_os = "none")]
static KERNEL_SPACE: spin::Once<AddressSpace> = spin::Once::new();

/// Build the kernel map and turn SV39 translation on.
#[cfg(target_os = "none")]
pub fn init() {
    let space = KERNEL_SPACE.call_once(|| {
        let mut frames = super::PAGE_ALLOCATOR.lock();
        kernel_map(&mut frames).expect("kernel page table")
    });

    crate::arch::install_page_table(space.root());
    log::info!("SV39 paging enabled, root {:#x}", space.root().as_usize());
}

/// Root of the kernel map (for tasks that run without their own space).
#[cfg(target_os = "none")]
pub fn kernel_root() -> Option<PhysAddr> {
    KERNEL_SPACE.get().map(|s| s.root())
}
