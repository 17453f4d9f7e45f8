//! DMA-Reachable Memory Allocation
//!
//! The 8237 addresses physical memory through a 16-bit address register
//! plus an 8-bit page register, so transfer buffers must live in the low
//! 16 MiB and the driver needs their physical addresses. The hosting
//! environment provides that through [`DmaMemory`]; in real mode this is
//! typically a conventional-memory allocator, under an emulator a flat
//! arena.

/// A physically contiguous region handed out by a [`DmaMemory`] allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DmaRegion {
    /// Physical address of the first byte.
    pub phys: u32,
    /// Length in bytes.
    pub len: u32,
}

impl DmaRegion {
    /// Physical address one past the last byte.
    #[inline]
    pub const fn end(&self) -> u32 {
        self.phys + self.len
    }

    /// Whether the region crosses a boundary of the given alignment mask.
    ///
    /// `mask` is the span a channel can address without carrying into the
    /// page register, e.g. `0xFFFF` for 8-bit channels. A region crosses
    /// when its first and last bytes disagree above the mask.
    #[inline]
    pub const fn crosses_boundary(&self, mask: u32) -> bool {
        if self.len == 0 {
            return false;
        }
        (self.phys & !mask) != ((self.end() - 1) & !mask)
    }
}

/// Allocator for DMA-reachable physical memory.
///
/// Implementations must hand out regions below 16 MiB. They are not
/// required to avoid 64 KiB boundaries; the buffer layer deals with that
/// by reallocating and shrinking.
pub trait DmaMemory {
    /// Allocate `len` bytes of physically contiguous memory.
    ///
    /// Returns `None` when the allocation cannot be satisfied.
    fn alloc(&mut self, len: u32) -> Option<DmaRegion>;

    /// Release a region previously returned by [`alloc`](Self::alloc).
    fn free(&mut self, region: DmaRegion);
}

impl<T: DmaMemory + ?Sized> DmaMemory for &mut T {
    #[inline]
    fn alloc(&mut self, len: u32) -> Option<DmaRegion> {
        T::alloc(self, len)
    }

    #[inline]
    fn free(&mut self, region: DmaRegion) {
        T::free(self, region)
    }
}
