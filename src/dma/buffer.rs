//! Boundary-Safe Transfer Buffer Allocation
//!
//! An ISA DMA channel cannot carry an address increment past its page
//! span, so a transfer buffer must not straddle the channel's boundary
//! (64 KiB for byte channels, 128 KiB for wide word channels). General
//! purpose allocators know nothing about this, so allocation here is a
//! retry loop: if a region straddles, a replacement is requested while
//! the bad region is still held, which forces the allocator to a
//! different placement. When placement alone cannot fix it the requested
//! size shrinks step by step until it fits or the budget runs out.

use crate::error::{DmaError, DmaResult};
use crate::hal::{DmaMemory, DmaRegion};

/// Size decrement applied when no placement of the current size works.
const SHRINK_STEP: u32 = 4096;

/// Replacement attempts before shrinking (and total shrink steps).
const PLACEMENT_RETRIES: u8 = 12;

/// A transfer buffer pinned in DMA-reachable memory.
///
/// Freeing is explicit (the allocator handle is not stored) and
/// idempotent; dropping the buffer without freeing leaks the region.
#[derive(Debug)]
pub struct DmaBuffer {
    region: DmaRegion,
    released: bool,
}

impl DmaBuffer {
    /// Physical address of the first byte.
    #[inline]
    #[must_use]
    pub const fn phys(&self) -> u32 {
        self.region.phys
    }

    /// Buffer length in bytes.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> u32 {
        self.region.len
    }

    /// Whether the buffer has zero length.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.region.len == 0
    }

    /// The underlying region.
    #[inline]
    #[must_use]
    pub const fn region(&self) -> DmaRegion {
        self.region
    }

    /// Release the region back to the allocator. Safe to call more than
    /// once; only the first call frees.
    pub fn free(&mut self, mem: &mut impl DmaMemory) {
        if !self.released {
            mem.free(self.region);
            self.released = true;
        }
    }
}

/// Allocate a buffer of up to `want` bytes that does not straddle the
/// boundary described by `limit_mask`.
///
/// The returned buffer may be smaller than requested when only a shrunk
/// size could be placed. Errors are [`DmaError::OutOfMemory`] when the
/// allocator refuses outright and [`DmaError::BoundaryUnsatisfiable`]
/// when every placement and size in the budget straddles.
pub fn alloc_buffer(
    mem: &mut impl DmaMemory,
    want: u32,
    limit_mask: u32,
) -> DmaResult<DmaBuffer> {
    if want == 0 {
        return Err(DmaError::InvalidLength);
    }
    let mut len = want.min(limit_mask + 1);

    for _ in 0..PLACEMENT_RETRIES {
        let first = mem.alloc(len).ok_or(DmaError::OutOfMemory)?;
        if !first.crosses_boundary(limit_mask) {
            return Ok(DmaBuffer { region: first, released: false });
        }

        // Request the replacement before releasing the straddling region
        // so the allocator cannot hand the same placement straight back.
        let second = mem.alloc(len);
        mem.free(first);
        if let Some(second) = second {
            if !second.crosses_boundary(limit_mask) {
                return Ok(DmaBuffer { region: second, released: false });
            }
            mem.free(second);
        }

        if len <= SHRINK_STEP {
            break;
        }
        len -= SHRINK_STEP;
    }

    Err(DmaError::BoundaryUnsatisfiable)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    extern crate std;
    use std::vec;

    use super::*;
    use crate::test_utils::MockDmaMemory;

    #[test]
    fn clean_placement_allocates_first_try() {
        let mut mem = MockDmaMemory::with_placements(vec![0x1_0000]);
        let buf = alloc_buffer(&mut mem, 0x4000, 0xFFFF).unwrap();
        assert_eq!(buf.phys(), 0x1_0000);
        assert_eq!(buf.len(), 0x4000);
        assert_eq!(mem.live_allocations(), 1);
    }

    #[test]
    fn straddling_first_region_held_during_retry() {
        // First placement straddles 64 KiB, second does not.
        let mut mem = MockDmaMemory::with_placements(vec![0xE000, 0x2_0000]);
        let buf = alloc_buffer(&mut mem, 0x4000, 0xFFFF).unwrap();
        assert_eq!(buf.phys(), 0x2_0000);
        // The straddling region must have been freed only after the
        // replacement was requested.
        assert!(mem.second_alloc_overlapped_first());
        assert_eq!(mem.live_allocations(), 1);
    }

    #[test]
    fn shrinks_until_a_size_fits() {
        // Allocator always places at the same awkward spot; only a
        // request small enough to fit before the boundary succeeds.
        let mut mem = MockDmaMemory::fixed_at(0xF000);
        let buf = alloc_buffer(&mut mem, 0x4000, 0xFFFF).unwrap();
        assert!(buf.len() <= 0x1000);
        assert_eq!(buf.phys() + buf.len() - 1, buf.phys() | 0x0FFF);
        assert!(!buf.region().crosses_boundary(0xFFFF));
    }

    #[test]
    fn boundary_unsatisfiable_when_budget_exhausted() {
        // Placement straddles no matter the size (one byte each side).
        let mut mem = MockDmaMemory::straddle_always(0xFFFF);
        assert_eq!(
            alloc_buffer(&mut mem, 0x4000, 0xFFFF).unwrap_err(),
            DmaError::BoundaryUnsatisfiable
        );
        assert_eq!(mem.live_allocations(), 0);
    }

    #[test]
    fn out_of_memory_propagates() {
        let mut mem = MockDmaMemory::empty();
        assert_eq!(
            alloc_buffer(&mut mem, 0x4000, 0xFFFF).unwrap_err(),
            DmaError::OutOfMemory
        );
    }

    #[test]
    fn request_clamped_to_channel_reach() {
        let mut mem = MockDmaMemory::with_placements(vec![0x4_0000]);
        let buf = alloc_buffer(&mut mem, 0x4_0000, 0x1_FFFF).unwrap();
        assert_eq!(buf.len(), 0x2_0000);
    }

    #[test]
    fn free_is_idempotent() {
        let mut mem = MockDmaMemory::with_placements(vec![0x1_0000]);
        let mut buf = alloc_buffer(&mut mem, 0x1000, 0xFFFF).unwrap();
        buf.free(&mut mem);
        buf.free(&mut mem);
        assert_eq!(mem.live_allocations(), 0);
        assert_eq!(mem.free_calls(), 1);
    }
}
