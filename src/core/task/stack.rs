//! Task stack arena
//!
//! Task stacks are carved out of one static, 8-byte aligned word pool when a
//! task is created and are never resized or returned. The kernel only keeps
//! word offsets into the pool ([`StackRegion`]); the memory itself is touched
//! by the port when it builds the initial frame and by the context switch.
//!
//! The lowest word of every region holds [`STK_CANARY`]. A saved stack
//! pointer inside the guard band or a clobbered canary means the task ran
//! past its stack.

use core::cell::UnsafeCell;

use crate::config::{CFG_STK_GUARD_WORDS, CFG_STK_POOL_WORDS};
use crate::error::{OsError, OsResult};
use crate::types::OsStkElement;

/// Marker written to the lowest word of every task stack
pub const STK_CANARY: OsStkElement = 0xDEAD_BEEF;

/// A contiguous slice of the stack pool, in words
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackRegion {
    base: usize,
    words: usize,
}

impl StackRegion {
    pub const EMPTY: StackRegion = StackRegion { base: 0, words: 0 };

    /// Offset of the lowest word
    #[inline]
    pub const fn base(&self) -> usize {
        self.base
    }

    /// Size in words
    #[inline]
    pub const fn words(&self) -> usize {
        self.words
    }

    /// Offset one past the highest word (initial stack top)
    #[inline]
    pub const fn top(&self) -> usize {
        self.base + self.words
    }

    /// Validate a saved stack pointer and the canary word
    ///
    /// `sp_offset` is the saved stack pointer as a word offset into the pool,
    /// `bottom` the current value of the region's lowest word.
    pub fn check(&self, sp_offset: usize, bottom: OsStkElement) -> OsResult<()> {
        if bottom != STK_CANARY {
            return Err(OsError::StkOvf);
        }
        if sp_offset < self.base + CFG_STK_GUARD_WORDS || sp_offset > self.top() {
            return Err(OsError::StkOvf);
        }
        Ok(())
    }
}

/// Bump allocator over the stack pool
#[derive(Debug)]
pub struct StackAllocator {
    used: usize,
}

impl StackAllocator {
    pub const fn new() -> Self {
        StackAllocator { used: 0 }
    }

    /// Reserve `words` words, rounded up to keep every region 8-byte aligned
    pub fn carve(&mut self, words: usize) -> OsResult<StackRegion> {
        let words = words.next_multiple_of(2);
        if words > self.remaining() {
            return Err(OsError::StkPoolEmpty);
        }
        let region = StackRegion {
            base: self.used,
            words,
        };
        self.used += words;
        Ok(region)
    }

    /// Words still available
    #[inline]
    pub fn remaining(&self) -> usize {
        CFG_STK_POOL_WORDS - self.used
    }
}

impl Default for StackAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Backing memory for all task stacks
#[repr(C, align(8))]
pub struct StackPool(UnsafeCell<[OsStkElement; CFG_STK_POOL_WORDS]>);

// SAFETY: each region is written by task creation before the task first
// runs, then only by its owning task and the context switch.
unsafe impl Sync for StackPool {}

/// The global stack pool
pub static STACK_POOL: StackPool = StackPool(UnsafeCell::new([0; CFG_STK_POOL_WORDS]));

impl StackPool {
    /// Address of the first word of the pool
    #[inline]
    pub fn base_addr(&self) -> usize {
        self.0.get() as usize
    }

    /// Convert an address inside the pool to a word offset
    #[inline]
    pub fn offset_of(&self, addr: usize) -> usize {
        addr.wrapping_sub(self.base_addr()) / core::mem::size_of::<OsStkElement>()
    }

    /// Address of the word at `offset`
    #[inline]
    pub fn addr_of(&self, offset: usize) -> usize {
        self.base_addr() + offset * core::mem::size_of::<OsStkElement>()
    }

    /// Read one word of the pool
    #[inline]
    pub fn word(&self, offset: usize) -> OsStkElement {
        debug_assert!(offset < CFG_STK_POOL_WORDS);
        // SAFETY: in bounds; a racy read of a word is benign on a single core.
        unsafe { core::ptr::read_volatile((self.0.get() as *const OsStkElement).add(offset)) }
    }

    /// Mutable view of a region
    ///
    /// # Safety
    /// The region's task must not be running and no other view of the
    /// region may be live.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn region_mut(&self, region: StackRegion) -> &mut [OsStkElement] {
        unsafe {
            let base = (self.0.get() as *mut OsStkElement).add(region.base);
            core::slice::from_raw_parts_mut(base, region.words)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_carve_aligned() {
        let mut alloc = StackAllocator::new();
        let a = alloc.carve(65).unwrap();
        let b = alloc.carve(64).unwrap();

        assert_eq!(a.base(), 0);
        assert_eq!(a.words(), 66);
        assert_eq!(b.base(), 66);
        assert_eq!(alloc.remaining(), CFG_STK_POOL_WORDS - 130);
    }

    #[test]
    fn test_pool_exhausted() {
        let mut alloc = StackAllocator::new();
        alloc.carve(CFG_STK_POOL_WORDS - 2).unwrap();
        assert_eq!(alloc.carve(4), Err(OsError::StkPoolEmpty));
        assert!(alloc.carve(2).is_ok());
    }

    #[test]
    fn test_check_guard_and_canary() {
        let mut alloc = StackAllocator::new();
        alloc.carve(64).unwrap();
        let region = alloc.carve(64).unwrap();

        assert_eq!(region.check(region.top() - 17, STK_CANARY), Ok(()));
        assert_eq!(
            region.check(region.base() + CFG_STK_GUARD_WORDS - 1, STK_CANARY),
            Err(OsError::StkOvf)
        );
        assert_eq!(region.check(region.top() - 17, 0), Err(OsError::StkOvf));
        assert_eq!(region.check(region.top() + 1, STK_CANARY), Err(OsError::StkOvf));
    }
}
