//! Priority bitmap management for O(1) highest-ready lookup
//!
//! This module implements the priority table using a bitmap approach.
//! Leverages the CLZ (Count Leading Zeros) instruction for efficient
//! highest-priority determination.

use crate::config::CFG_PRIO_MAX;
use crate::types::OsPrio;

/// Number of words needed for the priority bitmap
const PRIO_TBL_SIZE: usize = CFG_PRIO_MAX.div_ceil(32);

/// Priority bitmap table
///
/// Each bit represents a priority level. A set bit means there's at least
/// one ready task at that priority. Priority `p` lives in word `p / 32`,
/// bit `p % 32`, so the most urgent priority is the highest set bit of the
/// highest non-zero word.
#[derive(Debug, Clone, Copy)]
pub struct PrioTable {
    bitmap: [u32; PRIO_TBL_SIZE],
}

impl PrioTable {
    pub const fn new() -> Self {
        PrioTable {
            bitmap: [0; PRIO_TBL_SIZE],
        }
    }

    /// Insert a priority into the bitmap
    #[inline]
    pub fn insert(&mut self, prio: OsPrio) {
        debug_assert!((prio as usize) < CFG_PRIO_MAX);

        let word_idx = (prio / 32) as usize;
        let bit_pos = prio % 32;

        self.bitmap[word_idx] |= 1 << bit_pos;
    }

    /// Remove a priority from the bitmap
    #[inline]
    pub fn remove(&mut self, prio: OsPrio) {
        debug_assert!((prio as usize) < CFG_PRIO_MAX);

        let word_idx = (prio / 32) as usize;
        let bit_pos = prio % 32;

        self.bitmap[word_idx] &= !(1 << bit_pos);
    }

    /// Get the most urgent priority with a ready task
    #[inline]
    pub fn get_highest(&self) -> Option<OsPrio> {
        self.bitmap
            .iter()
            .enumerate()
            .rev()
            .find(|&(_, &word)| word != 0)
            .map(|(idx, &word)| (idx * 32) as OsPrio + Self::msb(word))
    }

    /// Check if a specific priority has any ready tasks
    #[inline]
    pub fn is_set(&self, prio: OsPrio) -> bool {
        let word_idx = (prio / 32) as usize;
        let bit_pos = prio % 32;

        (self.bitmap[word_idx] & (1 << bit_pos)) != 0
    }

    /// Check if the priority table is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bitmap.iter().all(|&w| w == 0)
    }

    /// Index of the most significant set bit (`value` must be non-zero)
    #[inline]
    fn msb(value: u32) -> OsPrio {
        (31 - value.leading_zeros()) as OsPrio
    }
}

impl Default for PrioTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_table() {
        let table = PrioTable::new();
        assert!(table.is_empty());
        assert_eq!(table.get_highest(), None);
    }

    #[test]
    fn test_insert_remove() {
        let mut table = PrioTable::new();

        table.insert(5);
        assert!(table.is_set(5));
        assert!(!table.is_set(4));
        assert_eq!(table.get_highest(), Some(5));

        table.insert(7);
        assert_eq!(table.get_highest(), Some(7));

        table.remove(7);
        assert_eq!(table.get_highest(), Some(5));

        table.remove(5);
        assert!(table.is_empty());
    }

    #[test]
    fn test_priority_order() {
        let mut table = PrioTable::new();

        table.insert(10);
        table.insert(5);
        table.insert(3);
        table.insert(0);
        table.insert(15);

        assert_eq!(table.get_highest(), Some(15));

        table.remove(15);
        assert_eq!(table.get_highest(), Some(10));

        table.remove(10);
        assert_eq!(table.get_highest(), Some(5));
    }
}
